//! Test suites for the custodian handles.

mod support;
