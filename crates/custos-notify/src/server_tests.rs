//! Tests for the notification server.

use std::io::Write;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use custos_config::HttpEndpoint;
use rstest::{fixture, rstest};

use crate::{Notification, NotificationServer, NotificationSink, NotificationTracker, Signal};

#[derive(Default)]
struct RecordingSink {
    received: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    fn kinds(&self) -> Vec<&'static str> {
        self.received
            .lock()
            .expect("recording sink lock")
            .iter()
            .map(Notification::kind)
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, notification: Notification) {
        self.received
            .lock()
            .expect("recording sink lock")
            .push(notification);
    }
}

#[fixture]
fn server() -> NotificationServer {
    NotificationServer::bind_loopback().expect("bind notification server")
}

fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

const LISTENING: &[u8] =
    b"{\"name\":\"http_listening\",\"value\":{\"type\":\"HTTP\",\"address\":\"127.0.0.1\",\"port\":8093}}\n";

#[rstest]
fn feeds_tracker_from_connection(server: NotificationServer) {
    let addr = server.local_addr();
    let tracker = Arc::new(NotificationTracker::new());
    let handle = server
        .start(Arc::clone(&tracker) as Arc<dyn NotificationSink>)
        .expect("start server");

    let mut client = TcpStream::connect(addr).expect("connect");
    client.write_all(LISTENING).expect("write notification");

    assert_eq!(
        tracker.wait_for_listening(Duration::from_secs(2)),
        Some(HttpEndpoint::new("127.0.0.1", 8093))
    );
    handle.stop().expect("stop server");
}

#[rstest]
fn skips_malformed_lines_and_joins_split_writes(server: NotificationServer) {
    let addr = server.local_addr();
    let sink = Arc::new(RecordingSink::default());
    let handle = server
        .start(Arc::clone(&sink) as Arc<dyn NotificationSink>)
        .expect("start server");

    let mut client = TcpStream::connect(addr).expect("connect");
    client.write_all(b"garbage\n\n").expect("write garbage");
    let (head, tail) = LISTENING.split_at(20);
    client.write_all(head).expect("write head");
    client.flush().expect("flush");
    thread::sleep(Duration::from_millis(120));
    client.write_all(tail).expect("write tail");

    assert!(wait_until(|| sink.kinds() == vec!["http_listening"]));
    handle.stop().expect("stop server");
}

#[rstest]
fn serves_several_connections(server: NotificationServer) {
    let addr = server.local_addr();
    let tracker = Arc::new(NotificationTracker::new());
    let handle = server
        .start(Arc::clone(&tracker) as Arc<dyn NotificationSink>)
        .expect("start server");

    let mut first = TcpStream::connect(addr).expect("connect first");
    let mut second = TcpStream::connect(addr).expect("connect second");
    first.write_all(LISTENING).expect("write listening");
    second
        .write_all(b"{\"name\":\"attempt_closing_wallets\",\"value\":{\"wallets\":[\"a\",\"b\"]}}\n")
        .expect("write closing");

    assert!(wait_until(|| tracker.snapshot().len() == 2));
    assert!(tracker.is_latched(Signal::Listening));
    assert!(tracker.is_latched(Signal::WalletsClosing));
    handle.stop().expect("stop server");
}

#[rstest]
fn stop_returns_while_clients_stay_connected(server: NotificationServer) {
    let addr = server.local_addr();
    let sink = Arc::new(RecordingSink::default());
    let handle = server
        .start(Arc::clone(&sink) as Arc<dyn NotificationSink>)
        .expect("start server");
    let mut client = TcpStream::connect(addr).expect("connect");
    client.write_all(LISTENING).expect("write");
    assert!(wait_until(|| !sink.kinds().is_empty()));

    let started = Instant::now();
    handle.stop().expect("stop server");
    assert!(started.elapsed() < Duration::from_secs(2));

    // Lines written after shutdown are never delivered.
    let _ = client.write_all(LISTENING);
    thread::sleep(Duration::from_millis(100));
    assert_eq!(sink.kinds().len(), 1);
}

#[test]
fn bind_reports_address_in_use() {
    let first = NotificationServer::bind_loopback().expect("bind first");
    let error = NotificationServer::bind(first.local_addr()).expect_err("port is taken");
    assert!(matches!(error, crate::ServerError::Bind { .. }));
}
