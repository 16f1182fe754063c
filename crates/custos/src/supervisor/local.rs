use std::fs;
use std::io::{self, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use custos_config::{Config, ProcessSettings};
use tracing::{debug, info, warn};

use super::{CustodianProcess, KeyPair, ProcessSupervisor, SupervisorError};
use crate::SUPERVISOR_TARGET;

#[cfg(unix)]
use libc::{SIGTERM, kill};

/// Time a custodian gets to exit after `SIGTERM` before it is killed.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

const EXIT_POLL: Duration = Duration::from_millis(25);

/// Runs the custodian binary on this machine.
///
/// The custodian is invoked as
/// `<binary> [args...] --notifications-endpoint <addr> --webserver-http-endpoint <addr> -d <dir>`
/// with its standard streams detached.
#[derive(Debug, Clone)]
pub struct LocalSupervisor {
    binary: String,
    args: Vec<String>,
    grace: Duration,
}

impl LocalSupervisor {
    /// Supervisor for `binary`, resolved through `PATH` when relative.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            grace: DEFAULT_STOP_GRACE,
        }
    }

    /// Supervisor for the binary named in `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.custodian_binary.clone())
    }

    /// Arguments placed before the generated flags.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Overrides the stop grace period.
    #[must_use]
    pub const fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(&self.args);
        command
    }

    fn map_spawn_error(&self, source: io::Error) -> SupervisorError {
        if source.kind() == io::ErrorKind::NotFound {
            SupervisorError::BinaryNotFound {
                binary: self.binary.clone(),
                source,
            }
        } else {
            SupervisorError::Spawn {
                binary: self.binary.clone(),
                source,
            }
        }
    }
}

fn prepare_working_directory(path: &Utf8Path) -> Result<(), SupervisorError> {
    fs::create_dir_all(path).map_err(|source| SupervisorError::WorkingDirectory {
        path: path.to_string(),
        source,
    })
}

impl ProcessSupervisor for LocalSupervisor {
    fn spawn(
        &self,
        settings: &ProcessSettings,
    ) -> Result<Box<dyn CustodianProcess>, SupervisorError> {
        prepare_working_directory(settings.working_directory())?;
        let mut command = self.command();
        if let Some(address) = settings.notification_endpoint() {
            command.arg("--notifications-endpoint").arg(address.to_string());
        }
        command
            .arg("--webserver-http-endpoint")
            .arg(settings.rpc_endpoint().address())
            .arg("-d")
            .arg(settings.working_directory().as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        debug!(
            target: SUPERVISOR_TARGET,
            binary = %self.binary,
            rpc_endpoint = %settings.rpc_endpoint(),
            working_directory = %settings.working_directory(),
            "spawning custodian"
        );
        let child = command
            .spawn()
            .map_err(|source| self.map_spawn_error(source))?;
        info!(target: SUPERVISOR_TARGET, pid = child.id(), "custodian spawned");
        Ok(Box::new(LocalProcess {
            child,
            grace: self.grace,
        }))
    }

    fn export_keys(
        &self,
        working_directory: &Utf8Path,
        wallet: &str,
        password: &str,
        destination: &Utf8Path,
    ) -> Result<Vec<KeyPair>, SupervisorError> {
        let export_error = |source: io::Error| SupervisorError::ExportIo {
            wallet: wallet.to_owned(),
            source,
        };
        let mut child = self
            .command()
            .arg("-d")
            .arg(working_directory.as_str())
            .arg("--export-keys-wallet")
            .arg(wallet)
            .arg("--export-keys-path")
            .arg(destination.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| self.map_spawn_error(source))?;

        // The password travels over stdin so it never shows up in `ps`.
        if let Some(mut stdin) = child.stdin.take() {
            writeln!(stdin, "{password}").map_err(export_error)?;
        }
        let output = child.wait_with_output().map_err(export_error)?;
        if !output.status.success() {
            return Err(SupervisorError::ExportFailed {
                wallet: wallet.to_owned(),
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let contents = fs::read(destination).map_err(export_error)?;
        let keys: Vec<KeyPair> =
            serde_json::from_slice(&contents).map_err(|source| SupervisorError::ExportDecode {
                wallet: wallet.to_owned(),
                source,
            })?;
        debug!(
            target: SUPERVISOR_TARGET,
            wallet,
            count = keys.len(),
            "exported wallet keys"
        );
        Ok(keys)
    }
}

struct LocalProcess {
    child: Child,
    grace: Duration,
}

impl LocalProcess {
    fn request_exit(&mut self) -> Result<(), SupervisorError> {
        let pid = self.child.id();
        #[cfg(unix)]
        {
            let raw_pid = libc::pid_t::try_from(pid).map_err(|_| SupervisorError::Signal {
                pid,
                source: io::Error::from(io::ErrorKind::InvalidInput),
            })?;
            // SAFETY: `kill(2)` only reads its integer arguments; an invalid
            // pid is reported through the return value.
            let result = unsafe { kill(raw_pid, SIGTERM) };
            if result == 0 {
                Ok(())
            } else {
                Err(SupervisorError::Signal {
                    pid,
                    source: io::Error::last_os_error(),
                })
            }
        }
        #[cfg(not(unix))]
        {
            self.child
                .kill()
                .map_err(|source| SupervisorError::Signal { pid, source })
        }
    }

    fn wait_for_exit(&mut self, deadline: Instant) -> Result<bool, SupervisorError> {
        let pid = self.child.id();
        loop {
            match self.child.try_wait() {
                Ok(Some(status)) => {
                    debug!(target: SUPERVISOR_TARGET, pid, ?status, "custodian exited");
                    return Ok(true);
                }
                Ok(None) if Instant::now() >= deadline => return Ok(false),
                Ok(None) => thread::sleep(EXIT_POLL),
                Err(source) => return Err(SupervisorError::Wait { pid, source }),
            }
        }
    }
}

impl CustodianProcess for LocalProcess {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn stop(&mut self) -> Result<(), SupervisorError> {
        if !self.is_running() {
            // Reap so the pid is not left as a zombie.
            let _ = self.child.wait();
            return Ok(());
        }
        let pid = self.child.id();
        self.request_exit()?;
        if self.wait_for_exit(Instant::now() + self.grace)? {
            return Ok(());
        }
        warn!(
            target: SUPERVISOR_TARGET,
            pid,
            grace_ms = self.grace.as_millis(),
            "custodian ignored SIGTERM, killing"
        );
        self.child
            .kill()
            .map_err(|source| SupervisorError::Signal { pid, source })?;
        self.child
            .wait()
            .map(|_| ())
            .map_err(|source| SupervisorError::Wait { pid, source })
    }
}

impl Drop for LocalProcess {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    #[fixture]
    fn workspace() -> TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    fn utf8(dir: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir")
    }

    #[rstest]
    fn missing_binary_is_reported(workspace: TempDir) {
        let supervisor = LocalSupervisor::new("custos-test-no-such-custodian");
        let settings = ProcessSettings::new(utf8(&workspace).join("wallets"));
        let Err(error) = supervisor.spawn(&settings) else {
            panic!("spawning a missing binary must fail");
        };
        assert!(matches!(error, SupervisorError::BinaryNotFound { .. }));
    }

    #[cfg(unix)]
    fn shell_supervisor(dir: &TempDir, script: &str) -> LocalSupervisor {
        let path = dir.path().join("custodian.sh");
        fs::write(&path, script).expect("write script");
        LocalSupervisor::new("/bin/sh")
            .with_args([path.to_string_lossy().into_owned()])
            .with_grace(Duration::from_millis(500))
    }

    #[cfg(unix)]
    #[rstest]
    fn stop_terminates_running_custodian(workspace: TempDir) {
        let supervisor = shell_supervisor(&workspace, "exec sleep 30\n");
        let mut settings = ProcessSettings::new(utf8(&workspace).join("wallets"));
        let address: SocketAddr = "127.0.0.1:9".parse().expect("socket address");
        settings.assign_notification_endpoint(address);

        let mut process = supervisor.spawn(&settings).expect("spawn custodian");
        assert!(process.is_running());
        assert!(workspace.path().join("wallets").is_dir());

        process.stop().expect("stop custodian");
        assert!(!process.is_running());
        process.stop().expect("second stop is a no-op");
    }

    #[cfg(unix)]
    #[rstest]
    fn stop_kills_custodian_ignoring_sigterm(workspace: TempDir) {
        let supervisor = shell_supervisor(&workspace, "trap '' TERM\nwhile :; do sleep 1; done\n")
            .with_grace(Duration::from_millis(200));
        let settings = ProcessSettings::new(utf8(&workspace));
        let mut process = supervisor.spawn(&settings).expect("spawn custodian");
        // Give the shell time to install its trap.
        thread::sleep(Duration::from_millis(100));

        process.stop().expect("stop custodian");
        assert!(!process.is_running());
    }

    #[cfg(unix)]
    const EXPORT_SCRIPT: &str = r#"read password
[ "$password" = "hunter2" ] || { echo "Invalid password for wallet" >&2; exit 3; }
while [ $# -gt 0 ]; do
  case "$1" in
    --export-keys-path) dest="$2"; shift ;;
  esac
  shift
done
printf '[{"public_key":"STM5RqVBAVNp5ufMCetQtvLGLJo7unX9nyCBMMrTXRWQ9i1Zzzizh","wif_private_key":"5KTNAYSHVzhnVPrwHpKhc5QqNQt6aW8JsrMT7T4hyrKydzYvYik"}]' > "$dest"
"#;

    #[cfg(unix)]
    #[rstest]
    fn export_keys_reads_destination_file(workspace: TempDir) {
        let supervisor = shell_supervisor(&workspace, EXPORT_SCRIPT);
        let destination = utf8(&workspace).join("alice.keys");

        let keys = supervisor
            .export_keys(&utf8(&workspace), "alice", "hunter2", &destination)
            .expect("export keys");

        assert_eq!(keys.len(), 1);
        assert!(keys.iter().all(|pair| pair.public_key.starts_with("STM")));
    }

    #[cfg(unix)]
    #[rstest]
    fn export_keys_surfaces_failures(workspace: TempDir) {
        let supervisor = shell_supervisor(&workspace, EXPORT_SCRIPT);
        let destination = utf8(&workspace).join("alice.keys");

        let error = supervisor
            .export_keys(&utf8(&workspace), "alice", "wrong", &destination)
            .expect_err("wrong password must fail");

        let SupervisorError::ExportFailed { status, stderr, .. } = error else {
            panic!("expected export failure, got {error:?}");
        };
        assert_eq!(status, Some(3));
        assert_eq!(stderr, "Invalid password for wallet");
    }
}
