//! Remote bootstrap over an existing ssh control channel: ship this very
//! program to the far host, run it there with the roles inverted, and relay
//! its console output into the local log.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::error::PunchError;
use crate::rendezvous::PunchTarget;

pub mod drain;

pub use drain::StreamDrain;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launches the reverse punch on the remote host and babysits its output
/// until the session ends. Failures here are fatal to this task only; the
/// local engine reports its own result independently.
pub struct RemoteBootstrap {
    target: PunchTarget,
}

impl RemoteBootstrap {
    pub fn new(target: PunchTarget) -> Self {
        Self { target }
    }

    pub async fn execute(self) -> Result<(), PunchError> {
        let exe_path = std::env::current_exe()
            .map_err(|err| PunchError::ControlChannel(err.to_string()))?;
        let exe = std::fs::File::open(&exe_path).map_err(|err| {
            PunchError::ControlChannel(format!("{}: {err}", exe_path.display()))
        })?;

        log::trace!(target: "pinhole", "Spawning control channel to {}", self.target.host);
        let mut child = Command::new("ssh")
            .arg(&self.target.host)
            .arg(remote_command(self.target.port))
            .stdin(Stdio::from(exe))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| PunchError::ControlChannel(err.to_string()))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            PunchError::ControlChannel("remote stdout was not captured".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            PunchError::ControlChannel("remote stderr was not captured".to_string())
        })?;

        relay_console(StreamDrain::new(stdout), StreamDrain::new(stderr)).await;

        let status = child
            .wait()
            .await
            .map_err(|err| PunchError::ControlChannel(err.to_string()))?;
        if !status.success() {
            return Err(PunchError::ControlChannel(format!(
                "remote session exited with {status}"
            )));
        }

        Ok(())
    }
}

/// The far side lands our bytes in a temp file and runs them with only the
/// port argument; sshd's `SSH_CLIENT` tells that instance who we are, which
/// resolves its role to remote.
fn remote_command(port: u16) -> String {
    format!(r#"t="$(mktemp)" && cat > "$t" && chmod +x "$t" && "$t" {port}; s=$?; rm -f "$t"; exit $s"#)
}

/// Polls both drains until each reports end-of-stream with an empty buffer.
/// stdout and stderr are drained by independent tasks, so a full pipe on one
/// never stalls the remote process while the other is quiet.
async fn relay_console(mut stdout: StreamDrain, mut stderr: StreamDrain) {
    while !(stdout.is_drained_and_closed() && stderr.is_drained_and_closed()) {
        for line in stdout.take_available() {
            log::info!(target: "pinhole", "Background stdout: {line}");
        }
        for line in stderr.take_available() {
            log::info!(target: "pinhole", "Background stderr: {line}");
        }

        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn remote_command_runs_streamed_payload_with_port_only() {
        let cmd = remote_command(60001);
        assert!(cmd.contains(r#"cat > "$t""#));
        assert!(cmd.contains(r#""$t" 60001"#));
        assert!(cmd.contains(r#"rm -f "$t""#));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_burst_larger_than_pipe_buffer_does_not_stall_the_child() {
        pinhole_logging::setup_log_no_panic_hook();
        // ~160 KiB of stderr before the final stdout line, far beyond the
        // default 64 KiB pipe buffer; without a concurrent stderr drain the
        // child would block mid-burst and "finished" would never appear
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(
                "i=0; while [ $i -lt 5000 ]; do \
                 echo xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx >&2; i=$((i+1)); \
                 done; echo finished",
            )
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();

        let mut stdout = StreamDrain::new(child.stdout.take().unwrap());
        let mut stderr = StreamDrain::new(child.stderr.take().unwrap());

        let mut out_lines = Vec::new();
        let mut err_lines = 0usize;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
        while !(stdout.is_drained_and_closed() && stderr.is_drained_and_closed()) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "drains never reached end-of-stream"
            );
            out_lines.extend(stdout.take_available());
            err_lines += stderr.take_available().count();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(out_lines, vec!["finished"]);
        assert_eq!(err_lines, 5000);
        assert!(child.wait().await.unwrap().success());
    }
}
