use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::trace;

pub fn cmd_program(program: &str, args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(|s| s.as_str()));
    cmd
}

/// Ask the child to stop, then kill it if it is still alive after `grace`.
pub async fn kill_graceful(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    terminate(child);
    if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
        trace!(target: "relay.exec.proc", ?status, "child exited within grace");
        return status.map(|_| ());
    }
    child.kill().await
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn terminate(child: &Child) {
            if let Some(id) = child.id() {
                // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs to our unreaped child.
                unsafe {
                    libc::kill(id as libc::pid_t, libc::SIGTERM);
                }
            }
        }
    } else {
        fn terminate(_child: &Child) {}
    }
}
