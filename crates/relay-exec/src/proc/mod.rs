use std::{path::PathBuf, process::Stdio, time::Duration};

use relay_core::{CancelSignal, ProgressSource, ProgressSubject, Task};
use relay_model::TaskError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, trace};

use crate::{
    error::{ExecError, ExecResult},
    util::{cmd_program, kill_graceful},
};

/// Process configuration for a [`ProcTask`].
#[derive(Clone, Debug)]
pub struct ProcConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// Return an error if the exit code is non-zero.
    pub fail_on_non_zero: bool,
    /// How long a cancelled child gets between SIGTERM and kill.
    pub grace: Duration,
}

impl Default for ProcConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            fail_on_non_zero: true,
            grace: Duration::from_secs(2),
        }
    }
}

/// Runs a child process; stdout lines are emitted as progress, the exit code is the output.
///
/// The lane drives a private current-thread runtime, so cancellation is event-driven rather than polled.
pub struct ProcTask {
    name: String,
    cfg: ProcConfig,
    output: ProgressSubject<String>,
}

impl ProcTask {
    pub fn new(cfg: ProcConfig) -> Self {
        Self {
            name: "proc".to_string(),
            cfg,
            output: ProgressSubject::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Stdout of the child, one notification per line.
    pub fn output(&self) -> &ProgressSubject<String> {
        &self.output
    }
}

impl Task for ProcTask {
    type Output = i32;

    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, signal: &CancelSignal) -> Result<i32, TaskError> {
        if self.cfg.program.is_empty() {
            return Err(ExecError::MissingProgram.into());
        }
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ExecError::Runtime(e.to_string()))?;

        match rt.block_on(supervise(&self.cfg, &self.output, signal)) {
            Ok(Some(code)) => Ok(code),
            Ok(None) => Err(TaskError::Canceled),
            Err(e) => Err(e.into()),
        }
    }

    fn progress_source(&self) -> Option<&dyn ProgressSource> {
        Some(&self.output)
    }
}

/// `Ok(None)` means the child was stopped because of cancellation.
async fn supervise(
    cfg: &ProcConfig,
    output: &ProgressSubject<String>,
    signal: &CancelSignal,
) -> ExecResult<Option<i32>> {
    trace!(target: "relay.exec.proc", program = %cfg.program, args = ?cfg.args, "spawn");

    let mut cmd = cmd_program(&cfg.program, &cfg.args);
    if let Some(cwd) = &cfg.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in &cfg.env {
        cmd.env(k, v);
    }
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::inherit());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| ExecError::Spawn(e.to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ExecError::Io("stdout was not captured".into()))?;

    let lines_out = output.clone();
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            lines_out.emit(line);
        }
    });

    tokio::select! {
        status = child.wait() => {
            let status = status?;
            let _ = reader.await;

            if !status.success() && cfg.fail_on_non_zero {
                return Err(match status.code() {
                    Some(code) => ExecError::NonZeroExit { code },
                    None => ExecError::KilledBySignal,
                });
            }
            debug!(target: "relay.exec.proc", code = ?status.code(), "exit");
            Ok(Some(status.code().unwrap_or(-1)))
        }
        _ = signal.cancelled() => {
            debug!(target: "relay.exec.proc", "cancelled; stopping child");
            let _ = kill_graceful(&mut child, cfg.grace).await;
            reader.abort();
            Ok(None)
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use relay_core::CancelController;
    use std::{
        sync::{Arc, Mutex},
        thread,
        time::Instant,
    };

    fn sh(script: &str) -> ProcConfig {
        ProcConfig {
            program: "sh".into(),
            args: vec!["-c".into(), script.into()],
            ..Default::default()
        }
    }

    #[test]
    fn stdout_lines_become_progress() {
        let mut task = ProcTask::new(sh("echo one; echo two")).with_name("echo");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        task.output()
            .subscribe(move |line: &String| sink.lock().unwrap().push(line.clone()))
            .detach();

        assert_eq!(task.run(&CancelController::new().signal()), Ok(0));
        assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
        assert_eq!(task.name(), "echo");
    }

    #[test]
    fn non_zero_exit_is_a_failure() {
        let mut task = ProcTask::new(sh("exit 3"));
        assert_eq!(
            task.run(&CancelController::new().signal()),
            Err(TaskError::fail("non-zero exit code: 3"))
        );
    }

    #[test]
    fn non_zero_exit_can_be_tolerated() {
        let mut task = ProcTask::new(ProcConfig {
            fail_on_non_zero: false,
            ..sh("exit 3")
        });
        assert_eq!(task.run(&CancelController::new().signal()), Ok(3));
    }

    #[test]
    fn empty_program_is_rejected() {
        let mut task = ProcTask::new(ProcConfig::default());
        assert_eq!(
            task.run(&CancelController::new().signal()),
            Err(TaskError::fail("missing program"))
        );
    }

    #[test]
    fn cancellation_stops_the_child() {
        let ctl = CancelController::new();
        let signal = ctl.signal();
        let lane = thread::spawn(move || {
            let started = Instant::now();
            let result = ProcTask::new(sh("sleep 30")).run(&signal);
            (result, started.elapsed())
        });

        thread::sleep(Duration::from_millis(100));
        ctl.request_cancel();

        let (result, elapsed) = lane.join().unwrap();
        assert_eq!(result, Err(TaskError::Canceled));
        assert!(elapsed < Duration::from_secs(10));
    }
}
