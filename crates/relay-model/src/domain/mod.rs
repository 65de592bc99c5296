mod run_id;
pub use run_id::RunId;

mod run_status;
pub use run_status::RunStatus;

mod run_info;
pub use run_info::RunInfo;

mod event;
pub use event::{EventKind, RunEvent};

mod step_progress;
pub use step_progress::StepProgress;

/// Human-readable task name used in logs, events and lane names.
pub type TaskName = String;
