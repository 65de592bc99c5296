pub mod error;
pub use error::CoreError;

pub mod cancel;
pub use cancel::{CancelController, CancelSignal};

pub mod progress;
pub use progress::{ProgressSource, ProgressSubject, Subscription};

pub mod home;
pub use home::{HomeContext, HomeHandle, HomeLoop, Job};

pub mod task;
pub use task::Task;

pub mod subscriber;
pub use subscriber::Subscribe;

pub mod state;
pub use state::RunState;

pub mod synchronizer;
pub use synchronizer::{RunHandle, Synchronizer, SynchronizerConfig};

pub mod prelude {
    pub use crate::{
        CancelSignal, HomeContext, HomeLoop, ProgressSubject, RunHandle, Synchronizer, Task,
    };
    pub use relay_model::{TaskError, TaskOutcome};
}
