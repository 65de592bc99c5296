mod error;
pub use error::{ExecError, ExecResult};

pub mod r#fn;
pub use r#fn::{FnTask, ReportingFnTask};

pub mod step;
pub use step::{StepConfig, StepTask};

#[cfg(feature = "proc")]
mod util;

#[cfg(feature = "proc")]
pub mod proc;
#[cfg(feature = "proc")]
pub use proc::{ProcConfig, ProcTask};

pub mod prelude {
    pub use crate::error::{ExecError, ExecResult};
    pub use crate::{FnTask, ReportingFnTask, StepConfig, StepTask};

    #[cfg(feature = "proc")]
    pub use crate::{ProcConfig, ProcTask};
}
