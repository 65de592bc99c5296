//! Plain data shared by every relay crate.
//!
//! Nothing here knows about threads or home contexts: these are the values that travel between a worker lane and the caller.

mod domain;
pub use domain::*;

mod error;
pub use error::TaskError;

mod outcome;
pub use outcome::TaskOutcome;
