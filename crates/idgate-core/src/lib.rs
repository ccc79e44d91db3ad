//! idgate Core: domain models, repository contracts, clock and error
//! taxonomy shared by every other crate.

pub mod clock;
pub mod error;
pub mod models;
pub mod repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorKind, IdgateError, IdgateResult};
