//! Contract registration: fans a negotiated multi-farmer aggregate out to the
//! contract store and the audit queue, one isolated pipeline per farmer.

pub mod cancel;
pub mod config;
pub mod error;
mod recovery;
mod registrar;

pub use cancel::{CancelHandle, CancelSignal, cancellation};
pub use config::{ConfigError, RegistrarConfig};
pub use error::RegistrarError;
pub use recovery::{RecoveryFailure, RecoveryReport};
pub use registrar::{FarmerOutcome, RegisteredContract, Registrar, RegistrationResult};
