pub mod config;
pub mod deadline;
pub mod error;
pub mod notify;
pub mod store;
pub mod types;

pub use config::{Config, Timeouts};
pub use deadline::with_deadline;
pub use error::{Error, Result, Stage};
pub use notify::Notifier;
pub use store::{RegistryStore, WindowTx};
pub use types::*;
