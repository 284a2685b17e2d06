pub mod backup;
pub mod error;
pub mod logging;
pub mod notification;
pub mod resolver;
pub mod restore;

pub use error::{BackupError, FetchAttempt};
