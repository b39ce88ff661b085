pub mod cli;
pub mod config;
pub mod device;
pub mod directory;
pub mod enrollment;
pub mod error;
pub mod logging;
pub mod logs;
pub mod models;
pub mod parser;
pub mod session;
pub mod sync;
pub mod transport;
pub mod tui;
pub mod utils;

pub use config::PortalConfig;
pub use device::DeviceApi;
pub use error::PortalError;
pub use models::{Credentials, LogEntry, SyncStatus, User};
pub use session::Session;
