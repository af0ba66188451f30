pub mod access;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod oracle;
pub mod stations;
pub mod store;

pub use access::{AllowList, PgAllowList, StaticAllowList};
pub use config::SeatWatchConfig;
pub use error::SeatWatchError;
pub use models::{MonitoringRequest, RequestStatus, TimeSlot};
pub use notify::{Notifier, NotifyError, TelegramNotifier};
pub use oracle::{AvailabilityOracle, CommandOracle, HttpOracle, OracleError};
pub use stations::{StationCatalog, StationMatch};
pub use store::{MemoryRequestStore, PgRequestStore, RequestStore, StoreError};
