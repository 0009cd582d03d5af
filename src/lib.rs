pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod progress;
pub mod scheduler;
pub mod signal;
pub mod staleness;
pub mod sync;
pub mod utils;

pub use config::{
    dump_config, load_settings, save_settings, settings_path, BackupConfig, Settings,
    MAX_INTERVAL_SECS, MIN_INTERVAL_SECS,
};
pub use error::IncbakError;
pub use filter::{matches, parse_filters};
pub use logging::init_logging;
pub use progress::CountdownDisplay;
pub use scheduler::{CountdownTick, RunScheduler, ScheduleState};
pub use signal::StopSignal;
pub use staleness::needs_copy;
pub use sync::{synchronize, RunError, RunResult, SyncEvent};

/// Main library result type
pub type Result<T> = std::result::Result<T, IncbakError>;
