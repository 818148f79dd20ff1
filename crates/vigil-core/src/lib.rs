pub mod alerts;
pub mod analytics;
pub mod callbacks;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod permissions;
pub mod resolver;
pub mod session;
pub mod signal;
pub mod smoothing;

pub use analytics::{format_duration, SessionResult, Summary};
pub use callbacks::{EngineCallbacks, NullCallbacks};
pub use config::EngineConfig;
pub use engine::{EngineDeps, SessionEngine, StatusSnapshot};
pub use error::{EngineError, ErrorKind, SourceError, StartError};
pub use ledger::UsageLedger;
pub use resolver::{MonitoringMode, Status};
pub use signal::{RawSignal, ScreenObservation, VisionObservation};
