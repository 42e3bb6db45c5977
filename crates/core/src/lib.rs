pub mod classifier;
pub mod config;
pub mod monitor;
pub mod outcome;
pub mod record;
pub mod resolver;
pub mod swarm;
pub mod testing;

pub use classifier::{classify, extract_name, Classified};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DatabaseConfig,
    LsdConfig, OutcomeLogConfig, SessionConfig,
};
pub use monitor::{MonitorConfig, MonitorError, MonitorStatus, SwarmMonitor};
pub use outcome::{
    create_outcome_log, FileOutcomeSink, OutcomeEntry, OutcomeHandle, OutcomeSink, OutcomeStatus,
    OutcomeWriter, SinkError,
};
pub use record::{
    RecordError, RecordStore, ResolutionStatus, SqliteRecordStore, StatusCounts, TorrentRecord,
    UpsertRecord, UNKNOWN_NAME,
};
pub use resolver::{
    MetadataResolver, Resolution, ResolutionOutcome, ResolutionState, ResolveError,
    ResolverConfig,
};
pub use swarm::{
    FetchHandle, FetchOptions, InfoHash, LibrqbitObserver, MagnetInfo, SwarmError, SwarmEvent,
    SwarmObserver, TorrentFile,
};
