pub mod config;
pub mod error;
pub mod naming;
pub mod partitioner;

pub use config::{MissingPropertyPolicy, SourceConfig, SplitConfig};
pub use error::SplitError;
pub use naming::{normalize_name, UnsafeNamePolicy};
pub use partitioner::{GroupOutcome, SplitSummary};

pub fn process_files(config: &SplitConfig) -> Result<SplitSummary, SplitError> {
    partitioner::split(config)
}
