pub mod toml_config;

pub use toml_config::{
    NotionProperties, PipelineConfig, RepositoryConfig, RetentionConfig, ScoringConfig,
    SourceConfig, TrackerConfig, Worklist,
};
