pub mod env;
mod loader;

pub use env::{
    AppConfig, BroadcastConfig, DirectoryConfig, LlmConfig, LlmProviderConfig, LoggingConfig,
    ModelConfig, OutreachConfig, ReplayConfig,
};
pub use loader::load_config;
