pub mod data;
pub mod io;
pub mod printing;

pub use data::{Config, DecisionConfig, LlmConfig, OrchestratorConfig, ToolBackendConfig};
pub use io::ConfigError;
