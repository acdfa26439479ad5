pub mod config;
pub mod parser;

pub use config::{CommandConfig, Config, ConfigFile, ScriptConfig, TimeoutConfig};
pub use parser::{parse_config_from_file, parse_config_from_str};
