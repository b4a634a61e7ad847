pub mod parser;
pub mod schema;
pub mod settings;
pub mod types;
pub mod validation;

pub use parser::{find_config_file, load_settings, parse_config, parse_config_str};
pub use settings::{CliOverrides, Settings, DEFAULT_PROFILE, RUN_MAX_WORKERS};
pub use types::*;
pub use validation::{validate_settings, VALID_REGIONS, VALID_SERVICES};
