use super::context::{load, GlobalOptions};
use crate::config::{find_config_file, CliOverrides};
use crate::errors::KostyError;

pub async fn handle_validate(global: &GlobalOptions) -> Result<(), KostyError> {
    let path = find_config_file(global.config_file.as_deref())?;
    let settings = load(global, &CliOverrides::default()).await?;
    match path {
        Some(p) => println!("Configuration is valid: {} (profile '{}')", p.display(), settings.profile),
        None => println!("No configuration file found; built-in defaults are valid"),
    }
    Ok(())
}
