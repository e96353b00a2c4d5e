use wayfare_core::config::ClientConfig;
use wayfare_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::commands::common::CliContext;
use crate::error::CliError;

pub fn run_config(context: &CliContext, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            api_base_url,
            user_id,
            mirror_timeout_ms,
            auth_token,
        } => {
            let updated = run_config_init(
                context,
                api_base_url,
                user_id,
                mirror_timeout_ms,
                auth_token,
            )?;
            println!("Saved config to {}", context.config_path.display());
            println!("{}", render_config(&updated)?);
            Ok(())
        }
        ConfigCommands::Show => {
            println!("config: {}", context.config_path.display());
            println!("database: {}", context.db_path.display());
            println!("{}", render_config(&context.config)?);
            Ok(())
        }
    }
}

/// Merge explicit values into the config file on disk. Environment overrides
/// are not written back.
pub fn run_config_init(
    context: &CliContext,
    api_base_url: Option<String>,
    user_id: Option<String>,
    mirror_timeout_ms: Option<u64>,
    auth_token: Option<String>,
) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::load_from_path(&context.config_path)?;

    if let Some(url) = normalize_text_option(api_base_url) {
        config.api_base_url = Some(url);
    }
    if let Some(user) = normalize_text_option(user_id) {
        config.user_id = Some(user);
    }
    if mirror_timeout_ms.is_some() {
        config.mirror_timeout_ms = mirror_timeout_ms;
    }
    if let Some(token) = normalize_text_option(auth_token) {
        config.auth_token = Some(token);
    }

    config.save_to_path(&context.config_path)?;
    ClientConfig::load_from_path(&context.config_path).map_err(CliError::from)
}

pub fn render_config(config: &ClientConfig) -> Result<String, CliError> {
    let mut shown = config.clone();
    if shown.auth_token.is_some() {
        shown.auth_token = Some("[REDACTED]".to_string());
    }
    Ok(serde_json::to_string_pretty(&shown)?)
}
