use crate::error::{CliError, Result};
use colored::Colorize;
use delegation::{DelegationConfig, SdkError};
use serde_json::json;
use std::path::PathBuf;

pub fn validate(
    token: &str,
    target: Option<&str>,
    key_dir: Option<PathBuf>,
    require_signature: bool,
    mut config: DelegationConfig,
    json_output: bool,
) -> Result<()> {
    if require_signature {
        config.require_signature = Some(true);
    }
    let service = super::service(config, key_dir)?;

    let accepted = match service.parse(token, target) {
        Ok(accepted) => accepted,
        Err(SdkError::Token(delegation::TokenError::InvalidToken(reason))) => {
            return Err(CliError::Rejected(reason))
        }
        Err(e) => return Err(e.into()),
    };

    if json_output {
        let output = json!({
            "success": true,
            "valid": true,
            "token": super::token_json(&accepted),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        let who = accepted
            .user()
            .map(super::describe_identity)
            .unwrap_or_else(|| "(no user)".to_string());
        println!("{} Token is valid", "✓".green());
        println!("  User:    {who}");
        println!("  Scope:   {}", accepted.scope());
        println!("  Expires: {}", accepted.expiry().to_rfc3339());
        if !accepted.is_signed() {
            println!("  {} Token is unsigned", "!".yellow());
        }
    }

    Ok(())
}
