use crate::error::Result;
use chrono::Utc;
use colored::Colorize;
use delegation::{DelegationConfig, DelegationToken, InvalidDelegationToken};
use serde_json::json;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignatureStatus {
    Valid,
    Absent,
    Unverified,
}

impl SignatureStatus {
    fn as_str(self) -> &'static str {
        match self {
            SignatureStatus::Valid => "valid",
            SignatureStatus::Absent => "absent",
            SignatureStatus::Unverified => "unverified",
        }
    }
}

/// Decodes the token, checking the signature when a public key is available.
fn decode(
    token: &str,
    mut config: DelegationConfig,
    key_dir: Option<PathBuf>,
) -> Result<(DelegationToken, SignatureStatus)> {
    config.require_signature = Some(false);
    let service = super::service(config, key_dir)?;

    match service.decode(token) {
        Ok(decoded) if decoded.is_signed() => Ok((decoded, SignatureStatus::Valid)),
        Ok(decoded) => Ok((decoded, SignatureStatus::Absent)),
        Err(e) if e.rejection() == Some(&InvalidDelegationToken::NoVerificationKey) => {
            Ok((delegation::decode(token)?.token, SignatureStatus::Unverified))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn inspect(
    token: &str,
    key_dir: Option<PathBuf>,
    config: DelegationConfig,
    json_output: bool,
    verbose: bool,
) -> Result<()> {
    let (decoded, signature) = decode(token, config, key_dir)?;
    let expired = decoded.is_expired_at(Utc::now());

    if json_output {
        let output = json!({
            "success": true,
            "token": super::token_json(&decoded),
            "signature": signature.as_str(),
            "expired": expired,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", "Delegation token".bold());
    for identity in decoded.identities() {
        println!(
            "  {:<10} {}",
            format!("{}:", identity.identity_type().tag()),
            super::describe_identity(identity)
        );
    }
    println!("  {:<10} {}", "scope:", decoded.scope());
    let expiry = decoded.expiry().to_rfc3339();
    if expired {
        println!("  {:<10} {} {}", "expiry:", expiry, "(expired)".red());
    } else {
        println!("  {:<10} {}", "expiry:", expiry);
    }
    if !decoded.domains().is_empty() {
        println!("  {:<10} {}", "domains:", decoded.domains().join(", "));
    }
    let status = match signature {
        SignatureStatus::Valid => "valid".green(),
        SignatureStatus::Absent => "absent".yellow(),
        SignatureStatus::Unverified => "not verified (no public key)".yellow(),
    };
    println!("  {:<10} {}", "signature:", status);

    if verbose {
        if let Some(sig) = decoded.signature() {
            println!("  {:<10} {} bytes", "sig size:", sig.len());
        }
    }

    Ok(())
}
