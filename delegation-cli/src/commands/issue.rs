use crate::error::{CliError, Result};
use colored::Colorize;
use delegation::{DelegationConfig, Identity, IdentitySet, Uuid};
use serde_json::json;
use std::path::PathBuf;

pub struct IssueArgs {
    pub user: String,
    pub proxy_user: Option<String>,
    pub x500: Option<String>,
    pub numeric: Option<String>,
    pub scope: String,
    pub domains: Vec<String>,
    pub ttl: Option<u64>,
    pub key_dir: Option<PathBuf>,
    pub token_only: bool,
}

impl IssueArgs {
    fn identities(&self) -> Result<IdentitySet> {
        let mut identities = IdentitySet::new();
        identities.insert(match &self.proxy_user {
            Some(proxy) => Identity::username_as(self.user.as_str(), proxy.as_str())?,
            None => Identity::username(self.user.as_str())?,
        });
        if let Some(dn) = &self.x500 {
            identities.insert(Identity::x500(dn.as_str())?);
        }
        if let Some(id) = &self.numeric {
            let id = Uuid::parse_str(id)
                .map_err(|e| CliError::InvalidInput(format!("Invalid numeric identity '{id}': {e}")))?;
            identities.insert(Identity::numeric(id));
        }
        Ok(identities)
    }
}

pub fn issue(args: IssueArgs, mut config: DelegationConfig, json_output: bool) -> Result<()> {
    if let Some(ttl) = args.ttl {
        config.token_lifetime_secs = ttl;
    }
    // Issuing does not validate; a private key alone is enough
    config.require_signature = Some(false);

    let identities = args.identities()?;
    let domains = (!args.domains.is_empty()).then(|| args.domains.clone());

    let service = super::service(config, args.key_dir.clone())?;
    let token = service.create(identities, &args.scope, domains)?;
    let encoded = service.format(&token)?;

    if args.token_only {
        println!("{encoded}");
        return Ok(());
    }

    if json_output {
        let output = json!({
            "success": true,
            "token": encoded,
            "details": super::token_json(&token),
            "signed": service.signs(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{} Issued delegation token", "✓".green());
        println!("  Scope:   {}", token.scope());
        println!("  Expires: {}", token.expiry().to_rfc3339());
        if !service.signs() {
            println!(
                "  {} Token is unsigned (no private key found)",
                "!".yellow()
            );
        }
        println!();
        println!("{encoded}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> IssueArgs {
        IssueArgs {
            user: "someuser".to_string(),
            proxy_user: Some("someproxyuser".to_string()),
            x500: Some("CN=JBP,OU=nrc-cnrc.gc.ca,O=grid,C=CA".to_string()),
            numeric: Some("6f1c7f5e-8a5b-4e8e-9c1a-3d2b1e0f9a7c".to_string()),
            scope: "foo:bar".to_string(),
            domains: vec![],
            ttl: None,
            key_dir: None,
            token_only: true,
        }
    }

    #[test]
    fn test_identities_from_args() {
        let identities = args().identities().unwrap();
        assert_eq!(identities.len(), 3);
        assert_eq!(identities.username(), Some("someuser"));
        assert_eq!(identities.proxy_user(), Some("someproxyuser"));
        assert_eq!(
            identities.numeric().map(|id| id.to_string()),
            Some("6f1c7f5e-8a5b-4e8e-9c1a-3d2b1e0f9a7c".to_string())
        );
    }

    #[test]
    fn test_invalid_numeric_identity() {
        let mut args = args();
        args.numeric = Some("not-a-uuid".to_string());
        assert!(matches!(args.identities(), Err(CliError::InvalidInput(_))));
    }

    #[test]
    fn test_issue_with_key_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        delegation::KeyRing::generate(1024)
            .unwrap()
            .write_to_dir(temp_dir.path())
            .unwrap();

        let mut args = args();
        args.key_dir = Some(temp_dir.path().to_path_buf());
        args.ttl = Some(60);
        issue(args, DelegationConfig::default(), false).unwrap();
    }
}
