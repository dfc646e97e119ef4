mod inspect;
mod issue;
mod keygen;
mod validate;

pub use inspect::inspect;
pub use issue::{issue, IssueArgs};
pub use keygen::keygen;
pub use validate::validate;

use crate::error::Result;
use delegation::{DelegationConfig, DelegationService, DelegationToken, Identity};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Builds the service for one command, with the key directory resolved from
/// the flag, the configuration or the default location.
fn service(mut config: DelegationConfig, key_dir: Option<PathBuf>) -> Result<DelegationService> {
    config.key_dir = crate::config::key_dir(key_dir, &config);
    Ok(DelegationService::from_config(&config)?)
}

fn describe_identity(identity: &Identity) -> String {
    match identity {
        Identity::Username {
            name,
            proxy_user: Some(proxy),
        } => format!("{name} (acting as {proxy})"),
        other => other.value(),
    }
}

fn token_json(token: &DelegationToken) -> Value {
    let identities: Vec<Value> = token
        .identities()
        .iter()
        .map(|identity| {
            let proxy_user = match identity {
                Identity::Username { proxy_user, .. } => proxy_user.as_deref(),
                _ => None,
            };
            json!({
                "type": identity.identity_type().tag(),
                "value": identity.value(),
                "proxy_user": proxy_user,
            })
        })
        .collect();

    json!({
        "identities": identities,
        "scope": token.scope().as_str(),
        "expiry": token.expiry().to_rfc3339(),
        "domains": token.domains(),
        "signed": token.is_signed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use delegation::Uuid;

    #[test]
    fn test_describe_identity() {
        let user = Identity::username_as("someuser", "someproxyuser").unwrap();
        assert_eq!(describe_identity(&user), "someuser (acting as someproxyuser)");

        let id = Uuid::new_v4();
        assert_eq!(describe_identity(&Identity::numeric(id)), id.to_string());
    }

    #[test]
    fn test_token_json() {
        let token = DelegationService::from_config(&DelegationConfig::default())
            .unwrap()
            .create(
                Identity::username_as("someuser", "someproxyuser").unwrap(),
                "foo:bar",
                Some(vec!["canfar.net".to_string()]),
            )
            .unwrap();
        let value = token_json(&token);
        assert_eq!(value["scope"], "foo:bar");
        assert_eq!(value["signed"], false);
        assert_eq!(value["domains"][0], "canfar.net");
        assert_eq!(value["identities"][0]["type"], "userid");
        assert_eq!(value["identities"][0]["proxy_user"], "someproxyuser");
    }
}
