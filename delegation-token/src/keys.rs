use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::TokenError;

/// File holding the signing key inside a key directory
pub const PRIV_KEY_FILE_NAME: &str = "DelegationPriv.key";
/// File holding the verification key inside a key directory
pub const PUB_KEY_FILE_NAME: &str = "DelegationPub.key";

pub const DEFAULT_KEY_BITS: usize = 2048;

/// Source of key material for signing and verifying tokens.
///
/// Implementations hand out keys that were loaded once; callers on any
/// thread only ever read them.
pub trait KeyProvider: Send + Sync {
    /// Key used to sign outgoing tokens. `None` means tokens go out unsigned.
    fn signing_key(&self) -> Option<&RsaPrivateKey>;

    /// Key used to check signatures on received tokens.
    fn verification_key(&self) -> Option<&RsaPublicKey>;
}

/// An RSA key pair, or just one half of it.
#[derive(Clone)]
pub struct KeyRing {
    private_key: Option<RsaPrivateKey>,
    public_key: Option<RsaPublicKey>,
}

impl KeyRing {
    /// Generates a fresh key pair.
    pub fn generate(bits: usize) -> Result<Self, TokenError> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| TokenError::key(format!("failed to generate RSA key: {e}")))?;
        let keys = Self::from_private_key(private_key);
        info!(bits, fingerprint = %keys.fingerprint().unwrap_or_default(), "generated delegation key pair");
        Ok(keys)
    }

    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        let public_key = RsaPublicKey::from(&private_key);
        Self {
            private_key: Some(private_key),
            public_key: Some(public_key),
        }
    }

    pub fn from_public_key(public_key: RsaPublicKey) -> Self {
        Self {
            private_key: None,
            public_key: Some(public_key),
        }
    }

    /// Loads a key pair from PEM text. PKCS#8 and PKCS#1 are both accepted.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Key` if either key fails to parse or the public
    /// key does not belong to the private key.
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self, TokenError> {
        let private_key = parse_private_pem(private_pem)?;
        let public_key = parse_public_pem(public_pem)?;
        if RsaPublicKey::from(&private_key) != public_key {
            return Err(TokenError::key("public key does not match private key"));
        }
        Ok(Self {
            private_key: Some(private_key),
            public_key: Some(public_key),
        })
    }

    pub fn from_private_pem(private_pem: &str) -> Result<Self, TokenError> {
        Ok(Self::from_private_key(parse_private_pem(private_pem)?))
    }

    pub fn from_public_pem(public_pem: &str) -> Result<Self, TokenError> {
        Ok(Self::from_public_key(parse_public_pem(public_pem)?))
    }

    /// Loads keys from a key directory.
    ///
    /// Either file may be missing: a service that only validates tokens
    /// needs just the public key. A directory with neither is an error.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, TokenError> {
        let dir = dir.as_ref();
        let private_path = dir.join(PRIV_KEY_FILE_NAME);
        let public_path = dir.join(PUB_KEY_FILE_NAME);

        let private_key = if private_path.exists() {
            Some(parse_private_pem(&fs::read_to_string(&private_path)?)?)
        } else {
            None
        };
        let public_key = if public_path.exists() {
            Some(parse_public_pem(&fs::read_to_string(&public_path)?)?)
        } else {
            None
        };

        let keys = match (private_key, public_key) {
            (None, None) => {
                return Err(TokenError::key(format!(
                    "no delegation keys found in {}",
                    dir.display()
                )))
            }
            (Some(private_key), None) => Self::from_private_key(private_key),
            (None, Some(public_key)) => Self::from_public_key(public_key),
            (Some(private_key), Some(public_key)) => {
                if RsaPublicKey::from(&private_key) != public_key {
                    return Err(TokenError::key(format!(
                        "key files in {} do not form a pair",
                        dir.display()
                    )));
                }
                Self {
                    private_key: Some(private_key),
                    public_key: Some(public_key),
                }
            }
        };

        info!(
            dir = %dir.display(),
            signing = keys.private_key.is_some(),
            fingerprint = %keys.fingerprint().unwrap_or_default(),
            "loaded delegation keys"
        );
        Ok(keys)
    }

    /// Writes the available keys as PKCS#8 / SPKI PEM files into `dir`.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<(), TokenError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        if let Some(private_key) = &self.private_key {
            let pem = private_key
                .to_pkcs8_pem(LineEnding::LF)
                .map_err(|e| TokenError::key(format!("failed to encode private key: {e}")))?;
            let path = dir.join(PRIV_KEY_FILE_NAME);
            fs::write(&path, pem.as_bytes())?;
            restrict_permissions(&path)?;
        }
        if let Some(public_key) = &self.public_key {
            let pem = public_key
                .to_public_key_pem(LineEnding::LF)
                .map_err(|e| TokenError::key(format!("failed to encode public key: {e}")))?;
            fs::write(dir.join(PUB_KEY_FILE_NAME), pem)?;
        }
        Ok(())
    }

    /// Hex SHA-256 of the DER-encoded public key, safe to log.
    pub fn fingerprint(&self) -> Option<String> {
        let der = self.public_key.as_ref()?.to_public_key_der().ok()?;
        Some(hex::encode(Sha256::digest(der.as_bytes())))
    }

    pub fn public_key_pem(&self) -> Result<Option<String>, TokenError> {
        self.public_key
            .as_ref()
            .map(|key| {
                key.to_public_key_pem(LineEnding::LF)
                    .map_err(|e| TokenError::key(format!("failed to encode public key: {e}")))
            })
            .transpose()
    }
}

impl KeyProvider for KeyRing {
    fn signing_key(&self) -> Option<&RsaPrivateKey> {
        self.private_key.as_ref()
    }

    fn verification_key(&self) -> Option<&RsaPublicKey> {
        self.public_key.as_ref()
    }
}

impl fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyRing")
            .field("signing", &self.private_key.is_some())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

fn parse_private_pem(pem: &str) -> Result<RsaPrivateKey, TokenError> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| TokenError::key(format!("failed to parse private key PEM: {e}")))
}

fn parse_public_pem(pem: &str) -> Result<RsaPublicKey, TokenError> {
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| TokenError::key(format!("failed to parse public key PEM: {e}")))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), TokenError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), TokenError> {
    Ok(())
}
