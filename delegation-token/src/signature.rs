//! RSA signatures over the unsigned field string.
//!
//! PKCS#1 v1.5 with SHA-256: deterministic, and the signature length equals
//! the modulus size of the key.

use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::TokenError;

/// Signs the UTF-8 bytes of `fields`.
pub fn sign(fields: &str, key: &RsaPrivateKey) -> Result<Vec<u8>, TokenError> {
    let signing_key = SigningKey::<Sha256>::new(key.clone());
    let signature = signing_key
        .try_sign(fields.as_bytes())
        .map_err(|e| TokenError::key(format!("failed to sign token: {e}")))?;
    Ok(signature.to_vec())
}

/// Checks `signature` against `fields`. Any failure is reported as `false`.
pub fn verify(fields: &str, signature: &[u8], key: &RsaPublicKey) -> bool {
    let Ok(signature) = Signature::try_from(signature) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(key.clone())
        .verify(fields.as_bytes(), &signature)
        .is_ok()
}
