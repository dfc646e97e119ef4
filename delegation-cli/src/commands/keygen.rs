use crate::error::{CliError, Result};
use colored::Colorize;
use delegation::{KeyRing, PRIV_KEY_FILE_NAME, PUB_KEY_FILE_NAME};
use serde_json::json;
use std::path::Path;

pub fn keygen(dir: &Path, bits: usize, force: bool, json_output: bool) -> Result<()> {
    let private_path = dir.join(PRIV_KEY_FILE_NAME);
    let public_path = dir.join(PUB_KEY_FILE_NAME);

    if (private_path.exists() || public_path.exists()) && !force {
        return Err(CliError::InvalidInput(format!(
            "Key files already exist in {}. Use --force to overwrite.",
            dir.display()
        )));
    }

    let keys = KeyRing::generate(bits)?;
    keys.write_to_dir(dir)?;
    let fingerprint = keys.fingerprint().unwrap_or_default();

    if json_output {
        let output = json!({
            "success": true,
            "private_key": private_path,
            "public_key": public_path,
            "bits": bits,
            "fingerprint": fingerprint,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{} Generated {bits}-bit key pair", "✓".green());
        println!("  Private key: {}", private_path.display());
        println!("  Public key:  {}", public_path.display());
        println!("  Fingerprint: {}", fingerprint.dimmed());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keygen_refuses_to_overwrite() {
        let temp_dir = tempfile::tempdir().unwrap();
        keygen(temp_dir.path(), 1024, false, true).unwrap();
        let first = std::fs::read_to_string(temp_dir.path().join(PUB_KEY_FILE_NAME)).unwrap();

        assert!(matches!(
            keygen(temp_dir.path(), 1024, false, true),
            Err(CliError::InvalidInput(_))
        ));
        let unchanged = std::fs::read_to_string(temp_dir.path().join(PUB_KEY_FILE_NAME)).unwrap();
        assert_eq!(first, unchanged);

        keygen(temp_dir.path(), 1024, true, true).unwrap();
        let replaced = std::fs::read_to_string(temp_dir.path().join(PUB_KEY_FILE_NAME)).unwrap();
        assert_ne!(first, replaced);

        assert!(KeyRing::from_dir(temp_dir.path()).is_ok());
    }
}
