use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "delegation",
    version,
    about = "Issue, inspect and validate delegation tokens",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (.json, .toml or .properties)
    #[arg(long, global = true, env = "DELEGATION_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate an RSA key pair for signing tokens
    Keygen {
        /// Directory to write DelegationPriv.key and DelegationPub.key into
        #[arg(long)]
        dir: PathBuf,

        /// RSA modulus size in bits
        #[arg(long, default_value_t = delegation::DEFAULT_KEY_BITS)]
        bits: usize,

        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },

    /// Issue a token for an already authenticated user
    Issue {
        /// Username the token is issued for
        #[arg(short, long)]
        user: String,

        /// User the service is acting as
        #[arg(long)]
        proxy_user: Option<String>,

        /// X.500 subject of the user's certificate
        #[arg(long)]
        x500: Option<String>,

        /// Numeric (UUID) identity of the user
        #[arg(long)]
        numeric: Option<String>,

        /// URI the token may be used for
        #[arg(short, long)]
        scope: String,

        /// Host suffix allowed to present the token (repeatable)
        #[arg(long = "domain")]
        domains: Vec<String>,

        /// Time-to-live for the token in seconds (default: from config, or 3600)
        #[arg(long)]
        ttl: Option<u64>,

        /// Directory holding the signing key (default: from config)
        #[arg(long, env = "DELEGATION_KEY_DIR")]
        key_dir: Option<PathBuf>,

        /// Output only the token without any formatting (useful for piping)
        #[arg(long)]
        token_only: bool,
    },

    /// Decode a token and show its contents
    Inspect {
        /// The token, starting with "base64:"
        token: String,

        /// Directory holding the verification key (default: from config)
        #[arg(long, env = "DELEGATION_KEY_DIR")]
        key_dir: Option<PathBuf>,
    },

    /// Run the full validation pipeline against a request target
    Validate {
        /// The token, starting with "base64:"
        token: String,

        /// URI of the resource being accessed
        #[arg(short, long)]
        target: Option<String>,

        /// Directory holding the verification key (default: from config)
        #[arg(long, env = "DELEGATION_KEY_DIR")]
        key_dir: Option<PathBuf>,

        /// Reject tokens without a signature (already the default when a public key is found)
        #[arg(long)]
        require_signature: bool,
    },
}
