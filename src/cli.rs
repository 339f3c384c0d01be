use clap::{Parser, Subcommand};

/// tokenctl — admin client for API token services
#[derive(Parser)]
#[command(name = "tokenctl", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List provisioned tokens
    List,

    /// Mint a new token and print its one-time plaintext
    Create {
        /// Token ID (letters, digits, '-' and '_')
        #[arg(long)]
        id: String,
    },

    /// Revoke a token by ID or by plaintext value
    Revoke {
        #[arg(long, conflicts_with = "token")]
        id: Option<String>,
        #[arg(long)]
        token: Option<String>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Revoke a token and mint a replacement under the same ID
    Regenerate {
        #[arg(long)]
        id: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Change a token's rate limit
    SetRateLimit {
        #[arg(long)]
        id: String,
        /// New quota; must be a whole number >= 0
        #[arg(long)]
        rate_limit: String,
    },
}
