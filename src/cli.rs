use clap::{Parser, Subcommand};

/// vaultview: page server that resolves vault secrets on every request
#[derive(Parser)]
#[command(name = "vaultview", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Port to bind
        #[arg(short, long, env = "VAULTVIEW_PORT", default_value = "8080")]
        port: u16,
    },

    /// Run one resolution pass and report the outcome
    Check {
        /// Print plaintext values instead of masking them
        #[arg(long)]
        show_values: bool,
    },
}
