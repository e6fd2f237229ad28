pub use clap::Parser;

use std::path::PathBuf;

use secm_cli::state::DEFAULT_PROFILE;

#[derive(Parser, Debug)]
#[command(name = "secm")]
#[command(about = "Keep secrets encrypted at rest and hand them to peers")]
pub struct Args {
    /// Path to the secm root directory (defaults to ~/.secm)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Profile to operate on; each profile has its own identity and secrets
    #[arg(long, short, global = true, default_value = DEFAULT_PROFILE)]
    pub profile: String,

    #[command(subcommand)]
    pub command: crate::Command,
}
