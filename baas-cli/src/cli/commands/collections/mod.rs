//! Collection listing

pub mod handler;

use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct CollectionsCommands {
    /// "*" lists every collection of the app; otherwise a comma separated list is echoed
    #[arg(default_value = "*")]
    pub which: String,

    /// Print names as a JSON array
    #[arg(long)]
    pub json: bool,
}
