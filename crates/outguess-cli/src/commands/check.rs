use std::fs;
use std::path::PathBuf;

use clap::Args;

use crate::CliResult;

/// Checks whether an image carries a password-less payload
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Image to inspect
    #[arg(short = 'i', long = "in", value_name = "image file", required = true)]
    pub media: PathBuf,
}

impl CheckArgs {
    pub fn run(self) -> CliResult<()> {
        let image = fs::read(&self.media)?;
        if outguess_core::has_hidden_data(&image)? {
            println!("{}: hidden data found", self.media.display());
        } else {
            println!("{}: no password-less hidden data", self.media.display());
        }
        Ok(())
    }
}
