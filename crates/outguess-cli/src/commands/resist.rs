use std::fs;
use std::path::PathBuf;

use clap::Args;

use crate::cli::PasswordArgs;
use crate::CliResult;

/// Tests whether a hidden message survives recompression
#[derive(Args, Debug)]
pub struct ResistArgs {
    #[command(flatten)]
    pub password: PasswordArgs,

    /// Image that contains secret data
    #[arg(short = 'i', long = "in", value_name = "image file", required = true)]
    pub media: PathBuf,

    /// JPEG quality to recompress at
    #[arg(short = 'q', long = "target-quality", value_parser = clap::value_parser!(u8).range(1..=100), required = true)]
    pub target_quality: u8,
}

impl ResistArgs {
    pub fn run(self) -> CliResult<()> {
        let password = self.password.resolve(false)?;
        let image = fs::read(&self.media)?;
        let survives =
            outguess_core::test_compression_resistance(&image, self.target_quality, &password)?;
        println!(
            "payload {} recompression at quality {}",
            if survives { "survives" } else { "does not survive" },
            self.target_quality
        );
        Ok(())
    }
}
