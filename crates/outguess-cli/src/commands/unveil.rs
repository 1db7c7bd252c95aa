use std::fs;
use std::path::PathBuf;

use clap::Args;

use crate::cli::{PasswordArgs, TuningArgs};
use crate::CliResult;

/// Unveils a message hidden in a JPEG image
#[derive(Args, Debug)]
pub struct UnveilArgs {
    #[command(flatten)]
    pub password: PasswordArgs,

    #[command(flatten)]
    pub tuning: TuningArgs,

    /// Source image that contains secret data
    #[arg(short = 'i', long = "in", value_name = "image source file", required = true)]
    pub media: PathBuf,

    /// Store the message in this file instead of printing it
    #[arg(short = 'o', long = "out", value_name = "output file")]
    pub output_file: Option<PathBuf>,
}

impl UnveilArgs {
    pub fn run(self, verbose: bool) -> CliResult<()> {
        let password = self.password.resolve(false)?;
        let options = self.tuning.options(password, verbose);
        let image = fs::read(&self.media)?;

        let result = outguess_core::extract(&image, &options)?;
        if !result.verified {
            log::warn!("checksum mismatch, the message is probably damaged");
        }

        match (&self.output_file, result.text()) {
            (Some(file), _) => super::write_atomically(file, &result.message)?,
            (None, Some(text)) => println!("{text}"),
            (None, None) => {
                println!(
                    "{} bytes of binary data, use --out to store them",
                    result.message.len()
                )
            }
        }
        Ok(())
    }
}
