use std::fs;
use std::path::PathBuf;

use clap::Args;

use crate::cli::{PasswordArgs, TuningArgs};
use crate::CliResult;

/// Hides a message or file in a baseline JPEG image
#[derive(Args, Debug)]
pub struct HideArgs {
    #[command(flatten)]
    pub password: PasswordArgs,

    #[command(flatten)]
    pub tuning: TuningArgs,

    /// Cover JPEG image, used readonly
    #[arg(short = 'i', long = "in", value_name = "cover image", required = true)]
    pub cover: PathBuf,

    /// Final image will be stored as file
    #[arg(short = 'o', long = "out", value_name = "output image file", required = true)]
    pub write_to_file: PathBuf,

    /// File whose bytes will be hidden
    #[arg(
        short = 'd',
        long = "data",
        value_name = "data file",
        required_unless_present = "message",
        conflicts_with = "message"
    )]
    pub data_file: Option<PathBuf>,

    /// A text message that will be hidden
    #[arg(short, long, value_name = "text message", required_unless_present = "data_file")]
    pub message: Option<String>,
}

impl HideArgs {
    pub fn run(self, verbose: bool) -> CliResult<()> {
        let message = match (&self.message, &self.data_file) {
            (Some(message), _) => message.as_bytes().to_vec(),
            (None, Some(file)) => fs::read(file)?,
            (None, None) => Vec::new(),
        };

        let password = self.password.resolve(true)?;
        let options = self.tuning.options(password, verbose);
        let cover = fs::read(&self.cover)?;

        let result = outguess_core::embed_with_progress(&cover, &message, &options, &mut |percent| {
            log::debug!("embedding {percent}%")
        })?;
        super::write_atomically(&self.write_to_file, &result.output_bytes)?;

        println!(
            "Hid {} bytes in {} ({} -> {} bytes, {:.1}% of capacity used)",
            message.len(),
            self.write_to_file.display(),
            result.metadata.original_size,
            result.metadata.output_size,
            result.stats.capacity_utilization * 100.0
        );
        Ok(())
    }
}
