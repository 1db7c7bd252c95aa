use std::fs;
use std::path::PathBuf;

use clap::Args;
use outguess_core::Password;

use crate::cli::TuningArgs;
use crate::CliResult;

/// Prints how many message bytes an image can carry
#[derive(Args, Debug)]
pub struct CapacityArgs {
    #[command(flatten)]
    pub tuning: TuningArgs,

    /// Cover JPEG image
    #[arg(short = 'i', long = "in", value_name = "cover image", required = true)]
    pub cover: PathBuf,
}

impl CapacityArgs {
    pub fn run(self, verbose: bool) -> CliResult<()> {
        let cover = fs::read(&self.cover)?;
        let options = self.tuning.options(Password::default(), verbose);
        let capacity = outguess_core::max_message_size(&cover, &options)?;
        println!("{capacity}");
        if verbose {
            let stats = outguess_core::embedding_stats(&cover, &options)?;
            println!(
                "{} of {} coefficients eligible at resistance {}, quality {}",
                stats.eligible_coefficients,
                stats.total_coefficients,
                stats.resistance,
                stats.estimated_quality
            );
        }
        Ok(())
    }
}
