use std::io;

use clap::{Args, Parser, Subcommand};
use outguess_core::{
    EmbeddingOptions, Password, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_QUALITY, DEFAULT_RESISTANCE,
};

use crate::commands::*;
use crate::CliResult;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Log a summary of every operation (see also RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Hide(hide::HideArgs),
    Unveil(unveil::UnveilArgs),
    Check(check::CheckArgs),
    Capacity(capacity::CapacityArgs),
    Resist(resist::ResistArgs),
}

#[derive(Args, Debug)]
pub struct PasswordArgs {
    /// Password that keys coefficient selection
    #[arg(short, long, value_name = "password", conflicts_with = "ask_password")]
    pub password: Option<String>,

    /// Prompt for the password instead
    #[arg(long)]
    pub ask_password: bool,
}

impl PasswordArgs {
    pub fn resolve(self, confirm: bool) -> CliResult<Password> {
        if self.ask_password {
            ask_for_password(confirm)
        } else {
            Ok(self.password.into())
        }
    }
}

#[derive(Args, Debug)]
pub struct TuningArgs {
    /// Compression resistance, 1 (capacity) to 10 (robustness)
    #[arg(short, long, default_value_t = DEFAULT_RESISTANCE, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub resistance: u8,

    /// Target JPEG quality; finer covers are requantized first
    #[arg(short, long, default_value_t = DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,

    /// Largest message accepted, in bytes
    #[arg(long = "max-size", value_name = "bytes", default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    pub max_message_size: usize,
}

impl TuningArgs {
    pub fn options(&self, password: Password, verbose: bool) -> EmbeddingOptions {
        EmbeddingOptions::default()
            .with_password(password)
            .with_resistance(self.resistance)
            .with_quality(self.quality)
            .with_max_message_size(self.max_message_size)
            .with_verbose(verbose)
    }
}

pub fn ask_for_password(confirm: bool) -> CliResult<Password> {
    let mut prompt = dialoguer::Password::new()
        .with_prompt("Password")
        .allow_empty_password(true);
    if confirm {
        prompt = prompt.with_confirmation("Repeat password", "Passwords do not match");
    }
    let password = prompt
        .interact()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    Ok(password.into())
}
