//! Options shared by every embedding, extraction and capacity call.

use std::fmt::{self, Debug, Formatter};

use crate::error::{OutguessError, Result};

/// Key used for selection and whitening when no password is given.
///
/// Password-less payloads are keyed with this, which is what lets
/// [`has_hidden_data`](crate::has_hidden_data) find them.
pub const DEFAULT_KEY: &[u8] = b"outguess_seed_v2";

pub const DEFAULT_RESISTANCE: u8 = 5;
pub const DEFAULT_QUALITY: u8 = 85;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 65536;

pub const MIN_RESISTANCE: u8 = 1;
pub const MAX_RESISTANCE: u8 = 10;

/// A password whose `Debug` output never reveals the content.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Password(Option<String>);

impl Password {
    /// Key bytes that drive selection. Empty passwords use [`DEFAULT_KEY`].
    pub fn key(&self) -> &[u8] {
        match &self.0 {
            Some(password) if !password.is_empty() => password.as_bytes(),
            _ => DEFAULT_KEY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_deref().map_or(true, str::is_empty)
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(password) = &self.0 {
            write!(f, "Password({})", "*".repeat(password.len()))
        } else {
            write!(f, "Password(None)")
        }
    }
}

impl From<Option<String>> for Password {
    fn from(password: Option<String>) -> Self {
        Self(password)
    }
}

impl From<&str> for Password {
    fn from(password: &str) -> Self {
        Self(Some(password.to_string()))
    }
}

impl From<String> for Password {
    fn from(password: String) -> Self {
        Self(Some(password))
    }
}

impl AsRef<Option<String>> for Password {
    fn as_ref(&self) -> &Option<String> {
        &self.0
    }
}

/// Options for embedding, extraction, capacity and resistance checks.
///
/// | option                  | default |
/// |-------------------------|---------|
/// | password                | empty   |
/// | compression_resistance  | 5       |
/// | quality                 | 85      |
/// | verbose                 | false   |
/// | max_message_size        | 65536   |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingOptions {
    pub password: Password,
    /// 1 (max capacity) ..= 10 (max robustness).
    pub compression_resistance: u8,
    /// Target JPEG quality 1..=100. Covers finer than this are requantized first.
    pub quality: u8,
    /// Promotes operation summaries to `info` level logging. No other effect.
    pub verbose: bool,
    /// Advisory cap on the message size in bytes.
    pub max_message_size: usize,
}

/// Extraction reads the same options; only password and resistance matter.
pub type ExtractionOptions = EmbeddingOptions;

impl Default for EmbeddingOptions {
    fn default() -> Self {
        Self {
            password: Password::default(),
            compression_resistance: DEFAULT_RESISTANCE,
            quality: DEFAULT_QUALITY,
            verbose: false,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl EmbeddingOptions {
    pub fn with_password<P: Into<Password>>(mut self, password: P) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_resistance(mut self, resistance: u8) -> Self {
        self.compression_resistance = resistance;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Checks every numeric option against its bounds.
    pub fn validate(&self) -> Result<()> {
        check_resistance(self.compression_resistance)?;
        check_quality(self.quality)?;
        if self.max_message_size == 0 {
            return Err(OutguessError::Range {
                param: "max_message_size",
                value: 0,
                min: 1,
                max: u32::MAX as i64 / 8,
            });
        }
        Ok(())
    }
}

pub(crate) fn check_resistance(resistance: u8) -> Result<()> {
    if !(MIN_RESISTANCE..=MAX_RESISTANCE).contains(&resistance) {
        return Err(OutguessError::Range {
            param: "compression_resistance",
            value: resistance as i64,
            min: MIN_RESISTANCE as i64,
            max: MAX_RESISTANCE as i64,
        });
    }
    Ok(())
}

pub(crate) fn check_quality(quality: u8) -> Result<()> {
    if !(1..=100).contains(&quality) {
        return Err(OutguessError::Range {
            param: "quality",
            value: quality as i64,
            min: 1,
            max: 100,
        });
    }
    Ok(())
}
