//! Resolves the signing identity from an ordered chain of key sources.

use std::{
    fs,
    io::{self, BufRead, Write},
    path::PathBuf,
};

use tracing::debug;

use crate::{Error, Identity};

/// Environment variable consulted when no other source names one.
pub const DEFAULT_KEY_ENV: &str = "RECEIPT_KEY";

/// One place a private key may come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeySource {
    /// A value handed over directly, e.g. from a command-line flag.
    Literal(String),
    /// A file whose trimmed contents are the key.
    File(PathBuf),
    /// An environment variable.
    EnvVar(String),
    /// A line typed on standard input.
    Stdin,
}

impl KeySource {
    /// Returns the raw key text, or `None` when this source has nothing.
    ///
    /// Blank values count as absent.
    fn read(&self) -> Result<Option<String>, Error> {
        let value = match self {
            Self::Literal(value) => Some(value.clone()),
            Self::File(path) => Some(fs::read_to_string(path).map_err(|e| {
                Error::Io(format!("reading key file {}: {}", path.display(), e))
            })?),
            Self::EnvVar(name) => std::env::var(name).ok(),
            Self::Stdin => {
                eprint!("Private key: ");
                io::stderr().flush()?;
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line)?;
                Some(line)
            }
        };

        Ok(value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    fn describe(&self) -> String {
        match self {
            Self::Literal(_) => "literal".to_string(),
            Self::File(path) => format!("file {}", path.display()),
            Self::EnvVar(name) => format!("env {}", name),
            Self::Stdin => "stdin".to_string(),
        }
    }
}

/// Ordered key sources; the first one that yields a value wins.
///
/// A present but invalid key is an error and does not fall through to the
/// next source.
#[derive(Clone, Debug, Default)]
pub struct KeyResolver {
    sources: Vec<KeySource>,
}

impl KeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `source` with lower precedence than those already added.
    pub fn then(mut self, source: KeySource) -> Self {
        self.sources.push(source);
        self
    }

    /// Appends `source` only when it is `Some`.
    pub fn then_some(self, source: Option<KeySource>) -> Self {
        match source {
            Some(source) => self.then(source),
            None => self,
        }
    }

    pub fn resolve(&self) -> Result<Identity, Error> {
        for source in &self.sources {
            if let Some(key) = source.read()? {
                debug!(source = %source.describe(), "private key resolved");
                return Identity::from_private_key_hex(&key);
            }
        }

        Err(Error::MissingPrivateKey)
    }
}
