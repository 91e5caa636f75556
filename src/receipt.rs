//! The persisted receipt record.

use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Seek, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{Error, SignedPayload};

/// A signed statement as written to disk.
///
/// `payment` is stored alongside the signed fields but is not covered by the
/// signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub message: String,
    pub timestamp: String,
    pub signer: String,
    pub signature: String,
    #[serde(default)]
    pub payment: Option<String>,
}

impl Receipt {
    /// The payload the signature is expected to cover.
    pub fn signed_payload(&self) -> SignedPayload<'_> {
        SignedPayload::new(&self.message, &self.timestamp, &self.signer)
    }

    /// Returns a new receipt carrying `tx_hash` as its payment.
    pub fn with_payment(self, tx_hash: String) -> Self {
        Self {
            payment: Some(tx_hash),
            ..self
        }
    }

    /// Parses a receipt, rejecting anything that is not a JSON object with
    /// the expected string fields.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::MalformedReceipt(e.to_string()))?;

        if !value.is_object() {
            return Err(Error::MalformedReceipt(
                "expected a JSON object".to_string(),
            ));
        }

        serde_json::from_value(value).map_err(|e| Error::MalformedReceipt(e.to_string()))
    }

    /// Pretty-printed with two-space indentation.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn read_from(path: &Path) -> Result<Self, Error> {
        let json = fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("reading {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Writes the receipt to `path`.
    ///
    /// An existing file is left untouched unless `overwrite` is set.
    pub fn write_to(&self, path: &Path, overwrite: bool) -> Result<(), Error> {
        ReservedOutput::reserve(path, overwrite)?.commit(self)
    }
}

/// An output file claimed before a receipt exists to fill it.
///
/// Reserving fails up front when the file exists and `overwrite` is unset, so
/// nothing irreversible happens for a receipt that could not be saved. A
/// reservation dropped without a commit removes the file it created and
/// leaves a pre-existing one as it was.
#[derive(Debug)]
pub struct ReservedOutput {
    path: PathBuf,
    file: File,
    created: bool,
    committed: bool,
}

impl ReservedOutput {
    pub fn reserve(path: &Path, overwrite: bool) -> Result<Self, Error> {
        let existed = overwrite && path.exists();

        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true);
        } else {
            options.create_new(true);
        }

        let file = options.open(path).map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => Error::Io(format!("{} already exists", path.display())),
            _ => Error::Io(format!("writing {}: {}", path.display(), e)),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            created: !existed,
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replaces the file contents with `receipt`.
    pub fn commit(mut self, receipt: &Receipt) -> Result<(), Error> {
        let json = receipt.to_json()?;

        self.file.set_len(0)?;
        self.file.rewind()?;
        self.file.write_all(json.as_bytes())?;
        self.file.sync_all()?;

        self.committed = true;
        Ok(())
    }
}

impl Drop for ReservedOutput {
    fn drop(&mut self) {
        if self.created && !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}
