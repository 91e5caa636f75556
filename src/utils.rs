//! Canonical payload helpers shared by the signer and the verifier.

use bitcoin::secp256k1::{All, Secp256k1};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::Error;

/// The record that is actually signed for a receipt.
///
/// Field order is part of the format: `message`, `timestamp`, `signer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SignedPayload<'a> {
    pub message: &'a str,
    pub timestamp: &'a str,
    pub signer: &'a str,
}

impl<'a> SignedPayload<'a> {
    pub fn new(message: &'a str, timestamp: &'a str, signer: &'a str) -> Self {
        Self {
            message,
            timestamp,
            signer,
        }
    }

    /// Compact JSON with no whitespace between tokens.
    pub fn to_canonical_string(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

/// Renders `time` the way receipts store it, e.g. `2024-01-01T00:00:00.000Z`.
pub fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) type SecpCtx = Secp256k1<All>;

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_canonical_payload() {
        let payload = SignedPayload::new(
            "hello world",
            "2024-01-01T00:00:00.000Z",
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
        );

        assert_eq!(
            payload.to_canonical_string().unwrap(),
            r#"{"message":"hello world","timestamp":"2024-01-01T00:00:00.000Z","signer":"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"}"#
        );
    }

    #[test]
    fn test_canonical_payload_escaping() {
        let payload = SignedPayload::new("say \"hi\"\n\tü/€\u{1}", "t", "s");

        assert_eq!(
            payload.to_canonical_string().unwrap(),
            "{\"message\":\"say \\\"hi\\\"\\n\\tü/€\\u0001\",\"timestamp\":\"t\",\"signer\":\"s\"}"
        );
    }

    #[test]
    fn test_format_timestamp() {
        let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_timestamp(&time), "2024-01-01T00:00:00.000Z");

        let time = time + chrono::Duration::milliseconds(1234);
        assert_eq!(format_timestamp(&time), "2024-01-01T00:00:01.234Z");
    }
}
