//! Signed message receipts.
//!
//! A receipt binds a message, a timestamp and the signer's address under a
//! recoverable secp256k1 signature over the personal-message hash of the
//! canonical JSON payload `{"message", "timestamp", "signer"}`.

pub mod error;
pub mod identity;
pub mod issuer;
pub mod key_source;
pub mod payment;
pub mod receipt;
pub mod settings;
pub mod signer;
pub mod telemetry;
pub mod transaction;
pub mod utils;
pub mod verifier;

pub use error::*;
pub use identity::*;
pub use issuer::*;
pub use key_source::*;
pub use payment::*;
pub use receipt::*;
pub use settings::*;
pub use signer::*;
pub use telemetry::*;
pub use transaction::*;
pub use utils::*;
pub use verifier::*;
