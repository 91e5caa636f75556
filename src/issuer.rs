//! Signing followed by the optional payment and telemetry stages.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    Address, Error, Identity, NoPayment, NoTelemetry, PaymentCollaborator, Receipt,
    ReservedOutput, TelemetryCollaborator, TelemetryEvent, sign,
};

/// Issues receipts: signs, optionally pays `fee_wei` to `treasury`, then
/// reports to telemetry.
///
/// A payment failure means no receipt. Telemetry runs last, only for a
/// receipt that was produced, and can never fail an issue.
pub struct ReceiptIssuer<'a> {
    payment: &'a dyn PaymentCollaborator,
    telemetry: &'a dyn TelemetryCollaborator,
    treasury: Address,
    fee_wei: u128,
}

impl<'a> ReceiptIssuer<'a> {
    pub fn new(treasury: Address, fee_wei: u128) -> Self {
        Self {
            payment: &NoPayment,
            telemetry: &NoTelemetry,
            treasury,
            fee_wei,
        }
    }

    pub fn with_payment(mut self, payment: &'a dyn PaymentCollaborator) -> Self {
        self.payment = payment;
        self
    }

    pub fn with_telemetry(mut self, telemetry: &'a dyn TelemetryCollaborator) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn issue(
        &self,
        identity: &Identity,
        message: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Receipt, Error> {
        let receipt = self.sign_and_pay(identity, message, timestamp)?;

        self.telemetry.record(&TelemetryEvent::from(&receipt));
        Ok(receipt)
    }

    /// Issues a receipt and saves it to `path`.
    ///
    /// The output is claimed before signing, so an unwritable or already
    /// existing file (without `overwrite`) fails before any payment is sent.
    pub fn issue_to(
        &self,
        identity: &Identity,
        message: &str,
        timestamp: Option<DateTime<Utc>>,
        path: &Path,
        overwrite: bool,
    ) -> Result<Receipt, Error> {
        let output = ReservedOutput::reserve(path, overwrite)?;

        let receipt = self.sign_and_pay(identity, message, timestamp)?;
        output.commit(&receipt)?;
        info!(path = %path.display(), "receipt saved");

        self.telemetry.record(&TelemetryEvent::from(&receipt));
        Ok(receipt)
    }

    fn sign_and_pay(
        &self,
        identity: &Identity,
        message: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Receipt, Error> {
        let receipt = sign(message, identity, timestamp)?;

        match self.payment.pay(identity, &self.treasury, self.fee_wei)? {
            Some(tx_hash) => {
                info!(%tx_hash, "payment attached to receipt");
                Ok(receipt.with_payment(tx_hash))
            }
            None => Ok(receipt),
        }
    }
}
