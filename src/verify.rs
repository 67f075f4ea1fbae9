/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! Does an extracted payment match what the ledger expects?

use rust_decimal::Decimal;

use crate::ledger::LedgerSnapshot;
use crate::model::{PaymentRecord, Verdict};

/// Absolute tolerance, in ledger currency units (strict `<`)
pub fn tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Names are compared exactly: no case folding, no trimming.
pub fn verify(
    issuer: Option<&str>,
    receiver: Option<&str>,
    amount: Option<Decimal>,
    ledger: &LedgerSnapshot,
) -> bool {
    let (Some(issuer), Some(receiver), Some(amount)) = (
        issuer.filter(|s| !s.is_empty()),
        receiver.filter(|s| !s.is_empty()),
        amount,
    ) else {
        return false;
    };

    if !ledger.has_participant(issuer) || !ledger.has_participant(receiver) {
        log::debug!(
            "Slip names not in ledger (issuer '{}', receiver '{}')",
            issuer,
            receiver
        );
        return false;
    }

    let expected = match ledger.expected_transfer_to(receiver) {
        Ok(expected) => expected,
        Err(e) => {
            log::warn!("Cannot compute expected transfer: {}", e);
            return false;
        }
    };
    let matched = (expected - amount).abs() < tolerance();
    log::debug!(
        "Expected {} to '{}', slip says {}: {}",
        expected,
        receiver,
        amount,
        if matched { "match" } else { "mismatch" }
    );
    matched
}

/// `is_valid` is "an amount was read"; verification needs a ledger and both names.
pub fn verdict(record: &PaymentRecord, ledger: Option<&LedgerSnapshot>) -> Verdict {
    let is_valid = record.amount.is_some();
    let is_verified = match ledger {
        Some(ledger) if is_valid => verify(
            record.issuer_name.as_deref(),
            record.receiver_name.as_deref(),
            record.amount,
            ledger,
        ),
        _ => false,
    };
    Verdict {
        is_valid,
        is_verified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn ledger() -> LedgerSnapshot {
        LedgerSnapshot::from_json(
            r#"{"payers": [{"name": "A"}, {"name": "B"}],
                "items": [{"price": 100, "paidBy": "A", "splitWith": {"A": true, "B": true}}]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_exact_amount_verifies() {
        assert!(verify(Some("A"), Some("B"), Some(d("50")), &ledger()));
    }

    #[test]
    fn test_tolerance_boundary() {
        let ledger = ledger();
        assert!(verify(Some("A"), Some("B"), Some(d("50.009")), &ledger));
        assert!(!verify(Some("A"), Some("B"), Some(d("50.01")), &ledger));
        assert!(!verify(Some("A"), Some("B"), Some(d("50.02")), &ledger));
        assert!(verify(Some("A"), Some("B"), Some(d("49.991")), &ledger));
    }

    #[test]
    fn test_unknown_names_never_verify() {
        let ledger = ledger();
        assert!(!verify(Some("C"), Some("B"), Some(d("50")), &ledger));
        assert!(!verify(Some("A"), Some("C"), Some(d("50")), &ledger));
        assert!(!verify(Some("a"), Some("B"), Some(d("50")), &ledger));
        assert!(!verify(Some("A "), Some("B"), Some(d("50")), &ledger));
    }

    #[test]
    fn test_missing_fields_never_verify() {
        let ledger = ledger();
        assert!(!verify(None, Some("B"), Some(d("50")), &ledger));
        assert!(!verify(Some("A"), None, Some(d("50")), &ledger));
        assert!(!verify(Some("A"), Some("B"), None, &ledger));
        assert!(!verify(Some(""), Some("B"), Some(d("50")), &ledger));
    }

    #[test]
    fn test_receiver_position_magnitude() {
        // Paying the creditor A also matches: |A| = 50
        assert!(verify(Some("B"), Some("A"), Some(d("50")), &ledger()));
    }

    #[test]
    fn test_verdict() {
        let record = PaymentRecord {
            issuer_name: Some("A".into()),
            receiver_name: Some("B".into()),
            amount: Some(d("50")),
            ..Default::default()
        };
        let ledger = ledger();
        assert_eq!(
            verdict(&record, Some(&ledger)),
            Verdict {
                is_valid: true,
                is_verified: true
            }
        );
        assert_eq!(
            verdict(&record, None),
            Verdict {
                is_valid: true,
                is_verified: false
            }
        );

        let no_amount = PaymentRecord {
            amount: None,
            ..record
        };
        assert_eq!(verdict(&no_amount, Some(&ledger)), Verdict::default());
    }
}
