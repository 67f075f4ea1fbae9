/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! Shared expense ledger and the balance math behind slip verification.
//!
//! A positive net balance is what a participant still owes the pool,
//! a negative one is what the pool owes them back.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

pub type NetBalance = BTreeMap<String, Decimal>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    /// PromptPay phone number or identifier, as typed by the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promptpay: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default, rename = "paidBy")]
    pub paid_by: Option<String>,
    #[serde(default, rename = "splitWith")]
    pub split_with: BTreeMap<String, bool>,
}

impl LineItem {
    /// The editing client stores "nobody" as an empty string.
    pub fn payer(&self) -> Option<&str> {
        self.paid_by.as_deref().filter(|p| !p.is_empty())
    }

    pub fn sharers(&self) -> impl Iterator<Item = &str> {
        self.split_with
            .iter()
            .filter(|(_, checked)| **checked)
            .map(|(name, _)| name.as_str())
    }
}

/// The single current ledger. Read-only to verification.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    #[serde(default)]
    pub payers: Vec<Participant>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

/// One instruction of the greedy settlement plan
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transfer {
    pub from: String,
    pub to: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl LedgerSnapshot {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Rejects shapes the balance math cannot work with.
    pub fn validate(&self) -> Result<(), LedgerError> {
        for (index, item) in self.items.iter().enumerate() {
            if item.price.is_sign_negative() && !item.price.is_zero() {
                return Err(LedgerError::NegativePrice {
                    index,
                    price: item.price,
                });
            }
        }
        self.net_balances().map(|_| ())
    }

    pub fn is_empty(&self) -> bool {
        self.payers.is_empty() && self.items.is_empty()
    }

    pub fn has_participant(&self, name: &str) -> bool {
        self.payers.iter().any(|p| p.name == name)
    }

    /// Net balance per participant, every listed participant starting at zero.
    ///
    /// Names referenced by an item but missing from `payers` are still tracked.
    /// Fails when a running balance leaves the `Decimal` range.
    pub fn net_balances(&self) -> Result<NetBalance, LedgerError> {
        let mut balances: NetBalance = self
            .payers
            .iter()
            .map(|p| (p.name.clone(), Decimal::ZERO))
            .collect();

        for item in &self.items {
            let sharers: Vec<&str> = item.sharers().collect();
            if !sharers.is_empty() {
                let share = item.price / Decimal::from(sharers.len());
                for name in sharers {
                    let balance = self.entry(&mut balances, name);
                    *balance = balance
                        .checked_add(share)
                        .ok_or_else(|| LedgerError::Overflow(name.to_string()))?;
                }
            }
            if let Some(payer) = item.payer() {
                let balance = self.entry(&mut balances, payer);
                *balance = balance
                    .checked_sub(item.price)
                    .ok_or_else(|| LedgerError::Overflow(payer.to_string()))?;
            }
        }

        Ok(balances)
    }

    fn entry<'a>(&self, balances: &'a mut NetBalance, name: &str) -> &'a mut Decimal {
        if !balances.contains_key(name) {
            log::warn!("Ledger item references unknown participant '{}'", name);
        }
        balances.entry(name.to_string()).or_insert(Decimal::ZERO)
    }

    /// How much a transfer to `receiver` is expected to carry: the magnitude
    /// of the receiver's aggregate position.
    pub fn expected_transfer_to(&self, receiver: &str) -> Result<Decimal, LedgerError> {
        Ok(self
            .net_balances()?
            .get(receiver)
            .copied()
            .unwrap_or(Decimal::ZERO)
            .abs())
    }

    pub fn participant_by_promptpay(&self, promptpay_id: &str) -> Option<&Participant> {
        let wanted = canonical_promptpay_id(promptpay_id);
        self.payers.iter().find(|p| {
            p.promptpay
                .as_deref()
                .map(canonical_promptpay_id)
                .is_some_and(|id| !id.is_empty() && id == wanted)
        })
    }

    /// Greedy debtor/creditor pairing: largest debtor pays largest creditor first.
    pub fn settlement_plan(&self) -> Result<Vec<Transfer>, LedgerError> {
        let tolerance = Decimal::new(1, 2);
        let mut net = self.net_balances()?;

        let mut debtors: Vec<String> = net
            .iter()
            .filter(|(_, v)| v.is_sign_positive() && !v.is_zero())
            .map(|(k, _)| k.clone())
            .collect();
        debtors.sort_by(|a, b| net[b].cmp(&net[a]));

        let mut creditors: Vec<String> = net
            .iter()
            .filter(|(_, v)| v.is_sign_negative() && !v.is_zero())
            .map(|(k, _)| k.clone())
            .collect();
        creditors.sort_by(|a, b| net[a].cmp(&net[b]));

        let mut transfers = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < debtors.len() && j < creditors.len() {
            let from = &debtors[i];
            let to = &creditors[j];
            let amount = net[from].min(-net[to]);

            if amount > Decimal::ZERO {
                transfers.push(Transfer {
                    from: from.clone(),
                    to: to.clone(),
                    amount: amount.round_dp(2),
                });
                if let Some(v) = net.get_mut(from) {
                    *v -= amount;
                }
                if let Some(v) = net.get_mut(to) {
                    *v += amount;
                }
            }

            if net[from] <= tolerance {
                i += 1;
            }
            if net[to] >= -tolerance {
                j += 1;
            }
        }

        Ok(transfers)
    }
}

/// Canonical 13-character PromptPay id. A Thai mobile number `0XXXXXXXXX`
/// becomes `0066XXXXXXXXX`; anything else keeps its digits only.
pub fn canonical_promptpay_id(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 10 && digits.starts_with('0') {
        format!("0066{}", &digits[1..])
    } else {
        digits
    }
}
