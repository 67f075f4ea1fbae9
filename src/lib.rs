/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! Receipt verification for shared-expense ledgers.
//!
//! A payment slip image is read by one or more extractors (PromptPay QR,
//! remote or local OCR), normalised into a [`model::PaymentRecord`], and
//! checked against the net balances of the saved ledger.

pub mod config;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod verify;
