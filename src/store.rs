/*
 * SPDX-FileCopyrightText: © 2025 Jinwoo Park (pmnxis@gmail.com)
 *
 * SPDX-License-Identifier: MIT
 */

//! SQLite persistence for slip history and the single shared ledger.
//!
//! The ledger lives in one fixed row. Saving replaces it inside a single
//! transaction, so readers see either the old snapshot or the new one.

use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::error::StoreError;
use crate::ledger::LedgerSnapshot;
use crate::model::SlipHistoryEntry;

/// Served in place of the ledger before the first save
pub const EMPTY_LEDGER_JSON: &str = "{}";

#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        log::info!("Connected to {}", database_url);
        Self::from_pool(pool).await
    }

    /// Single in-memory connection that never expires; for tests and dry runs.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS slip_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                amount TEXT,
                promptpay TEXT,
                status INTEGER NOT NULL,
                verified INTEGER NOT NULL,
                issuer_name TEXT,
                receiver_name TEXT,
                error TEXT,
                source_raw TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Databases created before the audit column existed
        let (has_source_raw,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM pragma_table_info('slip_history') WHERE name = 'source_raw'",
        )
        .fetch_one(&self.pool)
        .await?;
        if has_source_raw == 0 {
            log::info!("Adding source_raw column to slip_history");
            sqlx::query("ALTER TABLE slip_history ADD COLUMN source_raw TEXT NOT NULL DEFAULT '[]'")
                .execute(&self.pool)
                .await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS shared_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                data TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn append_history(&self, entry: &SlipHistoryEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO slip_history
                (filename, amount, promptpay, status, verified,
                 issuer_name, receiver_name, error, source_raw, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.filename)
        .bind(entry.amount.map(|a| a.to_string()))
        .bind(&entry.promptpay)
        .bind(entry.status)
        .bind(entry.verified)
        .bind(&entry.issuer_name)
        .bind(&entry.receiver_name)
        .bind(&entry.error)
        .bind(serde_json::to_string(&entry.source_raw)?)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Most recent `limit` entries, newest first.
    pub async fn recent_history(&self, limit: u32) -> Result<Vec<SlipHistoryEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT filename, amount, promptpay, status, verified,
                   issuer_name, receiver_name, error, source_raw, created_at
            FROM slip_history
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<SlipHistoryEntry, StoreError> {
                let amount: Option<String> = row.try_get("amount")?;
                let source_raw: String = row.try_get("source_raw")?;
                Ok(SlipHistoryEntry {
                    filename: row.try_get("filename")?,
                    amount: amount.and_then(|a| Decimal::from_str(&a).ok()),
                    promptpay: row.try_get("promptpay")?,
                    status: row.try_get("status")?,
                    verified: row.try_get("verified")?,
                    issuer_name: row.try_get("issuer_name")?,
                    receiver_name: row.try_get("receiver_name")?,
                    error: row.try_get("error")?,
                    source_raw: serde_json::from_str(&source_raw)?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    /// Replace the ledger wholesale. The JSON text is stored verbatim.
    pub async fn save_ledger(&self, raw_json: &str) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM shared_state")
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO shared_state (id, data) VALUES (1, ?)")
            .bind(raw_json)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        log::info!("Ledger replaced ({} bytes)", raw_json.len());
        Ok(())
    }

    /// The stored JSON text, exactly as saved.
    pub async fn load_ledger_raw(&self) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM shared_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(data,)| data))
    }

    /// `None` when no ledger has been saved yet.
    pub async fn load_ledger(&self) -> Result<Option<LedgerSnapshot>, StoreError> {
        match self.load_ledger_raw().await? {
            Some(raw) => Ok(Some(LedgerSnapshot::from_json(&raw)?)),
            None => Ok(None),
        }
    }
}
