//! Per-request query executor
//!
//! Owns one pooled SQLite connection for the lifetime of a request context
//! and exposes a prepare → execute → fetch cycle, explicit transaction
//! boundaries and idempotent DDL helpers.
//!
//! All values go through parameter binding. Table and column identifiers
//! are only interpolated after [`SchemaRegistry`] confirms they exist.

use std::collections::VecDeque;

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::db::schema::{SchemaRegistry, TableDefinition};
use crate::db::value::{count_placeholders, decode_row, returns_rows, Record, SqlValue};
use crate::{Error, Result};

pub struct QueryExecutor {
    conn: Option<PoolConnection<Sqlite>>,
    schema: &'static SchemaRegistry,
    prepared: Option<String>,
    executed: bool,
    results: VecDeque<Record>,
    rows_affected: u64,
    last_insert_id: Option<i64>,
    in_transaction: bool,
}

impl QueryExecutor {
    /// Acquire a connection checked against the catalog schema
    pub async fn acquire(pool: &SqlitePool) -> Result<Self> {
        Self::acquire_with_schema(pool, SchemaRegistry::catalog()).await
    }

    pub async fn acquire_with_schema(
        pool: &SqlitePool,
        schema: &'static SchemaRegistry,
    ) -> Result<Self> {
        let conn = pool.acquire().await?;
        Ok(Self {
            conn: Some(conn),
            schema,
            prepared: None,
            executed: false,
            results: VecDeque::new(),
            rows_affected: 0,
            last_insert_id: None,
            in_transaction: false,
        })
    }

    pub fn schema(&self) -> &'static SchemaRegistry {
        self.schema
    }

    fn connection(&mut self) -> Result<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| Error::Internal("Executor connection already released".to_string()))
    }

    // ------------------------------------------------------------------
    // Prepare / execute / fetch
    // ------------------------------------------------------------------

    /// Prepare a statement; `?` marks positional parameters
    pub fn query(&mut self, sql: impl Into<String>) -> Result<&mut Self> {
        let sql = sql.into();
        if sql.trim().is_empty() {
            return Err(Error::Query("Query cannot be empty".to_string()));
        }

        self.prepared = Some(sql);
        self.executed = false;
        self.results.clear();
        Ok(self)
    }

    /// Bind `params` to the prepared statement and run it.
    ///
    /// Row-returning statements buffer their rows for [`fetch`](Self::fetch);
    /// others record the affected-row count and last insert id.
    pub async fn execute(&mut self, params: &[SqlValue]) -> Result<&mut Self> {
        let sql = self
            .prepared
            .clone()
            .ok_or_else(|| Error::Execution("No query has been prepared".to_string()))?;

        let expected = count_placeholders(&sql);
        if expected != params.len() {
            return Err(Error::Execution(format!(
                "Statement expects {} parameter(s), got {}",
                expected,
                params.len()
            )));
        }

        let mut query = sqlx::query(&sql);
        for param in params {
            query = param.clone().bind_to(query);
        }

        debug!(sql = %sql, params = params.len(), "execute");

        let conn = self.connection()?;
        if returns_rows(&sql) {
            let rows = query.fetch_all(&mut *conn).await?;
            let records = rows.iter().map(decode_row).collect::<Result<VecDeque<_>>>()?;
            self.results = records;
            self.rows_affected = 0;
        } else {
            let done = query.execute(&mut *conn).await?;
            self.results.clear();
            self.rows_affected = done.rows_affected();
            let rowid = done.last_insert_rowid();
            if rowid > 0 {
                self.last_insert_id = Some(rowid);
            }
        }

        self.executed = true;
        Ok(self)
    }

    fn ensure_executed(&self) -> Result<()> {
        if self.executed {
            Ok(())
        } else {
            Err(Error::Execution("No query has been executed".to_string()))
        }
    }

    /// Next buffered row of the last executed statement
    pub fn fetch(&mut self) -> Result<Option<Record>> {
        self.ensure_executed()?;
        Ok(self.results.pop_front())
    }

    /// All remaining buffered rows of the last executed statement
    pub fn fetch_all(&mut self) -> Result<Vec<Record>> {
        self.ensure_executed()?;
        Ok(self.results.drain(..).collect())
    }

    /// Rows changed by the last non-query statement
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Primary key generated by the most recent INSERT on this connection
    pub fn last_insert_id(&self) -> Option<i64> {
        self.last_insert_id
    }

    // ------------------------------------------------------------------
    // Allow-listed CRUD helpers
    // ------------------------------------------------------------------

    /// `INSERT INTO table (k...) VALUES (?...)`; returns the generated id
    pub async fn insert(&mut self, table: &str, fields: &[(&str, SqlValue)]) -> Result<i64> {
        let definition = self.schema.table(table)?;
        if fields.is_empty() {
            return Err(Error::Query(format!("Insert into '{}' has no fields", table)));
        }
        for (column, _) in fields {
            definition.require_column(column)?;
        }

        let columns: Vec<String> = fields.iter().map(|(c, _)| quoted(c)).collect();
        let placeholders = vec!["?"; fields.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoted(table),
            columns.join(", "),
            placeholders
        );
        let params: Vec<SqlValue> = fields.iter().map(|(_, v)| v.clone()).collect();

        self.query(sql)?.execute(&params).await?;
        self.last_insert_id
            .ok_or_else(|| Error::Execution(format!("Insert into '{}' produced no id", table)))
    }

    /// `SELECT columns FROM table WHERE k = ? AND ...`
    ///
    /// An empty `columns` slice or `["*"]` selects every column.
    pub async fn select(
        &mut self,
        table: &str,
        columns: &[&str],
        conditions: &[(&str, SqlValue)],
    ) -> Result<Vec<Record>> {
        let definition = self.schema.table(table)?;

        let column_sql = if columns.is_empty() || columns == ["*"] {
            "*".to_string()
        } else {
            for column in columns {
                definition.require_column(column)?;
            }
            columns.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", ")
        };

        let (where_sql, params) = where_clause(definition, conditions)?;
        let sql = format!("SELECT {} FROM {}{}", column_sql, quoted(table), where_sql);

        self.query(sql)?.execute(&params).await?;
        self.fetch_all()
    }

    /// Find one row by numeric id or by slug.
    ///
    /// An identifier made only of ASCII digits is looked up in `id`;
    /// anything else in `slug`.
    pub async fn find(&mut self, table: &str, identifier: &str) -> Result<Option<Record>> {
        let definition = self.schema.table(table)?;
        if identifier.is_empty() {
            return Err(Error::InvalidInput("Identifier cannot be empty".to_string()));
        }

        let (column, value) = match identifier.parse::<i64>() {
            Ok(id) if identifier.bytes().all(|b| b.is_ascii_digit()) => ("id", SqlValue::Integer(id)),
            _ => ("slug", SqlValue::Text(identifier.to_string())),
        };
        definition.require_column(column)?;

        let sql = format!(
            "SELECT * FROM {} WHERE {} = ? LIMIT 1",
            quoted(table),
            quoted(column)
        );
        self.query(sql)?.execute(&[value]).await?;
        self.fetch()
    }

    /// `UPDATE table SET k = ? ... WHERE ...`; returns affected rows
    pub async fn update(
        &mut self,
        table: &str,
        fields: &[(&str, SqlValue)],
        conditions: &[(&str, SqlValue)],
    ) -> Result<u64> {
        let definition = self.schema.table(table)?;
        if fields.is_empty() {
            return Err(Error::Query(format!("Update of '{}' has no fields", table)));
        }
        if conditions.is_empty() {
            return Err(Error::Query(format!("Update of '{}' has no conditions", table)));
        }

        let mut assignments = Vec::with_capacity(fields.len());
        let mut params = Vec::with_capacity(fields.len() + conditions.len());
        for (column, value) in fields {
            definition.require_column(column)?;
            assignments.push(format!("{} = ?", quoted(column)));
            params.push(value.clone());
        }

        let (where_sql, where_params) = where_clause(definition, conditions)?;
        params.extend(where_params);

        let sql = format!(
            "UPDATE {} SET {}{}",
            quoted(table),
            assignments.join(", "),
            where_sql
        );
        self.query(sql)?.execute(&params).await?;
        Ok(self.rows_affected)
    }

    /// `DELETE FROM table WHERE ...`; returns affected rows
    pub async fn delete(&mut self, table: &str, conditions: &[(&str, SqlValue)]) -> Result<u64> {
        let definition = self.schema.table(table)?;
        if conditions.is_empty() {
            return Err(Error::Query(format!("Delete from '{}' has no conditions", table)));
        }

        let (where_sql, params) = where_clause(definition, conditions)?;
        let sql = format!("DELETE FROM {}{}", quoted(table), where_sql);

        self.query(sql)?.execute(&params).await?;
        Ok(self.rows_affected)
    }

    /// `SELECT COUNT(*) FROM table WHERE ...`
    pub async fn count(&mut self, table: &str, conditions: &[(&str, SqlValue)]) -> Result<i64> {
        let definition = self.schema.table(table)?;
        let (where_sql, params) = where_clause(definition, conditions)?;
        let sql = format!("SELECT COUNT(*) AS total FROM {}{}", quoted(table), where_sql);

        self.query(sql)?.execute(&params).await?;
        Ok(self
            .fetch()?
            .and_then(|row| row.get("total").and_then(|v| v.as_i64()))
            .unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Open a transaction. Nested transactions are rejected.
    ///
    /// Uses `BEGIN IMMEDIATE` so the write lock is held from the start and
    /// check-then-insert sequences inside the transaction are serialised.
    pub async fn begin_transaction(&mut self) -> Result<()> {
        if self.in_transaction {
            return Err(Error::TransactionState("Transaction already active".to_string()));
        }

        let conn = self.connection()?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        self.in_transaction = true;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(Error::TransactionState(
                "No active transaction to commit".to_string(),
            ));
        }

        let conn = self.connection()?;
        sqlx::query("COMMIT").execute(&mut *conn).await?;
        self.in_transaction = false;
        Ok(())
    }

    pub async fn roll_back(&mut self) -> Result<()> {
        if !self.in_transaction {
            return Err(Error::TransactionState(
                "Cannot roll back a transaction that is not active".to_string(),
            ));
        }

        let conn = self.connection()?;
        sqlx::query("ROLLBACK").execute(&mut *conn).await?;
        self.in_transaction = false;
        Ok(())
    }

    /// Roll back if a transaction is open; failures are logged, not raised.
    /// Used on error paths where the first error must propagate.
    pub async fn roll_back_if_active(&mut self) {
        if self.in_transaction {
            if let Err(e) = self.roll_back().await {
                warn!("Rollback failed: {}", e);
            }
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    // ------------------------------------------------------------------
    // Schema introspection / DDL
    // ------------------------------------------------------------------

    pub async fn has_table(&mut self, name: &str) -> Result<bool> {
        if name.is_empty() {
            return Err(Error::Query("Table name cannot be empty".to_string()));
        }

        self.query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?) AS present",
        )?
        .execute(&[SqlValue::from(name)])
        .await?;

        Ok(self
            .fetch()?
            .and_then(|row| row.get("present").and_then(|v| v.as_i64()))
            == Some(1))
    }

    /// `CREATE TABLE IF NOT EXISTS` from a table definition
    pub async fn create_table(&mut self, table: &TableDefinition) -> Result<()> {
        if table.name.is_empty() {
            return Err(Error::Query("Table name cannot be empty".to_string()));
        }
        if table.columns.is_empty() {
            return Err(Error::Query(format!(
                "Table '{}' has no column definitions",
                table.name
            )));
        }

        self.query(table.create_sql())?.execute(&[]).await?;
        Ok(())
    }

    /// `DROP TABLE IF EXISTS`; only registry tables may be dropped
    pub async fn drop_table(&mut self, name: &str) -> Result<()> {
        self.schema.table(name)?;
        self.query(format!("DROP TABLE IF EXISTS {}", quoted(name)))?
            .execute(&[])
            .await?;
        Ok(())
    }
}

impl Drop for QueryExecutor {
    fn drop(&mut self) {
        if self.in_transaction {
            if let Some(conn) = self.conn.take() {
                // Closing the connection makes SQLite discard the open
                // transaction; it must not go back to the pool mid-transaction.
                warn!("Executor dropped inside a transaction; discarding connection");
                drop(conn.detach());
            }
        }
    }
}

fn quoted(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

/// ` WHERE a = ? AND b = ?` (empty when there are no conditions)
fn where_clause(
    table: &TableDefinition,
    conditions: &[(&str, SqlValue)],
) -> Result<(String, Vec<SqlValue>)> {
    if conditions.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut predicates = Vec::with_capacity(conditions.len());
    let mut params = Vec::with_capacity(conditions.len());
    for (column, value) in conditions {
        table.require_column(column)?;
        predicates.push(format!("{} = ?", quoted(column)));
        params.push(value.clone());
    }

    Ok((format!(" WHERE {}", predicates.join(" AND ")), params))
}
