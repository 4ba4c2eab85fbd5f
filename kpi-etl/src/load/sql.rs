//! sqlx-backed staging client

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::StagingClient;
use crate::normalize::Dataset;

/// Postgres bind-parameter ceiling per statement
const BIND_LIMIT: usize = 65_535;

/// Staging client over a Postgres connection pool. Each statement runs and
/// commits on its own.
pub struct SqlStagingClient {
    pool: PgPool,
}

impl SqlStagingClient {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn quote_ident(part: &str) -> String {
    format!("\"{}\"", part.replace('"', "\"\""))
}

/// Quote a possibly schema-qualified name part by part
fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Rows per INSERT statement, bounded by the bind-parameter limit
fn rows_per_statement(column_count: usize) -> usize {
    (BIND_LIMIT / column_count.max(1)).max(1)
}

#[async_trait]
impl StagingClient for SqlStagingClient {
    async fn truncate(&self, table: &str) -> Result<()> {
        let statement = format!("TRUNCATE TABLE {}", quote_qualified(table));
        sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to truncate {table}"))?;
        Ok(())
    }

    async fn append(&self, table: &str, dataset: &Dataset) -> Result<()> {
        if dataset.rows.is_empty() {
            return Ok(());
        }

        let column_list = dataset
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");

        for chunk in dataset.rows.chunks(rows_per_statement(dataset.columns.len())) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {} ({}) ",
                quote_qualified(table),
                column_list
            ));
            builder.push_values(chunk, |mut b, row| {
                for value in row {
                    b.push_bind(value.as_sql_text());
                }
            });
            builder
                .build()
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to append rows to {table}"))?;
        }

        Ok(())
    }

    async fn invoke(&self, procedure: &str) -> Result<()> {
        let statement = format!("CALL {}()", quote_qualified(procedure));
        sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to invoke {procedure}"))?;
        Ok(())
    }
}
