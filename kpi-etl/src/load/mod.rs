//! Staged load: truncate the staging table, append the dataset, invoke the
//! transform procedure

mod sql;

pub use sql::SqlStagingClient;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::DatabaseConfig;
use crate::normalize::Dataset;
use crate::pipeline::PipelineError;

/// The three engine operations the staged load is built from.
///
/// Each call is its own transactional unit; the loader never wraps them in a
/// spanning transaction, so a later failure leaves earlier steps committed.
#[async_trait]
pub trait StagingClient: Send + Sync {
    async fn truncate(&self, table: &str) -> Result<()>;
    async fn append(&self, table: &str, dataset: &Dataset) -> Result<()>;
    async fn invoke(&self, procedure: &str) -> Result<()>;
}

/// Sequences the staged load against a `StagingClient`
pub struct StagedLoader {
    config: DatabaseConfig,
    client: Box<dyn StagingClient>,
}

impl StagedLoader {
    pub fn new(config: DatabaseConfig, client: Box<dyn StagingClient>) -> Self {
        Self { config, client }
    }

    fn qualified_table(&self) -> String {
        format!("{}.{}", self.config.schema, self.config.staging_table)
    }

    /// Run the three sub-operations in order. A failed step maps to its own
    /// error kind and prevents the remaining steps from executing.
    pub async fn load(&self, dataset: &Dataset) -> Result<(), PipelineError> {
        let table = self.qualified_table();

        self.client.truncate(&table).await.map_err(|e| {
            PipelineError::StagingTruncateFailed {
                detail: format!("{e:#}"),
            }
        })?;
        log::info!("Truncated staging table {}", table);

        self.client.append(&table, dataset).await.map_err(|e| {
            PipelineError::StagingAppendFailed {
                detail: format!("{e:#}"),
            }
        })?;
        log::info!("Appended {} rows to {}", dataset.row_count(), table);

        self.client
            .invoke(&self.config.transform_procedure)
            .await
            .map_err(|e| PipelineError::TransformProcedureFailed {
                detail: format!("{e:#}"),
            })?;
        log::info!(
            "Invoked transform procedure {}",
            self.config.transform_procedure
        );

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;
    use crate::normalize::Value;

    /// In-memory stand-in for the relational engine. Appends are
    /// all-or-nothing, matching a single engine-side insert statement.
    #[derive(Default)]
    pub struct MemoryStagingClient {
        pub rows: Mutex<Vec<Vec<Option<String>>>>,
        pub calls: Mutex<Vec<String>>,
        pub fail_truncate: bool,
        pub fail_append: bool,
        pub fail_invoke: bool,
    }

    impl MemoryStagingClient {
        pub fn with_rows(rows: Vec<Vec<Option<String>>>) -> Self {
            Self {
                rows: Mutex::new(rows),
                ..Default::default()
            }
        }

        pub fn call_log(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn row_count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl StagingClient for MemoryStagingClient {
        async fn truncate(&self, table: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("truncate {table}"));
            if self.fail_truncate {
                anyhow::bail!("relation {table} does not exist");
            }
            self.rows.lock().unwrap().clear();
            Ok(())
        }

        async fn append(&self, table: &str, dataset: &Dataset) -> Result<()> {
            self.calls.lock().unwrap().push(format!("append {table}"));
            if self.fail_append {
                anyhow::bail!("column count mismatch");
            }
            let mut rows = self.rows.lock().unwrap();
            for row in &dataset.rows {
                rows.push(row.iter().map(Value::as_sql_text).collect());
            }
            Ok(())
        }

        async fn invoke(&self, procedure: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("invoke {procedure}"));
            if self.fail_invoke {
                anyhow::bail!("procedure raised");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl<T: StagingClient + ?Sized> StagingClient for Arc<T> {
        async fn truncate(&self, table: &str) -> Result<()> {
            (**self).truncate(table).await
        }

        async fn append(&self, table: &str, dataset: &Dataset) -> Result<()> {
            (**self).append(table, dataset).await
        }

        async fn invoke(&self, procedure: &str) -> Result<()> {
            (**self).invoke(procedure).await
        }
    }
}
