use super::{LinkStore, StoreError};
use crate::config::StoreConfig;
use crate::model::LinkRecord;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Postgres-backed store, one table per collection.
pub struct PgLinkStore {
    db_connection_pool: Pool<Postgres>,
    collection: String,
    timeout: Duration,
}

impl PgLinkStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        if !is_valid_collection_name(&config.collection) {
            return Err(StoreError::InvalidRequest(format!(
                "collection name {:?} is not a valid table name",
                config.collection
            )));
        }
        let timeout = Duration::from_millis(config.timeout_ms);
        let db_connection_pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(timeout)
            .connect(&config.database_url)
            .await
            .map_err(unavailable)?;
        let store = Self {
            db_connection_pool,
            collection: config.collection.clone(),
            timeout,
        };
        store.ensure_collection().await?;
        tracing::info!("Connected to link collection {}", store.collection);
        Ok(store)
    }

    async fn ensure_collection(&self) -> Result<(), StoreError> {
        let statement = format!(
            "create table if not exists {}(id text primary key, destination_url text not null)",
            self.collection
        );
        self.with_timeout(sqlx::query(&statement).execute(&self.db_connection_pool))
            .await?;
        Ok(())
    }

    async fn with_timeout<F, T>(&self, task: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        tokio::time::timeout(self.timeout, task)
            .await
            .map_err(|_| StoreError::Unavailable("query timed out".into()))?
            .map_err(unavailable)
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// Collection names are interpolated into SQL, so only plain identifiers are accepted.
fn is_valid_collection_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn put_link(&self, key: &str, destination: &str) -> Result<(), StoreError> {
        let statement = format!(
            r#"
              insert into {}(id, destination_url) values ($1, $2)
              on conflict (id) do update set destination_url = excluded.destination_url
            "#,
            self.collection
        );
        self.with_timeout(
            sqlx::query(&statement)
                .bind(key)
                .bind(destination)
                .execute(&self.db_connection_pool),
        )
        .await?;
        Ok(())
    }

    async fn get_link(&self, key: &str) -> Result<String, StoreError> {
        let statement = format!(
            "select id, destination_url from {} where id = $1",
            self.collection
        );
        let record: Option<LinkRecord> = self
            .with_timeout(
                sqlx::query_as::<_, LinkRecord>(&statement)
                    .bind(key)
                    .fetch_optional(&self.db_connection_pool),
            )
            .await?;
        record
            .map(|record| record.destination_url)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn list_links(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let statement = format!("select id, destination_url from {}", self.collection);
        let records: Vec<LinkRecord> = self
            .with_timeout(
                sqlx::query_as::<_, LinkRecord>(&statement).fetch_all(&self.db_connection_pool),
            )
            .await?;
        Ok(records
            .into_iter()
            .map(|record| (record.id, record.destination_url))
            .collect())
    }

    async fn remove_link(&self, key: &str) -> Result<(), StoreError> {
        let statement = format!("delete from {} where id = $1", self.collection);
        self.with_timeout(
            sqlx::query(&statement)
                .bind(key)
                .execute(&self.db_connection_pool),
        )
        .await?;
        Ok(())
    }

    async fn update_destination(&self, key: &str, destination: &str) -> Result<(), StoreError> {
        let statement = format!(
            "update {} set destination_url = $1 where id = $2",
            self.collection
        );
        let result = self
            .with_timeout(
                sqlx::query(&statement)
                    .bind(destination)
                    .bind(key)
                    .execute(&self.db_connection_pool),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(())
    }
}
