//! Short-link persistence.
//!
//! A [`LinkStore`] is a key-addressed collection holding one destination URL per short key.
//! Backends implement a handful of primitives; creation with generated keys and the edit
//! contract are built on top of them here so every backend behaves the same way.

mod memory;
mod postgres;

pub use memory::InMemoryLinkStore;
pub use postgres::PgLinkStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::utils::generate_id;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("short link {0:?} not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidRequest(String),
    #[error("link store unavailable: {0}")]
    Unavailable(String),
    /// The old key was removed but the new one could not be written. Needs manual repair.
    #[error("rename of {from:?} to {to:?} interrupted ({reason}); {destination} is no longer linked")]
    RenameInterrupted {
        from: String,
        to: String,
        destination: String,
        reason: String,
    },
}

#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Inserts or replaces the destination stored under `key`.
    async fn put_link(&self, key: &str, destination: &str) -> Result<(), StoreError>;

    async fn get_link(&self, key: &str) -> Result<String, StoreError>;

    async fn list_links(&self) -> Result<BTreeMap<String, String>, StoreError>;

    /// Removing a key that does not exist is a no-op.
    async fn remove_link(&self, key: &str) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NotFound`] when `key` does not exist.
    async fn update_destination(&self, key: &str, destination: &str) -> Result<(), StoreError>;

    /// Stores `destination` under `key`, or under a freshly generated key when `key` is empty.
    /// Returns the effective key.
    async fn add_link(&self, key: &str, destination: &str) -> Result<String, StoreError> {
        let key = if key.is_empty() {
            generate_id()
        } else {
            key.to_string()
        };
        self.put_link(&key, destination).await?;
        Ok(key)
    }

    /// Updates the destination and/or renames the link, returning the key it ends up under.
    ///
    /// A rename is a remove followed by an insert. The two calls are not atomic: if the insert
    /// fails the link is gone and [`StoreError::RenameInterrupted`] reports what was lost.
    async fn edit_link(
        &self,
        key: &str,
        current_destination: &str,
        new_key: &str,
        new_destination: &str,
    ) -> Result<String, StoreError> {
        if new_key.is_empty() && new_destination.is_empty() {
            return Err(StoreError::InvalidRequest("no new values provided".into()));
        }
        let mut destination = current_destination;
        if !new_destination.is_empty() {
            self.update_destination(key, new_destination).await?;
            destination = new_destination;
        }
        if new_key.is_empty() {
            return Ok(key.to_string());
        }
        self.remove_link(key).await?;
        self.put_link(new_key, destination)
            .await
            .map_err(|err| StoreError::RenameInterrupted {
                from: key.to_string(),
                to: new_key.to_string(),
                destination: destination.to_string(),
                reason: err.to_string(),
            })?;
        Ok(new_key.to_string())
    }
}

/// Builds the configured backend. Connection problems are returned, not retried.
pub async fn create_link_store(config: &StoreConfig) -> Result<Arc<dyn LinkStore>, StoreError> {
    match config.backend {
        StoreBackend::Postgres => Ok(Arc::new(PgLinkStore::connect(config).await?)),
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory link store, links will not survive a restart");
            Ok(Arc::new(InMemoryLinkStore::new()))
        }
    }
}
