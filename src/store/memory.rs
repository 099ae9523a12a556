use super::{LinkStore, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-local link store for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryLinkStore {
    links: Arc<RwLock<BTreeMap<String, String>>>,
}

impl InMemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LinkStore for InMemoryLinkStore {
    async fn put_link(&self, key: &str, destination: &str) -> Result<(), StoreError> {
        self.links
            .write()
            .await
            .insert(key.to_string(), destination.to_string());
        Ok(())
    }

    async fn get_link(&self, key: &str) -> Result<String, StoreError> {
        self.links
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn list_links(&self) -> Result<BTreeMap<String, String>, StoreError> {
        Ok(self.links.read().await.clone())
    }

    async fn remove_link(&self, key: &str) -> Result<(), StoreError> {
        self.links.write().await.remove(key);
        Ok(())
    }

    async fn update_destination(&self, key: &str, destination: &str) -> Result<(), StoreError> {
        let mut links = self.links.write().await;
        let current = links
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        *current = destination.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let store = InMemoryLinkStore::new();
        assert!(store.list_links().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn clones_share_the_same_links() {
        let store = InMemoryLinkStore::new();
        let handle = store.clone();
        handle.put_link("a", "https://a.example").await.unwrap();
        assert_eq!(store.get_link("a").await.unwrap(), "https://a.example");
    }

    #[tokio::test]
    async fn update_of_missing_key_does_not_insert() {
        let store = InMemoryLinkStore::new();
        assert!(matches!(
            store.update_destination("a", "https://a.example").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.list_links().await.unwrap().is_empty());
    }
}
