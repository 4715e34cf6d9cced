//! Per-user channel cache.

use std::collections::HashMap;
use std::sync::Arc;

use twin_core::{CategoryRegistry, UserChannel};

/// Constructor seam for per-user channels.
pub trait ChannelFactory: Send + Sync {
    /// Build a channel scoped to one remote user.
    fn create(
        &self,
        user: &str,
        categories: &CategoryRegistry,
        remote_addr: &str,
    ) -> Arc<dyn UserChannel>;
}

/// Cache holding at most one open channel per user.
///
/// Not internally locked: the controller's single state lock serializes
/// every mutation.
pub struct ChannelRegistry {
    factory: Arc<dyn ChannelFactory>,
    categories: CategoryRegistry,
    remote_addr: String,
    channels: HashMap<String, Arc<dyn UserChannel>>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(
        factory: Arc<dyn ChannelFactory>,
        categories: CategoryRegistry,
        remote_addr: String,
    ) -> Self {
        Self {
            factory,
            categories,
            remote_addr,
            channels: HashMap::new(),
        }
    }

    /// Return the user's cached channel, constructing it on first access.
    pub fn lookup_or_create(&mut self, user: &str) -> Arc<dyn UserChannel> {
        if let Some(channel) = self.channels.get(user) {
            return Arc::clone(channel);
        }
        tracing::debug!(user, "opening channel");
        let channel = self
            .factory
            .create(user, &self.categories, &self.remote_addr);
        self.channels.insert(user.to_string(), Arc::clone(&channel));
        channel
    }

    /// Drop the user's cached channel. No-op when there is none.
    pub fn evict(&mut self, user: &str) {
        if self.channels.remove(user).is_none() {
            tracing::debug!(user, "evict: no cached channel");
        }
    }

    /// Drop every cached channel.
    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// Number of open channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channel is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use twin_core::{
        AuthenticationInfo, Category, ChannelError, ChannelResponse, DataRecord,
    };

    struct NullChannel;

    #[async_trait]
    impl UserChannel for NullChannel {
        async fn get(&self, _resource: &str) -> Result<ChannelResponse, ChannelError> {
            Err(ChannelError::Closed)
        }
        async fn observe_state(
            &self,
            _session: &AuthenticationInfo,
            _category: &Category,
        ) -> Result<BoxStream<'static, DataRecord>, ChannelError> {
            Err(ChannelError::Closed)
        }
        async fn read_state(
            &self,
            _session: &AuthenticationInfo,
        ) -> Result<Vec<DataRecord>, ChannelError> {
            Err(ChannelError::Closed)
        }
        async fn update_state(
            &self,
            _session: &AuthenticationInfo,
            _records: &[DataRecord],
        ) -> Result<(), ChannelError> {
            Err(ChannelError::Closed)
        }
        async fn read_history(
            &self,
            _session: &AuthenticationInfo,
            _category: &Category,
            _limit: usize,
        ) -> Result<Vec<DataRecord>, ChannelError> {
            Err(ChannelError::Closed)
        }
        async fn refresh(&self, _session: &AuthenticationInfo) -> Result<String, ChannelError> {
            Err(ChannelError::Closed)
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
    }

    impl ChannelFactory for CountingFactory {
        fn create(
            &self,
            _user: &str,
            _categories: &CategoryRegistry,
            _remote_addr: &str,
        ) -> Arc<dyn UserChannel> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Arc::new(NullChannel)
        }
    }

    fn registry(factory: &Arc<CountingFactory>) -> ChannelRegistry {
        ChannelRegistry::new(
            Arc::clone(factory) as Arc<dyn ChannelFactory>,
            CategoryRegistry::default(),
            "http://remote".to_string(),
        )
    }

    #[test]
    fn second_lookup_reuses_cached_channel() {
        let factory = Arc::new(CountingFactory::default());
        let mut registry = registry(&factory);

        let first = registry.lookup_or_create("u1");
        let second = registry.lookup_or_create("u1");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn eviction_forces_a_fresh_channel() {
        let factory = Arc::new(CountingFactory::default());
        let mut registry = registry(&factory);

        let first = registry.lookup_or_create("u1");
        registry.evict("u1");
        let second = registry.lookup_or_create("u1");

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn evicting_an_unknown_user_is_a_noop() {
        let factory = Arc::new(CountingFactory::default());
        let mut registry = registry(&factory);
        registry.evict("nobody");
        assert!(registry.is_empty());
    }
}
