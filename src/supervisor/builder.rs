//! Builder for assembling a [`Supervisor`] from its dependencies.

use std::sync::Arc;

use super::{Supervisor, SupervisorError};
use crate::{
    config::AppConfig, models::CollectionConfig, notification::Notifier,
    persistence::KeyValueStore, sources::ActivitySource,
};

/// Collects the supervisor's dependencies and validates their presence.
pub struct SupervisorBuilder<S> {
    config: Option<AppConfig>,
    state: Option<Arc<S>>,
    collections: Vec<CollectionConfig>,
    primary_source: Option<Arc<dyn ActivitySource>>,
    secondary_source: Option<Arc<dyn ActivitySource>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl<S: KeyValueStore + Send + Sync + 'static> SupervisorBuilder<S> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self {
            config: None,
            state: None,
            collections: Vec::new(),
            primary_source: None,
            secondary_source: None,
            notifier: None,
        }
    }

    /// Sets the application configuration.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the state repository backing the dedup stores.
    pub fn state(mut self, state: Arc<S>) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the collections to monitor. Address fields are normalized here.
    pub fn collections(mut self, collections: Vec<CollectionConfig>) -> Self {
        self.collections = collections.into_iter().map(CollectionConfig::normalize).collect();
        self
    }

    /// Sets the primary activity source, polled for every collection.
    pub fn primary_source(mut self, source: Arc<dyn ActivitySource>) -> Self {
        self.primary_source = Some(source);
        self
    }

    /// Sets the optional secondary source, polled only for collections that
    /// configure a provider id for it.
    pub fn secondary_source(mut self, source: Option<Arc<dyn ActivitySource>>) -> Self {
        self.secondary_source = source;
        self
    }

    /// Sets the notifier receiving emitted events.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Validates the dependencies and builds the supervisor.
    pub fn build(self) -> Result<Supervisor<S>, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let state = self.state.ok_or(SupervisorError::MissingStateRepository)?;
        let primary_source =
            self.primary_source.ok_or(SupervisorError::MissingPrimarySource)?;
        let notifier = self.notifier.ok_or(SupervisorError::MissingNotifier)?;
        if self.collections.is_empty() {
            return Err(SupervisorError::NoCollections);
        }

        Ok(Supervisor {
            config: Arc::new(config),
            state,
            collections: self.collections.into_iter().map(Arc::new).collect(),
            primary_source,
            secondary_source: self.secondary_source,
            notifier,
            cancellation_token: tokio_util::sync::CancellationToken::new(),
            join_set: tokio::task::JoinSet::new(),
        })
    }
}

impl<S: KeyValueStore + Send + Sync + 'static> Default for SupervisorBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}
