use std::sync::Arc;
use std::time::Duration;

use super::activities::ActivityCatalog;
use super::lifecycle::ApplicationLifecycle;
use super::repository::VolunteerStore;
use super::schedule::{Clock, SystemClock};
use super::sweeper::ExpirationSweeper;
use super::users::UserRegistry;

/// Service facade composing the catalog, lifecycle engine, and user registry over one store.
pub struct VolunteerHub<S> {
    pub activities: ActivityCatalog<S>,
    pub applications: ApplicationLifecycle<S>,
    pub users: UserRegistry<S>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> VolunteerHub<S>
where
    S: VolunteerStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            activities: ActivityCatalog::with_clock(store.clone(), clock.clone()),
            applications: ApplicationLifecycle::with_clock(store.clone(), clock.clone()),
            users: UserRegistry::new(store.clone()),
            store,
            clock,
        }
    }

    /// Sweeper sharing this hub's store and clock.
    pub fn sweeper(&self, interval: Duration) -> ExpirationSweeper<S> {
        ExpirationSweeper::new(self.store.clone(), self.clock.clone(), interval)
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
