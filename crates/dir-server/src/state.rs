use std::sync::Arc;

use dir_index::SearchIndex;
use dir_routing::RoutingHost;
use dir_scheduler::{PublicationScheduler, SyncScheduler};
use dir_store::ContentStore;

/// Shared handles every service façade is built from. Cheap to clone:
/// everything inside is already an `Arc` or a pooled handle.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ContentStore>,
    pub index: Arc<SearchIndex>,
    pub routing: Arc<RoutingHost>,
    pub publications: Arc<PublicationScheduler>,
    pub syncs: Arc<SyncScheduler>,
}
