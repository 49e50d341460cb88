use std::sync::Arc;

use crate::cache::Cache;
use crate::db::EntityStore;
use crate::models::{Event, MatchScore, Player, Standing};
use crate::services::{GalleryService, ResourceService};
use crate::storage::BlobStore;

/// Shared by every handler. All services use the same store, blob store
/// and cache.
#[derive(Clone)]
pub struct AppState {
    pub players: ResourceService<Player>,
    pub events: ResourceService<Event>,
    pub standings: ResourceService<Standing>,
    pub scores: ResourceService<MatchScore>,
    pub gallery: GalleryService,
}

impl AppState {
    pub fn new(store: Arc<dyn EntityStore>, blobs: Arc<dyn BlobStore>, cache: Cache) -> Self {
        Self {
            players: ResourceService::new(store.clone(), blobs.clone(), cache.clone()),
            events: ResourceService::new(store.clone(), blobs.clone(), cache.clone()),
            standings: ResourceService::new(store.clone(), blobs.clone(), cache.clone()),
            scores: ResourceService::new(store, blobs.clone(), cache),
            gallery: GalleryService::new(blobs),
        }
    }
}
