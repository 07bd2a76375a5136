//! Persistence collaborator — append-only recommendation history and media storage.
//!
//! The engine only ever reads through `load()`; handlers own appends.

pub mod json_file;
pub mod media;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::recommendation::{RecommendationResult, StoredRecommendation};

/// Append-only store of past recommendations. Entries are never mutated or deleted.
///
/// Carried in `AppState` as `Arc<dyn RecommendationStore>`, picked at startup from config.
#[async_trait]
pub trait RecommendationStore: Send + Sync {
    /// Every stored record, oldest first.
    async fn load(&self) -> Result<Vec<StoredRecommendation>>;

    async fn append(&self, result: RecommendationResult) -> Result<StoredRecommendation>;

    async fn get(&self, id: Uuid) -> Result<Option<StoredRecommendation>>;
}
