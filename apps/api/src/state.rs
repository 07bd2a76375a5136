use std::sync::Arc;

use crate::config::Config;
use crate::pricing::notes::NoteRefiner;
use crate::storage::media::MediaStore;
use crate::storage::RecommendationStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Append-only recommendation history. JSON file or Postgres, picked from config.
    pub store: Arc<dyn RecommendationStore>,
    /// Local directory or S3, picked from config.
    pub media: Arc<dyn MediaStore>,
    /// Optional note rephrasing. `None` when no ANTHROPIC_API_KEY is configured.
    pub refiner: Option<Arc<dyn NoteRefiner>>,
    pub config: Config,
}
