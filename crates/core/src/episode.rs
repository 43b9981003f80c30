//! Episode summary view
//!
//! Owned by the external episode store; the core fetches these by id for
//! response shaping only.

use serde::{Deserialize, Serialize};

use crate::Category;

/// Episode metadata for recommendations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub episode_id: String,
    pub podcast_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub podcast_name: String,
    pub audio_uri: String,
    pub image_uri: String,
    #[serde(default)]
    pub rss_id: String,
    #[serde(default)]
    pub category: Category,
}
