//! Vector index client over Qdrant
//!
//! Filtered ANN search over transcript chunks. Filters are a conjunction of
//! equality/IN predicates over `category`, `tags`, `language`, and
//! `podcast_id`, matching the grammar the index exposes.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    condition::ConditionOneOf, r#match::MatchValue, value::Kind, Condition, FieldCondition,
    Filter, Match, Range, RepeatedStrings, ScrollPointsBuilder, SearchParamsBuilder,
    SearchPointsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;

use podwise_core::{Category, ChunkFilter, ChunkHit, Error, VectorIndex};
use podwise_config::RetrievalConfig;

use crate::RetrievalError;

/// Index client configuration
#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub endpoint: String,
    pub collection: String,
    pub vector_dim: usize,
    pub api_key: Option<String>,
    /// Pinned search width so identical queries return identical orderings
    pub hnsw_ef: Option<u64>,
}

impl From<&RetrievalConfig> for IndexConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            endpoint: config.qdrant_endpoint.clone(),
            collection: config.qdrant_collection.clone(),
            vector_dim: config.embedding_dim,
            api_key: config.qdrant_api_key.clone(),
            hnsw_ef: config.qdrant_hnsw_ef,
        }
    }
}

/// Qdrant-backed chunk index
pub struct QdrantIndex {
    client: Qdrant,
    config: IndexConfig,
}

impl QdrantIndex {
    pub fn new(config: IndexConfig) -> Result<Self, RetrievalError> {
        let mut builder = Qdrant::from_url(&config.endpoint);
        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }
        let client = builder
            .build()
            .map_err(|e| RetrievalError::Connection(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Probe for the health registry
    pub async fn is_available(&self) -> bool {
        self.client
            .collection_exists(&self.config.collection)
            .await
            .is_ok()
    }

    fn keyword_condition(key: &str, value: String) -> Condition {
        Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: key.to_string(),
                r#match: Some(Match {
                    match_value: Some(MatchValue::Keyword(value)),
                }),
                ..Default::default()
            })),
        }
    }

    fn keywords_condition(key: &str, values: Vec<String>) -> Condition {
        Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: key.to_string(),
                r#match: Some(Match {
                    match_value: Some(MatchValue::Keywords(RepeatedStrings { strings: values })),
                }),
                ..Default::default()
            })),
        }
    }

    fn build_filter(filter: &ChunkFilter) -> Option<Filter> {
        if filter.is_empty() {
            return None;
        }

        let mut conditions = Vec::new();

        if let Some(category) = filter.category {
            conditions.push(Self::keyword_condition("category", category.to_string()));
        }
        if !filter.tags.is_empty() {
            conditions.push(Self::keywords_condition("tags", filter.tags.clone()));
        }
        if let Some(ref language) = filter.language {
            conditions.push(Self::keyword_condition("language", language.clone()));
        }
        if let Some(ref podcast_id) = filter.podcast_id {
            conditions.push(Self::keyword_condition("podcast_id", podcast_id.clone()));
        }

        Some(Filter {
            must: conditions,
            ..Default::default()
        })
    }

    fn hit_from_payload(
        id: String,
        score: f32,
        payload: HashMap<String, qdrant_client::qdrant::Value>,
    ) -> ChunkHit {
        let mut text = String::new();
        let mut episode_id = String::new();
        let mut podcast_id = String::new();
        let mut podcast_name = String::new();
        let mut language = String::new();
        let mut category = Category::Other;
        let mut chunk_index = 0u32;
        let mut tags = Vec::new();
        let mut published_ts = None;

        for (key, value) in payload {
            match (key.as_str(), value.kind) {
                ("text", Some(Kind::StringValue(s))) => text = s,
                ("episode_id", Some(Kind::StringValue(s))) => episode_id = s,
                ("podcast_id", Some(Kind::StringValue(s))) => podcast_id = s,
                ("podcast_name", Some(Kind::StringValue(s))) => podcast_name = s,
                ("language", Some(Kind::StringValue(s))) => language = s,
                ("category", Some(Kind::StringValue(s))) => category = Category::parse(&s),
                ("chunk_index", Some(Kind::IntegerValue(n))) => chunk_index = n.max(0) as u32,
                ("published_ts", Some(Kind::IntegerValue(n))) => published_ts = Some(n),
                ("tags", Some(Kind::ListValue(list))) => {
                    tags = list
                        .values
                        .into_iter()
                        .filter_map(|v| match v.kind {
                            Some(Kind::StringValue(s)) => Some(s),
                            _ => None,
                        })
                        .collect();
                }
                _ => {}
            }
        }

        ChunkHit {
            chunk_id: id,
            episode_id,
            podcast_id,
            podcast_name,
            chunk_index,
            text,
            // Unit vectors: remap cosine from [-1,1] into [0,1]
            score: ((score + 1.0) / 2.0).clamp(0.0, 1.0),
            tags,
            category,
            language,
            published_ts,
        }
    }

    fn point_id_to_string(id: Option<qdrant_client::qdrant::PointId>) -> String {
        id.map(|pid| match pid.point_id_options {
            Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
            Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
            None => String::new(),
        })
        .unwrap_or_default()
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn search(
        &self,
        vector: &[f32],
        filter: &ChunkFilter,
        k: usize,
    ) -> Result<Vec<ChunkHit>, Error> {
        if vector.len() != self.config.vector_dim {
            return Err(Error::Invariant(format!(
                "query vector dim {} != index dim {}",
                vector.len(),
                self.config.vector_dim
            )));
        }

        let mut builder =
            SearchPointsBuilder::new(&self.config.collection, vector.to_vec(), k as u64)
                .with_payload(true);

        if let Some(ef) = self.config.hnsw_ef {
            builder = builder.params(SearchParamsBuilder::default().hnsw_ef(ef));
        }
        if let Some(qdrant_filter) = Self::build_filter(filter) {
            builder = builder.filter(qdrant_filter);
        }

        let results = self
            .client
            .search_points(builder)
            .await
            .map_err(|e| RetrievalError::Index(e.to_string()))?;

        let mut hits: Vec<ChunkHit> = results
            .result
            .into_iter()
            .map(|point| {
                let id = Self::point_id_to_string(point.id);
                Self::hit_from_payload(id, point.score, point.payload)
            })
            .collect();

        // nprobe-stable ordering: score desc, chunk_id asc
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(k);

        Ok(hits)
    }

    async fn neighbours(
        &self,
        episode_id: &str,
        chunk_index: u32,
        radius: u32,
    ) -> Result<Vec<ChunkHit>, Error> {
        let low = chunk_index.saturating_sub(radius) as f64;
        let high = (chunk_index + radius) as f64;

        let range_condition = Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: "chunk_index".to_string(),
                range: Some(Range {
                    gte: Some(low),
                    lte: Some(high),
                    ..Default::default()
                }),
                ..Default::default()
            })),
        };

        let filter = Filter {
            must: vec![
                Self::keyword_condition("episode_id", episode_id.to_string()),
                range_condition,
            ],
            ..Default::default()
        };

        let results = self
            .client
            .scroll(
                ScrollPointsBuilder::new(&self.config.collection)
                    .filter(filter)
                    .limit(radius * 2 + 1)
                    .with_payload(true),
            )
            .await
            .map_err(|e| RetrievalError::Index(e.to_string()))?;

        let mut hits: Vec<ChunkHit> = results
            .result
            .into_iter()
            .map(|point| {
                let id = Self::point_id_to_string(point.id);
                Self::hit_from_payload(id, 0.0, point.payload)
            })
            .collect();

        hits.sort_by_key(|h| h.chunk_index);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_is_none() {
        assert!(QdrantIndex::build_filter(&ChunkFilter::default()).is_none());
    }

    #[test]
    fn test_filter_is_conjunction() {
        let filter = ChunkFilter {
            category: Some(Category::Business),
            tags: vec!["investing".to_string()],
            language: Some("zh".to_string()),
            podcast_id: None,
        };
        let qdrant = QdrantIndex::build_filter(&filter).unwrap();
        assert_eq!(qdrant.must.len(), 3);
        assert!(qdrant.should.is_empty());
    }

    #[test]
    fn test_payload_mapping_remaps_score() {
        let hit = QdrantIndex::hit_from_payload("c1".into(), 1.0, HashMap::new());
        assert_eq!(hit.score, 1.0);
        let hit = QdrantIndex::hit_from_payload("c1".into(), -1.0, HashMap::new());
        assert_eq!(hit.score, 0.0);
    }
}
