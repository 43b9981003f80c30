//! Component health registry
//!
//! Probes are registered at startup where the concrete clients are known,
//! and cached briefly so a busy `/health` endpoint cannot hammer the
//! backends. The pipeline stays usable as long as the LLM pool and the
//! vector index answer; anything else down only degrades the status.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Components the pipeline cannot work without
const ESSENTIAL: [&str; 2] = ["llm", "vector_index"];

/// Probe result cache lifetime
const PROBE_TTL: Duration = Duration::from_secs(10);

type Probe = Box<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Overall service status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
        }
    }
}

/// Named component probes with a short result cache
pub struct HealthRegistry {
    probes: Vec<(String, Probe)>,
    cache: Mutex<HashMap<String, (Instant, bool)>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            probes: Vec::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn register<F>(mut self, name: impl Into<String>, probe: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, bool> + Send + Sync + 'static,
    {
        self.probes.push((name.into(), Box::new(probe)));
        self
    }

    /// Run all probes (through the cache) and fold into a status
    pub async fn check(&self) -> (HealthStatus, HashMap<String, bool>) {
        let mut components = HashMap::new();

        for (name, probe) in &self.probes {
            let cached = {
                let cache = self.cache.lock();
                cache
                    .get(name)
                    .filter(|(at, _)| at.elapsed() < PROBE_TTL)
                    .map(|(_, up)| *up)
            };

            let up = match cached {
                Some(up) => up,
                None => {
                    let up = probe().await;
                    self.cache.lock().insert(name.clone(), (Instant::now(), up));
                    up
                }
            };
            components.insert(name.clone(), up);
        }

        let essential_up = ESSENTIAL
            .iter()
            .all(|name| components.get(*name).copied().unwrap_or(true));
        let all_up = components.values().all(|up| *up);

        let status = if all_up {
            HealthStatus::Healthy
        } else {
            if !essential_up {
                tracing::warn!("Essential backend down (LLM or vector index)");
            }
            HealthStatus::Degraded
        };

        (status, components)
    }
}
