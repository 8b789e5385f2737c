//! Plan producers
//!
//! A producer turns request text into a raw plan. Its output is
//! untrusted and goes through the same parsing and sanitizing as a plan
//! supplied directly.

use std::collections::HashMap;

use serde_json::Value;

use super::errors::{EngineError, EngineResult};

pub trait PlanProducer: Send + Sync {
    fn produce(&self, text: &str) -> EngineResult<Value>;
}

/// Producer answering from a fixed text → plan table
#[derive(Debug, Clone, Default)]
pub struct StaticProducer {
    plans: HashMap<String, Value>,
}

impl StaticProducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(mut self, text: impl Into<String>, plan: Value) -> Self {
        self.plans.insert(text.into().trim().to_string(), plan);
        self
    }
}

impl PlanProducer for StaticProducer {
    fn produce(&self, text: &str) -> EngineResult<Value> {
        self.plans
            .get(text.trim())
            .cloned()
            .ok_or_else(|| EngineError::Producer(format!("no plan for '{}'", text.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_producer() {
        let producer = StaticProducer::new()
            .with_plan("list vendors", json!({"mode": "find", "collection": "vendors"}));

        assert_eq!(producer.produce(" list vendors ").unwrap()["mode"], "find");
        assert_eq!(
            producer.produce("drop all").unwrap_err().code(),
            "OPG_ENGINE_PRODUCER"
        );
    }
}
