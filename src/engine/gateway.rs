//! Async front for the engine
//!
//! Each call runs on a tokio blocking worker; the engine itself stays
//! synchronous. There is no timeout here, callers impose their own.

use std::sync::Arc;

use super::errors::{EngineError, EngineResult};
use super::handler::Engine;
use super::turn::{Reply, Turn};

#[derive(Clone)]
pub struct Gateway {
    engine: Arc<Engine>,
}

impl Gateway {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub async fn handle(&self, turn: Turn) -> EngineResult<Reply> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.handle(&turn))
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?
    }
}
