//! Fail point injection for testing abort paths
//!
//! A fail point makes a store operation return [`StoreError::Injected`]
//! instead of running. Points are armed per store instance, either in
//! code or through the `OPGUARD_FAIL_POINT` environment variable (a
//! comma-separated list read once when the store is built).
//!
//! # Usage
//!
//! ```ignore
//! store.fail_points().arm(points::INSERT, Some("auditlogs"));
//! ```
//!
//! # Testing
//!
//! ```bash
//! OPGUARD_FAIL_POINT=commit opguard write --data snapshot.json
//! ```

use std::collections::HashSet;
use std::sync::Mutex;

use super::errors::{StoreError, StoreResult};

/// Environment variable holding fail points to arm at startup
pub const FAIL_POINT_ENV: &str = "OPGUARD_FAIL_POINT";

/// All defined fail point names
pub mod points {
    pub const INSERT: &str = "insert";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const COMMIT: &str = "commit";

    /// Get all fail point names
    pub fn all() -> &'static [&'static str] {
        &[INSERT, UPDATE, DELETE, COMMIT]
    }
}

/// Armed fail points of one store
#[derive(Debug, Default)]
pub struct FailPoints {
    armed: Mutex<HashSet<String>>,
}

impl FailPoints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms points listed in `OPGUARD_FAIL_POINT`.
    ///
    /// Entries are `point` or `point:collection`.
    pub fn from_env() -> Self {
        let fail_points = Self::new();
        if let Ok(spec) = std::env::var(FAIL_POINT_ENV) {
            for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                match entry.split_once(':') {
                    Some((point, collection)) => fail_points.arm(point, Some(collection)),
                    None => fail_points.arm(entry, None),
                }
            }
        }
        fail_points
    }

    /// Arms a point, optionally scoped to one collection.
    pub fn arm(&self, point: &str, collection: Option<&str>) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.insert(key(point, collection));
        }
    }

    pub fn disarm(&self, point: &str, collection: Option<&str>) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.remove(&key(point, collection));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.clear();
        }
    }

    /// Fails if the point is armed globally or for this collection.
    pub fn check(&self, point: &str, collection: Option<&str>) -> StoreResult<()> {
        let armed = self.armed.lock()?;
        if armed.is_empty() {
            return Ok(());
        }

        let scoped = collection.map(|c| key(point, Some(c)));
        if armed.contains(point) || scoped.as_ref().is_some_and(|k| armed.contains(k)) {
            let fired = scoped.unwrap_or_else(|| point.to_string());
            tracing::warn!(fail_point = %fired, "injected store failure");
            return Err(StoreError::Injected(fired));
        }
        Ok(())
    }
}

fn key(point: &str, collection: Option<&str>) -> String {
    match collection {
        Some(c) => format!("{}:{}", point, c),
        None => point.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unarmed_is_noop() {
        let fp = FailPoints::new();
        for point in points::all() {
            assert!(fp.check(point, Some("vendors")).is_ok());
        }
    }

    #[test]
    fn test_scoped_point_only_fires_for_collection() {
        let fp = FailPoints::new();
        fp.arm(points::INSERT, Some("auditlogs"));

        assert!(fp.check(points::INSERT, Some("vendors")).is_ok());
        assert_eq!(
            fp.check(points::INSERT, Some("auditlogs")).unwrap_err(),
            StoreError::Injected("insert:auditlogs".into())
        );

        fp.disarm(points::INSERT, Some("auditlogs"));
        assert!(fp.check(points::INSERT, Some("auditlogs")).is_ok());
    }

    #[test]
    fn test_global_point_fires_everywhere() {
        let fp = FailPoints::new();
        fp.arm(points::COMMIT, None);
        assert!(fp.check(points::COMMIT, None).is_err());
        assert!(fp.check(points::COMMIT, Some("x")).is_err());

        fp.clear();
        assert!(fp.check(points::COMMIT, None).is_ok());
    }
}
