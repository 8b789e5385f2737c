//! Schema loader for registry files
//!
//! A registry is either a single JSON file of the form
//! `{"collections": [<schema>, ...]}` or a directory holding one
//! `<collection>.json` schema per file. Malformed input fails startup.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{SchemaError, SchemaResult};
use super::registry::SchemaRegistry;
use super::types::CollectionSchema;

/// On-disk shape of a single-file registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryFile {
    pub collections: Vec<CollectionSchema>,
}

/// Loads registries from disk
pub struct SchemaLoader;

impl SchemaLoader {
    /// Loads a registry from a file or a directory of schema files.
    pub fn load(path: &Path) -> SchemaResult<SchemaRegistry> {
        if path.is_dir() {
            Self::load_dir(path)
        } else {
            Self::load_file(path)
        }
    }

    /// Loads a single-file registry.
    pub fn load_file(path: &Path) -> SchemaResult<SchemaRegistry> {
        let content = read(path)?;
        let file: RegistryFile = serde_json::from_str(&content).map_err(|e| {
            SchemaError::malformed(path.display().to_string(), format!("Invalid JSON: {}", e))
        })?;

        let mut registry = SchemaRegistry::new();
        for schema in file.collections {
            registry.register(schema)?;
        }
        Ok(registry)
    }

    /// Loads every `*.json` schema in a directory.
    ///
    /// Files are visited in name order so duplicate detection is
    /// deterministic.
    pub fn load_dir(dir: &Path) -> SchemaResult<SchemaRegistry> {
        let entries = fs::read_dir(dir).map_err(|e| {
            SchemaError::malformed(
                dir.display().to_string(),
                format!("Failed to read schema directory: {}", e),
            )
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::malformed(
                    dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut registry = SchemaRegistry::new();
        for path in paths {
            let content = read(&path)?;
            let schema: CollectionSchema = serde_json::from_str(&content).map_err(|e| {
                SchemaError::malformed(path.display().to_string(), format!("Invalid JSON: {}", e))
            })?;
            registry.register(schema)?;
        }
        Ok(registry)
    }

    /// Writes a registry as a single JSON file.
    pub fn save_file(registry: &SchemaRegistry, path: &Path) -> SchemaResult<()> {
        let file = RegistryFile {
            collections: registry.iter().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| {
            SchemaError::malformed(path.display().to_string(), e.to_string())
        })?;
        fs::write(path, json).map_err(|e| {
            SchemaError::malformed(
                path.display().to_string(),
                format!("Failed to write file: {}", e),
            )
        })
    }
}

fn read(path: &Path) -> SchemaResult<String> {
    fs::read_to_string(path).map_err(|e| {
        SchemaError::malformed(
            path.display().to_string(),
            format!("Failed to read file: {}", e),
        )
    })
}
