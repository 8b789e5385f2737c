//! Schema Registry
//!
//! Static mapping from collection name to the fields an untrusted plan
//! may touch. Every plan's collection must resolve here or execution
//! fails closed before the store is reached.
//!
//! # Design Principles
//!
//! - Names are normalized (case, whitespace and separators ignored)
//! - Aliases resolve before allow-listing
//! - Registered schemas are immutable

mod errors;
mod loader;
mod registry;
mod types;

pub use errors::{SchemaError, SchemaResult};
pub use loader::{RegistryFile, SchemaLoader};
pub use registry::{normalize, SchemaRegistry};
pub use types::{CollectionSchema, WriteKind, ID_FIELD};
