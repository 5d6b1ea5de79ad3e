//! Core types and service wiring for the kubel address import engine.

/// Splitting of free-text addresses.
pub mod address;
/// TOML configuration.
pub mod config;
/// Manual correction of rejected rows.
pub mod correction;
/// Advisory duplicate detection.
pub mod duplicates;
/// Location and entry identity keys.
pub mod keys;
/// Domain models and identifiers shared by all sources.
pub mod model;
/// Registry for plugging per-source reducers into the service.
pub mod plugin;
/// Traits describing the store and reducer interfaces.
pub mod ports;
/// Diffing of entries against the store.
pub mod reconcile;
/// High-level import service used by clients.
pub mod service;
/// In-memory and JSON snapshot address stores.
pub mod store;
/// Byte decoding and row tokenizing.
pub mod text;
/// Waste-type classification.
pub mod waste;

pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
