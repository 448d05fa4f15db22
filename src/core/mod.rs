// src/core/mod.rs

// The `core` module holds everything except the command line front end.

/// Entity, relation and discovery types shared by every stage,
/// such as `Entity`, `Relation`, `Fqdn` and `FieldKind`.
pub mod models;

/// Error enums for decoding, entity validation, extension parsing,
/// input loading and whole-chain projection.
pub mod errors;

/// Decoding, field extraction, entity mapping and the projection walk.
pub mod chain;

/// The `GraphStore` adapter trait and the in-memory `MemoryStore`.
pub mod store;

/// Loads certificate chains from files.
pub mod source;

#[cfg(test)]
pub mod testing;
