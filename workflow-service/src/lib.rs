//! workflow-service: the sales-document workflow engine.
//!
//! Owns the Quote → Order → Invoice → DeliveryNote lifecycle: per-type
//! CRUD with deterministic monetary totals, collision-safe document
//! numbering, tenant/company scoping, document conversions with recorded
//! provenance edges, and chain resolution.
//!
//! The engine is procedural: it consumes a persistence interface
//! ([`store::DocumentStore`]) and a cache interface
//! (`service_core::cache::Cache`) and returns tagged results. HTTP
//! routing, authentication, and the relational schema live upstream.

pub mod config;
pub mod models;
pub mod services;
pub mod store;
