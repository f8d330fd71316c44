//! # Trellis Core
//!
//! Core library for the Trellis network inventory: discovery adapters,
//! the ingestion pipeline that reconciles their output, the inventory
//! store abstraction, and topology synthesis.
//!
//! ## Architecture
//!
//! - [`adapters`]: the scan and SNMP poll adapters (plus the traits the
//!   pipeline consumes them through)
//! - [`ingest`]: reconciliation of raw host facts into inventory records
//! - [`inventory`]: the store port with Postgres and in-memory backends
//! - [`topology`]: pure snapshot-to-graph synthesis
//!
//! Data flows adapter → pipeline → store; topology reads are on-demand
//! snapshots and the pipeline signals a [`ingest::ChangeListener`] after
//! each batch that changed anything.

pub mod adapters;
pub mod error;
pub mod ingest;
pub mod inventory;
pub mod topology;

pub use error::{InventoryError, Result};
pub use ingest::{
    ChangeListener, ChangeNotifier, IngestionPipeline, SnmpPollOutcome,
};
pub use inventory::Inventory;
pub use inventory::memory::MemoryInventory;
pub use inventory::postgres::PostgresInventory;
pub use topology::build_topology;
