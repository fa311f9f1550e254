//! # AutoDB
//!
//! An embedded object store with:
//! - One table file per stored type, self-describing (type id + schema)
//! - Append-only, checksummed frames with crash recovery on load
//! - Logical deletion via tombstones, stable never-reused slot indexes
//! - Attribute equality filters for retrieval and deletion
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Database                             │
//! │          (type id → table, startup discovery)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   PersistentTable                           │
//! │     (records, valid-index set, insert/retrieve/delete)      │
//! └──────────┬───────────────────────────────┬──────────────────┘
//!            │                               │
//!            ▼                               ▼
//!   ┌─────────────────┐            ┌──────────────────┐
//!   │      Codec      │            │  Writer/Recovery │
//!   │ (object ⇄ bytes)│            │  (table file)    │
//!   └─────────────────┘            └──────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use autodb::{Attributes, Database, Filter, Object};
//!
//! # fn main() -> autodb::Result<()> {
//! let mut db = Database::open_path(std::path::Path::new("./data"))?;
//! db.insert_object(&Object::new("Point", Attributes::new().with("x", 1).with("y", 2)))?;
//!
//! let points = db.retrieve_objects("Point", &Filter::new().eq("x", 1))?;
//! assert_eq!(points.len(), 1);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod model;
pub mod codec;
pub mod table;
pub mod database;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{AutoDbError, Result};
pub use config::{Config, SyncStrategy, TableOptions};
pub use model::{Attributes, Object, Persist, Schema, Value};
pub use table::{Filter, PersistentTable};
pub use database::{Database, LoadFailure};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AutoDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
