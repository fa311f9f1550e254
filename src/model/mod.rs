//! Model Module
//!
//! The in-memory shape of stored data.
//!
//! ## Types
//! - [`Value`]: one dynamically typed attribute value (scalars, lists, maps,
//!   nested objects)
//! - [`Attributes`]: attribute name → value map
//! - [`Object`]: type identifier + attributes, the unit a table stores
//! - [`Schema`]: ordered attribute names shared by a table's records
//! - [`Persist`]: maps a Rust type onto the above

mod object;
mod persist;
mod schema;
mod value;

pub use object::{Attributes, Object};
pub use persist::Persist;
pub use schema::Schema;
pub use value::Value;
