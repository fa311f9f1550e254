//! The `Persist` trait
//!
//! Maps a Rust type to a stable type identifier and attribute schema. The
//! identifier is written into the table file header, so a fresh process can
//! route a file back to its type without relying on the file name.

use crate::error::{AutoDbError, Result};

use super::{Attributes, Object, Schema};

/// A Rust type that can be stored in an AutoDB table
///
/// ```
/// use autodb::{Attributes, Persist, Result};
///
/// #[derive(Debug, PartialEq)]
/// struct Point {
///     x: i64,
///     y: i64,
/// }
///
/// impl Persist for Point {
///     const TYPE_ID: &'static str = "Point";
///     const ATTRIBUTES: &'static [&'static str] = &["x", "y"];
///
///     fn to_attributes(&self) -> Attributes {
///         Attributes::new().with("x", self.x).with("y", self.y)
///     }
///
///     fn from_attributes(mut attrs: Attributes) -> Result<Self> {
///         Ok(Point { x: attrs.take("x")?, y: attrs.take("y")? })
///     }
/// }
///
/// let p = Point { x: 1, y: 2 };
/// assert_eq!(Point::from_object(p.to_object()).unwrap(), p);
/// ```
pub trait Persist: Sized {
    /// Stable identifier; changing it orphans existing table files
    const TYPE_ID: &'static str;

    /// Attribute names in encoding order
    const ATTRIBUTES: &'static [&'static str];

    fn to_attributes(&self) -> Attributes;

    fn from_attributes(attributes: Attributes) -> Result<Self>;

    fn schema() -> Result<Schema> {
        Schema::new(Self::ATTRIBUTES.iter().copied())
    }

    fn to_object(&self) -> Object {
        Object::new(Self::TYPE_ID, self.to_attributes())
    }

    fn from_object(object: Object) -> Result<Self> {
        if object.type_id() != Self::TYPE_ID {
            return Err(AutoDbError::SchemaMismatch(format!(
                "expected type '{}', got '{}'",
                Self::TYPE_ID,
                object.type_id()
            )));
        }
        Self::from_attributes(object.into_attributes())
    }
}
