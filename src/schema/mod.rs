pub mod node;
pub mod validate;

pub use node::{SchemaNode, SchemaType};
pub use validate::{ArgumentValidator, Violation, ViolationReason};
