pub mod catalog;
pub mod dispatch;
pub mod handlers;
pub mod registry;

pub use catalog::{builtin_catalog, ToolCatalog};
pub use dispatch::{DispatchTable, Resolved, ToolBinding, ToolHandler};
pub use registry::{SchemaRegistry, ToolDescriptor};
