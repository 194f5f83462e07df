//! Component layer: declarations, property values and tool handles.
//!
//! Nothing here knows about accumulators; these are the leaf types the
//! accumulator collects and the materializer resolves.

pub mod handle;
pub mod spec;
pub mod value;

pub use handle::{ComponentRef, Ownership, ToolHandle};
pub use spec::{ComponentKind, ComponentSpec};
pub use value::PropertyValue;
