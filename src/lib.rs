//! Component accumulator: assemble a job configuration from independently
//! written configuration functions.
//!
//! Each configuration function returns an [`Accumulator`] holding the
//! services, algorithms and tools it needs. Callers merge those accumulators
//! into their own; equal re-declarations collapse, conflicting ones fail.
//! Event algorithms are arranged in a tree of named [`Sequence`]s.
//! The root accumulator is finally [`materialize`]d into a flat, validated
//! [`JobConfiguration`] that serializes to JSON.
//!
//! ```
//! use component_accumulator::{Accumulator, ComponentSpec, ToolHandle, materialize};
//!
//! fn tool_cfg() -> component_accumulator::Result<Accumulator> {
//!     let mut acc = Accumulator::new();
//!     acc.set_private_tools(ComponentSpec::private_tool("HelloTool").with_property("MyMessage", "hi"))?;
//!     Ok(acc)
//! }
//!
//! let mut root = Accumulator::new();
//! let tool = root.pop_tools_and_merge(&mut tool_cfg()?)?;
//! root.add_event_algo(ComponentSpec::event_algorithm("HelloAlg").with_property("Tool", ToolHandle::private(tool)))?;
//! let job = materialize(&mut root)?;
//! assert_eq!(job.event_algorithm_names(), ["HelloAlg"]);
//! # Ok::<(), component_accumulator::ConfigError>(())
//! ```

pub mod accumulator;
pub mod component;
pub mod diagnostics;
pub mod error;
pub mod flags;
pub mod job;

pub use accumulator::{
    Accumulator, Section, Selection, Sequence, SequenceMember, SequenceMode, TOP_SEQUENCE,
};
pub use component::{ComponentKind, ComponentRef, ComponentSpec, Ownership, PropertyValue, ToolHandle};
pub use error::{ConfigError, Result};
pub use flags::{ConfigFlags, FlagSource, FlagValue};
pub use job::{
    JobConfiguration, ResolvedComponent, ResolvedSequence, ResolvedValue, base_job, materialize,
};
