//! Error taxonomy for configuration assembly.
//!
//! Every variant is fatal for the assembly phase: callers propagate with `?`
//! and nothing is partially applied.

use crate::component::ComponentKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Two non-equal declarations collide on identity.
    #[error(
        "conflicting {what} declarations of '{name}'\n  existing: {existing}\n  incoming: {incoming}\n  differences: {differences}"
    )]
    Conflict {
        what: String,
        name: String,
        existing: String,
        incoming: String,
        differences: String,
    },

    /// The same private tool object is reachable from two parents.
    #[error("private tool {tool} is owned by both {first_owner} and {second_owner}")]
    OwnershipConflict {
        tool: String,
        first_owner: String,
        second_owner: String,
    },

    /// The accumulator was consumed by a merge or by materialization.
    #[error("accumulator{} was already consumed by a merge or materialization", origin_suffix(.origin))]
    AlreadyMerged { origin: Option<String> },

    #[error("accumulator{} has no primary component", origin_suffix(.origin))]
    NoPrimary { origin: Option<String> },

    #[error("primary component already set to {existing}, cannot designate {incoming}")]
    PrimaryAlreadySet { existing: String, incoming: String },

    #[error("no {kind} named '{name}'")]
    NotFound { kind: ComponentKind, name: String },

    #[error("expected exactly one {kind}, found {count}")]
    Ambiguous { kind: ComponentKind, count: usize },

    #[error("{component} is a {found} and cannot be added as a {expected}")]
    KindMismatch {
        component: String,
        expected: ComponentKind,
        found: ComponentKind,
    },

    /// A private primary would be lost by a bare merge or at materialization.
    #[error("private tool {tool} was never popped from its accumulator{}", origin_suffix(.origin))]
    UnconsumedPrivateTool { tool: String, origin: Option<String> },

    #[error("public tool {tool} referenced by {referenced_by} is not declared")]
    UnresolvedPublicTool { tool: String, referenced_by: String },

    #[error("property {component}.{property} holds a non-finite float")]
    NonFiniteFloat { component: String, property: String },

    #[error("{kind} instance name '{name}' appears more than once in the job")]
    DuplicateInstance { kind: ComponentKind, name: String },

    #[error("no sequence named '{0}'")]
    SequenceNotFound(String),

    #[error("sequence '{0}' is declared more than once in the job")]
    DuplicateSequence(String),

    /// A sequence would end up nested below itself.
    #[error("sequence nesting cycle: {0}")]
    SequenceCycle(String),

    #[error("no flag named '{0}'")]
    UnknownFlag(String),

    #[error("flag '{0}' is already defined")]
    DuplicateFlag(String),

    #[error("attempt to modify locked flag container (flag '{0}')")]
    FlagsLocked(String),

    #[error("flag '{name}' holds a {expected} value, got {found}")]
    FlagType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("cannot interpret flag assignment '{0}', expected Name=value")]
    InvalidFlagAssignment(String),

    #[error("unsupported job configuration format version {found} (expected {expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    #[error("invalid component pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn origin_suffix(origin: &Option<String>) -> String {
    match origin {
        Some(o) => format!(" '{}'", o),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
