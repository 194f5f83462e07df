//! Tool handles: how one component refers to a tool.
//!
//! A private handle embeds its tool and is owned by exactly one parent. Its
//! identity is the embedded object (`Rc` pointer), so cloning a handle yields
//! the same tool while re-declaring an equal spec yields a different one.
//! A public handle is only an address (`Type/Name`) resolved against the
//! job's public tools at materialization.

use crate::component::{ComponentKind, ComponentSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Private,
    Public,
}

/// `Type/Name` address of a component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentRef {
    pub type_name: String,
    pub instance_name: String,
}

impl ComponentRef {
    pub fn new(type_name: impl Into<String>, instance_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            instance_name: instance_name.into(),
        }
    }

    /// Parse `Type/Name`; a bare `Type` names the default instance.
    pub fn parse(full_name: &str) -> Option<Self> {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return None;
        }
        match full_name.split_once('/') {
            Some((ty, name)) if !ty.is_empty() && !name.is_empty() => Some(Self::new(ty, name)),
            Some(_) => None,
            None => Some(Self::new(full_name, full_name)),
        }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_name, self.instance_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolHandle {
    Private(Rc<ComponentSpec>),
    Public(ComponentRef),
}

impl ToolHandle {
    /// Embed `spec` as a private tool; the spec is re-tagged accordingly.
    pub fn private(spec: ComponentSpec) -> Self {
        ToolHandle::Private(Rc::new(spec.with_kind(ComponentKind::PrivateTool)))
    }

    pub fn public(type_name: impl Into<String>, instance_name: impl Into<String>) -> Self {
        ToolHandle::Public(ComponentRef::new(type_name, instance_name))
    }

    pub fn ownership(&self) -> Ownership {
        match self {
            ToolHandle::Private(_) => Ownership::Private,
            ToolHandle::Public(_) => Ownership::Public,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            ToolHandle::Private(spec) => spec.type_name(),
            ToolHandle::Public(r) => &r.type_name,
        }
    }

    pub fn instance_name(&self) -> &str {
        match self {
            ToolHandle::Private(spec) => spec.instance_name(),
            ToolHandle::Public(r) => &r.instance_name,
        }
    }

    /// The embedded spec of a private handle.
    pub fn target(&self) -> Option<&ComponentSpec> {
        match self {
            ToolHandle::Private(spec) => Some(spec),
            ToolHandle::Public(_) => None,
        }
    }

    /// True if both handles designate the same tool object (private) or the
    /// same address (public).
    pub fn same_target(&self, other: &ToolHandle) -> bool {
        match (self, other) {
            (ToolHandle::Private(a), ToolHandle::Private(b)) => Rc::ptr_eq(a, b),
            (ToolHandle::Public(a), ToolHandle::Public(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ToolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolHandle::Private(spec) => write!(f, "private({})", spec),
            ToolHandle::Public(r) => write!(f, "public({})", r),
        }
    }
}
