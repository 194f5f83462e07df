use crate::component::{ComponentRef, PropertyValue, ToolHandle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What role a component plays in the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    Service,
    EventAlgorithm,
    ConditionsAlgorithm,
    PublicTool,
    PrivateTool,
    Auditor,
}

impl ComponentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Service => "service",
            ComponentKind::EventAlgorithm => "event algorithm",
            ComponentKind::ConditionsAlgorithm => "conditions algorithm",
            ComponentKind::PublicTool => "public tool",
            ComponentKind::PrivateTool => "private tool",
            ComponentKind::Auditor => "auditor",
        }
    }

    pub fn is_tool(self) -> bool {
        matches!(self, ComponentKind::PublicTool | ComponentKind::PrivateTool)
    }

    pub fn is_algorithm(self) -> bool {
        matches!(
            self,
            ComponentKind::EventAlgorithm | ComponentKind::ConditionsAlgorithm
        )
    }

    /// Whether a spec declared as `self` may be re-tagged as `target`.
    ///
    /// Algorithms move freely between the event and conditions sections, tools
    /// between public registration and private designation.
    pub fn convertible_to(self, target: ComponentKind) -> bool {
        self == target
            || (self.is_algorithm() && target.is_algorithm())
            || (self.is_tool() && target.is_tool())
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of one configurable unit.
///
/// Identity within an accumulator section is the instance name; two specs
/// are duplicates only if kind, type, name and every property are equal.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpec {
    kind: ComponentKind,
    type_name: String,
    instance_name: String,
    properties: BTreeMap<String, PropertyValue>,
}

impl ComponentSpec {
    /// New spec whose instance name defaults to the type name.
    pub fn new(kind: ComponentKind, type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            kind,
            instance_name: type_name.clone(),
            type_name,
            properties: BTreeMap::new(),
        }
    }

    pub fn service(type_name: impl Into<String>) -> Self {
        Self::new(ComponentKind::Service, type_name)
    }

    pub fn event_algorithm(type_name: impl Into<String>) -> Self {
        Self::new(ComponentKind::EventAlgorithm, type_name)
    }

    pub fn conditions_algorithm(type_name: impl Into<String>) -> Self {
        Self::new(ComponentKind::ConditionsAlgorithm, type_name)
    }

    pub fn public_tool(type_name: impl Into<String>) -> Self {
        Self::new(ComponentKind::PublicTool, type_name)
    }

    pub fn private_tool(type_name: impl Into<String>) -> Self {
        Self::new(ComponentKind::PrivateTool, type_name)
    }

    pub fn auditor(type_name: impl Into<String>) -> Self {
        Self::new(ComponentKind::Auditor, type_name)
    }

    pub fn named(mut self, instance_name: impl Into<String>) -> Self {
        self.instance_name = instance_name.into();
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set (or overwrite) a property, returning the previous value.
    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Option<PropertyValue> {
        self.properties.insert(name.into(), value.into())
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }

    /// `Type/Name`, the address public handles use.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.type_name, self.instance_name)
    }

    pub fn to_ref(&self) -> ComponentRef {
        ComponentRef::new(self.type_name.clone(), self.instance_name.clone())
    }

    pub(crate) fn with_kind(mut self, kind: ComponentKind) -> Self {
        self.kind = kind;
        self
    }

    /// Visit every tool handle held directly by this spec's properties,
    /// including those inside lists. Does not descend into private tools.
    pub fn visit_tool_handles<'a>(&'a self, visit: &mut impl FnMut(&'a str, &'a ToolHandle)) {
        for (name, value) in &self.properties {
            value.visit_tool_handles(&mut |handle| visit(name.as_str(), handle));
        }
    }
}

impl fmt::Display for ComponentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_name, self.instance_name)?;
        if self.properties.is_empty() {
            return Ok(());
        }
        f.write_str(" {")?;
        for (i, (name, value)) in self.properties.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        f.write_str("}")
    }
}
