//! Ordered, name-indexed component tables, one per accumulator section.

use crate::component::{ComponentKind, ComponentSpec};
use crate::diagnostics;
use crate::error::{ConfigError, Result};
use std::collections::HashMap;

/// The accumulator sections, in initialization order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Services,
    EventAlgorithms,
    ConditionsAlgorithms,
    PublicTools,
    Auditors,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Services,
        Section::EventAlgorithms,
        Section::ConditionsAlgorithms,
        Section::PublicTools,
        Section::Auditors,
    ];

    /// Kind stamped on every spec stored in this section.
    pub fn kind(self) -> ComponentKind {
        match self {
            Section::Services => ComponentKind::Service,
            Section::EventAlgorithms => ComponentKind::EventAlgorithm,
            Section::ConditionsAlgorithms => ComponentKind::ConditionsAlgorithm,
            Section::PublicTools => ComponentKind::PublicTool,
            Section::Auditors => ComponentKind::Auditor,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Section::Services => 0,
            Section::EventAlgorithms => 1,
            Section::ConditionsAlgorithms => 2,
            Section::PublicTools => 3,
            Section::Auditors => 4,
        }
    }
}

/// Outcome of offering a spec to a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// No component with this name yet.
    New,
    /// An identical declaration is already present.
    Duplicate,
}

#[derive(Debug, Default)]
pub(crate) struct ComponentTable {
    entries: Vec<ComponentSpec>,
    index: HashMap<String, usize>,
}

impl ComponentTable {
    /// Decide whether `spec` can join this table, without mutating it.
    pub(crate) fn admit(&self, spec: &ComponentSpec) -> Result<Admission> {
        let Some(&pos) = self.index.get(spec.instance_name()) else {
            return Ok(Admission::New);
        };
        let existing = &self.entries[pos];
        if existing == spec {
            return Ok(Admission::Duplicate);
        }
        Err(ConfigError::Conflict {
            what: spec.kind().to_string(),
            name: spec.instance_name().to_string(),
            existing: existing.to_string(),
            incoming: spec.to_string(),
            differences: diagnostics::property_diff(existing, spec),
        })
    }

    /// Append a spec that `admit` classified as new.
    pub(crate) fn push_admitted(&mut self, spec: ComponentSpec) {
        self.index
            .insert(spec.instance_name().to_string(), self.entries.len());
        self.entries.push(spec);
    }

    pub(crate) fn get(&self, name: &str) -> Option<&ComponentSpec> {
        self.index.get(name).map(|&pos| &self.entries[pos])
    }

    /// Mutable access for property tweaks. Instance names cannot change
    /// through `ComponentSpec`'s API, so the index stays valid.
    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut ComponentSpec> {
        match self.index.get(name) {
            Some(&pos) => self.entries.get_mut(pos),
            None => None,
        }
    }

    pub(crate) fn as_slice(&self) -> &[ComponentSpec] {
        &self.entries
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ComponentSpec> {
        self.entries.iter_mut()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move all entries out, leaving the table empty.
    pub(crate) fn take_entries(&mut self) -> Vec<ComponentSpec> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }
}
