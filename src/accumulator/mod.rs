//! The accumulator: a scoped, single-use builder for one slice of a job.
//!
//! A configuration function creates an `Accumulator`, declares components on
//! it, merges in the accumulators returned by the functions it calls, and
//! returns it. Its caller consumes it with exactly one `merge` (or one of the
//! `*_and_merge` helpers), after which it is sealed: every further operation
//! fails with `AlreadyMerged`.
//!
//! Each section (services, event algorithms, conditions algorithms, public
//! tools, auditors) is an ordered table indexed by instance name. Adding a
//! component whose name is taken is a no-op if the declarations are equal and
//! a `Conflict` otherwise. Event algorithms are also members of the sequence
//! tree rooted at [`TOP_SEQUENCE`].

mod components;
mod merge;
mod ownership;
mod select;
mod sequence;

pub use components::Section;
pub use select::Selection;
pub use sequence::{SEQUENCER_TYPE, Sequence, SequenceMember, SequenceMode, TOP_SEQUENCE};
pub(crate) use sequence::check_acyclic;

use crate::component::{ComponentKind, ComponentRef, ComponentSpec, PropertyValue, ToolHandle};
use crate::diagnostics;
use crate::error::{ConfigError, Result};
use components::{Admission, ComponentTable};
use sequence::SequenceTree;
use std::collections::BTreeMap;
use std::iter;

/// Where an accumulator's primary component lives.
#[derive(Debug, Clone)]
enum Primary {
    /// A component registered in one of the tables, by instance name.
    Registered { section: Section, name: String },
    /// A private tool waiting to be popped by the consumer.
    Private(ComponentSpec),
}

#[derive(Debug, Default)]
pub struct Accumulator {
    tables: [ComponentTable; 5],
    sequences: SequenceTree,
    app_properties: BTreeMap<String, PropertyValue>,
    primary: Option<Primary>,
    sealed: bool,
    acknowledged: bool,
    origin: Option<String>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulator labelled with the configuration function that built it;
    /// the label shows up in errors and leak diagnostics.
    pub fn with_origin(origin: impl Into<String>) -> Self {
        let mut acc = Self::default();
        acc.origin = Some(origin.into());
        acc
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn add_service(&mut self, spec: ComponentSpec) -> Result<()> {
        self.add_to(Section::Services, spec).map(|_| ())
    }

    pub fn add_primary_service(&mut self, spec: ComponentSpec) -> Result<()> {
        self.add_primary(Section::Services, spec).map(|_| ())
    }

    /// Add an event algorithm to the top sequence.
    pub fn add_event_algo(&mut self, spec: ComponentSpec) -> Result<()> {
        self.add_event_algo_to(spec, TOP_SEQUENCE)
    }

    /// Add an event algorithm to the named sequence. An algorithm already
    /// registered (possibly in another sequence) gains one more parent.
    pub fn add_event_algo_to(&mut self, spec: ComponentSpec, sequence: &str) -> Result<()> {
        self.ensure_open()?;
        self.sequences.ensure_exists(sequence)?;
        let r = self.add_to(Section::EventAlgorithms, spec)?;
        self.sequences.add_algorithm(sequence, &r.instance_name)
    }

    pub fn add_primary_event_algo(&mut self, spec: ComponentSpec) -> Result<()> {
        let r = self.add_primary(Section::EventAlgorithms, spec)?;
        self.sequences.add_algorithm(TOP_SEQUENCE, &r.instance_name)
    }

    /// Add several event algorithms to the top sequence, keeping their order.
    pub fn add_event_algos(&mut self, specs: impl IntoIterator<Item = ComponentSpec>) -> Result<()> {
        self.add_event_algos_to(specs, TOP_SEQUENCE)
    }

    pub fn add_event_algos_to(
        &mut self,
        specs: impl IntoIterator<Item = ComponentSpec>,
        sequence: &str,
    ) -> Result<()> {
        for spec in specs {
            self.add_event_algo_to(spec, sequence)?;
        }
        Ok(())
    }

    /// Declare a sequence directly below the top sequence.
    pub fn add_sequence(&mut self, sequence: Sequence) -> Result<()> {
        self.add_sequence_to(sequence, TOP_SEQUENCE)
    }

    /// Declare a sequence below `parent`. Re-declaring an existing sequence
    /// with the same mode gives it another parent; nesting a sequence below
    /// itself fails with `SequenceCycle`.
    pub fn add_sequence_to(&mut self, sequence: Sequence, parent: &str) -> Result<()> {
        self.ensure_open()?;
        self.sequences.add_sequence(sequence, parent)
    }

    pub fn add_cond_algo(&mut self, spec: ComponentSpec) -> Result<()> {
        self.add_to(Section::ConditionsAlgorithms, spec).map(|_| ())
    }

    pub fn add_primary_cond_algo(&mut self, spec: ComponentSpec) -> Result<()> {
        self.add_primary(Section::ConditionsAlgorithms, spec)
            .map(|_| ())
    }

    /// Register a shared tool and return the public handle parents use to
    /// refer to it.
    pub fn add_public_tool(&mut self, spec: ComponentSpec) -> Result<ToolHandle> {
        let r = self.add_to(Section::PublicTools, spec)?;
        Ok(ToolHandle::public(r.type_name, r.instance_name))
    }

    pub fn add_primary_public_tool(&mut self, spec: ComponentSpec) -> Result<ToolHandle> {
        let r = self.add_primary(Section::PublicTools, spec)?;
        Ok(ToolHandle::public(r.type_name, r.instance_name))
    }

    pub fn add_auditor(&mut self, spec: ComponentSpec) -> Result<()> {
        self.add_to(Section::Auditors, spec).map(|_| ())
    }

    /// Application-level property (thread count, event count, ...). The value
    /// is passed through to the job untouched.
    pub fn set_app_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<()> {
        self.ensure_open()?;
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.app_properties.get(&name) {
            if existing != &value {
                return Err(ConfigError::Conflict {
                    what: "application property".to_string(),
                    name: name.clone(),
                    existing: existing.to_string(),
                    incoming: value.to_string(),
                    differences: format!("{}: {} vs {}", name, existing, value),
                });
            }
            return Ok(());
        }
        ownership::check_exclusive(
            self.all_components(),
            self.app_properties.values().chain(iter::once(&value)),
        )?;
        self.app_properties.insert(name, value);
        Ok(())
    }

    /// Designate `spec` as this accumulator's private tool. The consumer takes
    /// it with `pop_tools_and_merge` and attaches it under a parent of its own.
    pub fn set_private_tools(&mut self, spec: ComponentSpec) -> Result<()> {
        self.ensure_open()?;
        let spec = stamp(ComponentKind::PrivateTool, spec)?;
        self.ensure_no_primary(&spec)?;
        self.primary = Some(Primary::Private(spec));
        Ok(())
    }

    /// Take back the private tool set with `set_private_tools`.
    pub fn pop_private_tools(&mut self) -> Result<ComponentSpec> {
        self.ensure_open()?;
        match self.primary.take() {
            Some(Primary::Private(spec)) => Ok(spec),
            other => {
                self.primary = other;
                Err(ConfigError::NoPrimary {
                    origin: self.origin.clone(),
                })
            }
        }
    }

    /// Merge `other` into `self` and seal `other`.
    ///
    /// Fails without touching either side if any declaration conflicts, if
    /// private tools would end up with two owners, or if `other` still holds
    /// a private tool nobody popped. `other`'s top-level sequence members
    /// join the top sequence.
    pub fn merge(&mut self, other: &mut Accumulator) -> Result<()> {
        self.merge_into_sequence(other, TOP_SEQUENCE)
    }

    /// Like `merge`, but `other`'s top-level algorithms and sequences are
    /// placed below the named sequence of `self`.
    pub fn merge_into_sequence(&mut self, other: &mut Accumulator, sequence: &str) -> Result<()> {
        self.ensure_open()?;
        other.ensure_open()?;
        if let Some(Primary::Private(tool)) = &other.primary {
            return Err(ConfigError::UnconsumedPrivateTool {
                tool: tool.full_name(),
                origin: other.origin.clone(),
            });
        }
        merge::merge_into(self, other, sequence)
    }

    /// Merge `other` and return its private tool, ready to be attached under
    /// a new parent.
    pub fn pop_tools_and_merge(&mut self, other: &mut Accumulator) -> Result<ComponentSpec> {
        self.take_primary_and_merge(other)
    }

    /// Merge `other` and return its primary component (typically a service
    /// whose name the caller wires into a property).
    pub fn get_primary_and_merge(&mut self, other: &mut Accumulator) -> Result<ComponentSpec> {
        self.take_primary_and_merge(other)
    }

    fn take_primary_and_merge(&mut self, other: &mut Accumulator) -> Result<ComponentSpec> {
        self.ensure_open()?;
        other.ensure_open()?;
        let Some(primary) = other.primary.take() else {
            return Err(ConfigError::NoPrimary {
                origin: other.origin.clone(),
            });
        };
        if let Err(e) = merge::merge_into(self, other, TOP_SEQUENCE) {
            other.primary = Some(primary);
            return Err(e);
        }
        match primary {
            Primary::Private(spec) => Ok(spec),
            Primary::Registered { section, name } => self.lookup(section, &name).cloned(),
        }
    }

    /// True once this accumulator has been consumed by a merge or turned
    /// into a job.
    pub fn is_merged(&self) -> bool {
        self.sealed
    }

    /// Acknowledge that this accumulator is intentionally not merged. This
    /// only silences the leak diagnostic; the accumulator stays usable.
    pub fn discard(&mut self) {
        self.acknowledged = true;
    }

    pub fn is_discarded(&self) -> bool {
        self.acknowledged
    }

    pub fn primary(&self) -> Option<&ComponentSpec> {
        match self.primary.as_ref()? {
            Primary::Private(spec) => Some(spec),
            Primary::Registered { section, name } => self.table(*section).get(name),
        }
    }

    pub fn get_service(&self, name: &str) -> Result<&ComponentSpec> {
        self.lookup(Section::Services, name)
    }

    pub fn get_service_mut(&mut self, name: &str) -> Result<&mut ComponentSpec> {
        self.lookup_mut(Section::Services, name)
    }

    pub fn get_event_algo(&self, name: &str) -> Result<&ComponentSpec> {
        self.lookup(Section::EventAlgorithms, name)
    }

    pub fn get_event_algo_mut(&mut self, name: &str) -> Result<&mut ComponentSpec> {
        self.lookup_mut(Section::EventAlgorithms, name)
    }

    pub fn get_cond_algo(&self, name: &str) -> Result<&ComponentSpec> {
        self.lookup(Section::ConditionsAlgorithms, name)
    }

    pub fn get_cond_algo_mut(&mut self, name: &str) -> Result<&mut ComponentSpec> {
        self.lookup_mut(Section::ConditionsAlgorithms, name)
    }

    pub fn get_public_tool(&self, name: &str) -> Result<&ComponentSpec> {
        self.lookup(Section::PublicTools, name)
    }

    pub fn get_public_tool_mut(&mut self, name: &str) -> Result<&mut ComponentSpec> {
        self.lookup_mut(Section::PublicTools, name)
    }

    pub fn get_auditor(&self, name: &str) -> Result<&ComponentSpec> {
        self.lookup(Section::Auditors, name)
    }

    /// The only event algorithm; `Ambiguous` when there are several.
    pub fn single_event_algo(&self) -> Result<&ComponentSpec> {
        self.single(Section::EventAlgorithms)
    }

    /// The only public tool; `Ambiguous` when there are several.
    pub fn single_public_tool(&self) -> Result<&ComponentSpec> {
        self.single(Section::PublicTools)
    }

    pub fn services(&self) -> &[ComponentSpec] {
        self.table(Section::Services).as_slice()
    }

    pub fn event_algos(&self) -> &[ComponentSpec] {
        self.table(Section::EventAlgorithms).as_slice()
    }

    pub fn cond_algos(&self) -> &[ComponentSpec] {
        self.table(Section::ConditionsAlgorithms).as_slice()
    }

    pub fn public_tools(&self) -> &[ComponentSpec] {
        self.table(Section::PublicTools).as_slice()
    }

    pub fn auditors(&self) -> &[ComponentSpec] {
        self.table(Section::Auditors).as_slice()
    }

    pub fn components(&self, section: Section) -> &[ComponentSpec] {
        self.table(section).as_slice()
    }

    pub fn get_sequence(&self, name: &str) -> Result<&Sequence> {
        self.ensure_open()?;
        self.sequences
            .get(name)
            .ok_or_else(|| ConfigError::SequenceNotFound(name.to_string()))
    }

    /// All sequences, the top sequence first, then in declaration order.
    pub fn sequences(&self) -> &[Sequence] {
        self.sequences.as_slice()
    }

    /// Names of the event algorithms that run somewhere below `sequence`,
    /// depth first, each listed once.
    pub fn algorithms_in_sequence(&self, sequence: &str) -> Result<Vec<&str>> {
        self.ensure_open()?;
        self.sequences.algorithms_below(sequence)
    }

    pub fn app_properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.app_properties
    }

    pub fn is_empty(&self) -> bool {
        self.tables.iter().all(ComponentTable::is_empty)
            && self.app_properties.is_empty()
            && self.primary.is_none()
            && self.sequences.is_trivial()
    }

    pub fn component_count(&self) -> usize {
        self.tables.iter().map(ComponentTable::len).sum()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.sealed {
            return Err(ConfigError::AlreadyMerged {
                origin: self.origin.clone(),
            });
        }
        Ok(())
    }

    fn ensure_no_primary(&self, incoming: &ComponentSpec) -> Result<()> {
        match self.primary() {
            Some(existing) => Err(ConfigError::PrimaryAlreadySet {
                existing: existing.full_name(),
                incoming: incoming.full_name(),
            }),
            None => Ok(()),
        }
    }

    fn table(&self, section: Section) -> &ComponentTable {
        &self.tables[section.index()]
    }

    fn table_mut(&mut self, section: Section) -> &mut ComponentTable {
        &mut self.tables[section.index()]
    }

    pub(crate) fn all_components(&self) -> impl Iterator<Item = &ComponentSpec> {
        self.tables.iter().flat_map(|t| t.as_slice().iter())
    }

    /// The pending private tool, if the consumer never popped it.
    pub(crate) fn pending_private_tool(&self) -> Option<&ComponentSpec> {
        match &self.primary {
            Some(Primary::Private(spec)) => Some(spec),
            _ => None,
        }
    }

    pub(crate) fn check_open(&self) -> Result<()> {
        self.ensure_open()
    }

    pub(crate) fn check_ownership(&self) -> Result<()> {
        ownership::check_exclusive(self.all_components(), self.app_properties.values())
    }

    /// The root has been turned into a job: it is sealed like a merged
    /// accumulator and no longer counts as leaked.
    pub(crate) fn mark_materialized(&mut self) {
        self.sealed = true;
        self.acknowledged = true;
    }

    fn add_to(&mut self, section: Section, spec: ComponentSpec) -> Result<ComponentRef> {
        self.ensure_open()?;
        let spec = stamp(section.kind(), spec)?;
        let r = spec.to_ref();
        match self.table(section).admit(&spec)? {
            Admission::Duplicate => {
                tracing::debug!(
                    "{} {} already declared with identical content",
                    section.kind(),
                    r
                );
            }
            Admission::New => {
                ownership::check_exclusive(
                    self.all_components().chain(iter::once(&spec)),
                    self.app_properties.values(),
                )?;
                self.table_mut(section).push_admitted(spec);
            }
        }
        Ok(r)
    }

    fn add_primary(&mut self, section: Section, spec: ComponentSpec) -> Result<ComponentRef> {
        self.ensure_open()?;
        self.ensure_no_primary(&spec)?;
        let r = self.add_to(section, spec)?;
        self.primary = Some(Primary::Registered {
            section,
            name: r.instance_name.clone(),
        });
        Ok(r)
    }

    fn lookup(&self, section: Section, name: &str) -> Result<&ComponentSpec> {
        self.ensure_open()?;
        self.table(section)
            .get(name)
            .ok_or_else(|| ConfigError::NotFound {
                kind: section.kind(),
                name: name.to_string(),
            })
    }

    fn lookup_mut(&mut self, section: Section, name: &str) -> Result<&mut ComponentSpec> {
        self.ensure_open()?;
        self.table_mut(section)
            .get_mut(name)
            .ok_or_else(|| ConfigError::NotFound {
                kind: section.kind(),
                name: name.to_string(),
            })
    }

    fn single(&self, section: Section) -> Result<&ComponentSpec> {
        self.ensure_open()?;
        match self.table(section).as_slice() {
            [only] => Ok(only),
            [] => Err(ConfigError::NotFound {
                kind: section.kind(),
                name: "<any>".to_string(),
            }),
            many => Err(ConfigError::Ambiguous {
                kind: section.kind(),
                count: many.len(),
            }),
        }
    }
}

impl Drop for Accumulator {
    fn drop(&mut self) {
        if self.sealed || self.acknowledged || self.is_empty() {
            return;
        }
        let origin = self.origin.as_deref().unwrap_or("<unnamed>");
        tracing::error!(
            "accumulator {} was never merged; {} component(s) dropped",
            origin,
            self.component_count()
        );
        if let Some(tool) = self.pending_private_tool() {
            diagnostics::warn(format!(
                "private tool {} of accumulator {} was never popped",
                tool.full_name(),
                origin
            ));
        }
    }
}

/// Re-tag `spec` for the section it is being added to.
fn stamp(kind: ComponentKind, spec: ComponentSpec) -> Result<ComponentSpec> {
    if !spec.kind().convertible_to(kind) {
        return Err(ConfigError::KindMismatch {
            component: spec.full_name(),
            expected: kind,
            found: spec.kind(),
        });
    }
    Ok(spec.with_kind(kind))
}
