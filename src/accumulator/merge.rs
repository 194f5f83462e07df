//! Accumulator-to-accumulator merge.
//!
//! The merge is all-or-nothing: every incoming declaration is classified, the
//! merged sequence tree built aside and the ownership invariant checked
//! before anything moves, so a failure leaves both accumulators exactly as
//! they were.

use super::components::Admission;
use super::sequence::SequenceTree;
use super::{Accumulator, Section, ownership};
use crate::component::ComponentSpec;
use crate::error::{ConfigError, Result};

pub(crate) fn merge_into(
    target: &mut Accumulator,
    source: &mut Accumulator,
    sequence: &str,
) -> Result<()> {
    // Phase 1: classify incoming components, section by section. `true` means
    // "append", `false` means "collapses onto an identical declaration".
    let mut plans: Vec<Vec<bool>> = Vec::with_capacity(Section::ALL.len());
    for section in Section::ALL {
        let existing = target.table(section);
        let mut keep = Vec::with_capacity(source.table(section).len());
        for spec in source.table(section).as_slice() {
            keep.push(existing.admit(spec)? == Admission::New);
        }
        plans.push(keep);
    }

    // Phase 2: application properties follow the same equal-or-conflict rule.
    for (name, value) in &source.app_properties {
        if let Some(existing) = target.app_properties.get(name) {
            if existing != value {
                return Err(ConfigError::Conflict {
                    what: "application property".to_string(),
                    name: name.clone(),
                    existing: existing.to_string(),
                    incoming: value.to_string(),
                    differences: format!("{}: {} vs {}", name, existing, value),
                });
            }
        }
    }

    // Phase 3: sequences merge by name; source's top-level members land in
    // `sequence`. Modes must agree and no sequence may end up below itself.
    let sequences = target.sequences.merged(&source.sequences, sequence)?;

    // Phase 4: private tools must keep a single owner across the union.
    {
        let src: &Accumulator = source;
        let appended = Section::ALL
            .iter()
            .zip(&plans)
            .flat_map(|(section, keep)| appended_specs(src, *section, keep));
        let app_properties = target.app_properties.values().chain(
            src.app_properties
                .iter()
                .filter(|(name, _)| !target.app_properties.contains_key(*name))
                .map(|(_, value)| value),
        );
        ownership::check_exclusive(target.all_components().chain(appended), app_properties)?;
    }

    // Phase 5: apply. Nothing below can fail.
    let source_name = source.origin.clone().unwrap_or_else(|| "<unnamed>".to_string());
    let target_name = target.origin.clone().unwrap_or_else(|| "<unnamed>".to_string());
    for (section, keep) in Section::ALL.into_iter().zip(plans) {
        let incoming = source.table_mut(section).take_entries();
        if incoming.is_empty() {
            continue;
        }
        let mut appended = 0usize;
        let mut collapsed = 0usize;
        for (spec, append) in incoming.into_iter().zip(keep) {
            if append {
                target.table_mut(section).push_admitted(spec);
                appended += 1;
            } else {
                collapsed += 1;
            }
        }
        tracing::debug!(
            "merge {} into {}: {:?} {} appended, {} collapsed onto identical declarations",
            source_name,
            target_name,
            section,
            appended,
            collapsed
        );
    }
    for (name, value) in std::mem::take(&mut source.app_properties) {
        target.app_properties.entry(name).or_insert(value);
    }
    let declared = sequences.as_slice().len() - target.sequences.as_slice().len();
    if declared > 0 || !source.sequences.is_trivial() {
        tracing::debug!(
            "merge {} into {}: {} new sequence(s), top-level members placed in {}",
            source_name,
            target_name,
            declared,
            sequence
        );
    }
    target.sequences = sequences;
    source.sequences = SequenceTree::default();

    source.primary = None;
    source.sealed = true;
    Ok(())
}

fn appended_specs<'a>(
    source: &'a Accumulator,
    section: Section,
    keep: &'a [bool],
) -> impl Iterator<Item = &'a ComponentSpec> + 'a {
    source
        .table(section)
        .as_slice()
        .iter()
        .zip(keep)
        .filter(|(_, append)| **append)
        .map(|(spec, _)| spec)
}
