//! Accumulator → JobConfiguration.

use super::{FORMAT_VERSION, JobConfiguration, ResolvedComponent, ResolvedSequence, ResolvedValue};
use crate::accumulator::{Accumulator, Section};
use crate::component::{ComponentSpec, PropertyValue, ToolHandle};
use crate::error::{ConfigError, Result};
use std::collections::{BTreeMap, HashMap};

/// Turn the root accumulator into a job.
///
/// The root must be open and must not hold an unpopped private tool. On
/// success it is sealed like a merged accumulator: it can be neither merged
/// nor materialized again, and it no longer triggers the leak diagnostic.
pub fn materialize(acc: &mut Accumulator) -> Result<JobConfiguration> {
    // Phase 1: the root must be usable as a whole.
    acc.check_open()?;
    if let Some(tool) = acc.pending_private_tool() {
        return Err(ConfigError::UnconsumedPrivateTool {
            tool: tool.full_name(),
            origin: acc.origin().map(str::to_string),
        });
    }
    acc.check_ownership()?;

    // Phase 2: resolve every section in stored order.
    let job = {
        let m = Materializer::new(acc);
        JobConfiguration {
            format_version: FORMAT_VERSION,
            app_properties: m.resolve_properties(super::APPLICATION_MANAGER, acc.app_properties())?,
            services: m.resolve_section(Section::Services)?,
            event_algorithms: m.resolve_section(Section::EventAlgorithms)?,
            conditions_algorithms: m.resolve_section(Section::ConditionsAlgorithms)?,
            public_tools: m.resolve_section(Section::PublicTools)?,
            auditors: m.resolve_section(Section::Auditors)?,
            sequences: acc
                .sequences()
                .iter()
                .map(|s| ResolvedSequence {
                    name: s.name().to_string(),
                    mode: s.mode(),
                    members: s.members().to_vec(),
                })
                .collect(),
        }
    };

    // Phase 3: the same structural checks a deserialized job goes through.
    job.validate()?;

    acc.mark_materialized();
    tracing::info!(
        "materialized job{}: {} services, {} event algorithms, {} conditions algorithms, {} public tools, {} auditors, {} sequences",
        acc.origin().map(|o| format!(" from {}", o)).unwrap_or_default(),
        job.services.len(),
        job.event_algorithms.len(),
        job.conditions_algorithms.len(),
        job.public_tools.len(),
        job.auditors.len(),
        job.sequences.len()
    );
    Ok(job)
}

struct Materializer<'a> {
    acc: &'a Accumulator,
    public: HashMap<&'a str, &'a ComponentSpec>,
}

impl<'a> Materializer<'a> {
    fn new(acc: &'a Accumulator) -> Self {
        let public = acc
            .public_tools()
            .iter()
            .map(|t| (t.instance_name(), t))
            .collect();
        Self { acc, public }
    }

    fn resolve_section(&self, section: Section) -> Result<Vec<ResolvedComponent>> {
        self.acc
            .components(section)
            .iter()
            .map(|spec| self.resolve_component(spec, &spec.full_name()))
            .collect()
    }

    fn resolve_component(&self, spec: &ComponentSpec, path: &str) -> Result<ResolvedComponent> {
        Ok(ResolvedComponent {
            kind: spec.kind(),
            type_name: spec.type_name().to_string(),
            instance_name: spec.instance_name().to_string(),
            properties: self.resolve_properties(path, spec.properties())?,
        })
    }

    fn resolve_properties(
        &self,
        path: &str,
        properties: &BTreeMap<String, PropertyValue>,
    ) -> Result<BTreeMap<String, ResolvedValue>> {
        properties
            .iter()
            .map(|(name, value)| Ok((name.clone(), self.resolve_value(path, name, value)?)))
            .collect()
    }

    fn resolve_value(&self, path: &str, name: &str, value: &PropertyValue) -> Result<ResolvedValue> {
        Ok(match value {
            PropertyValue::Bool(b) => ResolvedValue::Bool(*b),
            PropertyValue::Int(i) => ResolvedValue::Int(*i),
            PropertyValue::Float(x) if !x.is_finite() => {
                return Err(ConfigError::NonFiniteFloat {
                    component: path.to_string(),
                    property: name.to_string(),
                });
            }
            PropertyValue::Float(x) => ResolvedValue::Float(*x),
            PropertyValue::Str(s) => ResolvedValue::Str(s.clone()),
            PropertyValue::List(items) => ResolvedValue::List(
                items
                    .iter()
                    .map(|item| self.resolve_value(path, name, item))
                    .collect::<Result<_>>()?,
            ),
            PropertyValue::Tool(ToolHandle::Private(tool)) => {
                let child_path = format!("{}.{}", path, tool.instance_name());
                ResolvedValue::PrivateTool(Box::new(self.resolve_component(tool, &child_path)?))
            }
            PropertyValue::Tool(ToolHandle::Public(r)) => match self.public.get(r.instance_name.as_str()) {
                Some(tool) if tool.type_name() == r.type_name => ResolvedValue::PublicTool(tool.to_ref()),
                _ => {
                    return Err(ConfigError::UnresolvedPublicTool {
                        tool: r.to_string(),
                        referenced_by: format!("{}.{}", path, name),
                    });
                }
            },
        })
    }
}
