//! The materialized job: flat, validated, serializable.
//!
//! A `JobConfiguration` is what the runtime consumes. Private tools are
//! inlined into their parents; public tools are listed once and referenced
//! by `Type/Name` everywhere else. Sequences reference event algorithms and
//! other sequences by name.

pub mod base;
mod codec;
mod materialize;

pub use base::base_job;
pub use codec::{FORMAT_VERSION, from_json, read_from, to_json, write_to};
pub use materialize::materialize;

use crate::accumulator::{SEQUENCER_TYPE, SequenceMember, SequenceMode, check_acyclic};
use crate::component::{ComponentKind, ComponentRef};
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// Name under which application properties appear in flattened dumps.
pub const APPLICATION_MANAGER: &str = "ApplicationMgr";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ResolvedValue>),
    PrivateTool(Box<ResolvedComponent>),
    PublicTool(ComponentRef),
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedValue::Bool(b) => write!(f, "{}", b),
            ResolvedValue::Int(i) => write!(f, "{}", i),
            ResolvedValue::Float(x) => write!(f, "{:?}", x),
            ResolvedValue::Str(s) => write!(f, "{:?}", s),
            ResolvedValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            ResolvedValue::PrivateTool(tool) => {
                write!(f, "private({}/{})", tool.type_name, tool.instance_name)
            }
            ResolvedValue::PublicTool(r) => write!(f, "public({})", r),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedComponent {
    pub kind: ComponentKind,
    pub type_name: String,
    pub instance_name: String,
    pub properties: BTreeMap<String, ResolvedValue>,
}

impl ResolvedComponent {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.type_name, self.instance_name)
    }

    pub fn property(&self, name: &str) -> Option<&ResolvedValue> {
        self.properties.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSequence {
    pub name: String,
    pub mode: SequenceMode,
    pub members: Vec<SequenceMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfiguration {
    pub format_version: u32,
    pub app_properties: BTreeMap<String, ResolvedValue>,
    pub services: Vec<ResolvedComponent>,
    pub event_algorithms: Vec<ResolvedComponent>,
    pub conditions_algorithms: Vec<ResolvedComponent>,
    pub public_tools: Vec<ResolvedComponent>,
    pub auditors: Vec<ResolvedComponent>,
    /// Top sequence first.
    pub sequences: Vec<ResolvedSequence>,
}

impl JobConfiguration {
    /// Sections in runtime initialization order, with the kind each holds.
    pub fn sections(&self) -> [(ComponentKind, &[ResolvedComponent]); 5] {
        [
            (ComponentKind::Service, self.services.as_slice()),
            (ComponentKind::EventAlgorithm, self.event_algorithms.as_slice()),
            (ComponentKind::ConditionsAlgorithm, self.conditions_algorithms.as_slice()),
            (ComponentKind::PublicTool, self.public_tools.as_slice()),
            (ComponentKind::Auditor, self.auditors.as_slice()),
        ]
    }

    pub fn component_count(&self) -> usize {
        self.sections().iter().map(|(_, s)| s.len()).sum()
    }

    pub fn service(&self, name: &str) -> Option<&ResolvedComponent> {
        find(&self.services, name)
    }

    pub fn event_algorithm(&self, name: &str) -> Option<&ResolvedComponent> {
        find(&self.event_algorithms, name)
    }

    pub fn conditions_algorithm(&self, name: &str) -> Option<&ResolvedComponent> {
        find(&self.conditions_algorithms, name)
    }

    /// The public tool a `PublicTool` reference points at.
    pub fn public_tool(&self, r: &ComponentRef) -> Option<&ResolvedComponent> {
        self.public_tools
            .iter()
            .find(|t| t.instance_name == r.instance_name && t.type_name == r.type_name)
    }

    pub fn event_algorithm_names(&self) -> Vec<&str> {
        self.event_algorithms
            .iter()
            .map(|a| a.instance_name.as_str())
            .collect()
    }

    pub fn sequence(&self, name: &str) -> Option<&ResolvedSequence> {
        self.sequences.iter().find(|s| s.name == name)
    }

    /// Event algorithms below `sequence` in execution order, each once.
    pub fn algorithms_in_sequence(&self, sequence: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        self.collect_algorithms(sequence, &mut visited, &mut out);
        out
    }

    fn collect_algorithms<'a>(
        &'a self,
        name: &str,
        visited: &mut HashSet<&'a str>,
        out: &mut Vec<&'a str>,
    ) {
        let Some(sequence) = self.sequence(name) else {
            return;
        };
        if !visited.insert(sequence.name.as_str()) {
            return;
        }
        for member in &sequence.members {
            match member {
                SequenceMember::Algorithm(alg) if !out.contains(&alg.as_str()) => out.push(alg),
                SequenceMember::Algorithm(_) => {}
                SequenceMember::Sequence(sub) => self.collect_algorithms(sub, visited, out),
            }
        }
    }

    /// Check the structural invariants of a job: every section holds only its
    /// own kind, instance names are unique per section, and every public tool
    /// reference resolves to exactly one listed public tool.
    pub fn validate(&self) -> Result<()> {
        let mut public: HashMap<&str, &str> = HashMap::new();
        for (kind, components) in self.sections() {
            let mut seen = HashSet::new();
            for c in components {
                if c.kind != kind {
                    return Err(ConfigError::KindMismatch {
                        component: c.full_name(),
                        expected: kind,
                        found: c.kind,
                    });
                }
                if !seen.insert(c.instance_name.as_str()) {
                    return Err(ConfigError::DuplicateInstance {
                        kind,
                        name: c.instance_name.clone(),
                    });
                }
                if kind == ComponentKind::PublicTool {
                    public.insert(&c.instance_name, &c.type_name);
                }
            }
        }

        let check = |r: &ComponentRef, owner: &str| -> Result<()> {
            match public.get(r.instance_name.as_str()) {
                Some(ty) if *ty == r.type_name => Ok(()),
                _ => Err(ConfigError::UnresolvedPublicTool {
                    tool: r.to_string(),
                    referenced_by: owner.to_string(),
                }),
            }
        };
        for (name, value) in &self.app_properties {
            visit_public_refs(value, &format!("{}.{}", APPLICATION_MANAGER, name), &check)?;
        }
        for (_, components) in self.sections() {
            for c in components {
                visit_component_refs(c, &c.full_name(), &check)?;
            }
        }
        self.validate_sequences()
    }

    /// Sequence names are unique, every member resolves and no sequence is
    /// nested below itself.
    fn validate_sequences(&self) -> Result<()> {
        let mut names = HashSet::new();
        for s in &self.sequences {
            if !names.insert(s.name.as_str()) {
                return Err(ConfigError::DuplicateSequence(s.name.clone()));
            }
        }
        for s in &self.sequences {
            for member in &s.members {
                match member {
                    SequenceMember::Algorithm(alg) if self.event_algorithm(alg).is_none() => {
                        return Err(ConfigError::NotFound {
                            kind: ComponentKind::EventAlgorithm,
                            name: alg.clone(),
                        });
                    }
                    SequenceMember::Sequence(sub) if !names.contains(sub.as_str()) => {
                        return Err(ConfigError::SequenceNotFound(sub.clone()));
                    }
                    _ => {}
                }
            }
        }
        check_acyclic(self.sequences.iter().map(|s| {
            let subs = s
                .members
                .iter()
                .filter_map(|m| match m {
                    SequenceMember::Sequence(name) => Some(name.as_str()),
                    SequenceMember::Algorithm(_) => None,
                })
                .collect();
            (s.name.as_str(), subs)
        }))
    }

    /// Every property as a `(component, property, value)` triple, components
    /// in section order. Private tools contribute their own properties under
    /// `Parent.Tool`; booleans render as `True`/`False`.
    pub fn flatten_properties(&self) -> Vec<(String, String, String)> {
        let mut out = Vec::new();
        for (name, value) in &self.app_properties {
            out.push((
                APPLICATION_MANAGER.to_string(),
                name.clone(),
                flat_value(value),
            ));
        }
        for (_, components) in self.sections() {
            for c in components {
                flatten_component(c, &c.instance_name, &mut out);
            }
        }
        for s in &self.sequences {
            let members: Vec<String> = s
                .members
                .iter()
                .map(|m| match m {
                    SequenceMember::Algorithm(name) => match self.event_algorithm(name) {
                        Some(alg) => format!("'{}'", alg.full_name()),
                        None => format!("'{}'", name),
                    },
                    SequenceMember::Sequence(name) => format!("'{}/{}'", SEQUENCER_TYPE, name),
                })
                .collect();
            let flag = |b: bool| flat_value(&ResolvedValue::Bool(b));
            out.push((s.name.clone(), "Members".to_string(), format!("[{}]", members.join(", "))));
            out.push((s.name.clone(), "Sequential".to_string(), flag(s.mode.is_sequential())));
            out.push((s.name.clone(), "ModeOR".to_string(), flag(s.mode.is_or())));
        }
        out
    }
}

fn find<'a>(components: &'a [ResolvedComponent], name: &str) -> Option<&'a ResolvedComponent> {
    components.iter().find(|c| c.instance_name == name)
}

fn visit_component_refs(
    c: &ResolvedComponent,
    path: &str,
    check: &impl Fn(&ComponentRef, &str) -> Result<()>,
) -> Result<()> {
    for (name, value) in &c.properties {
        visit_public_refs(value, &format!("{}.{}", path, name), check)?;
    }
    Ok(())
}

fn visit_public_refs(
    value: &ResolvedValue,
    path: &str,
    check: &impl Fn(&ComponentRef, &str) -> Result<()>,
) -> Result<()> {
    match value {
        ResolvedValue::PublicTool(r) => check(r, path),
        ResolvedValue::PrivateTool(tool) => visit_component_refs(tool, path, check),
        ResolvedValue::List(items) => {
            for item in items {
                visit_public_refs(item, path, check)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn flatten_component(c: &ResolvedComponent, path: &str, out: &mut Vec<(String, String, String)>) {
    for (name, value) in &c.properties {
        out.push((path.to_string(), name.clone(), flat_value(value)));
        match value {
            ResolvedValue::PrivateTool(tool) => {
                flatten_component(tool, &format!("{}.{}", path, tool.instance_name), out);
            }
            ResolvedValue::List(items) => {
                for item in items {
                    if let ResolvedValue::PrivateTool(tool) = item {
                        flatten_component(tool, &format!("{}.{}", path, tool.instance_name), out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn flat_value(value: &ResolvedValue) -> String {
    match value {
        ResolvedValue::Bool(true) => "True".to_string(),
        ResolvedValue::Bool(false) => "False".to_string(),
        ResolvedValue::Str(s) => s.clone(),
        ResolvedValue::PrivateTool(tool) => tool.full_name(),
        ResolvedValue::PublicTool(r) => r.to_string(),
        ResolvedValue::List(items) => {
            let items: Vec<String> = items
                .iter()
                .map(|item| match item {
                    ResolvedValue::Str(s) => format!("'{}'", s),
                    other => flat_value(other),
                })
                .collect();
            format!("[{}]", items.join(", "))
        }
        other => other.to_string(),
    }
}

impl fmt::Display for JobConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "job configuration (format {})", self.format_version)?;
        if !self.app_properties.is_empty() {
            writeln!(f, "application properties:")?;
            for (name, value) in &self.app_properties {
                writeln!(f, "  {} = {}", name, value)?;
            }
        }
        for (kind, components) in self.sections() {
            if components.is_empty() {
                continue;
            }
            writeln!(f, "{} ({}):", kind, components.len())?;
            for c in components {
                write_component(f, c, 1)?;
            }
        }
        if let Some(top) = self.sequences.first() {
            writeln!(f, "sequences:")?;
            write_sequence(f, self, top, 1, &mut Vec::new())?;
        }
        Ok(())
    }
}

fn write_sequence<'a>(
    f: &mut fmt::Formatter<'_>,
    job: &'a JobConfiguration,
    s: &'a ResolvedSequence,
    depth: usize,
    path: &mut Vec<&'a str>,
) -> fmt::Result {
    let indent = "  ".repeat(depth);
    writeln!(f, "{}{} ({})", indent, s.name, s.mode)?;
    // Unvalidated jobs may loop.
    if path.contains(&s.name.as_str()) {
        return Ok(());
    }
    path.push(&s.name);
    for member in &s.members {
        match member {
            SequenceMember::Algorithm(name) => writeln!(f, "{}  {}", indent, name)?,
            SequenceMember::Sequence(name) => match job.sequence(name) {
                Some(sub) => write_sequence(f, job, sub, depth + 1, path)?,
                None => writeln!(f, "{}  {} (missing)", indent, name)?,
            },
        }
    }
    path.pop();
    Ok(())
}

fn write_component(f: &mut fmt::Formatter<'_>, c: &ResolvedComponent, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    writeln!(f, "{}{}", indent, c.full_name())?;
    for (name, value) in &c.properties {
        writeln!(f, "{}  {} = {}", indent, name, value)?;
        if let ResolvedValue::PrivateTool(tool) = value {
            write_component(f, tool, depth + 2)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(kind: ComponentKind, ty: &str, name: &str) -> ResolvedComponent {
        ResolvedComponent {
            kind,
            type_name: ty.to_string(),
            instance_name: name.to_string(),
            properties: BTreeMap::new(),
        }
    }

    fn job() -> JobConfiguration {
        let mut alg = component(ComponentKind::EventAlgorithm, "HelloAlg", "HelloWorld");
        alg.properties
            .insert("MyBool".to_string(), ResolvedValue::Bool(true));
        alg.properties.insert(
            "MyStrings".to_string(),
            ResolvedValue::List(vec![
                ResolvedValue::Str("a".to_string()),
                ResolvedValue::Str("b".to_string()),
            ]),
        );
        let mut private = component(ComponentKind::PrivateTool, "HelloTool", "Priv");
        private
            .properties
            .insert("MyMessage".to_string(), ResolvedValue::Str("hi".to_string()));
        alg.properties.insert(
            "PrivateTool".to_string(),
            ResolvedValue::PrivateTool(Box::new(private)),
        );
        alg.properties.insert(
            "PublicTool".to_string(),
            ResolvedValue::PublicTool(ComponentRef::new("HelloTool", "Shared")),
        );

        JobConfiguration {
            format_version: FORMAT_VERSION,
            app_properties: BTreeMap::from([("EvtMax".to_string(), ResolvedValue::Int(10))]),
            services: vec![component(ComponentKind::Service, "MessageSvc", "MessageSvc")],
            event_algorithms: vec![alg],
            conditions_algorithms: vec![],
            public_tools: vec![component(ComponentKind::PublicTool, "HelloTool", "Shared")],
            auditors: vec![],
            sequences: vec![ResolvedSequence {
                name: "AthAlgSeq".to_string(),
                mode: SequenceMode::ParAnd,
                members: vec![SequenceMember::Algorithm("HelloWorld".to_string())],
            }],
        }
    }

    #[test]
    fn valid_job_passes() {
        let j = job();
        j.validate().unwrap();
        assert_eq!(j.component_count(), 3);
        assert_eq!(j.event_algorithm_names(), ["HelloWorld"]);
    }

    #[test]
    fn dangling_public_reference_is_reported_with_its_path() {
        let mut j = job();
        j.public_tools[0].type_name = "OtherTool".to_string();
        match j.validate() {
            Err(ConfigError::UnresolvedPublicTool { tool, referenced_by }) => {
                assert_eq!(tool, "HelloTool/Shared");
                assert_eq!(referenced_by, "HelloAlg/HelloWorld.PublicTool");
            }
            other => panic!("expected unresolved tool, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_and_misplaced_components_are_rejected() {
        let mut j = job();
        j.services.push(j.services[0].clone());
        assert!(matches!(
            j.validate(),
            Err(ConfigError::DuplicateInstance { .. })
        ));

        let mut j = job();
        j.services[0].kind = ComponentKind::Auditor;
        assert!(matches!(j.validate(), Err(ConfigError::KindMismatch { .. })));
    }

    #[test]
    fn flattened_properties() {
        let props = job().flatten_properties();
        let find = |c: &str, p: &str| {
            props
                .iter()
                .find(|(comp, prop, _)| comp == c && prop == p)
                .map(|(_, _, v)| v.as_str())
        };
        assert_eq!(find("ApplicationMgr", "EvtMax"), Some("10"));
        assert_eq!(find("HelloWorld", "MyBool"), Some("True"));
        assert_eq!(find("HelloWorld", "MyStrings"), Some("['a', 'b']"));
        assert_eq!(find("HelloWorld", "PrivateTool"), Some("HelloTool/Priv"));
        assert_eq!(find("HelloWorld.Priv", "MyMessage"), Some("hi"));
        assert_eq!(find("HelloWorld", "PublicTool"), Some("HelloTool/Shared"));
        assert_eq!(find("AthAlgSeq", "Members"), Some("['HelloAlg/HelloWorld']"));
        assert_eq!(find("AthAlgSeq", "Sequential"), Some("False"));
        assert_eq!(find("AthAlgSeq", "ModeOR"), Some("False"));
    }

    fn sequence(name: &str, mode: SequenceMode, members: Vec<SequenceMember>) -> ResolvedSequence {
        ResolvedSequence {
            name: name.to_string(),
            mode,
            members,
        }
    }

    #[test]
    fn sequence_members_must_resolve() {
        let mut j = job();
        j.sequences[0]
            .members
            .push(SequenceMember::Algorithm("Ghost".to_string()));
        assert!(matches!(
            j.validate(),
            Err(ConfigError::NotFound { kind: ComponentKind::EventAlgorithm, .. })
        ));

        let mut j = job();
        j.sequences[0]
            .members
            .push(SequenceMember::Sequence("missing".to_string()));
        assert!(matches!(j.validate(), Err(ConfigError::SequenceNotFound(_))));

        let mut j = job();
        j.sequences.push(j.sequences[0].clone());
        assert!(matches!(j.validate(), Err(ConfigError::DuplicateSequence(_))));
    }

    #[test]
    fn nested_sequences_are_walked_in_order() {
        let mut j = job();
        j.event_algorithms
            .push(component(ComponentKind::EventAlgorithm, "HelloAlg", "Inner"));
        j.sequences[0]
            .members
            .insert(0, SequenceMember::Sequence("sub".to_string()));
        j.sequences.push(sequence(
            "sub",
            SequenceMode::SeqOr,
            vec![
                SequenceMember::Algorithm("Inner".to_string()),
                SequenceMember::Algorithm("HelloWorld".to_string()),
            ],
        ));
        j.validate().unwrap();
        assert_eq!(j.algorithms_in_sequence("AthAlgSeq"), ["Inner", "HelloWorld"]);
        assert_eq!(j.algorithms_in_sequence("sub"), ["Inner", "HelloWorld"]);
        assert!(j.to_string().contains("    sub (seq OR)"));

        // Close the loop: sub -> AthAlgSeq -> sub.
        j.sequences[1]
            .members
            .push(SequenceMember::Sequence("AthAlgSeq".to_string()));
        match j.validate() {
            Err(ConfigError::SequenceCycle(path)) => assert_eq!(path, "AthAlgSeq -> sub -> AthAlgSeq"),
            other => panic!("expected a cycle, got {:?}", other),
        }
        // Display and lookups still terminate.
        assert!(!j.to_string().is_empty());
        assert_eq!(j.algorithms_in_sequence("sub"), ["Inner", "HelloWorld"]);
    }
}
