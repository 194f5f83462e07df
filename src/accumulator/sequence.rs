//! Algorithm sequences.
//!
//! Event algorithms run inside a tree of named sequences rooted at
//! [`TOP_SEQUENCE`]. A sequence lists algorithms and sub-sequences by name;
//! the algorithms themselves are stored once in the event algorithm table,
//! so one algorithm (or one sequence) may sit under several parents. A
//! sequence must never end up below itself.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Name of the sequence every accumulator starts with.
pub const TOP_SEQUENCE: &str = "AthAlgSeq";

/// Type name sequences carry in flattened property dumps.
pub const SEQUENCER_TYPE: &str = "AthSequencer";

/// How a sequence runs its members and combines their decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceMode {
    SeqAnd,
    SeqOr,
    ParAnd,
    ParOr,
}

impl SequenceMode {
    /// Members run one after the other, in order.
    pub fn is_sequential(self) -> bool {
        matches!(self, SequenceMode::SeqAnd | SequenceMode::SeqOr)
    }

    /// The sequence passes as soon as one member passes.
    pub fn is_or(self) -> bool {
        matches!(self, SequenceMode::SeqOr | SequenceMode::ParOr)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SequenceMode::SeqAnd => "seq AND",
            SequenceMode::SeqOr => "seq OR",
            SequenceMode::ParAnd => "par AND",
            SequenceMode::ParOr => "par OR",
        }
    }
}

impl fmt::Display for SequenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceMember {
    /// An event algorithm, by instance name.
    Algorithm(String),
    Sequence(String),
}

impl SequenceMember {
    pub fn name(&self) -> &str {
        match self {
            SequenceMember::Algorithm(name) | SequenceMember::Sequence(name) => name,
        }
    }
}

/// A named sequence. Created empty; members are attached through the
/// accumulator so that every algorithm member is also a registered algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    name: String,
    mode: SequenceMode,
    members: Vec<SequenceMember>,
}

impl Sequence {
    pub fn new(name: impl Into<String>, mode: SequenceMode) -> Self {
        Self {
            name: name.into(),
            mode,
            members: Vec::new(),
        }
    }

    pub fn seq_and(name: impl Into<String>) -> Self {
        Self::new(name, SequenceMode::SeqAnd)
    }

    pub fn seq_or(name: impl Into<String>) -> Self {
        Self::new(name, SequenceMode::SeqOr)
    }

    pub fn par_and(name: impl Into<String>) -> Self {
        Self::new(name, SequenceMode::ParAnd)
    }

    pub fn par_or(name: impl Into<String>) -> Self {
        Self::new(name, SequenceMode::ParOr)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> SequenceMode {
        self.mode
    }

    pub fn members(&self) -> &[SequenceMember] {
        &self.members
    }

    /// Direct algorithm members, in order.
    pub fn algorithm_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().filter_map(|m| match m {
            SequenceMember::Algorithm(name) => Some(name.as_str()),
            SequenceMember::Sequence(_) => None,
        })
    }

    /// Direct sub-sequences, in order.
    pub fn sequence_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().filter_map(|m| match m {
            SequenceMember::Sequence(name) => Some(name.as_str()),
            SequenceMember::Algorithm(_) => None,
        })
    }

    fn push(&mut self, member: SequenceMember) {
        if !self.members.contains(&member) {
            self.members.push(member);
        }
    }
}

/// All sequences of one accumulator, the top sequence first, indexed by name.
#[derive(Debug, Clone)]
pub(crate) struct SequenceTree {
    sequences: Vec<Sequence>,
    index: HashMap<String, usize>,
}

impl Default for SequenceTree {
    fn default() -> Self {
        Self {
            sequences: vec![Sequence::par_and(TOP_SEQUENCE)],
            index: HashMap::from([(TOP_SEQUENCE.to_string(), 0)]),
        }
    }
}

impl SequenceTree {
    pub(crate) fn get(&self, name: &str) -> Option<&Sequence> {
        self.index.get(name).map(|&i| &self.sequences[i])
    }

    pub(crate) fn as_slice(&self) -> &[Sequence] {
        &self.sequences
    }

    /// Only the top sequence, with nothing in it.
    pub(crate) fn is_trivial(&self) -> bool {
        self.sequences.len() == 1 && self.sequences[0].members.is_empty()
    }

    pub(crate) fn ensure_exists(&self, name: &str) -> Result<()> {
        if !self.index.contains_key(name) {
            return Err(ConfigError::SequenceNotFound(name.to_string()));
        }
        Ok(())
    }

    /// Declare `sequence` under `parent`. A sequence that already exists with
    /// the same mode gains another parent; a different mode is a conflict.
    pub(crate) fn add_sequence(&mut self, sequence: Sequence, parent: &str) -> Result<()> {
        self.ensure_exists(parent)?;
        let mut next = self.clone();
        next.declare(sequence.name(), sequence.mode())?;
        next.attach(parent, SequenceMember::Sequence(sequence.name))?;
        next.check_acyclic()?;
        *self = next;
        Ok(())
    }

    pub(crate) fn add_algorithm(&mut self, sequence: &str, algorithm: &str) -> Result<()> {
        self.attach(sequence, SequenceMember::Algorithm(algorithm.to_string()))
    }

    /// The tree `self` becomes when `other` is merged into it: `other`'s
    /// sequences are declared by name and its top-level members land in
    /// `into`. Nothing is modified; the caller commits the result.
    pub(crate) fn merged(&self, other: &SequenceTree, into: &str) -> Result<SequenceTree> {
        self.ensure_exists(into)?;
        let mut next = self.clone();
        for sequence in other.sequences.iter().skip(1) {
            next.declare(sequence.name(), sequence.mode())?;
        }
        for (i, sequence) in other.sequences.iter().enumerate() {
            let target = if i == 0 { into } else { sequence.name() };
            for member in &sequence.members {
                next.attach(target, member.clone())?;
            }
        }
        next.check_acyclic()?;
        Ok(next)
    }

    /// Every algorithm reachable from `name`, depth first, each once.
    pub(crate) fn algorithms_below(&self, name: &str) -> Result<Vec<&str>> {
        self.ensure_exists(name)?;
        let mut out = Vec::new();
        let mut visited = Vec::new();
        self.collect_algorithms(name, &mut visited, &mut out);
        Ok(out)
    }

    fn collect_algorithms<'a>(
        &'a self,
        name: &str,
        visited: &mut Vec<&'a str>,
        out: &mut Vec<&'a str>,
    ) {
        let Some(sequence) = self.get(name) else {
            return;
        };
        if visited.contains(&sequence.name()) {
            return;
        }
        visited.push(sequence.name());
        for member in &sequence.members {
            match member {
                SequenceMember::Algorithm(alg) => {
                    if !out.contains(&alg.as_str()) {
                        out.push(alg);
                    }
                }
                SequenceMember::Sequence(sub) => self.collect_algorithms(sub, visited, out),
            }
        }
    }

    fn declare(&mut self, name: &str, mode: SequenceMode) -> Result<()> {
        match self.get(name) {
            Some(existing) if existing.mode != mode => Err(ConfigError::Conflict {
                what: "sequence".to_string(),
                name: name.to_string(),
                existing: existing.mode.to_string(),
                incoming: mode.to_string(),
                differences: format!("mode: {} vs {}", existing.mode, mode),
            }),
            Some(_) => Ok(()),
            None => {
                self.index.insert(name.to_string(), self.sequences.len());
                self.sequences.push(Sequence::new(name, mode));
                Ok(())
            }
        }
    }

    fn attach(&mut self, parent: &str, member: SequenceMember) -> Result<()> {
        let i = *self
            .index
            .get(parent)
            .ok_or_else(|| ConfigError::SequenceNotFound(parent.to_string()))?;
        self.sequences[i].push(member);
        Ok(())
    }

    fn check_acyclic(&self) -> Result<()> {
        check_acyclic(
            self.sequences
                .iter()
                .map(|s| (s.name(), s.sequence_names().collect())),
        )
    }
}

/// Fail with the offending path if some sequence is nested below itself.
/// Takes each sequence with the names of its direct sub-sequences.
pub(crate) fn check_acyclic<'a>(
    sequences: impl IntoIterator<Item = (&'a str, Vec<&'a str>)>,
) -> Result<()> {
    #[derive(Copy, Clone, PartialEq, Eq)]
    enum Mark {
        Temp,
        Perm,
    }

    fn dfs<'a>(
        v: &'a str,
        children: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Result<()> {
        match marks.get(v) {
            Some(Mark::Perm) => return Ok(()),
            Some(Mark::Temp) => {
                // v is on the current path; report the loop from v back to v
                let start = stack.iter().position(|s| *s == v).unwrap_or(0);
                let mut path = stack[start..].to_vec();
                path.push(v);
                return Err(ConfigError::SequenceCycle(path.join(" -> ")));
            }
            None => {}
        }

        marks.insert(v, Mark::Temp);
        stack.push(v);
        if let Some(kids) = children.get(v) {
            for &k in kids {
                dfs(k, children, marks, stack)?;
            }
        }
        stack.pop();
        marks.insert(v, Mark::Perm);
        Ok(())
    }

    let mut order = Vec::new();
    let mut children = HashMap::new();
    for (name, kids) in sequences {
        order.push(name);
        children.insert(name, kids);
    }
    let mut marks = HashMap::new();
    let mut stack = Vec::new();
    for root in order {
        stack.clear();
        dfs(root, &children, &mut marks, &mut stack)?;
    }
    Ok(())
}
