//! Glob selection of components for bulk property tweaks.

use super::Accumulator;
use crate::component::{ComponentSpec, PropertyValue};
use crate::error::Result;
use regex::Regex;

/// Components selected by `Accumulator::foreach_component`.
pub struct Selection<'a> {
    components: Vec<&'a mut ComponentSpec>,
}

impl Accumulator {
    /// Select every top-level component whose `Type/Name` matches `pattern`.
    /// `*` matches any run of characters, `?` a single one.
    pub fn foreach_component(&mut self, pattern: &str) -> Result<Selection<'_>> {
        self.ensure_open()?;
        let re = glob_to_regex(pattern)?;
        let components: Vec<&mut ComponentSpec> = self
            .tables
            .iter_mut()
            .flat_map(|t| t.iter_mut())
            .filter(|c| re.is_match(&c.full_name()))
            .collect();
        if components.is_empty() {
            tracing::debug!("pattern {} matched no components", pattern);
        }
        Ok(Selection { components })
    }
}

impl Selection<'_> {
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn full_names(&self) -> Vec<String> {
        self.components.iter().map(|c| c.full_name()).collect()
    }

    /// Set `name` on every selected component; returns how many were touched.
    pub fn set_property(&mut self, name: &str, value: impl Into<PropertyValue>) -> usize {
        let value = value.into();
        for component in self.components.iter_mut() {
            tracing::debug!("setting {}.{} = {}", component.full_name(), name, value);
            component.set_property(name, value.clone());
        }
        self.components.len()
    }
}

fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let body = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    Ok(Regex::new(&format!("^{}$", body))?)
}
