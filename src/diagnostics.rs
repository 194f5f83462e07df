//! Diagnostic helpers shared by the accumulator and the materializer.

use crate::component::{ComponentSpec, PropertyValue};
use std::collections::BTreeSet;

/// Emit a warning that does not abort assembly.
pub fn warn(message: impl AsRef<str>) {
    tracing::warn!("{}", message.as_ref());
}

/// Describe which properties differ between two same-identity declarations.
pub fn property_diff(existing: &ComponentSpec, incoming: &ComponentSpec) -> String {
    let mut parts = Vec::new();
    if existing.kind() != incoming.kind() {
        parts.push(format!("kind {} vs {}", existing.kind(), incoming.kind()));
    }
    if existing.type_name() != incoming.type_name() {
        parts.push(format!(
            "type {} vs {}",
            existing.type_name(),
            incoming.type_name()
        ));
    }

    let names: BTreeSet<&String> = existing
        .properties()
        .keys()
        .chain(incoming.properties().keys())
        .collect();
    for name in names {
        let a = existing.property(name);
        let b = incoming.property(name);
        if a != b {
            parts.push(format!("{}: {} vs {}", name, show(a), show(b)));
        }
    }

    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join("; ")
    }
}

fn show(value: Option<&PropertyValue>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "<unset>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_names_changed_and_missing_properties() {
        let a = ComponentSpec::service("CoreDumpSvc")
            .named("CD")
            .with_property("Signals", vec![15]);
        let b = ComponentSpec::service("CoreDumpSvc")
            .named("CD")
            .with_property("Signals", vec![17])
            .with_property("FastStackTrace", true);
        assert_eq!(
            property_diff(&a, &b),
            "FastStackTrace: <unset> vs true; Signals: [15] vs [17]"
        );
    }
}
