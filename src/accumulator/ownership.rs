//! Private tool single-ownership check.
//!
//! Walks the application properties, every top-level component and each
//! private tool below them, recording which parent each private tool object
//! hangs under. The same object under two different parents is an ownership
//! conflict; structurally equal but distinct objects are fine.
//!
//! Parents are told apart by object identity, never by name: two components
//! may share a `Type/Name` across sections, and two distinct private tools
//! may share an instance name under one parent.

use crate::component::{ComponentSpec, PropertyValue, ToolHandle};
use crate::error::{ConfigError, Result};
use crate::job::APPLICATION_MANAGER;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Application,
    Component(*const ComponentSpec),
}

type Owners = HashMap<*const ComponentSpec, (Owner, String)>;

pub(crate) fn check_exclusive<'a>(
    components: impl IntoIterator<Item = &'a ComponentSpec>,
    app_properties: impl IntoIterator<Item = &'a PropertyValue>,
) -> Result<()> {
    // Keyed by object address. Every Rc reached here is alive for the whole
    // walk, so addresses cannot be reused mid-check.
    let mut owners = Owners::new();

    let mut app_tools = Vec::new();
    for value in app_properties {
        value.visit_tool_handles(&mut |handle| {
            if let ToolHandle::Private(tool) = handle {
                app_tools.push(tool);
            }
        });
    }
    let label = format!("application manager {}", APPLICATION_MANAGER);
    claim(app_tools, Owner::Application, &label, &mut owners)?;

    for component in components {
        let label = format!("{} {}", component.kind(), component.full_name());
        walk(
            component,
            Owner::Component(std::ptr::from_ref(component)),
            &label,
            &mut owners,
        )?;
    }
    Ok(())
}

fn walk(parent: &ComponentSpec, owner: Owner, label: &str, owners: &mut Owners) -> Result<()> {
    let mut children: Vec<&Rc<ComponentSpec>> = Vec::new();
    parent.visit_tool_handles(&mut |_, handle| {
        if let ToolHandle::Private(tool) = handle {
            children.push(tool);
        }
    });
    claim(children, owner, label, owners)
}

fn claim(
    children: Vec<&Rc<ComponentSpec>>,
    owner: Owner,
    label: &str,
    owners: &mut Owners,
) -> Result<()> {
    for tool in children {
        let key = Rc::as_ptr(tool);
        match owners.get(&key) {
            Some((first, first_label)) if *first != owner => {
                return Err(ConfigError::OwnershipConflict {
                    tool: tool.full_name(),
                    first_owner: first_label.clone(),
                    second_owner: label.to_string(),
                });
            }
            // Held twice by the same parent.
            Some(_) => continue,
            None => {
                owners.insert(key, (owner, label.to_string()));
            }
        }
        let child_label = format!("{}.{}", label, tool.instance_name());
        walk(tool, Owner::Component(key), &child_label, owners)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter;

    fn alg(name: &str) -> ComponentSpec {
        ComponentSpec::event_algorithm("HelloAlg").named(name)
    }

    #[test]
    fn equal_but_distinct_tools_are_fine() {
        let a = alg("a").with_property(
            "Tool",
            ToolHandle::private(ComponentSpec::private_tool("HelloTool")),
        );
        let b = alg("b").with_property(
            "Tool",
            ToolHandle::private(ComponentSpec::private_tool("HelloTool")),
        );
        assert!(check_exclusive([&a, &b], iter::empty()).is_ok());
    }

    #[test]
    fn one_parent_may_hold_a_tool_twice() {
        let tool = ToolHandle::private(ComponentSpec::private_tool("HelloTool"));
        let a = alg("a")
            .with_property("Tool", tool.clone())
            .with_property("Tools", vec![tool]);
        assert!(check_exclusive([&a], iter::empty()).is_ok());
    }

    #[test]
    fn shared_private_tool_is_rejected() {
        let tool = ToolHandle::private(ComponentSpec::private_tool("HelloTool").named("t"));
        let a = alg("a").with_property("Tool", tool.clone());
        let b = alg("b").with_property("Tools", vec![tool]);

        match check_exclusive([&a, &b], iter::empty()) {
            Err(ConfigError::OwnershipConflict {
                tool,
                first_owner,
                second_owner,
            }) => {
                assert_eq!(tool, "HelloTool/t");
                assert_eq!(first_owner, "event algorithm HelloAlg/a");
                assert_eq!(second_owner, "event algorithm HelloAlg/b");
            }
            other => panic!("expected ownership conflict, got {:?}", other),
        }
    }

    #[test]
    fn same_full_name_in_two_sections_is_two_owners() {
        let tool = ToolHandle::private(ComponentSpec::private_tool("HelloTool"));
        let event = ComponentSpec::event_algorithm("Alg")
            .named("x")
            .with_property("Tool", tool.clone());
        let cond = ComponentSpec::conditions_algorithm("Alg")
            .named("x")
            .with_property("Tool", tool);

        match check_exclusive([&event, &cond], iter::empty()) {
            Err(ConfigError::OwnershipConflict {
                first_owner,
                second_owner,
                ..
            }) => {
                assert_eq!(first_owner, "event algorithm Alg/x");
                assert_eq!(second_owner, "conditions algorithm Alg/x");
            }
            other => panic!("expected ownership conflict, got {:?}", other),
        }
    }

    #[test]
    fn nested_tools_are_owned_by_their_enclosing_tool() {
        let inner = ToolHandle::private(ComponentSpec::private_tool("Inner"));
        let outer_a = ToolHandle::private(
            ComponentSpec::private_tool("Outer")
                .named("oa")
                .with_property("Inner", inner.clone()),
        );
        let outer_b = ToolHandle::private(
            ComponentSpec::private_tool("Outer")
                .named("ob")
                .with_property("Inner", inner),
        );
        let parent = alg("p")
            .with_property("A", outer_a)
            .with_property("B", outer_b);

        let err = check_exclusive([&parent], iter::empty()).err();
        assert!(matches!(err, Some(ConfigError::OwnershipConflict { .. })));
    }

    #[test]
    fn enclosing_tools_with_the_same_name_are_still_distinct() {
        let inner = ToolHandle::private(ComponentSpec::private_tool("Inner"));
        let outer = |inner: ToolHandle| {
            ToolHandle::private(
                ComponentSpec::private_tool("Outer")
                    .named("same")
                    .with_property("Inner", inner),
            )
        };
        let parent = alg("p")
            .with_property("A", outer(inner.clone()))
            .with_property("B", outer(inner));

        let err = check_exclusive([&parent], iter::empty()).err();
        assert!(matches!(err, Some(ConfigError::OwnershipConflict { .. })));
    }

    #[test]
    fn application_properties_own_their_tools() {
        let tool = ToolHandle::private(ComponentSpec::private_tool("HelloTool").named("t"));
        let a = alg("a").with_property("Tool", tool.clone());
        let app = PropertyValue::Tool(tool);

        match check_exclusive([&a], [&app]) {
            Err(ConfigError::OwnershipConflict {
                first_owner,
                second_owner,
                ..
            }) => {
                assert_eq!(first_owner, "application manager ApplicationMgr");
                assert_eq!(second_owner, "event algorithm HelloAlg/a");
            }
            other => panic!("expected ownership conflict, got {:?}", other),
        }
    }
}
