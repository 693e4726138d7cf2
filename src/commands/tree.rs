use crate::commands::registry::UnitId;

/// Hierarchy of command names pointing into a registry
///
/// A node without a command is a topic: it only groups its children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandTree {
    pub name: String,
    pub command: Option<UnitId>,
    pub children: Vec<CommandTree>,
}

impl CommandTree {
    #[must_use]
    pub fn command(name: impl Into<String>, command: UnitId) -> Self {
        CommandTree {
            name: name.into(),
            command: Some(command),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn topic(name: impl Into<String>) -> Self {
        CommandTree {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn child(mut self, child: CommandTree) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn is_topic(&self) -> bool {
        self.command.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::definition::Definition;
    use crate::commands::registry::Registry;

    #[test]
    fn test_builders_nest_children() {
        let mut registry = Registry::new();
        let root = registry.add(Definition::command("app")).unwrap();
        let apply = registry.add(Definition::command("apply")).unwrap();
        let status = registry.add(Definition::command("status")).unwrap();

        let tree = CommandTree::command("app", root)
            .child(CommandTree::topic("deploy").child(CommandTree::command("apply", apply)))
            .child(CommandTree::command("status", status));

        assert_eq!(tree.command, Some(root));
        assert!(tree.children[0].is_topic());
        assert_eq!(tree.children[0].children[0].command, Some(apply));
        assert_eq!(tree.children[1].command, Some(status));
        assert!(!tree.children[1].is_topic());
    }
}
