use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use thiserror::Error;

use crate::commands::option::OptionDefinition;
use crate::commands::registry::{Registry, UnitId};
use crate::commands::tree::CommandTree;

/// Errors raised while compiling a command tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Duplicate command '{name}' in '{path}'")]
    DuplicateCommand { name: String, path: String },
    #[error("Command '{name}' refers to unknown unit {id}")]
    UnknownUnit { name: String, id: UnitId },
}

/// Handle to a node of a [`ValidationPlan`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One level of the compiled command tree
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub name: String,
    /// Command names from the root down to this node, root included
    pub path: Vec<String>,
    pub command: Option<UnitId>,
    pub is_topic: bool,
    /// Options of the owning command, in declaration order
    pub options: Vec<OptionDefinition>,
    children: HashMap<String, NodeId>,
    child_order: Vec<NodeId>,
    spellings: HashMap<String, usize>,
}

/// A global option together with the command that declared it
#[derive(Debug, Clone)]
pub struct GlobalOption {
    pub owner: UnitId,
    pub node: NodeId,
    pub option: OptionDefinition,
}

/// Lookup structure used to interpret tokens
#[derive(Debug, Clone)]
pub struct ValidationPlan {
    nodes: Vec<PlanNode>,
    globals: Vec<GlobalOption>,
    global_spellings: HashMap<String, usize>,
}

impl ValidationPlan {
    /// Compile a command tree whose commands live in `registry`.
    ///
    /// # Errors
    ///
    /// Returns `PlanError::DuplicateCommand` if two siblings share a name, or
    /// `PlanError::UnknownUnit` if a node points outside the registry.
    pub fn build(tree: &CommandTree, registry: &Registry) -> Result<Self, PlanError> {
        let mut plan = ValidationPlan {
            nodes: Vec::new(),
            globals: Vec::new(),
            global_spellings: HashMap::new(),
        };
        plan.visit(tree, Vec::new(), registry)?;
        debug!(
            "Built validation plan with {} nodes and {} global options",
            plan.nodes.len(),
            plan.globals.len()
        );
        Ok(plan)
    }

    fn visit(
        &mut self,
        tree: &CommandTree,
        mut path: Vec<String>,
        registry: &Registry,
    ) -> Result<NodeId, PlanError> {
        path.push(tree.name.clone());
        let id = NodeId(self.nodes.len());

        let options = match tree.command {
            Some(unit) => registry
                .get(unit)
                .ok_or_else(|| PlanError::UnknownUnit {
                    name: tree.name.clone(),
                    id: unit,
                })?
                .options
                .clone(),
            None => Vec::new(),
        };

        let mut spellings = HashMap::new();
        for (index, option) in options.iter().enumerate() {
            for spelling in option.spellings() {
                spellings.entry(spelling).or_insert(index);
            }
        }
        if let Some(owner) = tree.command {
            for option in options.iter().filter(|o| o.is_global) {
                for spelling in option.spellings() {
                    self.global_spellings
                        .entry(spelling)
                        .or_insert(self.globals.len());
                }
                self.globals.push(GlobalOption {
                    owner,
                    node: id,
                    option: option.clone(),
                });
            }
        }

        if tree.is_topic() && tree.children.is_empty() {
            warn!("Topic '{}' has no commands", path.join(" "));
        }

        self.nodes.push(PlanNode {
            name: tree.name.clone(),
            path: path.clone(),
            command: tree.command,
            is_topic: tree.is_topic(),
            options,
            children: HashMap::new(),
            child_order: Vec::new(),
            spellings,
        });

        let mut seen = HashSet::new();
        for child in &tree.children {
            if !seen.insert(child.name.as_str()) {
                return Err(PlanError::DuplicateCommand {
                    name: child.name.clone(),
                    path: path.join(" "),
                });
            }
            if let Some(unit) = child.command
                && registry.get(unit).is_some_and(|d| d.is_private)
            {
                debug!("Skipping private command '{}'", child.name);
                continue;
            }
            let child_id = self.visit(child, path.clone(), registry)?;
            let node = &mut self.nodes[id.0];
            node.children.insert(child.name.clone(), child_id);
            node.child_order.push(child_id);
        }

        Ok(id)
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// # Panics
    ///
    /// Panics if `id` was not produced by this plan.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id.0]
    }

    /// Invocable child of `node` with the given name
    #[must_use]
    pub fn child(&self, node: NodeId, name: &str) -> Option<NodeId> {
        self.node(node).children.get(name).copied()
    }

    /// Node reached by following `path` from the root; the first element names the
    /// root itself and is not checked
    #[must_use]
    pub fn find(&self, path: &[String]) -> Option<NodeId> {
        path.iter()
            .skip(1)
            .try_fold(self.root(), |node, name| self.child(node, name))
    }

    /// Invocable children of `node`, in declaration order
    pub fn children(&self, node: NodeId) -> impl Iterator<Item = &PlanNode> + '_ {
        self.node(node)
            .child_order
            .iter()
            .map(move |child| self.node(*child))
    }

    /// Option of `node`'s command selected by `spelling` (`--name`, `-x` or `--alias`)
    #[must_use]
    pub fn option(&self, node: NodeId, spelling: &str) -> Option<&OptionDefinition> {
        let node = self.node(node);
        node.spellings
            .get(spelling)
            .and_then(|index| node.options.get(*index))
    }

    #[must_use]
    pub fn global_option(&self, spelling: &str) -> Option<&GlobalOption> {
        self.global_spellings
            .get(spelling)
            .and_then(|index| self.globals.get(*index))
    }

    /// Every global option, pre-order by node and in declaration order
    #[must_use]
    pub fn globals(&self) -> &[GlobalOption] {
        &self.globals
    }
}
