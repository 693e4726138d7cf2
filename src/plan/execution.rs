use std::fmt;

use log::debug;
use serde::Serialize;

use crate::commands::option::{OptionDefinition, OptionValue, Options};
use crate::commands::registry::UnitId;
use crate::plan::validation::{NodeId, ValidationPlan};
use crate::tokenizer::Token;

/// One entry of an [`ExecutionPlan`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanItem {
    /// Matched command, `None` for topics and bare diagnostic items
    pub command: Option<UnitId>,
    /// Command names leading to this item, root included; empty for bare items
    pub path: Vec<String>,
    pub options: Options,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown_command: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown_options: Vec<String>,
}

impl PlanItem {
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        self.unknown_command.is_some() || !self.unknown_options.is_empty()
    }

    #[must_use]
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }
}

/// Ordered interpretation of a command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    pub items: Vec<PlanItem>,
    /// False iff any item carries a diagnostic
    pub success: bool,
}

struct PendingValue {
    item: usize,
    name: String,
}

struct Resolver<'a> {
    plan: &'a ValidationPlan,
    context: NodeId,
    items: Vec<PlanItem>,
    current: Option<usize>,
    pending: Option<PendingValue>,
}

impl<'a> Resolver<'a> {
    fn new(plan: &'a ValidationPlan) -> Self {
        Resolver {
            plan,
            context: plan.root(),
            items: Vec::new(),
            current: None,
            pending: None,
        }
    }

    /// Item for `node`'s command, reusing one opened earlier for the same unit
    fn item_for(&mut self, node: NodeId) -> usize {
        let plan = self.plan;
        let node = plan.node(node);
        if let Some(unit) = node.command
            && let Some(index) = self.items.iter().position(|i| i.command == Some(unit))
        {
            return index;
        }
        self.items.push(PlanItem {
            command: node.command,
            path: node.path.clone(),
            ..Default::default()
        });
        self.items.len() - 1
    }

    /// The current item, opening a default one for the root node if none exists yet
    fn current_item(&mut self) -> usize {
        match self.current {
            Some(index) => index,
            None => {
                let index = self.item_for(self.plan.root());
                self.current = Some(index);
                index
            }
        }
    }

    fn value(&mut self, value: &str) {
        if let Some(pending) = self.pending.take() {
            self.items[pending.item]
                .options
                .insert(pending.name, OptionValue::Value(value.to_string()));
            return;
        }

        if let Some(child) = self.plan.child(self.context, value) {
            self.context = child;
            self.current = Some(self.item_for(child));
            return;
        }

        debug!("Unknown command '{value}'");
        let index = match self.current {
            Some(index) => index,
            None => {
                self.items.push(PlanItem::default());
                let index = self.items.len() - 1;
                self.current = Some(index);
                index
            }
        };
        // The first unmatched value is the one reported
        self.items[index]
            .unknown_command
            .get_or_insert_with(|| value.to_string());
    }

    fn option(&mut self, spelling: &str) {
        let plan = self.plan;
        self.pending = None;

        if let Some(global) = plan.global_option(spelling) {
            let index = self.item_for(global.node);
            self.set_flag(index, &global.option);
            return;
        }

        let index = self.current_item();
        match plan.option(self.context, spelling) {
            Some(option) => self.set_flag(index, option),
            None => {
                debug!("Unknown option '{spelling}'");
                self.items[index].unknown_options.push(spelling.to_string());
            }
        }
    }

    fn set_flag(&mut self, index: usize, option: &OptionDefinition) {
        self.items[index]
            .options
            .insert(option.name.clone(), OptionValue::Flag(true));
        if option.expects_value {
            self.pending = Some(PendingValue {
                item: index,
                name: option.name.clone(),
            });
        }
    }
}

impl ExecutionPlan {
    /// Match tokens against a validation plan.
    ///
    /// Unknown commands and options are recorded on the plan items and never abort
    /// the scan.
    #[must_use]
    pub fn resolve(tokens: &[Token], plan: &ValidationPlan) -> Self {
        let mut resolver = Resolver::new(plan);
        for token in tokens {
            match token {
                Token::Value { value } => resolver.value(value),
                Token::Option { name } => resolver.option(name),
            }
        }
        let success = !resolver.items.iter().any(PlanItem::is_diagnostic);
        ExecutionPlan {
            items: resolver.items,
            success,
        }
    }

    /// Items that matched a command and carry no diagnostics
    pub fn commands(&self) -> impl Iterator<Item = (UnitId, &PlanItem)> + '_ {
        self.items
            .iter()
            .filter(|item| !item.is_diagnostic())
            .filter_map(|item| item.command.map(|unit| (unit, item)))
    }

    #[must_use]
    pub fn diagnostics(&self) -> Vec<&PlanItem> {
        self.items.iter().filter(|i| i.is_diagnostic()).collect()
    }
}

impl fmt::Display for PlanItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str("?")?;
        } else {
            f.write_str(&self.path.join(" "))?;
        }
        for (name, value) in &self.options {
            match value {
                OptionValue::Flag(_) => write!(f, " --{name}")?,
                OptionValue::Value(v) => write!(f, " --{name}={v}")?,
            }
        }
        if let Some(command) = &self.unknown_command {
            write!(f, " [unknown command: {command}]")?;
        }
        if !self.unknown_options.is_empty() {
            write!(f, " [unknown options: {}]", self.unknown_options.join(", "))?;
        }
        Ok(())
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}
