use std::collections::BTreeMap;

use serde::Serialize;

/// Value captured for an option on the command line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// The option was present; always `true`
    Flag(bool),
    /// The argument consumed by a value-expecting option
    Value(String),
}

impl OptionValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Flag(_) => None,
            OptionValue::Value(value) => Some(value),
        }
    }
}

/// Options captured for one plan item, keyed by canonical name
pub type Options = BTreeMap<String, OptionValue>;

/// A declared command-line option
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptionDefinition {
    /// Canonical name without dashes, used as the key in captured options
    pub name: String,
    pub aliases: Vec<String>,
    pub description: String,
    /// The next value token is consumed as this option's argument
    pub expects_value: bool,
    /// Recognized anywhere on the command line and routed to the owning command
    pub is_global: bool,
}

impl OptionDefinition {
    #[must_use]
    pub fn flag(name: impl Into<String>) -> Self {
        OptionDefinition {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn value(name: impl Into<String>) -> Self {
        OptionDefinition {
            name: name.into(),
            expects_value: true,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    #[must_use]
    pub fn global(mut self) -> Self {
        self.is_global = true;
        self
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Every spelling that selects this option, canonical first.
    ///
    /// Single-letter aliases are spelled `-x`, everything else `--name`.
    #[must_use]
    pub fn spellings(&self) -> Vec<String> {
        std::iter::once(format!("--{}", self.name))
            .chain(self.aliases.iter().map(|alias| {
                if alias.chars().count() == 1 {
                    format!("-{alias}")
                } else {
                    format!("--{alias}")
                }
            }))
            .collect()
    }
}
