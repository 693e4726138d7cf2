use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::commands::option::{OptionDefinition, Options};
use crate::commands::registry::{DefinitionError, Registry, UnitId};

/// Error type returned by lifecycle hooks
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

pub type HookResult<T = ()> = Result<T, HookError>;

pub(crate) type HookFn<T> =
    Arc<dyn Fn(HookContext) -> BoxFuture<'static, HookResult<T>> + Send + Sync>;

/// Lazily evaluated dependency list, called at most once with the registry it lives in
pub type Resolver =
    Box<dyn FnOnce(&Registry) -> Result<Vec<UnitId>, DefinitionError> + Send + Sync>;

/// Whether a unit is invocable from the command line or only reachable as a dependency
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Kind {
    #[default]
    Command,
    Task,
}

/// Value returned by a `before` hook
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BeforeOutcome {
    #[default]
    Continue,
    /// Do not run `exec` or `after` for this unit
    Skip,
}

/// Passed to every hook of a run
#[derive(Debug, Clone)]
pub struct HookContext {
    pub unit: UnitId,
    pub name: String,
    /// Options captured for the invocation that started the run
    pub options: Arc<Options>,
}

/// Lifecycle hooks of a unit; every hook is optional
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) before: Option<HookFn<BeforeOutcome>>,
    pub(crate) exec: Option<HookFn<()>>,
    pub(crate) after: Option<HookFn<()>>,
    pub(crate) after_all: Option<HookFn<()>>,
}

fn boxed<T, F, Fut>(hook: F) -> HookFn<T>
where
    F: Fn(HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HookResult<T>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(hook(ctx)))
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn before<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<BeforeOutcome>> + Send + 'static,
    {
        self.before = Some(boxed(hook));
        self
    }

    #[must_use]
    pub fn exec<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.exec = Some(boxed(hook));
        self
    }

    #[must_use]
    pub fn after<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.after = Some(boxed(hook));
        self
    }

    /// Collected by the runner and fired once after the whole run
    #[must_use]
    pub fn after_all<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.after_all = Some(boxed(hook));
        self
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before", &self.before.is_some())
            .field("exec", &self.exec.is_some())
            .field("after", &self.after.is_some())
            .field("after_all", &self.after_all.is_some())
            .finish()
    }
}

pub(crate) enum Dependencies {
    Resolved(Vec<UnitId>),
    Deferred(Resolver),
    /// The resolver has been taken and is running
    Resolving,
    Failed(DefinitionError),
}

impl Default for Dependencies {
    fn default() -> Self {
        Dependencies::Resolved(Vec::new())
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependencies::Resolved(ids) => f.debug_tuple("Resolved").field(ids).finish(),
            Dependencies::Deferred(_) => f.write_str("Deferred"),
            Dependencies::Resolving => f.write_str("Resolving"),
            Dependencies::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
        }
    }
}

/// A command or task, registered in a [`Registry`]
#[derive(Debug, Default)]
pub struct Definition {
    pub name: String,
    pub description: String,
    pub kind: Kind,
    /// Not invocable from the command line, still usable as a dependency
    pub is_private: bool,
    pub options: Vec<OptionDefinition>,
    pub(crate) dependencies: Dependencies,
    pub(crate) hooks: Hooks,
}

impl Definition {
    #[must_use]
    pub fn command(name: impl Into<String>) -> Self {
        Definition {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn task(name: impl Into<String>) -> Self {
        Definition {
            name: name.into(),
            kind: Kind::Task,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    #[must_use]
    pub fn option(mut self, option: OptionDefinition) -> Self {
        self.options.push(option);
        self
    }

    #[must_use]
    pub fn depends_on(mut self, dependencies: impl IntoIterator<Item = UnitId>) -> Self {
        self.dependencies = Dependencies::Resolved(dependencies.into_iter().collect());
        self
    }

    /// Dependencies computed the first time they are needed
    #[must_use]
    pub fn depends_on_deferred<F>(mut self, resolver: F) -> Self
    where
        F: FnOnce(&Registry) -> Result<Vec<UnitId>, DefinitionError> + Send + Sync + 'static,
    {
        self.dependencies = Dependencies::Deferred(Box::new(resolver));
        self
    }

    #[must_use]
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }
}
