//! Execution contexts and scope selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Scope a process runs in; selects which slice of configuration is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionContext {
    /// Machine-wide configuration.
    Global,
    /// Configuration of the project in the working directory.
    Project,
    /// Configuration of the current OS user.
    User,
}

impl ExecutionContext {
    /// All contexts, least specific first.
    pub const ALL: [ExecutionContext; 3] = [
        ExecutionContext::Global,
        ExecutionContext::Project,
        ExecutionContext::User,
    ];

    /// Returns the lower-case name of the context.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionContext::Global => "global",
            ExecutionContext::Project => "project",
            ExecutionContext::User => "user",
        }
    }

    /// Position of the context in [`ExecutionContext::ALL`].
    pub fn index(&self) -> usize {
        match self {
            ExecutionContext::Global => 0,
            ExecutionContext::Project => 1,
            ExecutionContext::User => 2,
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionContext {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(ExecutionContext::Global),
            "project" => Ok(ExecutionContext::Project),
            "user" => Ok(ExecutionContext::User),
            other => Err(ConfigError::UnknownContext(other.to_string())),
        }
    }
}

/// Selection of one or more scopes for a config operation.
///
/// An empty selection targets [`ExecutionContext::Project`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextOptions {
    /// Select the global scope.
    pub global: bool,
    /// Select the project scope.
    pub project: bool,
    /// Select the user scope.
    pub user: bool,
}

impl ContextOptions {
    /// Selects exactly one scope.
    pub fn only(context: ExecutionContext) -> Self {
        let mut options = Self::default();
        match context {
            ExecutionContext::Global => options.global = true,
            ExecutionContext::Project => options.project = true,
            ExecutionContext::User => options.user = true,
        }
        options
    }

    /// Returns true if no scope is explicitly selected.
    pub fn is_empty(&self) -> bool {
        !(self.global || self.project || self.user)
    }

    /// Returns the selected scopes, least specific first.
    pub fn contexts(&self) -> Vec<ExecutionContext> {
        if self.is_empty() {
            return vec![ExecutionContext::Project];
        }

        ExecutionContext::ALL
            .into_iter()
            .filter(|context| self.selects(*context))
            .collect()
    }

    fn selects(&self, context: ExecutionContext) -> bool {
        match context {
            ExecutionContext::Global => self.global,
            ExecutionContext::Project => self.project,
            ExecutionContext::User => self.user,
        }
    }
}

/// Resolves the single execution context of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextResolver {
    options: ContextOptions,
}

impl ContextResolver {
    /// Creates a resolver from the scope flags given to the process.
    pub fn new(options: ContextOptions) -> Self {
        Self { options }
    }

    /// Returns the current context.
    ///
    /// The most specific selected scope wins; `project` when none is selected.
    pub fn current_context(&self) -> ExecutionContext {
        self.options
            .contexts()
            .into_iter()
            .next_back()
            .unwrap_or(ExecutionContext::Project)
    }
}
