//! Generic fail-fast rule pipeline.
//!
//! A [`RuleCatalog`] holds the static, ordered set of [`RuleDefinition`]s for a
//! subject type. Per request, the surviving definitions are bound to the
//! subject as [`RuleInvocation`]s inside a [`Pipeline`], which runs them in
//! order and stops at the first [`Violation`].
//!
//! Nothing here knows about pods; any subject type can reuse it.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;
use tracing::debug;

/// A pure check over a subject
pub type Check<C> = fn(&C) -> Result<(), Violation>;

/// Why a rule rejected its subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    message: String,
    offenders: Vec<String>,
}

impl Violation {
    /// A violation of the subject as a whole
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offenders: Vec::new(),
        }
    }

    /// A violation naming the offending parts of the subject
    pub fn with_offenders(message: impl Into<String>, offenders: Vec<String>) -> Self {
        Self {
            message: message.into(),
            offenders,
        }
    }

    /// The violation description
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Names of the offending parts, empty for subject-wide violations
    pub fn offenders(&self) -> &[String] {
        &self.offenders
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A named check in the static catalog
pub struct RuleDefinition<C> {
    name: &'static str,
    check: Check<C>,
}

impl<C> RuleDefinition<C> {
    pub const fn new(name: &'static str, check: Check<C>) -> Self {
        Self { name, check }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<C> Clone for RuleDefinition<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for RuleDefinition<C> {}

impl<C> fmt::Debug for RuleDefinition<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Ordered set of uniquely named rule definitions
pub struct RuleCatalog<C> {
    rules: Vec<RuleDefinition<C>>,
}

impl<C> Clone for RuleCatalog<C> {
    fn clone(&self) -> Self {
        Self {
            rules: self.rules.clone(),
        }
    }
}

impl<C> fmt::Debug for RuleCatalog<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<C> RuleCatalog<C> {
    /// Build a catalog from definitions in registration order.
    ///
    /// # Panics
    ///
    /// Panics when two definitions share a name. The catalog is assembled from
    /// constants at startup, so a duplicate is a programming error.
    pub fn new(rules: Vec<RuleDefinition<C>>) -> Self {
        let mut seen = BTreeSet::new();
        for rule in &rules {
            assert!(
                seen.insert(rule.name),
                "duplicate rule registration: {}",
                rule.name
            );
        }
        Self { rules }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleDefinition<C>> {
        self.rules.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(RuleDefinition::name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RuleDefinition<C>> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// A rule bound to the subject of one request
pub struct RuleInvocation<'a, C> {
    definition: &'a RuleDefinition<C>,
    subject: &'a C,
}

impl<'a, C> RuleInvocation<'a, C> {
    pub fn new(definition: &'a RuleDefinition<C>, subject: &'a C) -> Self {
        Self {
            definition,
            subject,
        }
    }

    pub fn name(&self) -> &'static str {
        self.definition.name
    }

    pub fn execute(&self) -> Result<(), Violation> {
        (self.definition.check)(self.subject)
    }
}

/// The first rule that rejected a subject
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{rule}: {violation}")]
pub struct RuleFailure {
    pub rule: &'static str,
    pub violation: Violation,
}

/// The active rules for one subject, executed in order
pub struct Pipeline<'a, C> {
    subject: &'a C,
    invocations: Vec<RuleInvocation<'a, C>>,
}

impl<'a, C> Pipeline<'a, C> {
    pub fn new(subject: &'a C) -> Self {
        Self {
            subject,
            invocations: Vec::new(),
        }
    }

    /// Append a rule after those already registered
    pub fn register(&mut self, definition: &'a RuleDefinition<C>) {
        debug!(rule = definition.name, "registering validation");
        self.invocations
            .push(RuleInvocation::new(definition, self.subject));
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.invocations.iter().map(RuleInvocation::name).collect()
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    /// Run every rule in order, stopping at the first violation.
    ///
    /// Rules after a failing rule are never executed.
    pub fn run(&self) -> Result<(), RuleFailure> {
        for invocation in &self.invocations {
            debug!(rule = invocation.name(), "performing validation");
            invocation.execute().map_err(|violation| RuleFailure {
                rule: invocation.name(),
                violation,
            })?;
            debug!(rule = invocation.name(), "successfully completed validation");
        }
        Ok(())
    }
}
