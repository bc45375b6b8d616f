//! Engine configuration
//!
//! [`EngineConfig`] is owned by each assertion; nothing here is global.
//! [`EngineSettings`] is its serializable description, for loading a
//! configuration from JSON.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::convention::{
    CompositeConventionFactory, ConventionFactory, EmptySentinelConventionFactory,
    ReferenceTypeConventionFactory, StringConventionFactory, ValueTypeConventionFactory,
};
use crate::error::{Error, Result};
use crate::expectation::{
    BehaviorExpectation, CompositeBehaviorExpectation, EmptySentinelBehaviorExpectation,
    EmptyStringBehaviorExpectation, NullReferenceBehaviorExpectation,
    WhitespaceStringBehaviorExpectation,
};

/// How each parameter is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Substitution engine plus the behaviors' own predicates
    #[default]
    Conventions,
    /// Each parameter is handed to the composite behavior expectation
    Expectations,
}

/// Lifetime of synthesized dynamic types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// One synchronized cache for every pass of an assertion
    #[default]
    Shared,
    /// A fresh cache for every `verify_*` call
    PerPass,
}

/// Configuration owned by one assertion
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub conventions: CompositeConventionFactory,
    pub expectation: CompositeBehaviorExpectation,
    pub strategy: Strategy,
    pub cache: CachePolicy,
}

impl EngineConfig {
    pub fn with_conventions(mut self, conventions: CompositeConventionFactory) -> Self {
        self.conventions = conventions;
        self
    }

    pub fn with_expectation(mut self, expectation: CompositeBehaviorExpectation) -> Self {
        self.expectation = expectation;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_cache_policy(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    /// Build a configuration from its serialized description.
    ///
    /// # Errors
    /// `Settings` when a convention or expectation kind is listed twice.
    pub fn from_settings(settings: &EngineSettings) -> Result<Self> {
        let conventions = unique("convention", &settings.conventions)?
            .into_iter()
            .map(ConventionKind::factory)
            .collect();
        let expectations = unique("expectation", &settings.expectations)?
            .into_iter()
            .map(ExpectationKind::expectation)
            .collect();
        Ok(EngineConfig {
            conventions: CompositeConventionFactory::new(conventions),
            expectation: CompositeBehaviorExpectation::new(expectations),
            strategy: settings.strategy,
            cache: settings.cache,
        })
    }
}

fn unique<T: Copy + Ord + std::fmt::Debug>(what: &str, kinds: &[T]) -> Result<Vec<T>> {
    let mut seen = BTreeSet::new();
    for kind in kinds {
        if !seen.insert(*kind) {
            return Err(Error::Settings(format!("{} {:?} is listed twice", what, kind)));
        }
    }
    Ok(kinds.to_vec())
}

/// Built-in convention factories, by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConventionKind {
    EmptySentinel,
    String,
    ValueType,
    ReferenceType,
}

impl ConventionKind {
    fn factory(self) -> Arc<dyn ConventionFactory> {
        match self {
            ConventionKind::EmptySentinel => Arc::new(EmptySentinelConventionFactory::new()),
            ConventionKind::String => Arc::new(StringConventionFactory),
            ConventionKind::ValueType => Arc::new(ValueTypeConventionFactory),
            ConventionKind::ReferenceType => Arc::new(ReferenceTypeConventionFactory),
        }
    }
}

/// Built-in behavior expectations, by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectationKind {
    NullReference,
    EmptySentinel,
    EmptyString,
    WhitespaceString,
}

impl ExpectationKind {
    fn expectation(self) -> Arc<dyn BehaviorExpectation> {
        match self {
            ExpectationKind::NullReference => Arc::new(NullReferenceBehaviorExpectation),
            ExpectationKind::EmptySentinel => Arc::new(EmptySentinelBehaviorExpectation::new()),
            ExpectationKind::EmptyString => Arc::new(EmptyStringBehaviorExpectation),
            ExpectationKind::WhitespaceString => Arc::new(WhitespaceStringBehaviorExpectation),
        }
    }
}

/// Serializable description of an [`EngineConfig`]; missing fields take the
/// defaults
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    pub conventions: Vec<ConventionKind>,
    pub expectations: Vec<ExpectationKind>,
    pub strategy: Strategy,
    pub cache: CachePolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            conventions: vec![
                ConventionKind::EmptySentinel,
                ConventionKind::String,
                ConventionKind::ValueType,
                ConventionKind::ReferenceType,
            ],
            expectations: vec![
                ExpectationKind::NullReference,
                ExpectationKind::EmptySentinel,
                ExpectationKind::EmptyString,
                ExpectationKind::WhitespaceString,
            ],
            strategy: Strategy::default(),
            cache: CachePolicy::default(),
        }
    }
}

impl EngineSettings {
    /// # Errors
    /// `Settings` when the JSON is malformed or names an unknown kind.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Settings(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Settings(e.to_string()))
    }
}
