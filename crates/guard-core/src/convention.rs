//! Boundary conventions - which invalid values to try for a data type
//!
//! A [`BoundaryBehavior`] is one check: an invalid value plus the fault a
//! guarded member must answer it with. A [`BoundaryConvention`] is the list of
//! behaviors for one type, produced by a [`ConventionFactory`]. The
//! [`CompositeConventionFactory`] asks every registered factory in order and
//! concatenates what they return.
//!
//! # Default Registry
//!
//! 1. **Empty sentinel** - types with a well-known empty value (the nil
//!    `Identifier`): one behavior expecting an invalid-argument fault
//! 2. **String** - null, empty and whitespace-only strings; whitespace must
//!    also name the parameter when the fault names one
//! 3. **Value type** - no behaviors
//! 4. **Reference type** - null, expecting a null-argument fault
//!
//! Resolution never fails: a type nobody claims yields no behaviors.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::metadata::{DataType, Fault, FaultKind, Instance, ParameterInfo};

/// Predicate deciding whether an observed fault is an acceptable guard
pub type FaultPredicate = Arc<dyn Fn(&Fault, &ParameterInfo) -> bool + Send + Sync>;

// ── Boundary Behavior ─────────────────────────────────────

/// One invalid value to try on a parameter
#[derive(Clone)]
pub struct BoundaryBehavior {
    invalid_value: Instance,
    description: String,
    expected: String,
    predicate: FaultPredicate,
}

impl BoundaryBehavior {
    /// # Arguments
    /// - `description` - short label for the behavior, e.g. `"null"`
    /// - `expected` - the fault a guard should raise, for diagnostics
    pub fn new(
        invalid_value: Instance,
        description: impl Into<String>,
        expected: impl Into<String>,
        predicate: FaultPredicate,
    ) -> Self {
        BoundaryBehavior {
            invalid_value,
            description: description.into(),
            expected: expected.into(),
            predicate,
        }
    }

    /// Null for a reference type; only a null-argument fault counts
    /// Null for a reference type. A fault naming some other parameter does
    /// not count.
    pub fn null_reference() -> Self {
        Self::new(
            Instance::Null,
            "null",
            "a NullArgument fault naming the parameter",
            Arc::new(|fault, parameter| {
                fault.kind == FaultKind::NullArgument
                    && fault
                        .param_name
                        .as_deref()
                        .map_or(true, |name| name == parameter.name)
            }),
        )
    }

    /// The logical-empty value of a sentinel-bearing type
    pub fn empty_sentinel(sentinel: Instance) -> Self {
        Self::new(
            sentinel,
            "empty sentinel",
            "an InvalidArgument fault",
            Arc::new(|fault, _| fault.kind.is_invalid_argument()),
        )
    }

    pub fn null_string() -> Self {
        Self::new(
            Instance::Null,
            "null",
            "a NullArgument or InvalidArgument fault",
            Arc::new(|fault, _| fault.kind.is_invalid_argument()),
        )
    }

    pub fn empty_string() -> Self {
        Self::new(
            Instance::str(""),
            "empty string",
            "a NullArgument or InvalidArgument fault",
            Arc::new(|fault, _| fault.kind.is_invalid_argument()),
        )
    }

    /// Whitespace-only string. When the fault names a parameter, it must be
    /// the one that received the value.
    pub fn whitespace_string() -> Self {
        Self::new(
            Instance::str("  "),
            "whitespace string",
            "a NullArgument or InvalidArgument fault naming the parameter",
            Arc::new(|fault, parameter| {
                fault.kind.is_invalid_argument()
                    && fault
                        .param_name
                        .as_deref()
                        .map_or(true, |name| name == parameter.name)
            }),
        )
    }

    pub fn invalid_value(&self) -> &Instance {
        &self.invalid_value
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn is_satisfied_by(&self, fault: &Fault, parameter: &ParameterInfo) -> bool {
        (self.predicate)(fault, parameter)
    }
}

impl fmt::Debug for BoundaryBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryBehavior")
            .field("invalid_value", &self.invalid_value)
            .field("description", &self.description)
            .field("expected", &self.expected)
            .finish_non_exhaustive()
    }
}

// ── Boundary Convention ───────────────────────────────────

/// Ordered behaviors for one data type. Empty is legal.
#[derive(Debug, Clone, Default)]
pub struct BoundaryConvention {
    behaviors: Vec<BoundaryBehavior>,
}

impl BoundaryConvention {
    pub fn new(behaviors: Vec<BoundaryBehavior>) -> Self {
        BoundaryConvention { behaviors }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn behaviors(&self) -> &[BoundaryBehavior] {
        &self.behaviors
    }

    pub fn len(&self) -> usize {
        self.behaviors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.behaviors.is_empty()
    }

    /// Append the behaviors of `other` whose invalid value is not already tried
    pub fn merge(&mut self, other: BoundaryConvention) {
        for behavior in other.behaviors {
            if !self
                .behaviors
                .iter()
                .any(|b| b.invalid_value == behavior.invalid_value)
            {
                self.behaviors.push(behavior);
            }
        }
    }
}

// ── Factories ─────────────────────────────────────────────

/// Maps a data type to its convention, or `None` when it does not apply
pub trait ConventionFactory: Send + Sync {
    fn name(&self) -> &str;

    fn convention_for(&self, data_type: &DataType) -> Option<BoundaryConvention>;
}

/// Types with a well-known logical-empty value
#[derive(Debug, Clone)]
pub struct EmptySentinelConventionFactory {
    sentinels: Vec<(DataType, Instance)>,
}

impl EmptySentinelConventionFactory {
    /// Knows the nil `Identifier`
    pub fn new() -> Self {
        EmptySentinelConventionFactory {
            sentinels: vec![(DataType::Identifier, Instance::Identifier(Uuid::nil()))],
        }
    }

    /// Register another sentinel, replacing an earlier one for the same type
    pub fn with_sentinel(mut self, data_type: DataType, sentinel: Instance) -> Self {
        self.sentinels.retain(|(ty, _)| *ty != data_type);
        self.sentinels.push((data_type, sentinel));
        self
    }
}

impl Default for EmptySentinelConventionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConventionFactory for EmptySentinelConventionFactory {
    fn name(&self) -> &str {
        "empty_sentinel"
    }

    fn convention_for(&self, data_type: &DataType) -> Option<BoundaryConvention> {
        self.sentinels
            .iter()
            .find(|(ty, _)| ty == data_type)
            .map(|(_, sentinel)| {
                BoundaryConvention::new(vec![BoundaryBehavior::empty_sentinel(sentinel.clone())])
            })
    }
}

/// Null, empty and whitespace-only strings
#[derive(Debug, Clone, Copy, Default)]
pub struct StringConventionFactory;

impl ConventionFactory for StringConventionFactory {
    fn name(&self) -> &str {
        "string"
    }

    fn convention_for(&self, data_type: &DataType) -> Option<BoundaryConvention> {
        (*data_type == DataType::Str).then(|| {
            BoundaryConvention::new(vec![
                BoundaryBehavior::null_string(),
                BoundaryBehavior::empty_string(),
                BoundaryBehavior::whitespace_string(),
            ])
        })
    }
}

/// Value types without a sentinel have nothing to try
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueTypeConventionFactory;

impl ConventionFactory for ValueTypeConventionFactory {
    fn name(&self) -> &str {
        "value_type"
    }

    fn convention_for(&self, data_type: &DataType) -> Option<BoundaryConvention> {
        data_type.is_value_type().then(BoundaryConvention::empty)
    }
}

/// Catch-all for reference types: null
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceTypeConventionFactory;

impl ConventionFactory for ReferenceTypeConventionFactory {
    fn name(&self) -> &str {
        "reference_type"
    }

    fn convention_for(&self, data_type: &DataType) -> Option<BoundaryConvention> {
        data_type
            .is_reference_type()
            .then(|| BoundaryConvention::new(vec![BoundaryBehavior::null_reference()]))
    }
}

/// Factory built from a type predicate and a builder closure
pub struct FnConventionFactory {
    name: String,
    matches: Arc<dyn Fn(&DataType) -> bool + Send + Sync>,
    build: Arc<dyn Fn(&DataType) -> BoundaryConvention + Send + Sync>,
}

impl FnConventionFactory {
    pub fn new<M, B>(name: impl Into<String>, matches: M, build: B) -> Self
    where
        M: Fn(&DataType) -> bool + Send + Sync + 'static,
        B: Fn(&DataType) -> BoundaryConvention + Send + Sync + 'static,
    {
        FnConventionFactory {
            name: name.into(),
            matches: Arc::new(matches),
            build: Arc::new(build),
        }
    }
}

impl ConventionFactory for FnConventionFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn convention_for(&self, data_type: &DataType) -> Option<BoundaryConvention> {
        (self.matches)(data_type).then(|| (self.build)(data_type))
    }
}

/// Registry of factories consulted in registration order
#[derive(Clone)]
pub struct CompositeConventionFactory {
    factories: Vec<Arc<dyn ConventionFactory>>,
}

impl CompositeConventionFactory {
    pub fn new(factories: Vec<Arc<dyn ConventionFactory>>) -> Self {
        CompositeConventionFactory { factories }
    }

    /// Sentinel, string, value type, reference type
    pub fn defaults() -> Self {
        Self::new(vec![
            Arc::new(EmptySentinelConventionFactory::new()),
            Arc::new(StringConventionFactory),
            Arc::new(ValueTypeConventionFactory),
            Arc::new(ReferenceTypeConventionFactory),
        ])
    }

    /// Register a factory after the existing ones
    pub fn push(&mut self, factory: Arc<dyn ConventionFactory>) {
        self.factories.push(factory);
    }

    pub fn factory_names(&self) -> Vec<&str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    /// Concatenated behaviors of every matching factory; a later behavior for an
    /// invalid value already tried is dropped.
    pub fn get_convention(&self, data_type: &DataType) -> BoundaryConvention {
        let mut convention = BoundaryConvention::empty();
        for factory in &self.factories {
            if let Some(found) = factory.convention_for(data_type) {
                convention.merge(found);
            }
        }
        convention
    }
}

impl Default for CompositeConventionFactory {
    fn default() -> Self {
        Self::defaults()
    }
}

impl fmt::Debug for CompositeConventionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeConventionFactory")
            .field("factories", &self.factory_names())
            .finish()
    }
}

impl ConventionFactory for CompositeConventionFactory {
    fn name(&self) -> &str {
        "composite"
    }

    fn convention_for(&self, data_type: &DataType) -> Option<BoundaryConvention> {
        let matched = self
            .factories
            .iter()
            .any(|f| f.convention_for(data_type).is_some());
        matched.then(|| self.get_convention(data_type))
    }
}
