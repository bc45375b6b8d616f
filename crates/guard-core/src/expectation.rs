//! Behavior expectations - narrowly scoped guard policies
//!
//! Each expectation looks at a command's requested type. When the type is
//! outside its scope it does nothing; otherwise it runs the command with its
//! own invalid value and checks the fault with its own predicate, without
//! consulting the convention registry.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::command::GuardClauseCommand;
use crate::convention::BoundaryBehavior;
use crate::error::Result;
use crate::metadata::{DataType, Instance};
use crate::pipeline;

/// Policy deciding which fault a command must raise, and checking it did
pub trait BehaviorExpectation: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    /// A guard clause failure when the command did not guard as expected.
    fn verify(&self, command: &dyn GuardClauseCommand) -> Result<()>;
}

/// Null for reference-typed parameters, expecting a null-argument fault
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReferenceBehaviorExpectation;

impl BehaviorExpectation for NullReferenceBehaviorExpectation {
    fn name(&self) -> &str {
        "null_reference"
    }

    fn verify(&self, command: &dyn GuardClauseCommand) -> Result<()> {
        if !command.requested_type().is_reference_type() {
            return Ok(());
        }
        pipeline::guard(command, &BoundaryBehavior::null_reference()).map(|_| ())
    }
}

/// The logical-empty value of sentinel-bearing types
#[derive(Debug, Clone)]
pub struct EmptySentinelBehaviorExpectation {
    sentinels: Vec<(DataType, Instance)>,
}

impl EmptySentinelBehaviorExpectation {
    pub fn new() -> Self {
        EmptySentinelBehaviorExpectation {
            sentinels: vec![(DataType::Identifier, Instance::Identifier(Uuid::nil()))],
        }
    }

    pub fn with_sentinel(mut self, data_type: DataType, sentinel: Instance) -> Self {
        self.sentinels.retain(|(ty, _)| *ty != data_type);
        self.sentinels.push((data_type, sentinel));
        self
    }
}

impl Default for EmptySentinelBehaviorExpectation {
    fn default() -> Self {
        Self::new()
    }
}

impl BehaviorExpectation for EmptySentinelBehaviorExpectation {
    fn name(&self) -> &str {
        "empty_sentinel"
    }

    fn verify(&self, command: &dyn GuardClauseCommand) -> Result<()> {
        let requested = command.requested_type();
        match self.sentinels.iter().find(|(ty, _)| ty == requested) {
            Some((_, sentinel)) => {
                pipeline::guard(command, &BoundaryBehavior::empty_sentinel(sentinel.clone())).map(|_| ())
            }
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyStringBehaviorExpectation;

impl BehaviorExpectation for EmptyStringBehaviorExpectation {
    fn name(&self) -> &str {
        "empty_string"
    }

    fn verify(&self, command: &dyn GuardClauseCommand) -> Result<()> {
        if *command.requested_type() != DataType::Str {
            return Ok(());
        }
        pipeline::guard(command, &BoundaryBehavior::empty_string()).map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceStringBehaviorExpectation;

impl BehaviorExpectation for WhitespaceStringBehaviorExpectation {
    fn name(&self) -> &str {
        "whitespace_string"
    }

    fn verify(&self, command: &dyn GuardClauseCommand) -> Result<()> {
        if *command.requested_type() != DataType::Str {
            return Ok(());
        }
        pipeline::guard(command, &BoundaryBehavior::whitespace_string()).map(|_| ())
    }
}

/// Runs its expectations in registration order; the first failure wins
#[derive(Clone)]
pub struct CompositeBehaviorExpectation {
    expectations: Vec<Arc<dyn BehaviorExpectation>>,
}

impl CompositeBehaviorExpectation {
    pub fn new(expectations: Vec<Arc<dyn BehaviorExpectation>>) -> Self {
        CompositeBehaviorExpectation { expectations }
    }

    /// Null reference, empty sentinel, empty string, whitespace string
    pub fn defaults() -> Self {
        Self::new(vec![
            Arc::new(NullReferenceBehaviorExpectation),
            Arc::new(EmptySentinelBehaviorExpectation::new()),
            Arc::new(EmptyStringBehaviorExpectation),
            Arc::new(WhitespaceStringBehaviorExpectation),
        ])
    }

    pub fn push(&mut self, expectation: Arc<dyn BehaviorExpectation>) {
        self.expectations.push(expectation);
    }

    pub fn names(&self) -> Vec<&str> {
        self.expectations.iter().map(|e| e.name()).collect()
    }
}

impl Default for CompositeBehaviorExpectation {
    fn default() -> Self {
        Self::defaults()
    }
}

impl fmt::Debug for CompositeBehaviorExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeBehaviorExpectation")
            .field("expectations", &self.names())
            .finish()
    }
}

impl BehaviorExpectation for CompositeBehaviorExpectation {
    fn name(&self) -> &str {
        "composite"
    }

    fn verify(&self, command: &dyn GuardClauseCommand) -> Result<()> {
        for expectation in &self.expectations {
            expectation.verify(command)?;
        }
        Ok(())
    }
}
