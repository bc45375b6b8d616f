//! Invoke / unwrap / diagnose pipeline
//!
//! # States
//!
//! 1. **Invoke** the command with the invalid value
//! 2. **No fault**: a deferred sequence result is enumerated to the end, since
//!    a guard inside a generator body only runs then. Still no fault means a
//!    missing guard.
//! 3. **Fault**: the command's unwrapping step has already exposed the cause;
//!    it is checked against the behavior's predicate.
//!
//! [`observe`] and [`classify`] never fail on a guard problem; [`diagnose`]
//! turns a failing classification into a [`GuardClauseFailure`].
//!
//! [`GuardClauseFailure`]: crate::error::GuardClauseFailure

use std::sync::Arc;

use tracing::debug;

use crate::command::{GuardClauseCommand, MemberBinding, MemberInvokeCommand, ReflectionExceptionUnwrappingCommand};
use crate::convention::BoundaryBehavior;
use crate::error::{Error, FailureKind, Result};
use crate::metadata::{Fault, Instance, InvocationError};
use crate::substitution::SubstitutedInvocation;

/// Outcome of one substituted invocation
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Classification {
    /// The expected fault was raised by the call itself
    CorrectGuard,
    /// The expected fault surfaced while enumerating the returned sequence
    DeferredCorrectGuard,
    /// No fault at all
    MissingGuard { deferred: bool },
    /// A fault, but not the expected one
    WrongErrorKind { observed: Fault, deferred: bool },
}

impl Classification {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Classification::CorrectGuard | Classification::DeferredCorrectGuard
        )
    }
}

/// What happened when a command ran
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Returned { deferred: bool },
    Raised { fault: Fault, deferred: bool },
}

/// Run `command` with `value`, forcing deferred results.
///
/// # Errors
/// `HostInvocation` when the host could not perform the call at all.
pub fn observe(command: &dyn GuardClauseCommand, value: Instance) -> Result<Observation> {
    match command.execute(value) {
        Ok(Instance::Sequence(sequence)) if sequence.is_deferred() => Ok(match sequence.force() {
            Ok(_) => Observation::Returned { deferred: true },
            Err(fault) => Observation::Raised {
                fault,
                deferred: true,
            },
        }),
        Ok(_) => Ok(Observation::Returned { deferred: false }),
        Err(InvocationError::Raised(fault)) => Ok(Observation::Raised {
            fault,
            deferred: false,
        }),
        Err(InvocationError::Enumeration(fault)) => Ok(Observation::Raised {
            fault,
            deferred: true,
        }),
        // still wrapped: the command does not unwrap, so the wrapper is what
        // the caller observes
        Err(wrapped @ InvocationError::TargetInvocation(_)) => Ok(Observation::Raised {
            fault: Fault::other("TargetInvocation", wrapped.to_string()),
            deferred: false,
        }),
        Err(source) => Err(Error::HostInvocation {
            member: command.member().to_string(),
            source,
        }),
    }
}

pub fn classify<F>(observation: Observation, accepts: F) -> Classification
where
    F: Fn(&Fault) -> bool,
{
    match observation {
        Observation::Returned { deferred } => Classification::MissingGuard { deferred },
        Observation::Raised { fault, deferred } if accepts(&fault) => {
            if deferred {
                Classification::DeferredCorrectGuard
            } else {
                Classification::CorrectGuard
            }
        }
        Observation::Raised { fault, deferred } => Classification::WrongErrorKind {
            observed: fault,
            deferred,
        },
    }
}

/// Raise the diagnostic a failing classification calls for
pub fn diagnose(
    command: &dyn GuardClauseCommand,
    value: &Instance,
    expected: &str,
    classification: &Classification,
) -> Result<()> {
    match classification {
        Classification::CorrectGuard | Classification::DeferredCorrectGuard => Ok(()),
        Classification::MissingGuard { deferred } => Err(command
            .create_failure(FailureKind::MissingGuard, value, expected, None, *deferred)
            .into()),
        Classification::WrongErrorKind { observed, deferred } => Err(command
            .create_failure(
                FailureKind::WrongGuard,
                value,
                expected,
                Some(observed.clone()),
                *deferred,
            )
            .into()),
    }
}

/// Observe and classify `command` against one boundary behavior
pub fn verify_command(command: &dyn GuardClauseCommand, behavior: &BoundaryBehavior) -> Result<Classification> {
    let observation = observe(command, behavior.invalid_value().clone())?;
    let parameter = command.parameter();
    let classification = classify(observation, |fault| behavior.is_satisfied_by(fault, parameter));
    debug!(
        member = %command.member(),
        parameter = %parameter.name,
        behavior = behavior.description(),
        ?classification,
        "substitution classified"
    );
    Ok(classification)
}

/// Verify `command` against `behavior`, failing on anything but a guard
pub fn guard(command: &dyn GuardClauseCommand, behavior: &BoundaryBehavior) -> Result<Classification> {
    let classification = verify_command(command, behavior)?;
    diagnose(command, behavior.invalid_value(), behavior.expected(), &classification)?;
    Ok(classification)
}

/// The unwrapping command the assertion runs for one substitution
pub fn command_for(
    binding: &Arc<MemberBinding>,
    substitution: &SubstitutedInvocation,
) -> Result<ReflectionExceptionUnwrappingCommand<MemberInvokeCommand>> {
    MemberInvokeCommand::for_substitution(Arc::clone(binding), substitution)
        .map(ReflectionExceptionUnwrappingCommand::new)
}
