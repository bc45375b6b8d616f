//! Parameter substitution - one candidate call per (parameter, invalid value)
//!
//! Given a member, a valid baseline argument list and the convention
//! registry, [`substitutions_for`] emits the argument lists the pipeline will
//! try. Each differs from the baseline at exactly one position.
//!
//! Ordering is parameter index ascending, then behavior registration order,
//! so "the Nth substitution" of a member is reproducible.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::convention::{BoundaryBehavior, CompositeConventionFactory};
use crate::error::{Error, Result};
use crate::metadata::{DataType, Instance, MemberUnderTest, ParameterInfo};

/// One member call with one parameter overridden by an invalid value
#[derive(Debug, Clone)]
pub struct SubstitutedInvocation {
    pub parameter_index: usize,
    /// The overridden parameter, with generic parameters closed
    pub parameter: ParameterInfo,
    pub behavior: BoundaryBehavior,
    /// Full argument list: the baseline with the invalid value at
    /// `parameter_index`
    pub arguments: Vec<Instance>,
}

impl SubstitutedInvocation {
    pub fn invalid_value(&self) -> &Instance {
        self.behavior.invalid_value()
    }

    /// Positions at which `arguments` differ from `baseline`
    pub fn differing_positions(&self, baseline: &[Instance]) -> Vec<usize> {
        self.arguments
            .iter()
            .zip(baseline)
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Parameters of `member` with its generic parameters closed by `closed`
pub fn closed_parameters(member: &MemberUnderTest, closed: &BTreeMap<String, DataType>) -> Vec<ParameterInfo> {
    member
        .parameters()
        .into_iter()
        .map(|mut p| {
            p.data_type = p.data_type.close(closed);
            p
        })
        .collect()
}

/// Build every substituted invocation for `member`.
///
/// `out` parameters are skipped, as is every position whose type has no
/// boundary behaviors. `Equals(Object)` overrides yield nothing. A behavior
/// whose invalid value the parameter type cannot hold is dropped with a
/// warning.
///
/// # Errors
/// `ArgumentInvalid` when `baseline` does not match the member's arity.
pub fn substitutions_for(
    member: &MemberUnderTest,
    closed: &BTreeMap<String, DataType>,
    baseline: &[Instance],
    conventions: &CompositeConventionFactory,
) -> Result<Vec<SubstitutedInvocation>> {
    if member.is_equals_override() {
        debug!(member = %member, "equality override, no substitutions");
        return Ok(Vec::new());
    }

    let parameters = closed_parameters(member, closed);
    if baseline.len() != parameters.len() {
        return Err(Error::argument_invalid(
            "baseline_args",
            format!(
                "{} takes {} argument(s), baseline has {}",
                member,
                parameters.len(),
                baseline.len()
            ),
        ));
    }

    let mut substitutions = Vec::new();
    for (index, parameter) in parameters.into_iter().enumerate() {
        if parameter.is_out() {
            continue;
        }
        let convention = conventions.get_convention(&parameter.data_type);
        for behavior in convention.behaviors() {
            if !parameter.data_type.accepts(behavior.invalid_value()) {
                warn!(
                    member = %member,
                    parameter = %parameter.name,
                    value = %behavior.invalid_value(),
                    "boundary value not assignable to parameter type, dropped"
                );
                continue;
            }
            let mut arguments = baseline.to_vec();
            arguments[index] = behavior.invalid_value().clone();
            substitutions.push(SubstitutedInvocation {
                parameter_index: index,
                parameter: parameter.clone(),
                behavior: behavior.clone(),
                arguments,
            });
        }
    }
    Ok(substitutions)
}
