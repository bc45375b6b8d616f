//! Guard-clause commands - "invoke this member with this value here"
//!
//! A command fixes a member, its owner, a valid baseline argument list and
//! one requested parameter. Executing it with a value replaces that
//! parameter's argument and invokes the member. Commands also know how to
//! describe a failure against the requested parameter.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, FailureKind, GuardClauseFailure, Result};
use crate::metadata::{
    unwrap_one_level, DataType, Fault, Instance, InvocationError, MemberUnderTest, ParameterInfo,
};
use crate::substitution::{closed_parameters, SubstitutedInvocation};

/// Everything needed to call a member with valid arguments
#[derive(Debug, Clone)]
pub struct MemberBinding {
    pub member: MemberUnderTest,
    /// `None` for constructors and static members
    pub owner: Option<Instance>,
    pub arguments: Vec<Instance>,
    /// Declaring type's type arguments first, then the member's own
    pub type_args: Vec<DataType>,
    /// Generic parameter name to closed type
    pub closed: BTreeMap<String, DataType>,
}

impl MemberBinding {
    /// A binding for a non-generic member
    pub fn new(member: MemberUnderTest, owner: Option<Instance>, arguments: Vec<Instance>) -> Self {
        MemberBinding {
            member,
            owner,
            arguments,
            type_args: Vec::new(),
            closed: BTreeMap::new(),
        }
    }

    pub fn with_type_args(mut self, type_args: Vec<DataType>, closed: BTreeMap<String, DataType>) -> Self {
        self.type_args = type_args;
        self.closed = closed;
        self
    }

    pub fn parameters(&self) -> Vec<ParameterInfo> {
        closed_parameters(&self.member, &self.closed)
    }

    /// Invoke with an explicit argument list
    pub fn invoke(&self, arguments: &[Instance]) -> std::result::Result<Instance, InvocationError> {
        self.member
            .invoke(self.owner.as_ref(), arguments, &self.type_args)
    }
}

/// A member call with one requested parameter left open
pub trait GuardClauseCommand {
    fn member(&self) -> &MemberUnderTest;

    /// The requested parameter, generic parameters closed
    fn parameter(&self) -> &ParameterInfo;

    /// Invoke the member with `value` in the requested position
    fn execute(&self, value: Instance) -> std::result::Result<Instance, InvocationError>;

    fn requested_type(&self) -> &DataType {
        &self.parameter().data_type
    }

    fn requested_parameter_name(&self) -> &str {
        &self.parameter().name
    }

    /// Diagnostic naming the member and the requested parameter
    fn create_failure(
        &self,
        kind: FailureKind,
        value: &Instance,
        expected: &str,
        cause: Option<Fault>,
        deferred: bool,
    ) -> GuardClauseFailure {
        let member = self.member();
        GuardClauseFailure {
            kind,
            member: member.to_string(),
            declaring_type: member.declaring_type().to_string(),
            is_static: member.is_static(),
            parameter: Some(self.requested_parameter_name().to_string()),
            parameter_type: Some(self.requested_type().clone()),
            value: value.to_string(),
            expected: expected.to_string(),
            cause,
            deferred,
        }
    }
}

/// Invokes a bound member directly
#[derive(Debug, Clone)]
pub struct MemberInvokeCommand {
    binding: Arc<MemberBinding>,
    index: usize,
    parameter: ParameterInfo,
}

impl MemberInvokeCommand {
    /// # Errors
    /// `ArgumentInvalid` when `index` is not a parameter position of the member.
    pub fn new(binding: Arc<MemberBinding>, index: usize) -> Result<Self> {
        let parameter = binding.parameters().into_iter().nth(index).ok_or_else(|| {
            Error::argument_invalid(
                "index",
                format!("{} has no parameter at position {}", binding.member, index),
            )
        })?;
        Ok(MemberInvokeCommand {
            binding,
            index,
            parameter,
        })
    }

    pub fn for_substitution(binding: Arc<MemberBinding>, substitution: &SubstitutedInvocation) -> Result<Self> {
        Self::new(binding, substitution.parameter_index)
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl GuardClauseCommand for MemberInvokeCommand {
    fn member(&self) -> &MemberUnderTest {
        &self.binding.member
    }

    fn parameter(&self) -> &ParameterInfo {
        &self.parameter
    }

    fn execute(&self, value: Instance) -> std::result::Result<Instance, InvocationError> {
        let mut arguments = self.binding.arguments.clone();
        let found = arguments.len();
        match arguments.get_mut(self.index) {
            Some(slot) => *slot = value,
            None => {
                return Err(InvocationError::ParameterCountMismatch {
                    member: self.binding.member.to_string(),
                    expected: self.binding.parameters().len(),
                    found,
                })
            }
        }
        self.binding.invoke(&arguments)
    }
}

/// Strips the reflective invocation wrapper off whatever the inner command
/// raises
#[derive(Debug, Clone)]
pub struct ReflectionExceptionUnwrappingCommand<C> {
    inner: C,
}

impl<C: GuardClauseCommand> ReflectionExceptionUnwrappingCommand<C> {
    pub fn new(inner: C) -> Self {
        ReflectionExceptionUnwrappingCommand { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: GuardClauseCommand> GuardClauseCommand for ReflectionExceptionUnwrappingCommand<C> {
    fn member(&self) -> &MemberUnderTest {
        self.inner.member()
    }

    fn parameter(&self) -> &ParameterInfo {
        self.inner.parameter()
    }

    fn execute(&self, value: Instance) -> std::result::Result<Instance, InvocationError> {
        self.inner.execute(value).map_err(unwrap_one_level)
    }
}
