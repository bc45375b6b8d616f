//! Composite idiomatic-assertion dispatch
//!
//! Every convention-style assertion verifies members; the trait supplies the
//! fan-out from assemblies, type lists, types and member lists down to
//! single members, so an implementation only has to provide
//! [`IdiomaticAssertion::verify_member`].

use std::sync::Arc;

use crate::error::Result;
use crate::metadata::{Assembly, MemberUnderTest, TypeInfo};

/// Anything an assertion can be pointed at
#[derive(Debug, Clone, Copy)]
pub enum VerificationTarget<'a> {
    Assembly(&'a Assembly),
    Types(&'a [Arc<TypeInfo>]),
    Type(&'a TypeInfo),
    Members(&'a [MemberUnderTest]),
    Member(&'a MemberUnderTest),
}

impl<'a> From<&'a Assembly> for VerificationTarget<'a> {
    fn from(assembly: &'a Assembly) -> Self {
        VerificationTarget::Assembly(assembly)
    }
}

impl<'a> From<&'a [Arc<TypeInfo>]> for VerificationTarget<'a> {
    fn from(types: &'a [Arc<TypeInfo>]) -> Self {
        VerificationTarget::Types(types)
    }
}

impl<'a> From<&'a TypeInfo> for VerificationTarget<'a> {
    fn from(info: &'a TypeInfo) -> Self {
        VerificationTarget::Type(info)
    }
}

impl<'a> From<&'a [MemberUnderTest]> for VerificationTarget<'a> {
    fn from(members: &'a [MemberUnderTest]) -> Self {
        VerificationTarget::Members(members)
    }
}

impl<'a> From<&'a MemberUnderTest> for VerificationTarget<'a> {
    fn from(member: &'a MemberUnderTest) -> Self {
        VerificationTarget::Member(member)
    }
}

/// A convention-style assertion over members.
///
/// All entry points are fail-fast: the first failing member stops the call.
pub trait IdiomaticAssertion {
    fn verify_member(&self, member: &MemberUnderTest) -> Result<()>;

    fn verify_members(&self, members: &[MemberUnderTest]) -> Result<()> {
        members.iter().try_for_each(|m| self.verify_member(m))
    }

    /// Constructors, methods and settable properties of `info`
    fn verify_type(&self, info: &TypeInfo) -> Result<()> {
        self.verify_members(&info.members())
    }

    fn verify_types(&self, types: &[Arc<TypeInfo>]) -> Result<()> {
        types.iter().try_for_each(|t| self.verify_type(t))
    }

    fn verify_assembly(&self, assembly: &Assembly) -> Result<()> {
        self.verify_types(assembly.types())
    }

    fn verify(&self, target: VerificationTarget<'_>) -> Result<()> {
        match target {
            VerificationTarget::Assembly(assembly) => self.verify_assembly(assembly),
            VerificationTarget::Types(types) => self.verify_types(types),
            VerificationTarget::Type(info) => self.verify_type(info),
            VerificationTarget::Members(members) => self.verify_members(members),
            VerificationTarget::Member(member) => self.verify_member(member),
        }
    }
}

/// Runs several assertions over the same target, in order
#[derive(Default)]
pub struct CompositeIdiomaticAssertion {
    assertions: Vec<Box<dyn IdiomaticAssertion>>,
}

impl CompositeIdiomaticAssertion {
    pub fn new(assertions: Vec<Box<dyn IdiomaticAssertion>>) -> Self {
        CompositeIdiomaticAssertion { assertions }
    }

    pub fn push(&mut self, assertion: Box<dyn IdiomaticAssertion>) {
        self.assertions.push(assertion);
    }

    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }
}

impl IdiomaticAssertion for CompositeIdiomaticAssertion {
    fn verify_member(&self, member: &MemberUnderTest) -> Result<()> {
        self.assertions.iter().try_for_each(|a| a.verify_member(member))
    }

    fn verify_members(&self, members: &[MemberUnderTest]) -> Result<()> {
        self.assertions.iter().try_for_each(|a| a.verify_members(members))
    }

    fn verify_type(&self, info: &TypeInfo) -> Result<()> {
        self.assertions.iter().try_for_each(|a| a.verify_type(info))
    }

    fn verify_types(&self, types: &[Arc<TypeInfo>]) -> Result<()> {
        self.assertions.iter().try_for_each(|a| a.verify_types(types))
    }

    fn verify_assembly(&self, assembly: &Assembly) -> Result<()> {
        self.assertions.iter().try_for_each(|a| a.verify_assembly(assembly))
    }
}
