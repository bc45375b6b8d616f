//! Members under test - constructors, methods and property setters
//!
//! A member is invoked with a full positional argument list. Faults raised by
//! its body come back wrapped in [`InvocationError::TargetInvocation`], the
//! way a reflective host wraps exceptions thrown through an invoke call;
//! [`unwrap_one_level`] strips that wrapper.

use std::fmt;
use std::sync::Arc;

use super::instance::{Fault, Instance, ObjectRef};
use super::{DataType, GenericParameter};

/// Executable body of a member
pub type MemberBody = Arc<dyn Fn(&Call<'_>) -> Result<Instance, Fault> + Send + Sync>;

static NULL: Instance = Instance::Null;

/// Everything a member body sees when it runs
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    /// Owner instance; the fresh object for constructors, `None` for statics
    pub target: Option<&'a Instance>,
    pub args: &'a [Instance],
    /// Closed type arguments: declaring type's first, then the method's own
    pub type_args: &'a [DataType],
}

impl<'a> Call<'a> {
    /// Positional argument; out-of-range positions read as null
    pub fn arg(&self, index: usize) -> &'a Instance {
        self.args.get(index).unwrap_or(&NULL)
    }

    /// The owner object, or `NullReference` when there is none
    pub fn this(&self) -> Result<&'a ObjectRef, Fault> {
        match self.target {
            Some(target) => target.require_object(),
            None => Err(Fault::null_reference()),
        }
    }

    pub fn type_arg(&self, index: usize) -> Option<&'a DataType> {
        self.type_args.get(index)
    }
}

// ── Parameters ────────────────────────────────────────────

/// Data flow direction of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    In,
    /// Passed by reference; read and written
    Ref,
    /// Written only; carries no input to guard
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub data_type: DataType,
    pub direction: Direction,
}

impl ParameterInfo {
    pub fn input(name: impl Into<String>, data_type: DataType) -> Self {
        ParameterInfo {
            name: name.into(),
            data_type,
            direction: Direction::In,
        }
    }

    pub fn by_ref(name: impl Into<String>, data_type: DataType) -> Self {
        ParameterInfo {
            name: name.into(),
            data_type,
            direction: Direction::Ref,
        }
    }

    pub fn output(name: impl Into<String>, data_type: DataType) -> Self {
        ParameterInfo {
            name: name.into(),
            data_type,
            direction: Direction::Out,
        }
    }

    pub fn is_out(&self) -> bool {
        self.direction == Direction::Out
    }
}

impl fmt::Display for ParameterInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.direction {
            Direction::In => write!(f, "{} {}", self.data_type, self.name),
            Direction::Ref => write!(f, "ref {} {}", self.data_type, self.name),
            Direction::Out => write!(f, "out {} {}", self.data_type, self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Visibility {
    Public,
    /// Reachable from derived types only
    Protected,
    Private,
}

// ── Members ───────────────────────────────────────────────

pub struct ConstructorInfo {
    pub declaring_type: String,
    pub parameters: Vec<ParameterInfo>,
    pub visibility: Visibility,
    body: MemberBody,
}

impl ConstructorInfo {
    /// The body receives the fresh object as `Call::target` and initializes it
    pub fn new(parameters: Vec<ParameterInfo>, body: MemberBody) -> Self {
        ConstructorInfo {
            declaring_type: String::new(),
            parameters,
            visibility: Visibility::Public,
            body,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

impl fmt::Debug for ConstructorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorInfo")
            .field("declaring_type", &self.declaring_type)
            .field("parameters", &self.parameters)
            .field("visibility", &self.visibility)
            .finish_non_exhaustive()
    }
}

pub struct MethodInfo {
    pub name: String,
    pub declaring_type: String,
    pub parameters: Vec<ParameterInfo>,
    pub return_type: DataType,
    pub generic_parameters: Vec<GenericParameter>,
    pub is_static: bool,
    pub is_abstract: bool,
    pub visibility: Visibility,
    body: Option<MemberBody>,
}

impl MethodInfo {
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<ParameterInfo>,
        return_type: DataType,
        body: MemberBody,
    ) -> Self {
        MethodInfo {
            name: name.into(),
            declaring_type: String::new(),
            parameters,
            return_type,
            generic_parameters: Vec::new(),
            is_static: false,
            is_abstract: false,
            visibility: Visibility::Public,
            body: Some(body),
        }
    }

    /// A method without a body, as declared by an interface or abstract class
    pub fn abstract_method(
        name: impl Into<String>,
        parameters: Vec<ParameterInfo>,
        return_type: DataType,
    ) -> Self {
        MethodInfo {
            name: name.into(),
            declaring_type: String::new(),
            parameters,
            return_type,
            generic_parameters: Vec::new(),
            is_static: false,
            is_abstract: true,
            visibility: Visibility::Public,
            body: None,
        }
    }

    pub fn with_generic_parameter(mut self, param: GenericParameter) -> Self {
        self.generic_parameters.push(param);
        self
    }

    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// `Equals(Object)` overrides belong to the equality assertion, not here
    pub fn is_equals_override(&self) -> bool {
        !self.is_static
            && self.name == "Equals"
            && self.parameters.len() == 1
            && self.parameters[0].data_type == DataType::Object
    }
}

impl fmt::Debug for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInfo")
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("parameters", &self.parameters)
            .field("return_type", &self.return_type)
            .field("generic_parameters", &self.generic_parameters)
            .field("is_static", &self.is_static)
            .field("is_abstract", &self.is_abstract)
            .finish_non_exhaustive()
    }
}

pub struct PropertyInfo {
    pub name: String,
    pub declaring_type: String,
    pub data_type: DataType,
    pub is_static: bool,
    pub is_abstract: bool,
    /// Whether the property accepts writes (for abstract properties, whether
    /// implementations must provide a setter)
    pub settable: bool,
    pub getter: Option<MemberBody>,
    pub setter: Option<MemberBody>,
}

impl PropertyInfo {
    pub fn read_only(name: impl Into<String>, data_type: DataType, getter: MemberBody) -> Self {
        PropertyInfo {
            name: name.into(),
            declaring_type: String::new(),
            data_type,
            is_static: false,
            is_abstract: false,
            settable: false,
            getter: Some(getter),
            setter: None,
        }
    }

    /// The setter receives the new value as its single argument
    pub fn read_write(
        name: impl Into<String>,
        data_type: DataType,
        getter: MemberBody,
        setter: MemberBody,
    ) -> Self {
        PropertyInfo {
            name: name.into(),
            declaring_type: String::new(),
            data_type,
            is_static: false,
            is_abstract: false,
            settable: true,
            getter: Some(getter),
            setter: Some(setter),
        }
    }

    pub fn abstract_property(name: impl Into<String>, data_type: DataType, settable: bool) -> Self {
        PropertyInfo {
            name: name.into(),
            declaring_type: String::new(),
            data_type,
            is_static: false,
            is_abstract: true,
            settable,
            getter: None,
            setter: None,
        }
    }

    pub fn static_member(mut self) -> Self {
        self.is_static = true;
        self
    }
}

impl fmt::Debug for PropertyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyInfo")
            .field("name", &self.name)
            .field("declaring_type", &self.declaring_type)
            .field("data_type", &self.data_type)
            .field("is_static", &self.is_static)
            .field("is_abstract", &self.is_abstract)
            .field("settable", &self.settable)
            .finish_non_exhaustive()
    }
}

// ── Member Under Test ─────────────────────────────────────

/// Host-level invocation failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvocationError {
    /// Reflective wrapper around a fault raised by the member body
    #[error("exception has been thrown by the target of an invocation: {0}")]
    TargetInvocation(Fault),

    /// Fault raised directly, or exposed by [`unwrap_one_level`]
    #[error("{0}")]
    Raised(Fault),

    /// Fault raised while enumerating a deferred sequence the member returned
    #[error("fault raised while enumerating the returned sequence: {0}")]
    Enumeration(Fault),

    #[error("parameter count mismatch for {member}: expected {expected}, found {found}")]
    ParameterCountMismatch {
        member: String,
        expected: usize,
        found: usize,
    },

    #[error("non-static member {member} requires an owner instance")]
    MissingTarget { member: String },

    #[error("member {member} has no body to invoke")]
    NotInvocable { member: String },
}

impl InvocationError {
    /// The underlying fault, once no wrapper is left around it
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            InvocationError::Raised(fault) | InvocationError::Enumeration(fault) => Some(fault),
            _ => None,
        }
    }

    /// True when the fault surfaced during forced enumeration
    pub fn is_deferred(&self) -> bool {
        matches!(self, InvocationError::Enumeration(_))
    }
}

/// Strip one reflective invocation wrapper. Anything else passes through.
pub fn unwrap_one_level(error: InvocationError) -> InvocationError {
    match error {
        InvocationError::TargetInvocation(fault) => InvocationError::Raised(fault),
        other => other,
    }
}

/// Any member kind the assertion can exercise, behind one invoke capability
#[derive(Debug, Clone)]
pub enum MemberUnderTest {
    Constructor(Arc<ConstructorInfo>),
    Method(Arc<MethodInfo>),
    /// The setter of a property
    Property(Arc<PropertyInfo>),
}

impl MemberUnderTest {
    pub fn name(&self) -> &str {
        match self {
            MemberUnderTest::Constructor(_) => ".ctor",
            MemberUnderTest::Method(m) => &m.name,
            MemberUnderTest::Property(p) => &p.name,
        }
    }

    pub fn declaring_type(&self) -> &str {
        match self {
            MemberUnderTest::Constructor(c) => &c.declaring_type,
            MemberUnderTest::Method(m) => &m.declaring_type,
            MemberUnderTest::Property(p) => &p.declaring_type,
        }
    }

    /// Ordered parameters, matching the invocation signature exactly.
    /// A property setter has one parameter named `value`.
    pub fn parameters(&self) -> Vec<ParameterInfo> {
        match self {
            MemberUnderTest::Constructor(c) => c.parameters.clone(),
            MemberUnderTest::Method(m) => m.parameters.clone(),
            MemberUnderTest::Property(p) => vec![ParameterInfo::input("value", p.data_type.clone())],
        }
    }

    /// Generic parameters the member declares itself
    pub fn generic_parameters(&self) -> &[GenericParameter] {
        match self {
            MemberUnderTest::Method(m) => &m.generic_parameters,
            _ => &[],
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            MemberUnderTest::Constructor(_) => false,
            MemberUnderTest::Method(m) => m.is_static,
            MemberUnderTest::Property(p) => p.is_static,
        }
    }

    pub fn requires_owner(&self) -> bool {
        !matches!(self, MemberUnderTest::Constructor(_)) && !self.is_static()
    }

    /// Declared return type; constructors return their declaring class
    pub fn return_type(&self) -> DataType {
        match self {
            MemberUnderTest::Constructor(c) => DataType::Class(c.declaring_type.clone()),
            MemberUnderTest::Method(m) => m.return_type.clone(),
            MemberUnderTest::Property(_) => DataType::Void,
        }
    }

    pub fn is_equals_override(&self) -> bool {
        matches!(self, MemberUnderTest::Method(m) if m.is_equals_override())
    }

    pub fn is_abstract(&self) -> bool {
        match self {
            MemberUnderTest::Constructor(_) => false,
            MemberUnderTest::Method(m) => m.is_abstract || m.body.is_none(),
            MemberUnderTest::Property(p) => p.is_abstract || p.setter.is_none(),
        }
    }

    /// Invoke the member with a full argument list.
    ///
    /// # Errors
    /// Body faults are wrapped in `TargetInvocation`; arity and owner
    /// problems are reported unwrapped.
    pub fn invoke(
        &self,
        owner: Option<&Instance>,
        args: &[Instance],
        type_args: &[DataType],
    ) -> Result<Instance, InvocationError> {
        let expected = match self {
            MemberUnderTest::Constructor(c) => c.parameters.len(),
            MemberUnderTest::Method(m) => m.parameters.len(),
            MemberUnderTest::Property(_) => 1,
        };
        if args.len() != expected {
            return Err(InvocationError::ParameterCountMismatch {
                member: self.to_string(),
                expected,
                found: args.len(),
            });
        }
        if self.requires_owner() && owner.is_none() {
            return Err(InvocationError::MissingTarget {
                member: self.to_string(),
            });
        }
        let owner = if self.is_static() { None } else { owner };

        match self {
            MemberUnderTest::Constructor(c) => {
                let created = Instance::Object(ObjectRef::new(c.declaring_type.clone()));
                let call = Call {
                    target: Some(&created),
                    args,
                    type_args,
                };
                (c.body)(&call).map_err(InvocationError::TargetInvocation)?;
                Ok(created)
            }
            MemberUnderTest::Method(m) => {
                let body = m.body.as_ref().ok_or_else(|| InvocationError::NotInvocable {
                    member: self.to_string(),
                })?;
                let call = Call {
                    target: owner,
                    args,
                    type_args,
                };
                body(&call).map_err(InvocationError::TargetInvocation)
            }
            MemberUnderTest::Property(p) => {
                let setter = p.setter.as_ref().ok_or_else(|| InvocationError::NotInvocable {
                    member: self.to_string(),
                })?;
                let call = Call {
                    target: owner,
                    args,
                    type_args,
                };
                setter(&call).map_err(InvocationError::TargetInvocation)
            }
        }
    }
}

impl fmt::Display for MemberUnderTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static() {
            write!(f, "static ")?;
        }
        match self {
            MemberUnderTest::Property(p) => {
                write!(f, "{}::{} (setter of {})", p.declaring_type, p.name, p.data_type)
            }
            _ => {
                write!(f, "{}::{}", self.declaring_type(), self.name())?;
                let generics = self.generic_parameters();
                if !generics.is_empty() {
                    let names: Vec<&str> = generics.iter().map(|g| g.name.as_str()).collect();
                    write!(f, "<{}>", names.join(", "))?;
                }
                let params: Vec<String> = self.parameters().iter().map(|p| p.to_string()).collect();
                write!(f, "({})", params.join(", "))
            }
        }
    }
}
