//! Runtime values - what members under test receive, return and raise
//!
//! `Instance` plays the role the executor's `Value` plays for contract state:
//! a closed set of runtime shapes with a human-readable `Display`, used both
//! as arguments to members and as the invalid values boundary behaviors
//! inject.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::synthesis::DynamicInstance;

// ── Faults ────────────────────────────────────────────────

/// Category of failure raised by a member under test
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FaultKind {
    /// A required argument was null
    NullArgument,
    /// An argument was rejected as invalid
    InvalidArgument,
    /// An argument fell outside its accepted range
    ArgumentOutOfRange,
    /// A null value was dereferenced (no guard, the body simply crashed)
    NullReference,
    /// The member could not run in the current state
    InvalidOperation,
    /// Any other named failure
    Other(String),
}

impl FaultKind {
    /// True for the invalid-argument family, which includes null-argument
    /// and out-of-range faults.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            FaultKind::NullArgument | FaultKind::InvalidArgument | FaultKind::ArgumentOutOfRange
        )
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FaultKind::NullArgument => write!(f, "NullArgument"),
            FaultKind::InvalidArgument => write!(f, "InvalidArgument"),
            FaultKind::ArgumentOutOfRange => write!(f, "ArgumentOutOfRange"),
            FaultKind::NullReference => write!(f, "NullReference"),
            FaultKind::InvalidOperation => write!(f, "InvalidOperation"),
            FaultKind::Other(name) => write!(f, "{}", name),
        }
    }
}

/// A failure raised by the body of a member under test
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fault {
    pub kind: FaultKind,
    /// Name of the parameter the fault refers to, when the member supplied one
    pub param_name: Option<String>,
    pub message: String,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.param_name {
            Some(ref name) => write!(f, "{} ({}): {}", self.kind, name, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for Fault {}

impl Fault {
    pub fn null_argument(param: impl Into<String>) -> Self {
        let param = param.into();
        Fault {
            kind: FaultKind::NullArgument,
            message: format!("value cannot be null (parameter '{}')", param),
            param_name: Some(param),
        }
    }

    pub fn invalid_argument(param: impl Into<String>, message: impl Into<String>) -> Self {
        Fault {
            kind: FaultKind::InvalidArgument,
            param_name: Some(param.into()),
            message: message.into(),
        }
    }

    pub fn out_of_range(param: impl Into<String>, message: impl Into<String>) -> Self {
        Fault {
            kind: FaultKind::ArgumentOutOfRange,
            param_name: Some(param.into()),
            message: message.into(),
        }
    }

    pub fn null_reference() -> Self {
        Fault {
            kind: FaultKind::NullReference,
            param_name: None,
            message: "object reference not set to an instance".into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Fault {
            kind: FaultKind::InvalidOperation,
            param_name: None,
            message: message.into(),
        }
    }

    pub fn other(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Fault {
            kind: FaultKind::Other(kind.into()),
            param_name: None,
            message: message.into(),
        }
    }

    /// True when the fault names exactly `param`
    pub fn refers_to(&self, param: &str) -> bool {
        self.param_name.as_deref() == Some(param)
    }
}

// ── Objects ───────────────────────────────────────────────

/// A constructed object: its type name plus mutable named fields.
///
/// Fields use a `BTreeMap` so that debug output stays deterministic.
#[derive(Debug)]
pub struct Object {
    type_name: String,
    fields: Mutex<BTreeMap<String, Instance>>,
}

/// Shared handle to an [`Object`]. Equality is identity.
#[derive(Debug, Clone)]
pub struct ObjectRef(Arc<Object>);

impl ObjectRef {
    pub fn new(type_name: impl Into<String>) -> Self {
        ObjectRef(Arc::new(Object {
            type_name: type_name.into(),
            fields: Mutex::new(BTreeMap::new()),
        }))
    }

    pub fn type_name(&self) -> &str {
        &self.0.type_name
    }

    pub fn get(&self, field: &str) -> Option<Instance> {
        self.0.fields.lock().get(field).cloned()
    }

    /// Set a field value, returning the previous value
    pub fn set(&self, field: impl Into<String>, value: Instance) -> Option<Instance> {
        self.0.fields.lock().insert(field.into(), value)
    }

    pub fn same_object(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ── Sequences ─────────────────────────────────────────────

/// Iterator produced by one enumeration of a [`Sequence`]
pub type SequenceIter = Box<dyn Iterator<Item = Result<Instance, Fault>> + Send>;

type Generator = Arc<dyn Fn() -> SequenceIter + Send + Sync>;

/// A sequence returned by a member, either materialized or lazily generated.
///
/// A deferred sequence runs its generator on every enumeration, so a guard
/// placed inside the generator only fires once somebody consumes it.
#[derive(Clone)]
pub enum Sequence {
    Eager(Vec<Instance>),
    Deferred(Generator),
}

impl Sequence {
    pub fn eager(items: Vec<Instance>) -> Self {
        Sequence::Eager(items)
    }

    pub fn deferred<F, I>(generator: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: Iterator<Item = Result<Instance, Fault>> + Send + 'static,
    {
        Sequence::Deferred(Arc::new(move || Box::new(generator()) as SequenceIter))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Sequence::Deferred(_))
    }

    /// Start a fresh enumeration
    pub fn iter(&self) -> SequenceIter {
        match self {
            Sequence::Eager(items) => Box::new(items.clone().into_iter().map(Ok)),
            Sequence::Deferred(generator) => generator(),
        }
    }

    /// Enumerate to the end, returning the item count or the first fault.
    ///
    /// An endless generator never returns.
    pub fn force(&self) -> Result<usize, Fault> {
        let mut count = 0;
        for item in self.iter() {
            item?;
            count += 1;
        }
        Ok(count)
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sequence::Eager(items) => f.debug_tuple("Eager").field(items).finish(),
            Sequence::Deferred(_) => write!(f, "Deferred(..)"),
        }
    }
}

// ── Instance ──────────────────────────────────────────────

/// A runtime value handed to or returned from a member
#[derive(Debug, Clone)]
pub enum Instance {
    /// The null reference
    Null,
    /// Result of a member that returns nothing; placeholder for `out` slots
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Identifier(Uuid),
    Object(ObjectRef),
    Dynamic(Arc<DynamicInstance>),
    Sequence(Sequence),
}

impl Instance {
    pub fn str(value: impl Into<String>) -> Self {
        Instance::Str(value.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Instance::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Instance::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Instance::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_dynamic(&self) -> Option<&Arc<DynamicInstance>> {
        match self {
            Instance::Dynamic(dynamic) => Some(dynamic),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Instance::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// Short name of the runtime shape, for diagnostics
    pub fn kind_name(&self) -> &str {
        match self {
            Instance::Null => "Null",
            Instance::Unit => "Unit",
            Instance::Bool(_) => "Bool",
            Instance::Int(_) => "Int",
            Instance::Float(_) => "Float",
            Instance::Str(_) => "Str",
            Instance::Identifier(_) => "Identifier",
            Instance::Object(obj) => obj.type_name(),
            Instance::Dynamic(dynamic) => dynamic.type_name(),
            Instance::Sequence(_) => "Sequence",
        }
    }

    /// Dereference helper for member bodies: a null receiver raises
    /// `NullReference`, the way an unguarded body would crash.
    pub fn require_object(&self) -> Result<&ObjectRef, Fault> {
        match self {
            Instance::Object(obj) => Ok(obj),
            Instance::Null => Err(Fault::null_reference()),
            other => Err(Fault::invalid_operation(format!(
                "expected an object, found {}",
                other.kind_name()
            ))),
        }
    }

    /// String helper for member bodies, with the same null behavior
    pub fn require_str(&self) -> Result<&str, Fault> {
        match self {
            Instance::Str(s) => Ok(s),
            Instance::Null => Err(Fault::null_reference()),
            other => Err(Fault::invalid_operation(format!(
                "expected a string, found {}",
                other.kind_name()
            ))),
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Instance::Null, Instance::Null) | (Instance::Unit, Instance::Unit) => true,
            (Instance::Bool(a), Instance::Bool(b)) => a == b,
            (Instance::Int(a), Instance::Int(b)) => a == b,
            (Instance::Float(a), Instance::Float(b)) => a == b,
            (Instance::Str(a), Instance::Str(b)) => a == b,
            (Instance::Identifier(a), Instance::Identifier(b)) => a == b,
            (Instance::Object(a), Instance::Object(b)) => a.same_object(b),
            (Instance::Dynamic(a), Instance::Dynamic(b)) => Arc::ptr_eq(a, b),
            (Instance::Sequence(Sequence::Eager(a)), Instance::Sequence(Sequence::Eager(b))) => {
                a == b
            }
            (
                Instance::Sequence(Sequence::Deferred(a)),
                Instance::Sequence(Sequence::Deferred(b)),
            ) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instance::Null => write!(f, "null"),
            Instance::Unit => write!(f, "()"),
            Instance::Bool(b) => write!(f, "{}", b),
            Instance::Int(i) => write!(f, "{}", i),
            Instance::Float(v) => write!(f, "{}", v),
            Instance::Str(s) => write!(f, "\"{}\"", s),
            Instance::Identifier(id) => write!(f, "{}", id),
            Instance::Object(obj) => write!(f, "<{}>", obj.type_name()),
            Instance::Dynamic(dynamic) => write!(f, "<{}>", dynamic.type_name()),
            Instance::Sequence(Sequence::Eager(items)) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Instance::Sequence(Sequence::Deferred(_)) => write!(f, "<deferred sequence>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_family() {
        assert!(FaultKind::NullArgument.is_invalid_argument());
        assert!(FaultKind::InvalidArgument.is_invalid_argument());
        assert!(FaultKind::ArgumentOutOfRange.is_invalid_argument());
        assert!(!FaultKind::NullReference.is_invalid_argument());
        assert!(!FaultKind::Other("IoError".into()).is_invalid_argument());
    }

    #[test]
    fn test_fault_refers_to_parameter() {
        let fault = Fault::null_argument("name");
        assert!(fault.refers_to("name"));
        assert!(!fault.refers_to("other"));
        assert!(!Fault::null_reference().refers_to("name"));
    }

    #[test]
    fn test_object_identity_equality() {
        let a = ObjectRef::new("Order");
        let b = ObjectRef::new("Order");
        assert_eq!(Instance::Object(a.clone()), Instance::Object(a.clone()));
        assert_ne!(Instance::Object(a), Instance::Object(b));
    }

    #[test]
    fn test_object_fields() {
        let obj = ObjectRef::new("Order");
        assert_eq!(obj.set("id", Instance::Int(1)), None);
        assert_eq!(obj.set("id", Instance::Int(2)), Some(Instance::Int(1)));
        assert_eq!(obj.get("id"), Some(Instance::Int(2)));
    }

    #[test]
    fn test_deferred_sequence_runs_generator_per_enumeration() {
        let seq = Sequence::deferred(|| vec![Ok(Instance::Int(1)), Ok(Instance::Int(2))].into_iter());
        assert!(seq.is_deferred());
        assert_eq!(seq.force(), Ok(2));
        assert_eq!(seq.force(), Ok(2));
    }

    #[test]
    fn test_force_surfaces_fault() {
        let seq = Sequence::deferred(|| std::iter::once(Err(Fault::null_argument("s"))));
        assert_eq!(seq.force(), Err(Fault::null_argument("s")));
    }

    #[test]
    fn test_require_helpers() {
        assert_eq!(Instance::Null.require_str(), Err(Fault::null_reference()));
        assert_eq!(Instance::str("x").require_str(), Ok("x"));
        assert!(Instance::Int(3).require_object().is_err());
    }

    #[test]
    fn test_instance_display() {
        assert_eq!(Instance::Null.to_string(), "null");
        assert_eq!(Instance::str("  ").to_string(), "\"  \"");
        assert_eq!(Instance::Identifier(Uuid::nil()).to_string(), "00000000-0000-0000-0000-000000000000");
        assert_eq!(
            Instance::Sequence(Sequence::eager(vec![Instance::Int(1), Instance::Int(2)])).to_string(),
            "[1, 2]"
        );
    }
}
