//! Host type model - the metadata the engine introspects
//!
//! Guard clause verification needs to enumerate the constructors, methods and
//! settable properties of a type, inspect their parameters, and invoke them
//! with an arbitrary argument list. This module is the explicit description
//! of that surface: callers build `TypeInfo` values (usually in test code),
//! collect them into an `Assembly`, and hand them to the assertion.
//!
//! # Layout
//!
//! - [`DataType`] - declared type of a parameter, property or return value
//! - [`instance`] - runtime values and the faults members raise
//! - [`member`] - constructors, methods, properties and their invocation
//! - [`TypeInfo`] / [`Assembly`] - types and their grouping

pub mod instance;
pub mod member;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use instance::{Fault, FaultKind, Instance, ObjectRef, Sequence};
pub use member::{
    Call, ConstructorInfo, Direction, InvocationError, MemberBody, MemberUnderTest, MethodInfo,
    ParameterInfo, PropertyInfo, Visibility, unwrap_one_level,
};

// ── Data Types ────────────────────────────────────────────

/// Declared type of a parameter, property or return value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum DataType {
    /// Root reference type every class derives from
    Object,
    Bool,
    Int,
    Float,
    Str,
    /// 128-bit identifier with a nil sentinel
    Identifier,
    /// User-defined value type
    Struct(String),
    /// User-defined reference type
    Class(String),
    Interface(String),
    /// Sequence of items, possibly lazily generated
    Sequence(Box<DataType>),
    /// Unresolved generic type parameter
    GenericParameter(String),
    /// Type synthesized at verification time
    Dynamic(String),
    Void,
}

impl DataType {
    pub fn class(name: impl Into<String>) -> Self {
        DataType::Class(name.into())
    }

    pub fn interface(name: impl Into<String>) -> Self {
        DataType::Interface(name.into())
    }

    pub fn generic(name: impl Into<String>) -> Self {
        DataType::GenericParameter(name.into())
    }

    pub fn sequence_of(item: DataType) -> Self {
        DataType::Sequence(Box::new(item))
    }

    /// True for types whose values may be null
    pub fn is_reference_type(&self) -> bool {
        matches!(
            self,
            DataType::Object
                | DataType::Str
                | DataType::Class(_)
                | DataType::Interface(_)
                | DataType::Sequence(_)
                | DataType::Dynamic(_)
        )
    }

    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
            DataType::Bool
                | DataType::Int
                | DataType::Float
                | DataType::Identifier
                | DataType::Struct(_)
        )
    }

    /// True when the type still mentions a generic parameter
    pub fn is_open(&self) -> bool {
        match self {
            DataType::GenericParameter(_) => true,
            DataType::Sequence(item) => item.is_open(),
            _ => false,
        }
    }

    /// True when the generic parameter `name` occurs in this type
    pub fn mentions(&self, name: &str) -> bool {
        match self {
            DataType::GenericParameter(own) => own == name,
            DataType::Sequence(item) => item.mentions(name),
            _ => false,
        }
    }

    /// Replace generic parameters with their closed arguments.
    /// Parameters missing from `args` stay open.
    pub fn close(&self, args: &BTreeMap<String, DataType>) -> DataType {
        match self {
            DataType::GenericParameter(name) => {
                args.get(name).cloned().unwrap_or_else(|| self.clone())
            }
            DataType::Sequence(item) => DataType::Sequence(Box::new(item.close(args))),
            other => other.clone(),
        }
    }

    /// Assignability of a runtime value to this declared type.
    ///
    /// Nominal types are checked by name only; the engine does not walk
    /// inheritance here.
    pub fn accepts(&self, value: &Instance) -> bool {
        match (self, value) {
            (DataType::Void, Instance::Unit) => true,
            (DataType::Object, _) => !matches!(value, Instance::Unit),
            (ty, Instance::Null) => ty.is_reference_type(),
            (DataType::Bool, Instance::Bool(_)) => true,
            (DataType::Int, Instance::Int(_)) => true,
            (DataType::Float, Instance::Float(_)) => true,
            (DataType::Str, Instance::Str(_)) => true,
            (DataType::Identifier, Instance::Identifier(_)) => true,
            (DataType::Sequence(_), Instance::Sequence(_)) => true,
            (DataType::Struct(name), Instance::Object(obj))
            | (DataType::Class(name), Instance::Object(obj)) => obj.type_name() == name,
            (DataType::Interface(name), Instance::Dynamic(dynamic))
            | (DataType::Class(name), Instance::Dynamic(dynamic)) => dynamic.implements(name),
            (DataType::Dynamic(name), Instance::Dynamic(dynamic)) => dynamic.type_name() == name,
            _ => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataType::Object => write!(f, "Object"),
            DataType::Bool => write!(f, "Bool"),
            DataType::Int => write!(f, "Int"),
            DataType::Float => write!(f, "Float"),
            DataType::Str => write!(f, "String"),
            DataType::Identifier => write!(f, "Identifier"),
            DataType::Struct(name)
            | DataType::Class(name)
            | DataType::Interface(name)
            | DataType::GenericParameter(name)
            | DataType::Dynamic(name) => write!(f, "{}", name),
            DataType::Sequence(item) => write!(f, "Sequence<{}>", item),
            DataType::Void => write!(f, "Void"),
        }
    }
}

// ── Generics ──────────────────────────────────────────────

/// A constraint on a generic type parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Constraint {
    /// Argument must be a reference type
    ReferenceType,
    /// Argument must be a value type
    ValueType,
    /// Argument must have a public parameterless constructor
    DefaultConstructor,
    /// Argument must implement the named interface
    Implements(String),
    /// Argument must derive from the named class
    DerivesFrom(String),
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GenericParameter {
    pub name: String,
    pub constraints: Vec<Constraint>,
}

impl GenericParameter {
    pub fn new(name: impl Into<String>) -> Self {
        GenericParameter {
            name: name.into(),
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Interfaces and base class the argument must satisfy, if any
    pub fn nominal_constraints(&self) -> (Option<&str>, Vec<&str>) {
        let mut base = None;
        let mut interfaces = Vec::new();
        for constraint in &self.constraints {
            match constraint {
                Constraint::DerivesFrom(name) => base = Some(name.as_str()),
                Constraint::Implements(name) => interfaces.push(name.as_str()),
                _ => {}
            }
        }
        (base, interfaces)
    }
}

// ── Types ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    /// A class with static members only; it has no constructors or owner
    StaticClass,
}

/// Description of one type: its shape and its members
#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: String,
    pub kind: TypeKind,
    pub is_abstract: bool,
    pub generic_parameters: Vec<GenericParameter>,
    pub base: Option<String>,
    pub interfaces: Vec<String>,
    pub constructors: Vec<Arc<ConstructorInfo>>,
    pub methods: Vec<Arc<MethodInfo>>,
    pub properties: Vec<Arc<PropertyInfo>>,
}

impl TypeInfo {
    fn with_kind(name: impl Into<String>, kind: TypeKind) -> Self {
        TypeInfo {
            name: name.into(),
            kind,
            is_abstract: kind == TypeKind::Interface,
            generic_parameters: Vec::new(),
            base: None,
            interfaces: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Class)
    }

    pub fn abstract_class(name: impl Into<String>) -> Self {
        let mut info = Self::with_kind(name, TypeKind::Class);
        info.is_abstract = true;
        info
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Struct)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Interface)
    }

    pub fn static_class(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::StaticClass)
    }

    pub fn with_generic_parameter(mut self, param: GenericParameter) -> Self {
        self.generic_parameters.push(param);
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn with_constructor(mut self, mut ctor: ConstructorInfo) -> Self {
        ctor.declaring_type = self.name.clone();
        self.constructors.push(Arc::new(ctor));
        self
    }

    pub fn with_method(mut self, mut method: MethodInfo) -> Self {
        method.declaring_type = self.name.clone();
        if self.kind == TypeKind::Interface {
            method.is_abstract = true;
        }
        if self.kind == TypeKind::StaticClass {
            method.is_static = true;
        }
        self.methods.push(Arc::new(method));
        self
    }

    pub fn with_property(mut self, mut property: PropertyInfo) -> Self {
        property.declaring_type = self.name.clone();
        if self.kind == TypeKind::StaticClass {
            property.is_static = true;
        }
        self.properties.push(Arc::new(property));
        self
    }

    /// Declared type a member of this type refers to itself with
    pub fn data_type(&self) -> DataType {
        match self.kind {
            TypeKind::Struct => DataType::Struct(self.name.clone()),
            TypeKind::Interface => DataType::Interface(self.name.clone()),
            TypeKind::Class | TypeKind::StaticClass => DataType::Class(self.name.clone()),
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.generic_parameters.is_empty()
    }

    /// Constructors a subclass or caller could reach
    pub fn accessible_constructors(&self) -> impl Iterator<Item = &Arc<ConstructorInfo>> {
        self.constructors
            .iter()
            .filter(|c| c.visibility != Visibility::Private)
    }

    /// Every member the guard clause assertion looks at: constructors of
    /// concrete types, public methods and public properties with a setter.
    pub fn members(&self) -> Vec<MemberUnderTest> {
        let mut members = Vec::new();
        if !self.is_abstract && self.kind != TypeKind::StaticClass {
            members.extend(
                self.constructors
                    .iter()
                    .filter(|c| c.visibility == Visibility::Public)
                    .map(|c| MemberUnderTest::Constructor(Arc::clone(c))),
            );
        }
        members.extend(
            self.methods
                .iter()
                .filter(|m| m.visibility == Visibility::Public)
                .map(|m| MemberUnderTest::Method(Arc::clone(m))),
        );
        members.extend(
            self.properties
                .iter()
                .filter(|p| p.setter.is_some())
                .map(|p| MemberUnderTest::Property(Arc::clone(p))),
        );
        members
    }
}

// ── Assembly ──────────────────────────────────────────────

/// Named, ordered collection of types.
///
/// Order of registration is kept so that verification walks types
/// deterministically.
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub name: String,
    types: Vec<Arc<TypeInfo>>,
    index: BTreeMap<String, usize>,
}

impl Assembly {
    pub fn new(name: impl Into<String>) -> Self {
        Assembly {
            name: name.into(),
            types: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    /// Register a type, replacing an earlier type of the same name
    pub fn register(&mut self, info: TypeInfo) -> Arc<TypeInfo> {
        let info = Arc::new(info);
        match self.index.get(&info.name) {
            Some(&slot) => self.types[slot] = Arc::clone(&info),
            None => {
                self.index.insert(info.name.clone(), self.types.len());
                self.types.push(Arc::clone(&info));
            }
        }
        info
    }

    pub fn with_type(mut self, info: TypeInfo) -> Self {
        self.register(info);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeInfo>> {
        self.index.get(name).map(|&slot| &self.types[slot])
    }

    pub fn types(&self) -> &[Arc<TypeInfo>] {
        &self.types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Every interface `name` extends, itself included, depth first
    pub fn interface_closure(&self, name: &str) -> Vec<String> {
        let mut seen = Vec::new();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            if seen.contains(&current) {
                continue;
            }
            if let Some(info) = self.get(&current) {
                for parent in info.interfaces.iter().rev() {
                    stack.push(parent.clone());
                }
            }
            seen.push(current);
        }
        seen
    }
}
