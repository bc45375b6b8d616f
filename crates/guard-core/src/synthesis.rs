//! Dynamic instance synthesis - stand-in implementations of abstract contracts
//!
//! When a parameter is typed as an interface or an abstract class (directly,
//! or through a constrained generic parameter) the anonymous value source has
//! nothing to construct. The synthesizer builds a [`DynamicType`] for the
//! contract instead: a capability table listing every abstract member, backed
//! at call time by a value source.
//!
//! # Behavior of a synthesized instance
//!
//! - property reads return the last recorded write, or a fresh anonymous value
//! - property writes are recorded
//! - methods return an anonymous value of their (closed) return type; void
//!   methods do nothing
//! - concrete methods inherited from an abstract base run against a base
//!   object built through the base's most modest accessible constructor
//!
//! Synthesized types are memoized in a [`SynthesisCache`] keyed by the SHA-256
//! digest of the contract's canonical signature.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::anonymous::AnonymousValueSource;
use crate::error::CreationFailure;
use crate::metadata::{
    Assembly, Constraint, ConstructorInfo, DataType, Fault, GenericParameter, Instance,
    InvocationError, MemberUnderTest, MethodInfo, ObjectRef, PropertyInfo, TypeInfo, TypeKind,
};

// ── Contract Signature ────────────────────────────────────

/// The contract a synthesized type must satisfy: an optional base class and
/// a set of interfaces. Interfaces are kept sorted so equal contracts compare
/// and hash equal regardless of declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ContractSignature {
    base: Option<String>,
    interfaces: BTreeSet<String>,
}

impl ContractSignature {
    pub fn interface(name: impl Into<String>) -> Self {
        Self::default().with_interface(name)
    }

    pub fn derived_from(base: impl Into<String>) -> Self {
        Self::default().with_base(base)
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.insert(name.into());
        self
    }

    /// Contract implied by a generic parameter's nominal constraints, if any
    pub fn from_constraints(param: &GenericParameter) -> Option<Self> {
        let (base, interfaces) = param.nominal_constraints();
        if base.is_none() && interfaces.is_empty() {
            return None;
        }
        let mut signature = Self::default();
        if let Some(base) = base {
            signature = signature.with_base(base);
        }
        for interface in interfaces {
            signature = signature.with_interface(interface);
        }
        Some(signature)
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.interfaces.iter().map(String::as_str)
    }

    /// Canonical text form, the input of [`ContractSignature::digest`]
    pub fn canonical(&self) -> String {
        let interfaces: Vec<&str> = self.interfaces().collect();
        format!(
            "base:{}|interfaces:{}",
            self.base.as_deref().unwrap_or(""),
            interfaces.join(",")
        )
    }

    /// SHA-256 of the canonical form, lowercase hex
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Name given to the synthesized type, e.g. `Dummy<Shape+IComparable>`
    pub fn type_name(&self) -> String {
        let mut parts: Vec<&str> = self.base.iter().map(String::as_str).collect();
        parts.extend(self.interfaces());
        format!("Dummy<{}>", parts.join("+"))
    }
}

impl fmt::Display for ContractSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

// ── Dynamic Type ──────────────────────────────────────────

/// Capability table of a synthesized type
#[derive(Debug)]
pub struct DynamicType {
    name: String,
    signature: ContractSignature,
    digest: String,
    /// Base class followed by its ancestors
    base_chain: Vec<String>,
    base_constructor: Option<Arc<ConstructorInfo>>,
    /// Every interface implemented, transitively
    interfaces: Vec<String>,
    abstract_methods: Vec<Arc<MethodInfo>>,
    inherited_methods: Vec<Arc<MethodInfo>>,
    properties: Vec<Arc<PropertyInfo>>,
}

impl DynamicType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &ContractSignature {
        &self.signature
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn data_type(&self) -> DataType {
        DataType::Dynamic(self.name.clone())
    }

    /// True for the type's own name, any base class and any interface
    pub fn implements(&self, name: &str) -> bool {
        self.name == name
            || self.base_chain.iter().any(|b| b == name)
            || self.interfaces.iter().any(|i| i == name)
    }

    /// Members the synthesized type provides itself
    pub fn abstract_methods(&self) -> &[Arc<MethodInfo>] {
        &self.abstract_methods
    }

    pub fn properties(&self) -> &[Arc<PropertyInfo>] {
        &self.properties
    }

    fn find_method<'a>(
        methods: &'a [Arc<MethodInfo>],
        name: &str,
        arity: usize,
    ) -> Option<&'a Arc<MethodInfo>> {
        methods
            .iter()
            .find(|m| m.name == name && m.parameters.len() == arity)
    }
}

// ── Dynamic Instance ──────────────────────────────────────

/// A live instance of a [`DynamicType`]
pub struct DynamicInstance {
    dynamic_type: Arc<DynamicType>,
    base_object: Option<ObjectRef>,
    values: SynthesizingValueSource,
    recorded: Mutex<BTreeMap<String, Instance>>,
}

impl DynamicInstance {
    pub fn type_name(&self) -> &str {
        self.dynamic_type.name()
    }

    pub fn implements(&self, name: &str) -> bool {
        self.dynamic_type.implements(name)
    }

    pub fn dynamic_type(&self) -> &Arc<DynamicType> {
        &self.dynamic_type
    }

    /// Object the concrete base-class members run against
    pub fn base_object(&self) -> Option<&ObjectRef> {
        self.base_object.as_ref()
    }

    /// Read a property: the last recorded write, else a fresh anonymous value
    pub fn get_property(&self, name: &str) -> Result<Instance, Fault> {
        let property = self.property(name)?;
        if let Some(value) = self.recorded.lock().get(name) {
            return Ok(value.clone());
        }
        self.anonymous(&property.data_type)
    }

    pub fn set_property(&self, name: &str, value: Instance) -> Result<(), Fault> {
        let property = self.property(name)?;
        if !property.settable {
            return Err(Fault::invalid_operation(format!(
                "property '{}' of {} has no setter",
                name,
                self.type_name()
            )));
        }
        self.recorded.lock().insert(name.to_string(), value);
        Ok(())
    }

    /// Call a method by name.
    ///
    /// `type_args` close the method's own generic parameters, in declaration
    /// order.
    pub fn call(&self, method: &str, type_args: &[DataType], args: &[Instance]) -> Result<Instance, Fault> {
        let ty = &self.dynamic_type;
        if let Some(info) = DynamicType::find_method(&ty.abstract_methods, method, args.len()) {
            let closed: BTreeMap<String, DataType> = info
                .generic_parameters
                .iter()
                .map(|g| g.name.clone())
                .zip(type_args.iter().cloned())
                .collect();
            let return_type = info.return_type.close(&closed);
            if return_type == DataType::Void {
                return Ok(Instance::Unit);
            }
            if return_type.is_open() {
                return Err(Fault::invalid_operation(format!(
                    "{}::{} was called without closing its return type {}",
                    self.type_name(),
                    method,
                    return_type
                )));
            }
            return self.anonymous(&return_type);
        }

        if let Some(info) = DynamicType::find_method(&ty.inherited_methods, method, args.len()) {
            let owner = self.base_object.clone().map(Instance::Object);
            return MemberUnderTest::Method(Arc::clone(info))
                .invoke(owner.as_ref(), args, type_args)
                .map_err(|e| match e {
                    InvocationError::TargetInvocation(fault) => fault,
                    other => Fault::invalid_operation(other.to_string()),
                });
        }

        Err(Fault::invalid_operation(format!(
            "{} has no method '{}' taking {} argument(s)",
            self.type_name(),
            method,
            args.len()
        )))
    }

    fn property(&self, name: &str) -> Result<&Arc<PropertyInfo>, Fault> {
        self.dynamic_type
            .properties
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| {
                Fault::invalid_operation(format!("{} has no property '{}'", self.type_name(), name))
            })
    }

    fn anonymous(&self, data_type: &DataType) -> Result<Instance, Fault> {
        self.values
            .value_for(data_type)
            .map_err(|failure| Fault::other("CreationFailure", failure.to_string()))
    }
}

impl fmt::Debug for DynamicInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicInstance")
            .field("type", &self.dynamic_type.name)
            .field("base_object", &self.base_object)
            .field("recorded", &*self.recorded.lock())
            .finish()
    }
}

// ── Cache ─────────────────────────────────────────────────

/// Hit and miss counters of a [`SynthesisCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Synthesized types by contract digest.
///
/// Writes are synchronized and idempotent: when two callers synthesize the
/// same contract concurrently, the first insert wins and both get it.
#[derive(Debug, Default)]
pub struct SynthesisCache {
    entries: RwLock<HashMap<String, Arc<DynamicType>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SynthesisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, digest: &str) -> Option<Arc<DynamicType>> {
        self.entries.read().get(digest).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<DynamicType>> {
        self.entries
            .read()
            .values()
            .find(|t| t.name == name)
            .cloned()
    }

    /// Cached type for `digest`, building and inserting it on a miss
    pub fn get_or_try_insert<F>(&self, digest: &str, build: F) -> Result<Arc<DynamicType>, CreationFailure>
    where
        F: FnOnce() -> Result<DynamicType, CreationFailure>,
    {
        if let Some(found) = self.get(digest) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(digest, name = %found.name, "synthesis cache hit");
            return Ok(found);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let built = Arc::new(build()?);
        debug!(digest, name = %built.name, "synthesis cache miss");
        let mut entries = self.entries.write();
        Ok(Arc::clone(entries.entry(digest.to_string()).or_insert(built)))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

// ── Synthesizer ───────────────────────────────────────────

/// Builds and caches [`DynamicType`]s for the contracts of one [`Assembly`]
#[derive(Debug)]
pub struct DynamicInstanceSynthesizer {
    assembly: Arc<Assembly>,
    cache: SynthesisCache,
}

impl DynamicInstanceSynthesizer {
    pub fn new(assembly: Arc<Assembly>) -> Self {
        DynamicInstanceSynthesizer {
            assembly,
            cache: SynthesisCache::new(),
        }
    }

    pub fn assembly(&self) -> &Arc<Assembly> {
        &self.assembly
    }

    pub fn cache(&self) -> &SynthesisCache {
        &self.cache
    }

    /// The synthesized type for `signature`, from cache when possible.
    ///
    /// # Errors
    /// `CreationFailure` ("cannot create dummy type") naming the offending
    /// base type when it is unregistered, static, a value type, generic, or
    /// has no accessible constructor.
    pub fn synthesize(&self, signature: &ContractSignature) -> Result<Arc<DynamicType>, CreationFailure> {
        let digest = signature.digest();
        self.cache
            .get_or_try_insert(&digest, || self.build(signature, digest.clone()))
    }

    /// A synthesized type previously built under `name`
    pub fn find(&self, name: &str) -> Option<Arc<DynamicType>> {
        self.cache.find_by_name(name)
    }

    /// A fresh instance of `dynamic_type` whose outputs come from `values`
    pub fn instantiate(
        &self,
        dynamic_type: &Arc<DynamicType>,
        values: SynthesizingValueSource,
    ) -> Result<Instance, CreationFailure> {
        let base_object = match dynamic_type.base_constructor {
            Some(ref ctor) => Some(Self::construct_base(dynamic_type, ctor, &values)?),
            None => None,
        };
        Ok(Instance::Dynamic(Arc::new(DynamicInstance {
            dynamic_type: Arc::clone(dynamic_type),
            base_object,
            values,
            recorded: Mutex::new(BTreeMap::new()),
        })))
    }

    fn construct_base(
        dynamic_type: &DynamicType,
        ctor: &Arc<ConstructorInfo>,
        values: &SynthesizingValueSource,
    ) -> Result<ObjectRef, CreationFailure> {
        let member = MemberUnderTest::Constructor(Arc::clone(ctor));
        let mut args = Vec::new();
        for param in member.parameters() {
            if param.is_out() {
                args.push(Instance::Unit);
                continue;
            }
            let value = values.value_for(&param.data_type).map_err(|cause| {
                CreationFailure::new(dynamic_type.data_type(), "cannot create dummy type")
                    .for_parameter(member.to_string(), param.name.clone())
                    .caused_by(cause)
            })?;
            args.push(value);
        }
        let created = member.invoke(None, &args, &[]).map_err(|e| {
            CreationFailure::new(
                dynamic_type.data_type(),
                format!("cannot create dummy type: base constructor failed: {}", e),
            )
            .for_member(member.to_string())
        })?;
        created.as_object().cloned().ok_or_else(|| {
            CreationFailure::new(dynamic_type.data_type(), "base constructor produced no object")
        })
    }

    fn build(&self, signature: &ContractSignature, digest: String) -> Result<DynamicType, CreationFailure> {
        let name = signature.type_name();
        let mut ty = DynamicType {
            name: name.clone(),
            signature: signature.clone(),
            digest,
            base_chain: Vec::new(),
            base_constructor: None,
            interfaces: Vec::new(),
            abstract_methods: Vec::new(),
            inherited_methods: Vec::new(),
            properties: Vec::new(),
        };
        let mut pending_interfaces: Vec<String> = signature.interfaces().map(str::to_string).collect();

        if let Some(base) = signature.base() {
            let info = self.registered_base(base)?;
            if info.kind == TypeKind::Interface {
                pending_interfaces.push(base.to_string());
            } else {
                ty.base_constructor = info
                    .accessible_constructors()
                    .min_by_key(|c| c.parameters.len())
                    .cloned();
                if ty.base_constructor.is_none() {
                    return Err(CreationFailure::new(
                        DataType::class(base),
                        format!(
                            "cannot create dummy type {}: base type '{}' has no accessible constructor",
                            name, base
                        ),
                    ));
                }
                self.collect_base_chain(&mut ty, &mut pending_interfaces, info);
            }
        }

        let mut seen = BTreeSet::new();
        for root in pending_interfaces {
            for interface in self.assembly.interface_closure(&root) {
                if !seen.insert(interface.clone()) {
                    continue;
                }
                match self.assembly.get(&interface) {
                    Some(info) if info.kind == TypeKind::Interface => Self::add_abstract_members(&mut ty, info),
                    Some(_) => {
                        return Err(CreationFailure::new(
                            DataType::class(interface.clone()),
                            format!("cannot create dummy type {}: '{}' is not an interface", name, interface),
                        ))
                    }
                    None => {
                        return Err(CreationFailure::new(
                            DataType::interface(interface.clone()),
                            format!("cannot create dummy type {}: interface '{}' is not registered", name, interface),
                        ))
                    }
                }
                ty.interfaces.push(interface);
            }
        }
        Ok(ty)
    }

    fn registered_base(&self, base: &str) -> Result<&Arc<TypeInfo>, CreationFailure> {
        let refuse = |reason: &str| {
            Err(CreationFailure::new(
                DataType::class(base),
                format!("cannot create dummy type: base type '{}' {}", base, reason),
            ))
        };
        let Some(info) = self.assembly.get(base) else {
            return refuse("is not registered");
        };
        match info.kind {
            TypeKind::StaticClass => refuse("is a static class"),
            TypeKind::Struct => refuse("is a value type"),
            _ if info.is_generic() => refuse("is generic"),
            _ => Ok(info),
        }
    }

    fn collect_base_chain(&self, ty: &mut DynamicType, interfaces: &mut Vec<String>, base: &Arc<TypeInfo>) {
        let mut current = Some(Arc::clone(base));
        while let Some(info) = current {
            if ty.base_chain.contains(&info.name) {
                break;
            }
            ty.base_chain.push(info.name.clone());
            interfaces.extend(info.interfaces.iter().cloned());
            Self::add_abstract_members(ty, &info);
            for method in info.methods.iter().filter(|m| !m.is_abstract && !m.is_static) {
                if DynamicType::find_method(&ty.inherited_methods, &method.name, method.parameters.len()).is_none() {
                    ty.inherited_methods.push(Arc::clone(method));
                }
            }
            current = info.base.as_deref().and_then(|b| self.assembly.get(b)).cloned();
        }
    }

    fn add_abstract_members(ty: &mut DynamicType, info: &TypeInfo) {
        for method in info.methods.iter().filter(|m| m.is_abstract && !m.is_static) {
            if DynamicType::find_method(&ty.abstract_methods, &method.name, method.parameters.len()).is_none() {
                ty.abstract_methods.push(Arc::clone(method));
            }
        }
        for property in info.properties.iter().filter(|p| p.is_abstract && !p.is_static) {
            if !ty.properties.iter().any(|p| p.name == property.name) {
                ty.properties.push(Arc::clone(property));
            }
        }
    }
}

// ── Synthesizing Value Source ─────────────────────────────

/// Nested synthesis requests allowed before giving up on a cyclic contract
const MAX_NESTING: usize = 32;

/// Value source that answers interfaces and abstract classes by synthesis
/// when the wrapped source cannot construct them, including constructor
/// arguments nested inside ordinary objects.
///
/// Values frozen here stay local to this source and its clones; the wrapped
/// source never sees them. One pass owns one such source.
#[derive(Clone)]
pub struct SynthesizingValueSource {
    inner: Arc<dyn AnonymousValueSource>,
    synthesizer: Arc<DynamicInstanceSynthesizer>,
    frozen: Arc<Mutex<HashMap<DataType, Instance>>>,
    nesting: Arc<AtomicUsize>,
}

impl SynthesizingValueSource {
    pub fn new(inner: Arc<dyn AnonymousValueSource>, synthesizer: Arc<DynamicInstanceSynthesizer>) -> Self {
        SynthesizingValueSource {
            inner,
            synthesizer,
            frozen: Arc::new(Mutex::new(HashMap::new())),
            nesting: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Drop every value frozen into this source
    pub fn thaw(&self) {
        self.frozen.lock().clear();
    }

    pub fn synthesizer(&self) -> &Arc<DynamicInstanceSynthesizer> {
        &self.synthesizer
    }

    /// A fresh instance satisfying `signature`
    pub fn synthesize_instance(&self, signature: &ContractSignature) -> Result<Instance, CreationFailure> {
        let dynamic_type = self.synthesizer.synthesize(signature)?;
        self.synthesizer.instantiate(&dynamic_type, self.clone())
    }

    fn contract_for(&self, data_type: &DataType) -> Option<ContractSignature> {
        match data_type {
            DataType::Interface(name) => Some(ContractSignature::interface(name.clone())),
            DataType::Class(name) => self
                .synthesizer
                .assembly()
                .get(name)
                .filter(|info| info.is_abstract && info.kind == TypeKind::Class)
                .map(|_| ContractSignature::derived_from(name.clone())),
            _ => None,
        }
    }
}

impl AnonymousValueSource for SynthesizingValueSource {
    fn value_for(&self, data_type: &DataType) -> Result<Instance, CreationFailure> {
        if let Some(value) = self.frozen.lock().get(data_type) {
            return Ok(value.clone());
        }
        let nesting = self.nesting.fetch_add(1, Ordering::Relaxed);
        let result = if nesting >= MAX_NESTING {
            Err(CreationFailure::new(
                data_type.clone(),
                format!("synthesis nested more than {} levels deep", MAX_NESTING),
            ))
        } else {
            self.resolve(data_type)
        };
        self.nesting.fetch_sub(1, Ordering::Relaxed);
        result
    }

    fn freeze(&self, data_type: DataType, value: Instance) {
        self.frozen.lock().insert(data_type, value);
    }
}

impl SynthesizingValueSource {
    fn resolve(&self, data_type: &DataType) -> Result<Instance, CreationFailure> {
        let failure = match self.inner.value_with(data_type, self) {
            Ok(value) => return Ok(value),
            Err(failure) => failure,
        };
        if let DataType::Dynamic(name) = data_type {
            return match self.synthesizer.find(name) {
                Some(found) => self.synthesizer.instantiate(&found, self.clone()),
                None => Err(failure),
            };
        }
        match self.contract_for(data_type) {
            Some(signature) => self.synthesize_instance(&signature).map_err(|synthesis| {
                CreationFailure::new(data_type.clone(), "dummy type synthesis failed").caused_by(synthesis)
            }),
            None => Err(failure),
        }
    }
}

// ── Generic Stand-ins ─────────────────────────────────────

/// Representative closed types for generic parameters, chosen by constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericStandIns {
    /// Unconstrained, `ReferenceType` and `DefaultConstructor` parameters
    pub reference: DataType,
    /// `ValueType` parameters
    pub value: DataType,
}

impl Default for GenericStandIns {
    fn default() -> Self {
        GenericStandIns {
            reference: DataType::Object,
            value: DataType::Int,
        }
    }
}

impl GenericStandIns {
    /// Close one generic parameter.
    ///
    /// Interface or base-class constraints are satisfied by a synthesized
    /// type; everything else gets a stand-in.
    pub fn resolve(
        &self,
        param: &GenericParameter,
        synthesizer: &DynamicInstanceSynthesizer,
    ) -> Result<DataType, CreationFailure> {
        if let Some(signature) = ContractSignature::from_constraints(param) {
            return synthesizer
                .synthesize(&signature)
                .map(|ty| ty.data_type())
                .map_err(|cause| {
                    CreationFailure::new(
                        DataType::generic(param.name.clone()),
                        "dummy type synthesis failed",
                    )
                    .caused_by(cause)
                });
        }
        if param.constraints.contains(&Constraint::ValueType) {
            Ok(self.value.clone())
        } else {
            Ok(self.reference.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymous::SequentialValueSource;
    use crate::metadata::{GenericParameter, ParameterInfo, Visibility};

    fn shapes() -> Arc<Assembly> {
        let named = TypeInfo::interface("INamed")
            .with_property(PropertyInfo::abstract_property("Name", DataType::Str, true));
        let shape = TypeInfo::interface("IShape")
            .with_interface("INamed")
            .with_method(MethodInfo::abstract_method("Area", vec![], DataType::Float))
            .with_method(MethodInfo::abstract_method("Reset", vec![], DataType::Void))
            .with_method(
                MethodInfo::abstract_method("Convert", vec![], DataType::generic("U"))
                    .with_generic_parameter(GenericParameter::new("U")),
            );
        let polygon = TypeInfo::abstract_class("Polygon")
            .with_constructor(
                ConstructorInfo::new(
                    vec![ParameterInfo::input("sides", DataType::Int)],
                    Arc::new(|call| {
                        call.this()?.set("sides", call.arg(0).clone());
                        Ok(Instance::Unit)
                    }),
                )
                .with_visibility(Visibility::Protected),
            )
            .with_method(MethodInfo::abstract_method("Perimeter", vec![], DataType::Float))
            .with_method(MethodInfo::new(
                "Sides",
                vec![],
                DataType::Int,
                Arc::new(|call| Ok(call.this()?.get("sides").unwrap_or(Instance::Null))),
            ));
        let sealed = TypeInfo::abstract_class("Sealed").with_constructor(
            ConstructorInfo::new(vec![], Arc::new(|_| Ok(Instance::Unit)))
                .with_visibility(Visibility::Private),
        );
        Arc::new(
            Assembly::new("Shapes")
                .with_type(named)
                .with_type(shape)
                .with_type(polygon)
                .with_type(sealed),
        )
    }

    fn source(assembly: &Arc<Assembly>) -> SynthesizingValueSource {
        SynthesizingValueSource::new(
            Arc::new(SequentialValueSource::new(Arc::clone(assembly))),
            Arc::new(DynamicInstanceSynthesizer::new(Arc::clone(assembly))),
        )
    }

    #[test]
    fn test_signature_digest_ignores_interface_order() {
        let a = ContractSignature::interface("IA").with_interface("IB");
        let b = ContractSignature::interface("IB").with_interface("IA");
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
        assert_ne!(a.digest(), ContractSignature::interface("IA").digest());
        assert_eq!(
            ContractSignature::derived_from("Polygon").with_interface("IShape").type_name(),
            "Dummy<Polygon+IShape>"
        );
    }

    #[test]
    fn test_interface_instance_implements_whole_closure() {
        let assembly = shapes();
        let values = source(&assembly);
        let shape = values.value_for(&DataType::interface("IShape")).unwrap();
        let dynamic = shape.as_dynamic().unwrap();
        assert!(dynamic.implements("IShape"));
        assert!(dynamic.implements("INamed"));
        assert!(DataType::interface("INamed").accepts(&shape));
        assert!(matches!(dynamic.call("Area", &[], &[]), Ok(Instance::Float(_))));
        assert_eq!(dynamic.call("Reset", &[], &[]), Ok(Instance::Unit));
        assert!(dynamic.call("Missing", &[], &[]).is_err());
    }

    #[test]
    fn test_generic_method_closed_at_call_time() {
        let assembly = shapes();
        let shape = source(&assembly).value_for(&DataType::interface("IShape")).unwrap();
        let dynamic = shape.as_dynamic().unwrap();
        assert!(matches!(dynamic.call("Convert", &[DataType::Str], &[]), Ok(Instance::Str(_))));
        assert!(dynamic.call("Convert", &[], &[]).is_err());
    }

    #[test]
    fn test_properties_record_writes() {
        let assembly = shapes();
        let shape = source(&assembly).value_for(&DataType::interface("IShape")).unwrap();
        let dynamic = shape.as_dynamic().unwrap();
        assert!(matches!(dynamic.get_property("Name"), Ok(Instance::Str(_))));
        dynamic.set_property("Name", Instance::str("square")).unwrap();
        assert_eq!(dynamic.get_property("Name"), Ok(Instance::str("square")));
        assert!(dynamic.get_property("Color").is_err());
    }

    #[test]
    fn test_abstract_base_runs_inherited_members() {
        let assembly = shapes();
        let polygon = source(&assembly).value_for(&DataType::class("Polygon")).unwrap();
        let dynamic = polygon.as_dynamic().unwrap();
        assert!(dynamic.implements("Polygon"));
        assert!(dynamic.base_object().is_some());
        assert!(matches!(dynamic.call("Sides", &[], &[]), Ok(Instance::Int(_))));
        assert!(matches!(dynamic.call("Perimeter", &[], &[]), Ok(Instance::Float(_))));
    }

    #[test]
    fn test_base_without_accessible_constructor_fails() {
        let synthesizer = DynamicInstanceSynthesizer::new(shapes());
        let err = synthesizer
            .synthesize(&ContractSignature::derived_from("Sealed"))
            .unwrap_err();
        assert!(err.reason.contains("cannot create dummy type"), "{}", err);
        assert!(err.reason.contains("'Sealed'"), "{}", err);
        assert!(synthesizer.synthesize(&ContractSignature::derived_from("Nowhere")).is_err());
    }

    #[test]
    fn test_unregistered_interface_is_refused() {
        let synthesizer = DynamicInstanceSynthesizer::new(shapes());
        let err = synthesizer
            .synthesize(&ContractSignature::interface("IShape").with_interface("IGhost"))
            .unwrap_err();
        assert!(err.reason.contains("cannot create dummy type"), "{}", err);
        assert!(err.reason.contains("'IGhost'"), "{}", err);
        assert_eq!(err.data_type, DataType::interface("IGhost"));
        assert!(synthesizer.cache().is_empty());
    }

    #[test]
    fn test_frozen_values_stay_local_until_thawed() {
        let assembly = shapes();
        let inner: Arc<dyn AnonymousValueSource> = Arc::new(SequentialValueSource::new(Arc::clone(&assembly)));
        let synthesizer = Arc::new(DynamicInstanceSynthesizer::new(Arc::clone(&assembly)));
        let values = SynthesizingValueSource::new(Arc::clone(&inner), Arc::clone(&synthesizer));

        values.freeze(DataType::Str, Instance::str("pinned"));
        assert_eq!(values.clone().value_for(&DataType::Str), Ok(Instance::str("pinned")));
        assert_ne!(inner.value_for(&DataType::Str), Ok(Instance::str("pinned")));

        let other = SynthesizingValueSource::new(inner, synthesizer);
        assert_ne!(other.value_for(&DataType::Str), Ok(Instance::str("pinned")));

        values.thaw();
        assert_ne!(values.value_for(&DataType::Str), Ok(Instance::str("pinned")));
    }

    #[test]
    fn test_nested_abstract_arguments_are_synthesized() {
        let clock = TypeInfo::interface("IClock").with_method(MethodInfo::abstract_method("Now", vec![], DataType::Int));
        let service = TypeInfo::class("Service").with_constructor(ConstructorInfo::new(
            vec![ParameterInfo::input("clock", DataType::interface("IClock"))],
            Arc::new(|call| {
                let now = call.arg(0).as_dynamic().map(|c| c.call("Now", &[], &[])).transpose()?;
                call.this()?.set("started", now.unwrap_or(Instance::Null));
                Ok(Instance::Unit)
            }),
        ));
        let assembly = Arc::new(Assembly::new("Ops").with_type(clock).with_type(service));
        let created = source(&assembly).value_for(&DataType::class("Service")).unwrap();
        let started = created.as_object().unwrap().get("started").unwrap();
        assert!(matches!(started, Instance::Int(_)));
    }

    #[test]
    fn test_cyclic_abstract_arguments_give_up() {
        // Node's base constructor needs a Link, and a Link needs a Node
        let node = TypeInfo::abstract_class("Node").with_constructor(ConstructorInfo::new(
            vec![ParameterInfo::input("link", DataType::class("Link"))],
            Arc::new(|_| Ok(Instance::Unit)),
        ));
        let link = TypeInfo::class("Link").with_constructor(ConstructorInfo::new(
            vec![ParameterInfo::input("node", DataType::class("Node"))],
            Arc::new(|_| Ok(Instance::Unit)),
        ));
        let assembly = Arc::new(Assembly::new("Graph").with_type(node).with_type(link));
        assert!(source(&assembly).value_for(&DataType::class("Link")).is_err());
    }

    #[test]
    fn test_cache_reuses_synthesized_types() {
        let synthesizer = DynamicInstanceSynthesizer::new(shapes());
        let first = synthesizer.synthesize(&ContractSignature::interface("IShape")).unwrap();
        let second = synthesizer.synthesize(&ContractSignature::interface("IShape")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        let stats = synthesizer.cache().stats();
        assert_eq!((stats.hits, stats.misses, stats.entries), (1, 1, 1));
        assert!(synthesizer.find("Dummy<IShape>").is_some());
        synthesizer.cache().clear();
        assert!(synthesizer.cache().is_empty());
    }

    #[test]
    fn test_stand_ins_follow_constraints() {
        let synthesizer = DynamicInstanceSynthesizer::new(shapes());
        let stand_ins = GenericStandIns::default();
        let plain = GenericParameter::new("T");
        assert_eq!(stand_ins.resolve(&plain, &synthesizer).unwrap(), DataType::Object);
        let value = GenericParameter::new("T").with_constraint(Constraint::ValueType);
        assert_eq!(stand_ins.resolve(&value, &synthesizer).unwrap(), DataType::Int);
        let shaped = GenericParameter::new("T")
            .with_constraint(Constraint::ReferenceType)
            .with_constraint(Constraint::Implements("IShape".into()));
        assert_eq!(
            stand_ins.resolve(&shaped, &synthesizer).unwrap(),
            DataType::Dynamic("Dummy<IShape>".into())
        );
        let sealed = GenericParameter::new("T").with_constraint(Constraint::DerivesFrom("Sealed".into()));
        assert!(stand_ins.resolve(&sealed, &synthesizer).is_err());
    }

    #[test]
    fn test_dynamic_data_type_resolves_through_cache() {
        let assembly = shapes();
        let values = source(&assembly);
        values
            .synthesizer()
            .synthesize(&ContractSignature::interface("IShape"))
            .unwrap();
        let dynamic = values.value_for(&DataType::Dynamic("Dummy<IShape>".into())).unwrap();
        assert_eq!(dynamic.kind_name(), "Dummy<IShape>");
        assert!(values.value_for(&DataType::Dynamic("Dummy<IOther>".into())).is_err());
    }
}
