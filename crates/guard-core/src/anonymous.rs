//! Anonymous value sources - valid instances of any requested type
//!
//! The engine only needs two things from a value source: a plausible valid
//! value for a declared type, and a way to pin one type's value for the rest
//! of a pass. [`SequentialValueSource`] is a deterministic implementation
//! that builds objects through the constructors registered in an
//! [`Assembly`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::CreationFailure;
use crate::metadata::{Assembly, DataType, Instance, MemberUnderTest, ObjectRef, Sequence, TypeKind};

/// Supplier of valid values, shared across a whole verification pass
pub trait AnonymousValueSource: Send + Sync {
    /// A valid value of `data_type`.
    ///
    /// # Errors
    /// Returns `CreationFailure` when the type cannot be produced (interfaces,
    /// abstract classes, open generic parameters, ...).
    fn value_for(&self, data_type: &DataType) -> Result<Instance, CreationFailure>;

    /// Like [`value_for`](Self::value_for), but nested values this source
    /// cannot build itself (constructor arguments typed as an interface or an
    /// abstract class) are requested from `resolver`.
    fn value_with(
        &self,
        data_type: &DataType,
        resolver: &dyn AnonymousValueSource,
    ) -> Result<Instance, CreationFailure> {
        let _ = resolver;
        self.value_for(data_type)
    }

    /// Pin `value` as the answer for `data_type` from now on
    fn freeze(&self, data_type: DataType, value: Instance);
}

/// Deterministic value source: counters for primitives, constructors for
/// objects.
///
/// Objects are built through their most modest public constructor (fewest
/// parameters first, falling back to the next one when a constructor faults).
pub struct SequentialValueSource {
    assembly: Arc<Assembly>,
    counter: AtomicU64,
    frozen: Mutex<HashMap<DataType, Instance>>,
    max_depth: usize,
}

/// Number of items in generated sequences
const SEQUENCE_LENGTH: usize = 3;

const DEFAULT_MAX_DEPTH: usize = 16;

impl SequentialValueSource {
    pub fn new(assembly: Arc<Assembly>) -> Self {
        SequentialValueSource {
            assembly,
            counter: AtomicU64::new(0),
            frozen: Mutex::new(HashMap::new()),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit on nested constructor arguments before creation gives up
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn assembly(&self) -> &Arc<Assembly> {
        &self.assembly
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// True for types only a resolver can answer
    fn is_abstract(&self, data_type: &DataType) -> bool {
        match data_type {
            DataType::Interface(_) | DataType::Dynamic(_) => true,
            DataType::Class(name) => self.assembly.get(name).map_or(false, |info| info.is_abstract),
            _ => false,
        }
    }

    fn create(
        &self,
        data_type: &DataType,
        depth: usize,
        resolver: Option<&dyn AnonymousValueSource>,
    ) -> Result<Instance, CreationFailure> {
        if let Some(value) = self.frozen.lock().get(data_type) {
            return Ok(value.clone());
        }
        if depth > self.max_depth {
            return Err(CreationFailure::new(
                data_type.clone(),
                format!("recursion depth {} exceeded", self.max_depth),
            ));
        }
        // the top-level request came from the resolver itself
        if depth > 0 && self.is_abstract(data_type) {
            if let Some(resolver) = resolver {
                return resolver.value_for(data_type);
            }
        }

        match data_type {
            DataType::Object => Ok(Instance::Object(ObjectRef::new("Object"))),
            DataType::Bool => Ok(Instance::Bool(self.next() % 2 == 1)),
            DataType::Int => Ok(Instance::Int(self.next() as i64)),
            DataType::Float => Ok(Instance::Float(self.next() as f64 + 0.5)),
            DataType::Str => Ok(Instance::Str(format!(
                "anonymous-{}",
                Uuid::from_u128(u128::from(self.next()))
            ))),
            DataType::Identifier => Ok(Instance::Identifier(Uuid::from_u128(
                (u128::from(self.next()) << 64) | 0x4000,
            ))),
            DataType::Void => Ok(Instance::Unit),
            DataType::Sequence(item) => {
                let mut items = Vec::with_capacity(SEQUENCE_LENGTH);
                for _ in 0..SEQUENCE_LENGTH {
                    items.push(self.create(item, depth + 1, resolver)?);
                }
                Ok(Instance::Sequence(Sequence::eager(items)))
            }
            DataType::Struct(name) | DataType::Class(name) => {
                self.construct(data_type, name, depth, resolver)
            }
            DataType::Interface(name) => Err(CreationFailure::new(
                data_type.clone(),
                format!("interface '{}' has no constructor to call", name),
            )),
            DataType::GenericParameter(name) => Err(CreationFailure::new(
                data_type.clone(),
                format!("generic parameter '{}' is not closed", name),
            )),
            DataType::Dynamic(name) => Err(CreationFailure::new(
                data_type.clone(),
                format!("synthesized type '{}' was never frozen into this source", name),
            )),
        }
    }

    fn construct(
        &self,
        data_type: &DataType,
        name: &str,
        depth: usize,
        resolver: Option<&dyn AnonymousValueSource>,
    ) -> Result<Instance, CreationFailure> {
        let info = self.assembly.get(name).ok_or_else(|| {
            CreationFailure::new(data_type.clone(), format!("type '{}' is not registered", name))
        })?;

        if info.kind == TypeKind::StaticClass {
            return Err(CreationFailure::new(
                data_type.clone(),
                format!("'{}' is a static class", name),
            ));
        }
        if info.is_abstract {
            return Err(CreationFailure::new(
                data_type.clone(),
                format!("'{}' is abstract", name),
            ));
        }
        if info.is_generic() {
            return Err(CreationFailure::new(
                data_type.clone(),
                format!("'{}' is generic and needs type arguments", name),
            ));
        }

        let mut ctors: Vec<_> = info.members()
            .into_iter()
            .filter(|m| matches!(m, MemberUnderTest::Constructor(_)))
            .collect();
        ctors.sort_by_key(|c| c.parameters().len());

        if ctors.is_empty() {
            if info.kind == TypeKind::Struct {
                return Ok(Instance::Object(ObjectRef::new(name)));
            }
            return Err(CreationFailure::new(
                data_type.clone(),
                format!("'{}' has no public constructor", name),
            ));
        }

        let mut last_failure = None;
        'ctors: for ctor in &ctors {
            let mut args = Vec::new();
            for param in ctor.parameters() {
                if param.is_out() {
                    args.push(Instance::Unit);
                    continue;
                }
                match self.create(&param.data_type, depth + 1, resolver) {
                    Ok(arg) => args.push(arg),
                    Err(e) => {
                        last_failure = Some(
                            CreationFailure::new(data_type.clone(), "constructor argument failed")
                                .for_parameter(ctor.to_string(), param.name.clone())
                                .caused_by(e),
                        );
                        continue 'ctors;
                    }
                }
            }
            match ctor.invoke(None, &args, &[]) {
                Ok(created) => return Ok(created),
                Err(e) => {
                    last_failure = Some(
                        CreationFailure::new(data_type.clone(), e.to_string()).for_member(ctor.to_string()),
                    )
                }
            }
        }
        Err(last_failure.unwrap_or_else(|| {
            CreationFailure::new(data_type.clone(), "no constructor succeeded")
        }))
    }
}

impl AnonymousValueSource for SequentialValueSource {
    fn value_for(&self, data_type: &DataType) -> Result<Instance, CreationFailure> {
        self.create(data_type, 0, None)
    }

    fn value_with(
        &self,
        data_type: &DataType,
        resolver: &dyn AnonymousValueSource,
    ) -> Result<Instance, CreationFailure> {
        self.create(data_type, 0, Some(resolver))
    }

    fn freeze(&self, data_type: DataType, value: Instance) {
        self.frozen.lock().insert(data_type, value);
    }
}
