//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use guard_core::metadata::{
    Assembly, Call, Constraint, ConstructorInfo, DataType, Fault, GenericParameter, Instance,
    MemberBody, MethodInfo, ParameterInfo, PropertyInfo, Sequence, TypeInfo, Visibility,
};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test harness; `RUST_LOG` overrides the level
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

pub fn body<F>(f: F) -> MemberBody
where
    F: Fn(&Call<'_>) -> Result<Instance, Fault> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Null raises `NullArgument`, blank strings raise `InvalidArgument`
pub fn require_text(value: &Instance, param: &str) -> Result<String, Fault> {
    match value {
        Instance::Null => Err(Fault::null_argument(param)),
        Instance::Str(s) if s.trim().is_empty() => Err(Fault::invalid_argument(param, "must not be blank")),
        Instance::Str(s) => Ok(s.clone()),
        other => Err(Fault::invalid_argument(param, format!("expected text, found {}", other.kind_name()))),
    }
}

fn text_method(name: &str, param: &str, f: MemberBody) -> MethodInfo {
    MethodInfo::new(name, vec![ParameterInfo::input(param, DataType::Str)], DataType::Void, f)
}

fn numbers(from: i64) -> impl Iterator<Item = Result<Instance, Fault>> + Send {
    (from..from + 3).map(|i| Ok::<_, Fault>(Instance::Int(i)))
}

/// Static string helpers, each guarding its parameter differently
pub fn text() -> TypeInfo {
    TypeInfo::static_class("Text")
        .with_method(text_method(
            "Guarded",
            "s",
            body(|call| {
                if call.arg(0).is_null() {
                    return Err(Fault::null_argument("s"));
                }
                Ok(Instance::Unit)
            }),
        ))
        .with_method(text_method("Unguarded", "s", body(|_| Ok(Instance::Unit))))
        .with_method(text_method(
            "FullyGuarded",
            "s",
            body(|call| require_text(call.arg(0), "s").map(|_| Instance::Unit)),
        ))
        .with_method(text_method(
            "Length",
            "s",
            body(|call| Ok(Instance::Int(call.arg(0).require_str()?.len() as i64))),
        ))
        .with_method(text_method(
            "Misnamed",
            "s",
            body(|call| require_text(call.arg(0), "text").map(|_| Instance::Unit)),
        ))
}

/// Identifier lookups
pub fn registry() -> TypeInfo {
    TypeInfo::static_class("Registry")
        .with_method(MethodInfo::new(
            "Find",
            vec![ParameterInfo::input("id", DataType::Identifier)],
            DataType::Bool,
            body(|call| match call.arg(0) {
                Instance::Identifier(id) if id.is_nil() => Err(Fault::invalid_argument("id", "empty identifier")),
                _ => Ok(Instance::Bool(true)),
            }),
        ))
        .with_method(MethodInfo::new(
            "Forget",
            vec![ParameterInfo::input("id", DataType::Identifier)],
            DataType::Void,
            body(|_| Ok(Instance::Unit)),
        ))
}

/// Generic members closed through stand-ins and synthesis
pub fn generics() -> TypeInfo {
    TypeInfo::static_class("Generics")
        .with_method(
            MethodInfo::new(
                "Hold",
                vec![ParameterInfo::input("x", DataType::generic("T"))],
                DataType::Void,
                body(|call| {
                    if call.arg(0).is_null() {
                        return Err(Fault::null_argument("x"));
                    }
                    Ok(Instance::Unit)
                }),
            )
            .with_generic_parameter(GenericParameter::new("T").with_constraint(Constraint::ReferenceType)),
        )
        .with_method(
            MethodInfo::new(
                "Measure",
                vec![
                    ParameterInfo::input("shape", DataType::generic("T")),
                    ParameterInfo::input("label", DataType::Str),
                ],
                DataType::Float,
                body(|call| {
                    let shape = match call.arg(0) {
                        Instance::Null => return Err(Fault::null_argument("shape")),
                        Instance::Dynamic(shape) => shape,
                        other => {
                            return Err(Fault::invalid_operation(format!(
                                "expected a shape, found {}",
                                other.kind_name()
                            )))
                        }
                    };
                    let area = shape.call("Area", &[], &[])?;
                    require_text(call.arg(1), "label")?;
                    Ok(area)
                }),
            )
            .with_generic_parameter(
                GenericParameter::new("T").with_constraint(Constraint::Implements("IShape".into())),
            ),
        )
}

pub fn shape() -> TypeInfo {
    TypeInfo::interface("IShape")
        .with_method(MethodInfo::abstract_method("Area", vec![], DataType::Float))
        .with_property(PropertyInfo::abstract_property("Name", DataType::Str, true))
}

/// Members returning lazily generated sequences
pub fn source() -> TypeInfo {
    let values = DataType::sequence_of(DataType::Int);
    TypeInfo::static_class("Source")
        .with_method(MethodInfo::new(
            "GetValues",
            vec![ParameterInfo::input("s", DataType::Str)],
            values.clone(),
            body(|call| {
                let s = call.arg(0).clone();
                Ok(Instance::Sequence(Sequence::deferred(move || {
                    let guard = require_text(&s, "s").err().map(Err);
                    guard.into_iter().chain(numbers(1))
                })))
            }),
        ))
        .with_method(MethodInfo::new(
            "GetValuesUnchecked",
            vec![ParameterInfo::input("s", DataType::Str)],
            values,
            body(|_| Ok(Instance::Sequence(Sequence::deferred(|| numbers(1))))),
        ))
}

/// Out-only and by-ref parameters
pub fn parser() -> TypeInfo {
    TypeInfo::static_class("Parser")
        .with_method(MethodInfo::new(
            "TryParse",
            vec![ParameterInfo::output("result", DataType::Int)],
            DataType::Bool,
            body(|_| Ok(Instance::Bool(false))),
        ))
        .with_method(MethodInfo::new(
            "Split",
            vec![
                ParameterInfo::input("text", DataType::Str),
                ParameterInfo::output("parts", DataType::Int),
            ],
            DataType::Bool,
            body(|call| require_text(call.arg(0), "text").map(|_| Instance::Bool(true))),
        ))
}

/// An instance type whose constructor guards and one method that does not
pub fn order() -> TypeInfo {
    TypeInfo::class("Order")
        .with_constructor(ConstructorInfo::new(
            vec![
                ParameterInfo::input("customer", DataType::Str),
                ParameterInfo::input("id", DataType::Identifier),
            ],
            body(|call| {
                let customer = require_text(call.arg(0), "customer")?;
                if matches!(call.arg(1), Instance::Identifier(id) if id.is_nil()) {
                    return Err(Fault::invalid_argument("id", "empty identifier"));
                }
                let this = call.this()?;
                this.set("customer", Instance::Str(customer));
                this.set("id", call.arg(1).clone());
                Ok(Instance::Unit)
            }),
        ))
        .with_method(text_method(
            "Cancel",
            "reason",
            body(|call| {
                call.this()?.set("reason", call.arg(0).clone());
                Ok(Instance::Unit)
            }),
        ))
        .with_method(MethodInfo::new(
            "Equals",
            vec![ParameterInfo::input("obj", DataType::Object)],
            DataType::Bool,
            body(|_| Ok(Instance::Bool(false))),
        ))
        .with_method(
            text_method("Audit", "note", body(|_| Ok(Instance::Unit))).with_visibility(Visibility::Private),
        )
}

/// A base class nobody can derive from
pub fn sealed() -> TypeInfo {
    TypeInfo::abstract_class("Sealed").with_constructor(
        ConstructorInfo::new(vec![], body(|_| Ok(Instance::Unit))).with_visibility(Visibility::Private),
    )
}

pub fn unusable() -> TypeInfo {
    TypeInfo::static_class("Unusable").with_method(
        MethodInfo::new(
            "Use",
            vec![ParameterInfo::input("item", DataType::generic("T"))],
            DataType::Void,
            body(|_| Ok(Instance::Unit)),
        )
        .with_generic_parameter(GenericParameter::new("T").with_constraint(Constraint::DerivesFrom("Sealed".into()))),
    )
}

/// Every fixture type
pub fn library() -> Arc<Assembly> {
    Arc::new(
        Assembly::new("Library")
            .with_type(text())
            .with_type(registry())
            .with_type(shape())
            .with_type(generics())
            .with_type(source())
            .with_type(parser())
            .with_type(order())
            .with_type(sealed())
            .with_type(unusable()),
    )
}

/// Only types whose every member guards correctly
pub fn guarded_library() -> Arc<Assembly> {
    let text = TypeInfo::static_class("Text").with_method(text_method(
        "FullyGuarded",
        "s",
        body(|call| require_text(call.arg(0), "s").map(|_| Instance::Unit)),
    ));
    let registry = TypeInfo::static_class("Registry").with_method(MethodInfo::new(
        "Find",
        vec![ParameterInfo::input("id", DataType::Identifier)],
        DataType::Bool,
        body(|call| match call.arg(0) {
            Instance::Identifier(id) if id.is_nil() => Err(Fault::invalid_argument("id", "empty identifier")),
            _ => Ok(Instance::Bool(true)),
        }),
    ));
    Arc::new(
        Assembly::new("Guarded")
            .with_type(text)
            .with_type(registry)
            .with_type(shape())
            .with_type(generics())
            .with_type(parser()),
    )
}

/// Null guard that blames a parameter the member does not have
pub fn sink() -> TypeInfo {
    TypeInfo::static_class("Sink").with_method(MethodInfo::new(
        "Take",
        vec![ParameterInfo::input("order", DataType::class("Order"))],
        DataType::Void,
        body(|call| {
            if call.arg(0).is_null() {
                return Err(Fault::null_argument("somethingElse"));
            }
            Ok(Instance::Unit)
        }),
    ))
}

pub fn clock() -> TypeInfo {
    TypeInfo::interface("IClock").with_method(MethodInfo::abstract_method("Now", vec![], DataType::Int))
}

/// An instance type that can only be built around an `IClock`
pub fn service() -> TypeInfo {
    TypeInfo::class("Service")
        .with_constructor(ConstructorInfo::new(
            vec![ParameterInfo::input("clock", DataType::interface("IClock"))],
            body(|call| {
                if call.arg(0).is_null() {
                    return Err(Fault::null_argument("clock"));
                }
                call.this()?.set("clock", call.arg(0).clone());
                Ok(Instance::Unit)
            }),
        ))
        .with_method(text_method(
            "Schedule",
            "job",
            body(|call| {
                let job = require_text(call.arg(0), "job")?;
                let clock = call.this()?.get("clock").unwrap_or(Instance::Null);
                let now = match clock.as_dynamic() {
                    Some(clock) => clock.call("Now", &[], &[])?,
                    None => return Err(Fault::invalid_operation("service has no clock")),
                };
                call.this()?.set(job, now);
                Ok(Instance::Unit)
            }),
        ))
}

/// Collaborator types outside the main library
pub fn collaborators() -> Arc<Assembly> {
    Arc::new(
        Assembly::new("Collaborators")
            .with_type(order())
            .with_type(sink())
            .with_type(clock())
            .with_type(service()),
    )
}

/// A generic member whose synthesized arguments are handed to `seen`
pub fn recording_library(seen: Arc<Mutex<Vec<Instance>>>) -> Arc<Assembly> {
    let host = TypeInfo::static_class("Host").with_method(
        MethodInfo::new(
            "Hold",
            vec![
                ParameterInfo::input("x", DataType::generic("T")),
                ParameterInfo::input("note", DataType::Str),
            ],
            DataType::Void,
            body(move |call| {
                if call.arg(0).is_null() {
                    return Err(Fault::null_argument("x"));
                }
                if call.arg(0).as_dynamic().is_some() {
                    seen.lock().push(call.arg(0).clone());
                }
                require_text(call.arg(1), "note").map(|_| Instance::Unit)
            }),
        )
        .with_generic_parameter(GenericParameter::new("T").with_constraint(Constraint::Implements("IShape".into()))),
    );
    Arc::new(Assembly::new("Recording").with_type(shape()).with_type(host))
}
