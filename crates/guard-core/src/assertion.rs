//! Guard clause assertion - the entry point
//!
//! For each member: skip it if it is exempt, close its generic parameters,
//! build an owner and a valid baseline argument list, then run every
//! substitution through the pipeline (or hand every parameter to the
//! behavior expectation, depending on the configured strategy).
//!
//! # Exempt members
//!
//! - `Equals(Object)` overrides
//! - abstract members, which have no body to guard
//! - members without any input parameter (e.g. a single `out` parameter)

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::anonymous::{AnonymousValueSource, SequentialValueSource};
use crate::command::{MemberBinding, MemberInvokeCommand, ReflectionExceptionUnwrappingCommand};
use crate::config::{CachePolicy, EngineConfig, Strategy};
use crate::dispatch::IdiomaticAssertion;
use crate::error::{CreationFailure, Error, Result};
use crate::expectation::BehaviorExpectation;
use crate::metadata::{
    Assembly, DataType, GenericParameter, Instance, MemberUnderTest, TypeInfo, Visibility,
};
use crate::pipeline;
use crate::report::{SurveyEntry, SurveyReport};
use crate::substitution::{closed_parameters, substitutions_for};
use crate::synthesis::{DynamicInstanceSynthesizer, GenericStandIns, SynthesizingValueSource};

/// Verifies that members reject invalid arguments with a recognizable fault
pub struct GuardClauseAssertion {
    source: Arc<dyn AnonymousValueSource>,
    assembly: Arc<Assembly>,
    config: EngineConfig,
    stand_ins: GenericStandIns,
    synthesizer: Arc<DynamicInstanceSynthesizer>,
}

impl GuardClauseAssertion {
    pub fn new(source: Arc<dyn AnonymousValueSource>, assembly: Arc<Assembly>) -> Self {
        GuardClauseAssertion {
            source,
            synthesizer: Arc::new(DynamicInstanceSynthesizer::new(Arc::clone(&assembly))),
            assembly,
            config: EngineConfig::default(),
            stand_ins: GenericStandIns::default(),
        }
    }

    /// An assertion backed by a [`SequentialValueSource`] over `assembly`
    pub fn for_assembly(assembly: Arc<Assembly>) -> Self {
        let source = Arc::new(SequentialValueSource::new(Arc::clone(&assembly)));
        Self::new(source, assembly)
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_stand_ins(mut self, stand_ins: GenericStandIns) -> Self {
        self.stand_ins = stand_ins;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn assembly(&self) -> &Arc<Assembly> {
        &self.assembly
    }

    /// The synthesizer shared by passes under [`CachePolicy::Shared`]
    pub fn synthesizer(&self) -> &Arc<DynamicInstanceSynthesizer> {
        &self.synthesizer
    }

    fn begin_pass(&self) -> Pass<'_> {
        let synthesizer = match self.config.cache {
            CachePolicy::Shared => Arc::clone(&self.synthesizer),
            CachePolicy::PerPass => Arc::new(DynamicInstanceSynthesizer::new(Arc::clone(&self.assembly))),
        };
        Pass {
            assertion: self,
            values: SynthesizingValueSource::new(Arc::clone(&self.source), synthesizer),
        }
    }

    /// Verify the type registered under `name`.
    ///
    /// # Errors
    /// `ArgumentInvalid` for an empty or unknown name, otherwise as
    /// [`IdiomaticAssertion::verify_type`].
    pub fn verify_type_named(&self, name: &str) -> Result<()> {
        let info = self.lookup_type(name)?;
        self.verify_type(&info)
    }

    /// Verify every overload named `member_name` on the type `type_name`.
    /// Constructors are named `.ctor`.
    pub fn verify_member_named(&self, type_name: &str, member_name: &str) -> Result<()> {
        let info = self.lookup_type(type_name)?;
        if member_name.trim().is_empty() {
            return Err(Error::argument_invalid("member_name", "must not be empty"));
        }
        let members: Vec<MemberUnderTest> = info
            .members()
            .into_iter()
            .filter(|m| m.name() == member_name)
            .collect();
        if members.is_empty() {
            return Err(Error::argument_invalid(
                "member_name",
                format!("'{}' has no verifiable member named '{}'", type_name, member_name),
            ));
        }
        self.verify_members(&members)
    }

    fn lookup_type(&self, name: &str) -> Result<Arc<TypeInfo>> {
        if name.trim().is_empty() {
            return Err(Error::argument_invalid("type_name", "must not be empty"));
        }
        self.assembly.get(name).cloned().ok_or_else(|| {
            Error::argument_invalid(
                "type_name",
                format!("no type named '{}' in assembly '{}'", name, self.assembly.name),
            )
        })
    }

    /// Classify every substitution of `member` without failing on unguarded
    /// parameters
    pub fn survey(&self, member: &MemberUnderTest) -> Result<SurveyReport> {
        let mut report = SurveyReport::new();
        self.begin_pass().survey_member(member, &mut report)?;
        Ok(report)
    }

    pub fn survey_type(&self, info: &TypeInfo) -> Result<SurveyReport> {
        let pass = self.begin_pass();
        let mut report = SurveyReport::new();
        for member in info.members() {
            pass.survey_member(&member, &mut report)?;
        }
        Ok(report)
    }
}

impl IdiomaticAssertion for GuardClauseAssertion {
    fn verify_member(&self, member: &MemberUnderTest) -> Result<()> {
        self.begin_pass().verify_member(member)
    }

    fn verify_members(&self, members: &[MemberUnderTest]) -> Result<()> {
        let pass = self.begin_pass();
        members.iter().try_for_each(|m| pass.verify_member(m))
    }

    fn verify_type(&self, info: &TypeInfo) -> Result<()> {
        self.begin_pass().verify_type(info)
    }

    fn verify_types(&self, types: &[Arc<TypeInfo>]) -> Result<()> {
        let pass = self.begin_pass();
        types.iter().try_for_each(|t| pass.verify_type(t))
    }

    fn verify_assembly(&self, assembly: &Assembly) -> Result<()> {
        info!(assembly = %assembly.name, types = assembly.len(), "verifying assembly");
        let pass = self.begin_pass();
        assembly.types().iter().try_for_each(|t| pass.verify_type(t))
    }
}

// ── Pass ──────────────────────────────────────────────────

/// State of one `verify_*` or `survey*` call
struct Pass<'a> {
    assertion: &'a GuardClauseAssertion,
    values: SynthesizingValueSource,
}

// frozen synthesized instances hold clones of `values`
impl Drop for Pass<'_> {
    fn drop(&mut self) {
        self.values.thaw();
    }
}

impl Pass<'_> {
    fn exemption(member: &MemberUnderTest) -> Option<&'static str> {
        if member.is_equals_override() {
            Some("equality override")
        } else if member.is_abstract() {
            Some("abstract member")
        } else if member.parameters().iter().all(|p| p.is_out()) {
            Some("no input parameters")
        } else {
            None
        }
    }

    fn verify_type(&self, info: &TypeInfo) -> Result<()> {
        let members = info.members();
        info!(type_name = %info.name, members = members.len(), "verifying type");
        members.iter().try_for_each(|m| self.verify_member(m))
    }

    fn verify_member(&self, member: &MemberUnderTest) -> Result<()> {
        if let Some(reason) = Self::exemption(member) {
            debug!(member = %member, reason, "member skipped");
            return Ok(());
        }
        let binding = Arc::new(self.bind(member)?);
        let config = &self.assertion.config;

        match config.strategy {
            Strategy::Conventions => {
                let substitutions =
                    substitutions_for(member, &binding.closed, &binding.arguments, &config.conventions)?;
                for substitution in &substitutions {
                    let command = pipeline::command_for(&binding, substitution)?;
                    pipeline::guard(&command, &substitution.behavior)?;
                }
            }
            Strategy::Expectations => {
                for (index, parameter) in binding.parameters().iter().enumerate() {
                    if parameter.is_out() {
                        continue;
                    }
                    let command = ReflectionExceptionUnwrappingCommand::new(MemberInvokeCommand::new(
                        Arc::clone(&binding),
                        index,
                    )?);
                    config.expectation.verify(&command)?;
                }
            }
        }
        Ok(())
    }

    fn survey_member(&self, member: &MemberUnderTest, report: &mut SurveyReport) -> Result<()> {
        if let Some(reason) = Self::exemption(member) {
            debug!(member = %member, reason, "member skipped");
            return Ok(());
        }
        let binding = Arc::new(self.bind(member)?);
        let conventions = &self.assertion.config.conventions;
        for substitution in substitutions_for(member, &binding.closed, &binding.arguments, conventions)? {
            let command = pipeline::command_for(&binding, &substitution)?;
            let classification = pipeline::verify_command(&command, &substitution.behavior)?;
            report.push(SurveyEntry {
                member: member.to_string(),
                declaring_type: member.declaring_type().to_string(),
                parameter_index: substitution.parameter_index,
                parameter: substitution.parameter.name.clone(),
                parameter_type: substitution.parameter.data_type.clone(),
                behavior: substitution.behavior.description().to_string(),
                value: substitution.invalid_value().to_string(),
                classification,
            });
        }
        Ok(())
    }

    /// Close generics, then build the owner and the baseline arguments
    fn bind(&self, member: &MemberUnderTest) -> Result<MemberBinding> {
        let declaring = self.assertion.assembly.get(member.declaring_type()).cloned();
        let type_generics: &[GenericParameter] = declaring
            .as_deref()
            .map(|t| t.generic_parameters.as_slice())
            .unwrap_or(&[]);

        let mut closed = BTreeMap::new();
        let mut type_args = Vec::new();
        for generic in type_generics.iter().chain(member.generic_parameters()) {
            let resolved = self
                .assertion
                .stand_ins
                .resolve(generic, self.values.synthesizer())
                .map_err(|cause| Self::generic_failure(member, generic, cause))?;
            debug!(member = %member, generic = %generic.name, closed = %resolved, "generic parameter closed");
            closed.insert(generic.name.clone(), resolved.clone());
            type_args.push(resolved);
        }

        let owner = if member.requires_owner() {
            let owner_type_args = &type_args[..type_generics.len()];
            Some(self.owner_for(member, declaring.as_deref(), &closed, owner_type_args)?)
        } else {
            None
        };

        let mut arguments = Vec::new();
        for parameter in closed_parameters(member, &closed) {
            if parameter.is_out() {
                arguments.push(Instance::Unit);
                continue;
            }
            let value = self.values.value_for(&parameter.data_type).map_err(|cause| {
                CreationFailure::new(parameter.data_type.clone(), "no valid argument could be created")
                    .for_parameter(member.to_string(), parameter.name.clone())
                    .caused_by(cause)
            })?;
            if let DataType::Dynamic(_) = parameter.data_type {
                self.values.freeze(parameter.data_type.clone(), value.clone());
            }
            arguments.push(value);
        }

        Ok(MemberBinding::new(member.clone(), owner, arguments).with_type_args(type_args, closed))
    }

    fn generic_failure(member: &MemberUnderTest, generic: &GenericParameter, cause: CreationFailure) -> Error {
        let failure = CreationFailure::new(
            DataType::generic(generic.name.clone()),
            "generic parameter could not be closed",
        );
        let failure = match member
            .parameters()
            .iter()
            .find(|p| p.data_type.mentions(&generic.name))
        {
            Some(parameter) => failure.for_parameter(member.to_string(), parameter.name.clone()),
            None => failure.for_member(member.to_string()),
        };
        failure.caused_by(cause).into()
    }

    /// An instance of the declaring type to call an instance member on
    fn owner_for(
        &self,
        member: &MemberUnderTest,
        declaring: Option<&TypeInfo>,
        closed: &BTreeMap<String, DataType>,
        type_args: &[DataType],
    ) -> Result<Instance> {
        let created = match declaring {
            Some(info) if info.is_generic() => self.construct_generic(info, closed, type_args),
            Some(info) => self.values.value_for(&info.data_type()),
            None => self.values.value_for(&DataType::class(member.declaring_type())),
        };
        let owner = created.map_err(|cause| {
            CreationFailure::new(
                DataType::class(member.declaring_type()),
                "no owner instance could be created",
            )
            .for_member(member.to_string())
            .caused_by(cause)
        })?;

        // concrete members of an abstract class run against the base object
        Ok(match owner {
            Instance::Dynamic(dynamic) => match dynamic.base_object() {
                Some(base) => Instance::Object(base.clone()),
                None => Instance::Dynamic(dynamic),
            },
            other => other,
        })
    }

    /// Build a generic type through its most modest public constructor,
    /// with its type parameters closed
    fn construct_generic(
        &self,
        info: &TypeInfo,
        closed: &BTreeMap<String, DataType>,
        type_args: &[DataType],
    ) -> std::result::Result<Instance, CreationFailure> {
        let closed_type = DataType::class(info.name.clone());
        let mut constructors: Vec<_> = info
            .constructors
            .iter()
            .filter(|c| c.visibility == Visibility::Public)
            .map(|c| MemberUnderTest::Constructor(Arc::clone(c)))
            .collect();
        constructors.sort_by_key(|c| c.parameters().len());

        let mut last_failure = CreationFailure::new(closed_type.clone(), "no public constructor");
        'ctors: for ctor in constructors {
            let mut args = Vec::new();
            for parameter in closed_parameters(&ctor, closed) {
                if parameter.is_out() {
                    args.push(Instance::Unit);
                    continue;
                }
                match self.values.value_for(&parameter.data_type) {
                    Ok(arg) => args.push(arg),
                    Err(cause) => {
                        last_failure = CreationFailure::new(closed_type.clone(), "constructor argument failed")
                            .for_parameter(ctor.to_string(), parameter.name.clone())
                            .caused_by(cause);
                        continue 'ctors;
                    }
                }
            }
            match ctor.invoke(None, &args, type_args) {
                Ok(created) => return Ok(created),
                Err(e) => {
                    last_failure = CreationFailure::new(closed_type.clone(), e.to_string()).for_member(ctor.to_string())
                }
            }
        }
        Err(last_failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ConstructorInfo, Constraint, Fault, MethodInfo, ParameterInfo, PropertyInfo};
    use crate::pipeline::Classification;

    fn require_name(value: &Instance, param: &str) -> std::result::Result<String, Fault> {
        match value {
            Instance::Null => Err(Fault::null_argument(param)),
            Instance::Str(s) if s.trim().is_empty() => Err(Fault::invalid_argument(param, "blank")),
            Instance::Str(s) => Ok(s.clone()),
            _ => Err(Fault::invalid_argument(param, "not a string")),
        }
    }

    fn shop() -> Arc<Assembly> {
        let customer = TypeInfo::class("Customer")
            .with_constructor(ConstructorInfo::new(
                vec![ParameterInfo::input("name", DataType::Str)],
                Arc::new(|call| {
                    let name = require_name(call.arg(0), "name")?;
                    call.this()?.set("name", Instance::Str(name));
                    Ok(Instance::Unit)
                }),
            ))
            .with_method(MethodInfo::new(
                "Rename",
                vec![ParameterInfo::input("name", DataType::Str)],
                DataType::Void,
                Arc::new(|call| {
                    if call.arg(0).is_null() {
                        return Err(Fault::null_argument("name"));
                    }
                    call.this()?.set("name", call.arg(0).clone());
                    Ok(Instance::Unit)
                }),
            ))
            .with_method(MethodInfo::new(
                "Equals",
                vec![ParameterInfo::input("obj", DataType::Object)],
                DataType::Bool,
                Arc::new(|_| Ok(Instance::Bool(false))),
            ))
            .with_property(PropertyInfo::read_write(
                "Nickname",
                DataType::Str,
                Arc::new(|call| Ok(call.this()?.get("nickname").unwrap_or(Instance::Null))),
                Arc::new(|call| {
                    let nickname = require_name(call.arg(0), "value")?;
                    call.this()?.set("nickname", Instance::Str(nickname));
                    Ok(Instance::Unit)
                }),
            ));
        let boxed = TypeInfo::class("Box")
            .with_generic_parameter(GenericParameter::new("T"))
            .with_constructor(ConstructorInfo::new(vec![], Arc::new(|_| Ok(Instance::Unit))))
            .with_method(MethodInfo::new(
                "Put",
                vec![ParameterInfo::input("item", DataType::generic("T"))],
                DataType::Void,
                Arc::new(|call| {
                    if call.arg(0).is_null() {
                        return Err(Fault::null_argument("item"));
                    }
                    Ok(Instance::Unit)
                }),
            ));
        Arc::new(Assembly::new("Shop").with_type(customer).with_type(boxed))
    }

    #[test]
    fn test_guarded_members_pass() {
        let assertion = GuardClauseAssertion::for_assembly(shop());
        assertion.verify_member_named("Customer", ".ctor").unwrap();
        assertion.verify_member_named("Customer", "Nickname").unwrap();
    }

    #[test]
    fn test_rename_misses_blank_names() {
        let assertion = GuardClauseAssertion::for_assembly(shop());
        let err = assertion.verify_member_named("Customer", "Rename").unwrap_err();
        let failure = err.guard_failure().unwrap();
        assert_eq!(failure.value, "\"\"");
        assert_eq!(failure.parameter.as_deref(), Some("name"));
        assert_eq!(failure.member, "Customer::Rename(String name)");
    }

    #[test]
    fn test_generic_declaring_type_is_closed() {
        let assertion = GuardClauseAssertion::for_assembly(shop());
        assertion.verify_type_named("Box").unwrap();
        let info = assertion.assembly().get("Box").cloned().unwrap();
        let report = assertion.survey_type(&info).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.entries[0].parameter_type, DataType::Object);
        assert_eq!(report.entries[0].classification, Classification::CorrectGuard);
    }

    #[test]
    fn test_generic_owner_skips_constructor_with_unbuildable_argument() {
        let sealed = TypeInfo::abstract_class("Sealed").with_constructor(
            ConstructorInfo::new(vec![], Arc::new(|_| Ok(Instance::Unit))).with_visibility(Visibility::Private),
        );
        let pair = TypeInfo::class("Pair")
            .with_generic_parameter(GenericParameter::new("T"))
            .with_constructor(ConstructorInfo::new(
                vec![ParameterInfo::input("seal", DataType::class("Sealed"))],
                Arc::new(|_| Ok(Instance::Unit)),
            ))
            .with_constructor(ConstructorInfo::new(
                vec![
                    ParameterInfo::input("left", DataType::Int),
                    ParameterInfo::input("right", DataType::Int),
                ],
                Arc::new(|_| Ok(Instance::Unit)),
            ))
            .with_method(MethodInfo::new(
                "Put",
                vec![ParameterInfo::input("item", DataType::generic("T"))],
                DataType::Void,
                Arc::new(|call| {
                    if call.arg(0).is_null() {
                        return Err(Fault::null_argument("item"));
                    }
                    Ok(Instance::Unit)
                }),
            ));
        let assembly = Assembly::new("Pairs").with_type(sealed).with_type(pair);
        let assertion = GuardClauseAssertion::for_assembly(Arc::new(assembly));
        assertion.verify_member_named("Pair", "Put").unwrap();
    }

    #[test]
    fn test_name_lookup_errors() {
        let assertion = GuardClauseAssertion::for_assembly(shop());
        assert!(matches!(
            assertion.verify_type_named(" "),
            Err(Error::ArgumentInvalid { ref name, .. }) if name == "type_name"
        ));
        assert!(matches!(
            assertion.verify_type_named("Missing"),
            Err(Error::ArgumentInvalid { .. })
        ));
        assert!(matches!(
            assertion.verify_member_named("Customer", "Fly"),
            Err(Error::ArgumentInvalid { ref name, .. }) if name == "member_name"
        ));
    }

    #[test]
    fn test_survey_does_not_stop_at_failures() {
        let assertion = GuardClauseAssertion::for_assembly(shop());
        let info = assertion.assembly().get("Customer").cloned().unwrap();
        let report = assertion.survey_type(&info).unwrap();
        // ctor: 3, Rename: 3, Nickname: 3; Equals skipped
        assert_eq!(report.len(), 9);
        let summary = report.summary();
        assert_eq!(summary.missing, 2);
        assert_eq!(summary.correct, 7);
    }

    #[test]
    fn test_unresolvable_constraint_names_member_and_parameter() {
        let assembly = Assembly::new("Broken")
            .with_type(
                TypeInfo::abstract_class("Sealed").with_constructor(
                    ConstructorInfo::new(vec![], Arc::new(|_| Ok(Instance::Unit)))
                        .with_visibility(Visibility::Private),
                ),
            )
            .with_type(
                TypeInfo::static_class("Util").with_method(
                    MethodInfo::new(
                        "Use",
                        vec![ParameterInfo::input("item", DataType::generic("T"))],
                        DataType::Void,
                        Arc::new(|_| Ok(Instance::Unit)),
                    )
                    .with_generic_parameter(
                        GenericParameter::new("T").with_constraint(Constraint::DerivesFrom("Sealed".into())),
                    ),
                ),
            );
        let assertion = GuardClauseAssertion::for_assembly(Arc::new(assembly));
        let err = assertion.verify_type_named("Util").unwrap_err();
        let failure = match err {
            Error::Creation(failure) => failure,
            other => panic!("expected a creation failure, got {:?}", other),
        };
        assert_eq!(failure.parameter.as_deref(), Some("item"));
        assert!(failure.member.as_deref().unwrap_or("").contains("Util::Use"));
        assert!(failure.cause.is_some());
    }
}
