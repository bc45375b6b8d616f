//! Guard Core - convention-based guard clause verification
//!
//! Checks that every constructor, method and property setter of a type
//! rejects known-invalid arguments with a recognizable fault, while all other
//! arguments hold valid values.
//!
//! # Architecture
//!
//! ```text
//! IdiomaticAssertion (dispatch) → GuardClauseAssertion → members
//!                                        ↓
//!         Convention registry → Substitution engine → one call per (parameter, invalid value)
//!                                        ↓
//!         Command → Invoke / Unwrap / Diagnose pipeline → Classification
//!                                        ↓
//!                       GuardClauseFailure (verify) or SurveyReport (survey)
//! ```
//!
//! Valid arguments come from an [`AnonymousValueSource`]; interfaces and
//! abstract classes it cannot build are answered by the dynamic instance
//! synthesizer.
//!
//! # Guarantees
//!
//! - **Deterministic order**: substitutions run by parameter index, then
//!   behavior registration order
//! - **Fail-fast**: `verify_*` stops at the first unguarded parameter
//! - **No hidden state**: all configuration lives in an [`EngineConfig`]
//!   owned by the assertion
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use guard_core::metadata::{Assembly, ConstructorInfo, DataType, Fault, Instance, ParameterInfo, TypeInfo};
//! use guard_core::GuardClauseAssertion;
//!
//! let greeter = TypeInfo::class("Greeter").with_constructor(ConstructorInfo::new(
//!     vec![ParameterInfo::input("name", DataType::Str)],
//!     Arc::new(|call| match call.arg(0) {
//!         Instance::Null => Err(Fault::null_argument("name")),
//!         Instance::Str(s) if s.trim().is_empty() => Err(Fault::invalid_argument("name", "blank")),
//!         _ => Ok(Instance::Unit),
//!     }),
//! ));
//! let assertion = GuardClauseAssertion::for_assembly(Arc::new(Assembly::new("Demo").with_type(greeter)));
//! assertion.verify_type_named("Greeter").unwrap();
//! ```

pub mod anonymous;
pub mod assertion;
pub mod command;
pub mod config;
pub mod convention;
pub mod dispatch;
pub mod error;
pub mod expectation;
pub mod metadata;
pub mod pipeline;
pub mod report;
pub mod substitution;
pub mod synthesis;

pub use anonymous::{AnonymousValueSource, SequentialValueSource};
pub use assertion::GuardClauseAssertion;
pub use config::{CachePolicy, EngineConfig, EngineSettings, Strategy};
pub use convention::{BoundaryBehavior, BoundaryConvention, CompositeConventionFactory, ConventionFactory};
pub use dispatch::{CompositeIdiomaticAssertion, IdiomaticAssertion, VerificationTarget};
pub use error::{CreationFailure, Error, FailureKind, GuardClauseFailure, Result};
pub use expectation::{BehaviorExpectation, CompositeBehaviorExpectation};
pub use pipeline::Classification;
pub use report::{SurveyEntry, SurveyReport};
pub use substitution::{substitutions_for, SubstitutedInvocation};
