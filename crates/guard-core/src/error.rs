//! Error types for guard clause verification
//!
//! All fallible operations return `Result<T, Error>`.
//! Guard clause failures carry everything needed to act on them: the member,
//! the parameter, the value that was passed and what was observed.

use std::fmt;

use crate::metadata::{DataType, Fault, InvocationError};

/// Guard clause verification error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The engine's own API was handed an invalid input
    #[error("argument '{name}' is invalid: {reason}")]
    ArgumentInvalid { name: String, reason: String },

    /// A required value could not be produced
    #[error(transparent)]
    Creation(#[from] CreationFailure),

    /// A member did not guard a parameter correctly
    #[error(transparent)]
    GuardClause(Box<GuardClauseFailure>),

    /// The host refused the call itself (arity, missing owner)
    #[error("host could not invoke {member}: {source}")]
    HostInvocation {
        member: String,
        #[source]
        source: InvocationError,
    },

    /// Engine settings could not be loaded
    #[error("invalid engine settings: {0}")]
    Settings(String),
}

impl Error {
    pub fn argument_invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ArgumentInvalid {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn guard_failure(&self) -> Option<&GuardClauseFailure> {
        match self {
            Error::GuardClause(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_missing_guard(&self) -> bool {
        self.guard_failure()
            .map(|f| f.kind == FailureKind::MissingGuard)
            .unwrap_or(false)
    }

    pub fn is_wrong_guard(&self) -> bool {
        self.guard_failure()
            .map(|f| f.kind == FailureKind::WrongGuard)
            .unwrap_or(false)
    }
}

impl From<GuardClauseFailure> for Error {
    fn from(failure: GuardClauseFailure) -> Self {
        Error::GuardClause(Box::new(failure))
    }
}

/// Result type alias for guard clause operations
pub type Result<T> = std::result::Result<T, Error>;

// ── Creation Failures ─────────────────────────────────────

/// A value source or the synthesizer could not produce a required value
#[derive(Debug, Clone, PartialEq)]
pub struct CreationFailure {
    pub data_type: DataType,
    /// Member whose argument was being created, when known
    pub member: Option<String>,
    /// Parameter whose argument was being created, when known
    pub parameter: Option<String>,
    pub reason: String,
    pub cause: Option<Box<CreationFailure>>,
}

impl CreationFailure {
    pub fn new(data_type: DataType, reason: impl Into<String>) -> Self {
        CreationFailure {
            data_type,
            member: None,
            parameter: None,
            reason: reason.into(),
            cause: None,
        }
    }

    /// Attach the member and parameter the value was requested for
    pub fn for_parameter(mut self, member: impl Into<String>, parameter: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self.parameter = Some(parameter.into());
        self
    }

    pub fn for_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    pub fn caused_by(mut self, cause: CreationFailure) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl fmt::Display for CreationFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "cannot create an instance of {}", self.data_type)?;
        match (&self.member, &self.parameter) {
            (Some(member), Some(parameter)) => {
                write!(f, " for parameter '{}' of {}", parameter, member)?
            }
            (Some(member), None) => write!(f, " for {}", member)?,
            _ => {}
        }
        write!(f, ": {}", self.reason)
    }
}

impl std::error::Error for CreationFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

// ── Guard Clause Failures ─────────────────────────────────

/// Which way a member failed to guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FailureKind {
    /// The invalid value was accepted without any fault
    MissingGuard,
    /// A fault was raised, but not the expected one
    WrongGuard,
}

/// Diagnostic for a member that did not guard one of its parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GuardClauseFailure {
    pub kind: FailureKind,
    /// Display form of the member, e.g. `Order::.ctor(String name)`
    pub member: String,
    pub declaring_type: String,
    pub is_static: bool,
    pub parameter: Option<String>,
    pub parameter_type: Option<DataType>,
    /// Rendered invalid value, e.g. `null` or `""`
    pub value: String,
    /// What the convention expected, e.g. `a NullArgument fault`
    pub expected: String,
    /// Fault actually observed (wrong guard only)
    pub cause: Option<Fault>,
    /// The member returned a lazily evaluated sequence
    pub deferred: bool,
}

impl fmt::Display for GuardClauseFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let parameter = self.parameter.as_deref().unwrap_or("?");
        write!(
            f,
            "An attempt was made to assign the value {} to the parameter \"{}\" of \"{}\", ",
            self.value, parameter, self.member
        )?;
        match self.kind {
            FailureKind::MissingGuard => write!(
                f,
                "and no guard clause prevented this. Are you missing a guard clause? Expected {}.",
                self.expected
            )?,
            FailureKind::WrongGuard => {
                write!(
                    f,
                    "and a guard clause prevented this, but it raised the wrong fault. Expected {}",
                    self.expected
                )?;
                match self.cause {
                    Some(ref cause) => write!(f, ", observed {}.", cause)?,
                    None => write!(f, ".")?,
                }
            }
        }
        if let Some(ref ty) = self.parameter_type {
            write!(f, "\nParameter type: {}", ty)?;
        }
        write!(f, "\nDeclaring type: {}", self.declaring_type)?;
        if self.is_static {
            write!(
                f,
                "\nThe member is static: the value was passed without an owner instance."
            )?;
        }
        if self.deferred && self.kind == FailureKind::MissingGuard {
            write!(
                f,
                "\nThe member returns a deferred sequence, which was enumerated to the end \
                 without a fault. A guard clause inside a generator body only runs on \
                 enumeration; check that the generator body validates the parameter, or \
                 move the check into an eagerly evaluated outer member."
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for GuardClauseFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(kind: FailureKind) -> GuardClauseFailure {
        GuardClauseFailure {
            kind,
            member: "Greeter::.ctor(String name)".into(),
            declaring_type: "Greeter".into(),
            is_static: false,
            parameter: Some("name".into()),
            parameter_type: Some(DataType::Str),
            value: "null".into(),
            expected: "a NullArgument fault".into(),
            cause: None,
            deferred: false,
        }
    }

    #[test]
    fn test_missing_guard_message_names_member_and_parameter() {
        let msg = failure(FailureKind::MissingGuard).to_string();
        assert!(msg.contains("\"name\""), "{}", msg);
        assert!(msg.contains("Greeter::.ctor(String name)"), "{}", msg);
        assert!(msg.contains("Are you missing a guard clause?"), "{}", msg);
        assert!(!msg.contains("deferred"), "{}", msg);
    }

    #[test]
    fn test_wrong_guard_message_includes_cause() {
        let mut f = failure(FailureKind::WrongGuard);
        f.cause = Some(Fault::null_reference());
        let msg = f.to_string();
        assert!(msg.contains("wrong fault"), "{}", msg);
        assert!(msg.contains("NullReference"), "{}", msg);
    }

    #[test]
    fn test_deferred_notice_only_on_missing_guard() {
        let mut missing = failure(FailureKind::MissingGuard);
        missing.deferred = true;
        assert!(missing.to_string().contains("deferred sequence"));

        let mut wrong = failure(FailureKind::WrongGuard);
        wrong.deferred = true;
        assert!(!wrong.to_string().contains("deferred sequence"));
    }

    #[test]
    fn test_static_notice() {
        let mut f = failure(FailureKind::MissingGuard);
        f.is_static = true;
        assert!(f.to_string().contains("The member is static"));
    }

    #[test]
    fn test_error_classification_helpers() {
        let err: Error = failure(FailureKind::MissingGuard).into();
        assert!(err.is_missing_guard());
        assert!(!err.is_wrong_guard());
        let err: Error = failure(FailureKind::WrongGuard).into();
        assert!(err.is_wrong_guard());
        assert!(Error::argument_invalid("type", "empty").guard_failure().is_none());
    }

    #[test]
    fn test_creation_failure_context_and_source() {
        use std::error::Error as _;
        let inner = CreationFailure::new(DataType::class("Shape"), "no accessible constructor");
        let outer = CreationFailure::new(DataType::generic("T"), "dummy type synthesis failed")
            .for_parameter("Canvas::Draw<T>(T shape)", "shape")
            .caused_by(inner);
        let msg = outer.to_string();
        assert!(msg.contains("parameter 'shape' of Canvas::Draw<T>(T shape)"), "{}", msg);
        assert!(outer.source().is_some());
    }
}
