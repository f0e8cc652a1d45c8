// We want a few things here:
// 1. A way to create a new error with a backtrace
// 2. A way to centralize setting a breakpoint to trap any error in the system fairly soon
//    after it's created (or at least when it's propagated from a library we use back to us)
// 3. Same but for logging / emitting error messages into the tracing/logging system
// 4. A small closed taxonomy (`Kind`) for the handful of error shapes callers actually
//    need to branch on, without requiring them to match on message strings.

use std::borrow::Cow;
use std::fmt;

use backtrace_error::DynBacktraceError;
use tracing::error;

#[cfg(test)]
use test_log::test;

/// The closed taxonomy of error kinds this system raises. See SPEC_FULL.md §7/§9.2.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Kind {
    /// `Unlock` against a name absent from the current pointer naming.
    InvalidPointer,
    /// `Unlock` against a name already in the unlocked set.
    AlreadyUnlocked,
    /// A context produced during automation was its own ancestor.
    Cycle,
    /// The hypertext fragment parser rejected its input.
    Parse,
    /// Registering a promisee on an already-resolved promise, or resolving
    /// an address that was never allocated. Indicates a programmer error.
    PromiseContractViolation,
    /// No pending context can advance a still-needed promise.
    SchedulerStarvation,
    /// The optional soft automation-step ceiling (§9.3) was exceeded.
    AutomationCeilingExceeded,
    /// Anything else (I/O, wrapped third-party errors, etc).
    Other,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::InvalidPointer => "invalid pointer reference",
            Kind::AlreadyUnlocked => "already unlocked",
            Kind::Cycle => "cycle detected",
            Kind::Parse => "parse error",
            Kind::PromiseContractViolation => "promise contract violation",
            Kind::SchedulerStarvation => "scheduler starvation",
            Kind::AutomationCeilingExceeded => "automation step ceiling exceeded",
            Kind::Other => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    inner: DynBacktraceError,
}

pub type Result<T> = std::result::Result<T, Error>;

struct SimpleErr(Cow<'static, str>);

impl fmt::Debug for SimpleErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl fmt::Display for SimpleErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for SimpleErr {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.inner)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<E> for Error {
    fn from(err: E) -> Error {
        Error::new(Kind::Other, err)
    }
}

impl Error {
    pub fn new<E: std::error::Error + Send + Sync + 'static>(kind: Kind, err: E) -> Error {
        error!(target: "loom", kind = %kind, "{:?}", err);
        Error {
            kind,
            inner: DynBacktraceError::from(err),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }
}

pub fn err(kind: Kind, msg: impl Into<Cow<'static, str>>) -> Error {
    Error::new(kind, SimpleErr(msg.into()))
}

#[test]
fn test_error_kind_round_trips() {
    let e = err(Kind::InvalidPointer, "$9 is not visible in this context");
    assert_eq!(e.kind(), Kind::InvalidPointer);
    assert!(format!("{e}").contains("invalid pointer reference"));
}

#[test]
fn test_wrapped_error_defaults_to_other() {
    let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
    let e: Error = io_err.into();
    assert_eq!(e.kind(), Kind::Other);
}
