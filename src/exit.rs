use std::any::Any;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;

/// An unrecoverable failure outside of an effect's typed error channel.
///
/// Defects are reference counted, so replaying a cached defect hands out the
/// very same instance to every observer.
#[derive(Clone)]
pub struct Defect(Arc<dyn Any + Send + Sync>);

impl Defect {
    /// Wrap an arbitrary payload.
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self(Arc::new(payload))
    }

    /// Recover a defect from a caught panic payload.
    ///
    /// A panic that was raised with a `Defect` payload yields that defect
    /// again. Otherwise, the panic message or the [`Unsupported`] value is
    /// preserved.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<Defect>() {
            Ok(defect) => return *defect,
            Err(payload) => payload,
        };

        let payload = match payload.downcast::<Unsupported>() {
            Ok(unsupported) => return Self::new(*unsupported),
            Err(payload) => payload,
        };

        if let Some(&message) = payload.downcast_ref::<&'static str>() {
            Self::new(message)
        } else if let Ok(message) = payload.downcast::<String>() {
            Self::new(*message)
        } else {
            Self::new("unknown panic")
        }
    }

    /// Try to view the payload as a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// A human-readable description of the payload.
    pub fn message(&self) -> String {
        if let Some(message) = self.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = self.downcast_ref::<String>() {
            message.clone()
        } else if let Some(unsupported) = self.downcast_ref::<Unsupported>() {
            unsupported.to_string()
        } else {
            "opaque defect".into()
        }
    }

    /// Whether both defects are the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Debug for Defect {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Defect({:?})", self.message())
    }
}

impl Display for Defect {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.pad(&self.message())
    }
}

/// Why an effect did not succeed.
#[derive(Debug, Clone)]
pub enum Cause<E> {
    /// No failure at all, the neutral element of composition.
    Empty,
    /// An expected failure from the typed error channel.
    Fail(E),
    /// An unrecoverable defect.
    Die(Defect),
    /// The execution was cancelled before it settled.
    Interrupt,
    /// Two failures that happened one after the other.
    Sequential(Box<Cause<E>>, Box<Cause<E>>),
    /// Two failures that happened in concurrently composed effects.
    Parallel(Box<Cause<E>>, Box<Cause<E>>),
}

impl<E> Cause<E> {
    /// Compose with a cause that happened afterwards.
    pub fn then(self, next: Self) -> Self {
        match (self, next) {
            (Self::Empty, cause) | (cause, Self::Empty) => cause,
            (first, second) => Self::Sequential(Box::new(first), Box::new(second)),
        }
    }

    /// Compose with a cause that happened concurrently.
    pub fn both(self, other: Self) -> Self {
        match (self, other) {
            (Self::Empty, cause) | (cause, Self::Empty) => cause,
            (left, right) => Self::Parallel(Box::new(left), Box::new(right)),
        }
    }

    /// Transform the typed failures.
    pub fn map<F, T>(self, f: &F) -> Cause<T>
    where
        F: Fn(E) -> T,
    {
        match self {
            Self::Empty => Cause::Empty,
            Self::Fail(error) => Cause::Fail(f(error)),
            Self::Die(defect) => Cause::Die(defect),
            Self::Interrupt => Cause::Interrupt,
            Self::Sequential(a, b) => Cause::Sequential(Box::new(a.map(f)), Box::new(b.map(f))),
            Self::Parallel(a, b) => Cause::Parallel(Box::new(a.map(f)), Box::new(b.map(f))),
        }
    }

    /// The shape of the cause, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Fail(_) => "fail",
            Self::Die(_) => "die",
            Self::Interrupt => "interrupt",
            Self::Sequential(..) => "sequential",
            Self::Parallel(..) => "parallel",
        }
    }
}

/// The result of executing an effect.
#[derive(Debug, Clone)]
pub enum Exit<A, E> {
    Success(A),
    Failure(Cause<E>),
}

impl<A, E> Exit<A, E> {
    /// Whether the effect succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Transform the success value.
    pub fn map<F, B>(self, f: F) -> Exit<B, E>
    where
        F: FnOnce(A) -> B,
    {
        match self {
            Self::Success(value) => Exit::Success(f(value)),
            Self::Failure(cause) => Exit::Failure(cause),
        }
    }
}

impl<A, E> From<Result<A, E>> for Exit<A, E> {
    fn from(result: Result<A, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(error) => Self::Failure(Cause::Fail(error)),
        }
    }
}

/// A settled execution that consists of a single leaf.
///
/// This is everything a memoized slot can faithfully replay.
#[derive(Debug, Clone)]
pub enum Outcome<A, E> {
    Success(A),
    Failure(E),
    Defect(Defect),
}

impl<A, E> Outcome<A, E> {
    /// Narrow an exit down to a single-leaf outcome.
    pub fn classify(exit: Exit<A, E>) -> Result<Self, Unsupported> {
        match exit {
            Exit::Success(value) => Ok(Self::Success(value)),
            Exit::Failure(Cause::Fail(error)) => Ok(Self::Failure(error)),
            Exit::Failure(Cause::Die(defect)) => Ok(Self::Defect(defect)),
            Exit::Failure(Cause::Interrupt) => Err(Unsupported::Interrupted),
            Exit::Failure(Cause::Empty) => Err(Unsupported::Empty),
            Exit::Failure(Cause::Sequential(..)) => Err(Unsupported::Sequential),
            Exit::Failure(Cause::Parallel(..)) => Err(Unsupported::Parallel),
        }
    }

    /// Turn the outcome back into an exit of the effect system.
    pub fn into_exit(self) -> Exit<A, E> {
        match self {
            Self::Success(value) => Exit::Success(value),
            Self::Failure(error) => Exit::Failure(Cause::Fail(error)),
            Self::Defect(defect) => Exit::Failure(Cause::Die(defect)),
        }
    }
}

/// A settled execution that a memoized slot refuses to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Unsupported {
    #[error("effect-memo: memoized execution was interrupted")]
    Interrupted,
    #[error("effect-memo: memoized execution failed with an empty cause")]
    Empty,
    #[error("effect-memo: memoized execution failed with a sequential cause")]
    Sequential,
    #[error("effect-memo: memoized execution failed with a parallel cause")]
    Parallel,
}
