use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::env::Scope;
use crate::exit::{Cause, Defect, Exit};

/// The boxed body of an effect.
type Body<A, E, R> = Box<dyn FnOnce(R) -> BoxFuture<'static, Exit<A, E>> + Send>;

/// A description of a computation that has not been executed yet.
///
/// Running it with an environment of type `R` produces either a success value
/// of type `A`, a typed failure of type `E` or a defect.
pub struct Effect<A, E, R = ()> {
    body: Body<A, E, R>,
}

impl<A, E, R> Effect<A, E, R>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Clone + Send + 'static,
{
    /// Create an effect from an asynchronous function producing an exit.
    pub fn from_exit<F, Fut>(f: F) -> Self
    where
        F: FnOnce(R) -> Fut + Send + 'static,
        Fut: Future<Output = Exit<A, E>> + Send + 'static,
    {
        Self { body: Box::new(move |env| f(env).boxed()) }
    }

    /// Create an effect from an asynchronous function producing a result.
    ///
    /// An `Err` ends up in the typed failure channel. A panic is a defect.
    pub fn from_future<F, Fut>(f: F) -> Self
    where
        F: FnOnce(R) -> Fut + Send + 'static,
        Fut: Future<Output = Result<A, E>> + Send + 'static,
    {
        Self::from_exit(move |env| f(env).map(Exit::from))
    }

    /// An effect that succeeds with the value.
    pub fn succeed(value: A) -> Self {
        Self::from_exit(move |_| async move { Exit::Success(value) })
    }

    /// An effect that fails with the typed error.
    pub fn fail(error: E) -> Self {
        Self::failure(Cause::Fail(error))
    }

    /// An effect that dies with the payload as its defect.
    pub fn die<T: Any + Send + Sync>(payload: T) -> Self {
        Self::failure(Cause::Die(Defect::new(payload)))
    }

    /// An effect that is interrupted as soon as it runs.
    pub fn interrupt() -> Self {
        Self::failure(Cause::Interrupt)
    }

    /// An effect that fails with an arbitrary cause.
    pub fn failure(cause: Cause<E>) -> Self {
        Self::from_exit(move |_| async move { Exit::Failure(cause) })
    }

    /// An effect that reads something from its environment.
    pub fn service<F>(f: F) -> Self
    where
        F: FnOnce(&R) -> A + Send + 'static,
    {
        Self::from_exit(move |env| {
            let value = f(&env);
            async move { Exit::Success(value) }
        })
    }

    /// Transform the success value.
    pub fn map<F, B>(self, f: F) -> Effect<B, E, R>
    where
        F: FnOnce(A) -> B + Send + 'static,
        B: Send + 'static,
    {
        Effect::from_exit(move |env| async move { self.exit(env).await.map(f) })
    }

    /// Transform the typed failure. Defects are left untouched.
    pub fn map_err<F, E2>(self, f: F) -> Effect<A, E2, R>
    where
        F: Fn(E) -> E2 + Send + 'static,
        E2: Send + 'static,
    {
        Effect::from_exit(move |env| async move {
            match self.exit(env).await {
                Exit::Success(value) => Exit::Success(value),
                Exit::Failure(cause) => Exit::Failure(cause.map(&f)),
            }
        })
    }

    /// Continue with another effect once this one succeeded.
    pub fn and_then<F, B>(self, f: F) -> Effect<B, E, R>
    where
        F: FnOnce(A) -> Effect<B, E, R> + Send + 'static,
        B: Send + 'static,
    {
        Effect::from_exit(move |env: R| async move {
            match self.exit(env.clone()).await {
                Exit::Success(value) => f(value).exit(env).await,
                Exit::Failure(cause) => Exit::Failure(cause),
            }
        })
    }

    /// Recover from a typed failure.
    ///
    /// Only `Cause::Fail` is handed to the handler. Defects, interruptions and
    /// composite causes pass through.
    pub fn catch<F>(self, f: F) -> Self
    where
        F: FnOnce(E) -> Self + Send + 'static,
    {
        Self::from_exit(move |env: R| async move {
            match self.exit(env.clone()).await {
                Exit::Failure(Cause::Fail(error)) => f(error).exit(env).await,
                exit => exit,
            }
        })
    }

    /// Run both effects concurrently and combine their results.
    ///
    /// When both fail, the failures are combined into a parallel cause.
    pub fn zip_par<B>(self, other: Effect<B, E, R>) -> Effect<(A, B), E, R>
    where
        B: Send + 'static,
    {
        Effect::from_exit(move |env: R| async move {
            let (left, right) = futures::join!(self.exit(env.clone()), other.exit(env));
            match (left, right) {
                (Exit::Success(a), Exit::Success(b)) => Exit::Success((a, b)),
                (Exit::Success(_), Exit::Failure(cause))
                | (Exit::Failure(cause), Exit::Success(_)) => Exit::Failure(cause),
                (Exit::Failure(a), Exit::Failure(b)) => Exit::Failure(a.both(b)),
            }
        })
    }

    /// Execute the effect and observe how it settled.
    ///
    /// Panics during execution are turned into defects.
    pub async fn run_exit(self, env: R) -> Exit<A, E> {
        self.exit(env).await
    }

    /// Execute the effect.
    ///
    /// A typed failure is returned as `Err`.
    ///
    /// # Panics
    /// A defect is re-raised as a panic carrying the [`Defect`], so it can't
    /// be handled like an ordinary error. Interruptions and composite causes
    /// panic as well.
    pub async fn run(self, env: R) -> Result<A, E> {
        match self.exit(env).await {
            Exit::Success(value) => Ok(value),
            Exit::Failure(Cause::Fail(error)) => Err(error),
            Exit::Failure(Cause::Die(defect)) => std::panic::resume_unwind(Box::new(defect)),
            Exit::Failure(cause) => {
                panic!("effect-memo: effect ended with an unhandled {} cause", cause.kind())
            }
        }
    }

    /// Execute the body, capturing panics as defects.
    fn exit(self, env: R) -> BoxFuture<'static, Exit<A, E>> {
        let body = self.body;
        match std::panic::catch_unwind(AssertUnwindSafe(move || body(env))) {
            Ok(future) => AssertUnwindSafe(future)
                .catch_unwind()
                .map(|result| match result {
                    Ok(exit) => exit,
                    Err(payload) => Exit::Failure(Cause::Die(Defect::from_panic(payload))),
                })
                .boxed(),
            Err(payload) => {
                let defect = Defect::from_panic(payload);
                async move { Exit::Failure(Cause::Die(defect)) }.boxed()
            }
        }
    }
}

impl<E, R> Effect<R, E, R>
where
    E: Send + 'static,
    R: Clone + Send + 'static,
{
    /// An effect that succeeds with the whole environment it runs with.
    pub fn environment() -> Self {
        Self::service(R::clone)
    }
}

impl<A, E, R> Effect<A, E, R>
where
    A: Clone + Send + Sync + 'static,
    E: Send + 'static,
    R: AsRef<Scope> + Clone + Send + 'static,
{
    /// Acquire a resource and release it when the environment's scope closes.
    pub fn acquire_release<F>(acquire: Self, release: F) -> Self
    where
        F: FnOnce(A) + Send + 'static,
    {
        Self::from_exit(move |env: R| async move {
            let scope = env.as_ref().clone();
            let exit = acquire.exit(env).await;
            if let Exit::Success(resource) = &exit {
                let resource = resource.clone();
                scope.add_finalizer(move || release(resource));
            }
            exit
        })
    }
}

impl<A, E, R> Debug for Effect<A, E, R> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.pad("Effect(..)")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_channels() {
        let ok = Effect::<_, String>::succeed(2).map(|x| x * 3);
        assert_eq!(ok.run(()).await, Ok(6));

        let failed = Effect::<u8, _>::fail("nope").map_err(|e| e.len());
        assert_eq!(failed.run(()).await, Err(4));

        let died = Effect::<u8, String>::die("dead").run_exit(()).await;
        match died {
            Exit::Failure(Cause::Die(defect)) => assert_eq!(defect.message(), "dead"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_panics_become_defects() {
        let sync = Effect::<u8, String>::from_exit(|()| -> futures::future::Ready<_> {
            panic!("sync boom")
        });
        let asynch = Effect::<u8, String>::from_future(|()| async { panic!("async boom") });

        for (effect, message) in [(sync, "sync boom"), (asynch, "async boom")] {
            match effect.run_exit(()).await {
                Exit::Failure(Cause::Die(defect)) => assert_eq!(defect.message(), message),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_catch_only_sees_typed_failures() {
        let recovered = Effect::<u8, &str>::fail("e").catch(|_| Effect::succeed(1));
        assert_eq!(recovered.run(()).await, Ok(1));

        let handled = Arc::new(AtomicUsize::new(0));
        let counter = handled.clone();
        let effect = Effect::<u8, &str>::die("fatal").catch(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Effect::succeed(1)
        });
        assert!(matches!(effect.run_exit(()).await, Exit::Failure(Cause::Die(_))));
        assert_eq!(handled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zip_par_builds_parallel_cause() {
        let both = Effect::<u8, u8>::succeed(1).zip_par(Effect::succeed(2));
        assert_eq!(both.run(()).await, Ok((1, 2)));

        let one = Effect::<u8, u8>::succeed(1).zip_par(Effect::<u8, u8>::fail(2));
        assert_eq!(one.run(()).await, Err(2));

        let two = Effect::<u8, u8>::fail(1).zip_par(Effect::<u8, u8>::fail(2));
        match two.run_exit(()).await {
            Exit::Failure(cause) => assert_eq!(cause.kind(), "parallel"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_environment_flows_through_and_then() {
        let effect = Effect::<u32, (), u32>::service(|n| *n)
            .and_then(|n| Effect::service(move |m| n + *m));
        assert_eq!(effect.run(20).await, Ok(40));
    }

    #[tokio::test]
    async fn test_environment_reads_whole_environment() {
        let effect = Effect::<_, (), (u8, &'static str)>::environment()
            .map(|(n, s)| s.repeat(n.into()));
        assert_eq!(effect.run((3, "ab")).await, Ok("ababab".to_string()));
    }

    #[tokio::test]
    async fn test_acquire_release() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let scope = Scope::new();

        let effect = Effect::<u8, (), Scope>::acquire_release(Effect::succeed(5), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(effect.run(scope.clone()).await, Ok(5));
        assert_eq!(released.load(Ordering::SeqCst), 0);
        scope.close();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
