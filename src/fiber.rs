use tokio::task::JoinHandle;

use crate::effect::Effect;
use crate::exit::{Cause, Defect, Exit};

/// A running effect.
///
/// The effect executes on its own task, independently of whoever holds the
/// fiber. Dropping the fiber detaches it; only [`interrupt`](Self::interrupt)
/// cancels the execution.
#[derive(Debug)]
pub struct Fiber<A, E> {
    handle: JoinHandle<Exit<A, E>>,
}

impl<A, E> Fiber<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    /// Start executing an effect on the ambient tokio runtime.
    ///
    /// # Panics
    /// Panics when called outside of a tokio runtime.
    pub fn fork<R>(effect: Effect<A, E, R>, env: R) -> Self
    where
        R: Clone + Send + 'static,
    {
        Self { handle: tokio::spawn(effect.run_exit(env)) }
    }

    /// Cancel the execution.
    ///
    /// Joining an interrupted fiber yields `Cause::Interrupt`, unless it
    /// settled before the interruption took effect.
    pub fn interrupt(&self) {
        self.handle.abort();
    }

    /// Whether the execution has settled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the execution to settle.
    pub async fn join(self) -> Exit<A, E> {
        match self.handle.await {
            Ok(exit) => exit,
            Err(err) if err.is_cancelled() => Exit::Failure(Cause::Interrupt),
            Err(err) => match err.try_into_panic() {
                Ok(payload) => Exit::Failure(Cause::Die(Defect::from_panic(payload))),
                Err(_) => Exit::Failure(Cause::Interrupt),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_join() {
        let fiber = Fiber::fork(Effect::<_, ()>::succeed("done"), ());
        assert!(matches!(fiber.join().await, Exit::Success("done")));

        let fiber = Fiber::fork(Effect::<(), _>::fail(3), ());
        assert!(matches!(fiber.join().await, Exit::Failure(Cause::Fail(3))));
    }

    #[tokio::test]
    async fn test_interrupt() {
        let effect = Effect::<u8, ()>::from_future(|()| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1)
        });

        let fiber = Fiber::fork(effect, ());
        fiber.interrupt();
        assert!(matches!(fiber.join().await, Exit::Failure(Cause::Interrupt)));
    }
}
