//! Memoization of effectful computations.
//!
//! [`wrap`] turns a function returning an [`Effect`] into a [`Cached`]
//! function of the same shape. Within one [`Store`], every distinct argument
//! tuple executes the underlying effect at most once: concurrent callers share
//! the in-flight execution and later callers replay its outcome.
//!
//! ```
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! use effect_memo::{wrap, Capability, Effect, MemoStore};
//!
//! #[derive(Clone, Capability)]
//! struct Greeting(&'static str);
//!
//! let store = MemoStore::new();
//! let greet = wrap(&store, |name: String| {
//!     Effect::<String, (), Greeting>::service(move |greeting| {
//!         format!("{}, {name}!", greeting.0)
//!     })
//! });
//!
//! // The first run pins the environment for this argument.
//! let first = greet.call("Ada".to_string()).run(Greeting("Hello")).await;
//! let second = greet.call("Ada".to_string()).run(Greeting("Goodbye")).await;
//! assert_eq!(first, Ok("Hello, Ada!".to_string()));
//! assert_eq!(second, first);
//! # });
//! ```
//!
//! Outcomes are replayed on the channel they were produced on: typed failures
//! come back as typed failures and defects stay defects. Executions that were
//! interrupted or failed with a composite [`Cause`] are not replayable and
//! make every observer die with an [`Unsupported`] payload.

mod cached;
mod effect;
mod env;
mod exit;
mod fiber;
mod hash;
mod store;
#[cfg(feature = "testing")]
mod testing;

pub use crate::cached::{Cached, TAG, wrap};
pub use crate::effect::Effect;
pub use crate::env::{Capability, Environment, Flag, No, Scope, Unscoped, Yes};
pub use crate::exit::{Cause, Defect, Exit, Outcome, Unsupported};
pub use crate::fiber::Fiber;
pub use crate::hash::{FuncId, Key};
pub use crate::store::{Lookup, MemoStore, Store};

#[cfg(feature = "macros")]
pub use effect_memo_macros::Capability;

/// These are implementation details. Do not rely on them!
#[doc(hidden)]
pub mod internal {
    #[cfg(feature = "testing")]
    pub use crate::testing::last_was_hit;
}
