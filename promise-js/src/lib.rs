//! Promise/A+ deferred values for `ecma-rs` runtimes.
//!
//! This crate provides:
//! - A promise state machine ([`Promise`]) with settle-once semantics and ordered reactions
//! - The promise resolution procedure, including guarded adoption of thenables
//! - `resolve`, `reject`, `all` and `race` combinators ([`Brand`])
//! - A FIFO job queue ([`JobQueue`]) through which every callback is dispatched
//! - A virtual-time event loop ([`EventLoop`]) for driving timers and checkpoints in tests
//!
//! # Scheduling
//!
//! Nothing in this crate runs a callback synchronously. Settling a promise, calling `then` on a
//! settled promise, and resolving with a thenable all enqueue jobs; they run only when the host
//! advances the queue (for example with [`JobQueue::perform_microtask_checkpoint`]). Reactions
//! registered on the same promise run in registration order.
//!
//! Execution is single-threaded: promises, brands and queues are `Rc`-based handles and are not
//! `Send`.
//!
//! # Brands
//!
//! Every promise belongs to a [`Brand`], which decides how new promises are allocated (via its
//! [`PromiseFactory`]) and which queue their jobs go to. Promises created by `then` and by the
//! combinators keep the brand of the promise or brand that created them, and
//! [`Brand::resolve`] only passes through promises of its own brand.
//!
//! ```
//! use promise_js::{EventLoop, Function, Value};
//!
//! let event_loop = EventLoop::default();
//! let doubled = event_loop
//!   .brand()
//!   .resolve(21)
//!   .then(Some(Function::unary(|v| Ok(Value::Number(v.as_number().unwrap_or(0.0) * 2.0)))), None);
//!
//! let settled = event_loop.block_on(&doubled).unwrap();
//! assert_eq!(settled.fulfilled(), Some(Value::Number(42.0)));
//! ```

mod brand;
mod combinators;
mod error;
mod event_loop;
mod job_queue;
mod jobs;
mod promise;
mod promise_jobs;
mod promise_rejection_tracker;
mod resolution;
mod value;

pub use crate::brand::Brand;
pub use crate::brand::PromiseFactory;
pub use crate::brand::StandardFactory;
pub use crate::error::SchedulerError;
pub use crate::error::TypeError;
pub use crate::event_loop::EventLoop;
pub use crate::event_loop::EventLoopOptions;
pub use crate::event_loop::Settled;
pub use crate::job_queue::JobQueue;
pub use crate::jobs::Job;
pub use crate::jobs::JobKind;
pub use crate::jobs::JobResult;
pub use crate::promise::Deferred;
pub use crate::promise::Promise;
pub use crate::promise::PromiseReactionType;
pub use crate::promise::PromiseState;
pub use crate::value::Completion;
pub use crate::value::ErrorKind;
pub use crate::value::ErrorObject;
pub use crate::value::Function;
pub use crate::value::Object;
pub use crate::value::Property;
pub use crate::value::Value;
