//! The promise state machine.
//!
//! A [`Promise`] is a shared handle to a record holding its state, its settled value, and the
//! ordered list of reactions registered by `then`. Settlement happens only through the resolving
//! functions created alongside the promise (see [`Deferred`]), and only once: every later attempt
//! to fulfill or reject is a no-op.
//!
//! Reactions never run inline. Settling a promise (or calling `then` on an already-settled one)
//! enqueues one reaction job per reaction on the brand's [`JobQueue`], in registration order.

use crate::brand::Brand;
use crate::job_queue::JobQueue;
use crate::promise_jobs::new_promise_reaction_job;
use crate::promise_rejection_tracker::PromiseRejectionOperation;
use crate::resolution::create_resolving_functions;
use crate::{Function, Value};
use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;
use tracing::debug;
use tracing::warn;

/// The observable state of a promise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseState {
  Pending,
  Fulfilled,
  Rejected,
}

/// Which handler of a reaction a job should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseReactionType {
  Fulfill,
  Reject,
}

/// A promise together with the resolving functions that settle it.
///
/// The two functions share a single "already resolved" latch: whichever is called first wins and
/// every later call to either is ignored.
#[derive(Debug, Clone)]
pub struct Deferred {
  pub promise: Promise,
  pub resolve: Function,
  pub reject: Function,
}

impl Deferred {
  /// Allocates a new pending promise of `brand` and its resolving functions.
  ///
  /// This is the allocation primitive [`PromiseFactory`](crate::PromiseFactory) implementations
  /// build on.
  pub fn pending(brand: &Brand) -> Self {
    let promise = Promise::pending(brand.clone());
    let (resolve, reject) = create_resolving_functions(&promise);
    Self {
      promise,
      resolve,
      reject,
    }
  }
}

/// Calls a resolving function from a place that has no caller to propagate a throw to.
///
/// The functions made by [`Deferred::pending`] never throw; a throw from one supplied by a
/// custom [`PromiseFactory`](crate::PromiseFactory) is logged.
pub(crate) fn call_resolving_function(function: &Function, argument: Value) {
  if let Err(thrown) = function.call(&Value::Undefined, &[argument]) {
    warn!(function = function.name(), error = ?thrown, "resolving function threw");
  }
}

/// A reaction registered by `then`: the optional handlers plus the derived promise they settle.
#[derive(Debug, Clone)]
pub(crate) struct PromiseReaction {
  pub capability: Deferred,
  pub on_fulfilled: Option<Function>,
  pub on_rejected: Option<Function>,
}

#[derive(Clone, Debug)]
enum PromiseRecordState {
  Pending,
  Fulfilled(Value),
  Rejected(Value),
}

struct PromiseInner {
  brand: Brand,
  state: PromiseRecordState,
  is_handled: bool,
  reactions: Vec<PromiseReaction>,
}

impl Drop for PromiseInner {
  // A pending promise owns its reactions, whose derived promises own theirs. Unlink the chain
  // with a worklist so dropping a long `then` chain doesn't recurse once per link.
  fn drop(&mut self) {
    let mut worklist = mem::take(&mut self.reactions);
    while let Some(reaction) = worklist.pop() {
      let PromiseReaction {
        capability,
        on_fulfilled,
        on_rejected,
      } = reaction;
      let Deferred {
        promise,
        resolve,
        reject,
      } = capability;
      // The resolving functions hold clones of the derived promise.
      drop(resolve);
      drop(reject);
      drop(on_fulfilled);
      drop(on_rejected);
      if let Ok(derived) = Rc::try_unwrap(promise.inner) {
        worklist.append(&mut derived.into_inner().reactions);
      }
    }
  }
}

/// A handle to a promise. Clones refer to the same promise.
#[derive(Clone)]
pub struct Promise {
  inner: Rc<RefCell<PromiseInner>>,
}

impl Promise {
  pub(crate) fn pending(brand: Brand) -> Self {
    Self {
      inner: Rc::new(RefCell::new(PromiseInner {
        brand,
        state: PromiseRecordState::Pending,
        is_handled: false,
        reactions: Vec::new(),
      })),
    }
  }

  /// `new Promise(executor)` using the standard brand.
  ///
  /// See [`Brand::construct`].
  pub fn new(executor: Function) -> Self {
    Brand::standard().construct(executor)
  }

  /// `Promise.resolve(value)` using the standard brand.
  pub fn resolve(value: impl Into<Value>) -> Self {
    Brand::standard().resolve(value)
  }

  /// `Promise.reject(reason)` using the standard brand.
  pub fn reject(reason: impl Into<Value>) -> Self {
    Brand::standard().reject(reason)
  }

  /// `Promise.all(iterable)` using the standard brand.
  pub fn all(iterable: impl Into<Value>) -> Self {
    Brand::standard().all(iterable)
  }

  /// `Promise.race(iterable)` using the standard brand.
  pub fn race(iterable: impl Into<Value>) -> Self {
    Brand::standard().race(iterable)
  }

  pub fn state(&self) -> PromiseState {
    match self.inner.borrow().state {
      PromiseRecordState::Pending => PromiseState::Pending,
      PromiseRecordState::Fulfilled(_) => PromiseState::Fulfilled,
      PromiseRecordState::Rejected(_) => PromiseState::Rejected,
    }
  }

  pub fn is_pending(&self) -> bool {
    self.state() == PromiseState::Pending
  }

  /// The fulfillment value or rejection reason, or `None` while pending.
  pub fn result(&self) -> Option<Value> {
    match &self.inner.borrow().state {
      PromiseRecordState::Pending => None,
      PromiseRecordState::Fulfilled(v) | PromiseRecordState::Rejected(v) => Some(v.clone()),
    }
  }

  pub fn brand(&self) -> Brand {
    self.inner.borrow().brand.clone()
  }

  pub(crate) fn queue(&self) -> JobQueue {
    self.inner.borrow().brand.queue().clone()
  }

  pub fn ptr_eq(&self, other: &Promise) -> bool {
    Rc::ptr_eq(&self.inner, &other.inner)
  }

  /// `promise.then(onFulfilled, onRejected)`.
  ///
  /// Returns a new promise created through this promise's brand. A missing handler passes the
  /// value or reason through unchanged; a handler's `Err` rejects the returned promise.
  pub fn then(&self, on_fulfilled: Option<Function>, on_rejected: Option<Function>) -> Promise {
    let capability = self.brand().defer();
    let derived = capability.promise.clone();
    perform_promise_then(self, on_fulfilled, on_rejected, capability);
    derived
  }

  /// `promise.catch(onRejected)`, i.e. `then(None, on_rejected)`.
  pub fn catch(&self, on_rejected: Option<Function>) -> Promise {
    self.then(None, on_rejected)
  }
}

impl fmt::Debug for Promise {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    // Only the state: the settled value may contain this promise.
    let mut s = f.debug_struct("Promise");
    match self.inner.try_borrow() {
      Ok(inner) => {
        s.field("brand", &inner.brand.name());
        s.field(
          "state",
          &match inner.state {
            PromiseRecordState::Pending => PromiseState::Pending,
            PromiseRecordState::Fulfilled(_) => PromiseState::Fulfilled,
            PromiseRecordState::Rejected(_) => PromiseState::Rejected,
          },
        );
      }
      Err(_) => {
        s.field("state", &"<borrowed>");
      }
    }
    s.finish()
  }
}

fn perform_promise_then(
  promise: &Promise,
  on_fulfilled: Option<Function>,
  on_rejected: Option<Function>,
  capability: Deferred,
) {
  let reaction = PromiseReaction {
    capability,
    on_fulfilled,
    on_rejected,
  };

  let (state, was_handled, queue) = {
    let mut inner = promise.inner.borrow_mut();
    let was_handled = mem::replace(&mut inner.is_handled, true);
    if let PromiseRecordState::Pending = inner.state {
      inner.reactions.push(reaction);
      return;
    }
    (inner.state.clone(), was_handled, inner.brand.queue().clone())
  };

  match state {
    PromiseRecordState::Pending => {}
    PromiseRecordState::Fulfilled(value) => {
      queue.enqueue(new_promise_reaction_job(
        reaction,
        PromiseReactionType::Fulfill,
        value,
      ));
    }
    PromiseRecordState::Rejected(reason) => {
      if !was_handled {
        queue.promise_rejection_tracker(promise, PromiseRejectionOperation::Handle);
      }
      queue.enqueue(new_promise_reaction_job(
        reaction,
        PromiseReactionType::Reject,
        reason,
      ));
    }
  }
}

fn trigger_promise_reactions(
  queue: &JobQueue,
  reactions: Vec<PromiseReaction>,
  type_: PromiseReactionType,
  argument: Value,
) {
  for reaction in reactions {
    queue.enqueue(new_promise_reaction_job(reaction, type_, argument.clone()));
  }
}

/// Transitions a pending promise to fulfilled. No-op if already settled.
pub(crate) fn fulfill_promise(promise: &Promise, value: Value) {
  let (reactions, queue) = {
    let mut inner = promise.inner.borrow_mut();
    if !matches!(inner.state, PromiseRecordState::Pending) {
      return;
    }
    inner.state = PromiseRecordState::Fulfilled(value.clone());
    (mem::take(&mut inner.reactions), inner.brand.queue().clone())
  };
  debug!(reactions = reactions.len(), "promise fulfilled");
  trigger_promise_reactions(&queue, reactions, PromiseReactionType::Fulfill, value);
}

/// Transitions a pending promise to rejected. No-op if already settled.
pub(crate) fn reject_promise(promise: &Promise, reason: Value) {
  let (reactions, is_handled, queue) = {
    let mut inner = promise.inner.borrow_mut();
    if !matches!(inner.state, PromiseRecordState::Pending) {
      return;
    }
    inner.state = PromiseRecordState::Rejected(reason.clone());
    (
      mem::take(&mut inner.reactions),
      inner.is_handled,
      inner.brand.queue().clone(),
    )
  };
  debug!(reactions = reactions.len(), handled = is_handled, "promise rejected");
  if !is_handled {
    queue.promise_rejection_tracker(promise, PromiseRejectionOperation::Reject);
  }
  trigger_promise_reactions(&queue, reactions, PromiseReactionType::Reject, reason);
}
