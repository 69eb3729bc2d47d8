//! Promise job closures.
//!
//! These are the only places user callbacks are invoked from, and they only ever run from a
//! [`JobQueue`](crate::JobQueue) checkpoint.

use crate::jobs::Job;
use crate::jobs::JobKind;
use crate::promise::PromiseReaction;
use crate::promise::PromiseReactionType;
use crate::{Function, Promise, Value};
use tracing::trace;

/// Creates a reaction job: runs the handler for `type_` (receiver `undefined`) and settles the
/// reaction's derived promise with the outcome.
pub(crate) fn new_promise_reaction_job(
  reaction: PromiseReaction,
  type_: PromiseReactionType,
  argument: Value,
) -> Job {
  Job::new(JobKind::Reaction, move || {
    let PromiseReaction {
      capability,
      on_fulfilled,
      on_rejected,
    } = reaction;

    let handler = match type_ {
      PromiseReactionType::Fulfill => on_fulfilled,
      PromiseReactionType::Reject => on_rejected,
    };

    let handler_result = match handler {
      Some(handler) => handler.call(&Value::Undefined, &[argument]),
      None => match type_ {
        PromiseReactionType::Fulfill => Ok(argument),
        PromiseReactionType::Reject => Err(argument),
      },
    };

    match handler_result {
      Ok(value) => capability.resolve.call(&Value::Undefined, &[value])?,
      Err(reason) => capability.reject.call(&Value::Undefined, &[reason])?,
    };
    Ok(())
  })
}

/// How a thenable's `then` is invoked.
pub(crate) enum ThenAction {
  /// The resolution is one of our promises.
  Promise(Promise),
  /// The resolution is an object with a callable `then`.
  Function(Function),
}

/// Creates a thenable job: calls `thenable.then(resolve, reject)` with receiver `thenable`.
///
/// A throw from `then` is routed to `reject`, which ignores it if `then` already called either
/// resolving function.
pub(crate) fn new_promise_resolve_thenable_job(
  thenable: Value,
  then_action: ThenAction,
  resolve: Function,
  reject: Function,
) -> Job {
  Job::new(JobKind::Thenable, move || {
    trace!(thenable = thenable.type_name(), "adopting thenable");
    let result = match then_action {
      ThenAction::Promise(promise) => {
        promise.then(Some(resolve), Some(reject.clone()));
        Ok(Value::Undefined)
      }
      ThenAction::Function(then) => then.call(
        &thenable,
        &[Value::Function(resolve), Value::Function(reject.clone())],
      ),
    };

    if let Err(thrown) = result {
      reject.call(&Value::Undefined, &[thrown])?;
    }
    Ok(())
  })
}
