//! Resolving functions and the promise resolution procedure.

use crate::error::TypeError;
use crate::promise::fulfill_promise;
use crate::promise::reject_promise;
use crate::promise_jobs::new_promise_resolve_thenable_job;
use crate::promise_jobs::ThenAction;
use crate::{Function, Promise, Value};
use std::cell::Cell;
use std::rc::Rc;
use tracing::debug;

/// Creates a `resolve`/`reject` pair for `promise`.
///
/// The pair shares one `already_resolved` latch. This matters when:
/// - an executor calls both `resolve` and `reject`,
/// - or calls `resolve(thenable)` and then calls `resolve` again before the thenable job runs,
/// - or a thenable calls its callbacks more than once.
pub(crate) fn create_resolving_functions(promise: &Promise) -> (Function, Function) {
  let already_resolved = Rc::new(Cell::new(false));

  let resolve = {
    let promise = promise.clone();
    let already_resolved = already_resolved.clone();
    Function::named("resolve", move |_this, args| {
      if already_resolved.replace(true) {
        return Ok(Value::Undefined);
      }
      resolve_promise(&promise, args.first().cloned().unwrap_or_default());
      Ok(Value::Undefined)
    })
  };

  let reject = {
    let promise = promise.clone();
    Function::named("reject", move |_this, args| {
      if already_resolved.replace(true) {
        return Ok(Value::Undefined);
      }
      reject_promise(&promise, args.first().cloned().unwrap_or_default());
      Ok(Value::Undefined)
    })
  };

  (resolve, reject)
}

/// Resolves `promise` with `resolution`.
///
/// - Resolving a promise with itself rejects it with a `TypeError`.
/// - Thenables are adopted: a job calls their `then` with a fresh pair of resolving functions,
///   so every level of a thenable chain has its own latch and its own job.
/// - Anything else fulfills the promise directly.
pub(crate) fn resolve_promise(promise: &Promise, resolution: Value) {
  if let Value::Promise(p) = &resolution {
    if p.ptr_eq(promise) {
      debug!("promise resolved with itself");
      reject_promise(promise, TypeError::SelfResolution.into());
      return;
    }
  }

  let then_action = match &resolution {
    Value::Promise(p) => Some(ThenAction::Promise(p.clone())),
    Value::Object(obj) => match obj.get("then") {
      Ok(Value::Function(then)) => Some(ThenAction::Function(then)),
      Ok(_) => None,
      Err(thrown) => {
        reject_promise(promise, thrown);
        return;
      }
    },
    _ => None,
  };
  let Some(then_action) = then_action else {
    fulfill_promise(promise, resolution);
    return;
  };

  let (resolve, reject) = create_resolving_functions(promise);
  promise.queue().enqueue(new_promise_resolve_thenable_job(
    resolution,
    then_action,
    resolve,
    reject,
  ));
}
