//! `Promise.resolve`, `Promise.reject`, `Promise.all` and `Promise.race`.
//!
//! These only use the public surface of the core: the brand's factory, resolving functions and
//! `then`.

use crate::brand::Brand;
use crate::error::TypeError;
use crate::promise::call_resolving_function;
use crate::promise::Deferred;
use crate::{Function, Promise, Value};
use std::cell::Cell;
use std::cell::RefCell;
use std::mem;
use std::rc::Rc;
use tracing::debug;

impl Brand {
  /// `Promise.resolve(value)`.
  ///
  /// A promise of this brand is returned as is. Anything else is wrapped in a new promise resolved
  /// with `value`, adopting it if it is a thenable.
  pub fn resolve(&self, value: impl Into<Value>) -> Promise {
    let value = value.into();
    if let Value::Promise(p) = &value {
      if self.is_brand_of(p) {
        return p.clone();
      }
    }
    let Deferred { promise, resolve, .. } = self.defer();
    call_resolving_function(&resolve, value);
    promise
  }

  /// `Promise.reject(reason)`. The reason is never unwrapped, even if it is a promise.
  pub fn reject(&self, reason: impl Into<Value>) -> Promise {
    let Deferred { promise, reject, .. } = self.defer();
    call_resolving_function(&reject, reason.into());
    promise
  }

  /// `Promise.all(iterable)`.
  ///
  /// Fulfills with a list of the element values in input order once every element fulfilled, or
  /// rejects with the first rejection reason in time. Rejects with a `TypeError` if `iterable` is
  /// not a list.
  pub fn all(&self, iterable: impl Into<Value>) -> Promise {
    let Deferred {
      promise,
      resolve,
      reject,
    } = self.defer();

    let Value::List(items) = iterable.into() else {
      let err = TypeError::NotIterable {
        combinator: "Promise.all",
      };
      call_resolving_function(&reject, err.into());
      return promise;
    };

    if items.is_empty() {
      call_resolving_function(&resolve, Value::empty_list());
      return promise;
    }

    let remaining = Rc::new(Cell::new(items.len()));
    let values = Rc::new(RefCell::new(vec![Value::Undefined; items.len()]));

    for (index, item) in items.iter().enumerate() {
      let next = self.resolve(item.clone());

      let on_fulfilled = {
        let remaining = remaining.clone();
        let values = values.clone();
        let resolve = resolve.clone();
        Function::named("resolveElement", move |_this, args| {
          values.borrow_mut()[index] = args.first().cloned().unwrap_or_default();
          let left = remaining.get() - 1;
          remaining.set(left);
          if left == 0 {
            let values = mem::take(&mut *values.borrow_mut());
            resolve.call(&Value::Undefined, &[Value::from(values)])?;
          }
          Ok(Value::Undefined)
        })
      };

      next.then(Some(on_fulfilled), Some(reject.clone()));
    }

    promise
  }

  /// `Promise.race(iterable)`.
  ///
  /// Settles the same way as the first element to settle. An empty list never settles. Rejects
  /// with a `TypeError` if `iterable` is not a list.
  pub fn race(&self, iterable: impl Into<Value>) -> Promise {
    let Deferred {
      promise,
      resolve,
      reject,
    } = self.defer();

    let Value::List(items) = iterable.into() else {
      let err = TypeError::NotIterable {
        combinator: "Promise.race",
      };
      call_resolving_function(&reject, err.into());
      return promise;
    };

    if items.is_empty() {
      debug!("Promise.race called with no elements; the result never settles");
    }

    for item in items.iter() {
      self
        .resolve(item.clone())
        .then(Some(resolve.clone()), Some(reject.clone()));
    }

    promise
  }
}
