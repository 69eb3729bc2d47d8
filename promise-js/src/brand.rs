//! Brands: the identity a promise keeps through `then` and the combinators.
//!
//! Every place that needs a fresh promise (`then`, `construct`, `resolve`, `reject`, `all`,
//! `race`) asks the brand of the initiating promise (or the brand the combinator was called on)
//! to [`defer`](Brand::defer). The brand forwards to its [`PromiseFactory`], so a derived variant
//! only has to supply a factory to keep its identity across every chained promise.

use crate::job_queue::JobQueue;
use crate::promise::call_resolving_function;
use crate::promise::Deferred;
use crate::{Function, Promise, Value};
use std::fmt;
use std::rc::Rc;
use tracing::trace;

/// The overridable allocation hook behind a [`Brand`].
pub trait PromiseFactory {
  /// Allocates a new pending promise of `brand` and exposes its resolving functions.
  ///
  /// Implementations must return a promise whose [`Promise::brand`] is `brand`; the default does
  /// exactly that via [`Deferred::pending`].
  fn defer(&self, brand: &Brand) -> Deferred {
    Deferred::pending(brand)
  }
}

/// The factory used by [`Brand::new`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardFactory;

impl PromiseFactory for StandardFactory {}

struct BrandInner {
  name: Rc<str>,
  queue: JobQueue,
  factory: Box<dyn PromiseFactory>,
}

/// A promise variant. Clones refer to the same brand; two brands are the same only if one is a
/// clone of the other.
#[derive(Clone)]
pub struct Brand(Rc<BrandInner>);

thread_local! {
  static STANDARD_BRAND: Brand = Brand::new("Promise", JobQueue::global());
}

impl Brand {
  /// Creates a brand whose promises dispatch their jobs on `queue`.
  pub fn new(name: &str, queue: JobQueue) -> Self {
    Self::with_factory(name, queue, StandardFactory)
  }

  pub fn with_factory(name: &str, queue: JobQueue, factory: impl PromiseFactory + 'static) -> Self {
    Self(Rc::new(BrandInner {
      name: Rc::from(name),
      queue,
      factory: Box::new(factory),
    }))
  }

  /// This thread's `%Promise%`, bound to [`JobQueue::global`].
  pub fn standard() -> Self {
    STANDARD_BRAND.with(Brand::clone)
  }

  pub fn name(&self) -> &str {
    &self.0.name
  }

  pub fn queue(&self) -> &JobQueue {
    &self.0.queue
  }

  /// Allocates a new pending promise of this brand through its factory.
  pub fn defer(&self) -> Deferred {
    self.0.factory.defer(self)
  }

  pub fn same(&self, other: &Brand) -> bool {
    Rc::ptr_eq(&self.0, &other.0)
  }

  /// Whether `promise` was manufactured by this brand.
  pub fn is_brand_of(&self, promise: &Promise) -> bool {
    self.same(&promise.brand())
  }

  /// `new Promise(executor)`.
  ///
  /// Calls `executor` synchronously, exactly once, with receiver `undefined` and the arguments
  /// `[resolve, reject]`. If the executor throws, the thrown value is passed to `reject`, which
  /// ignores it if the executor already resolved or rejected.
  pub fn construct(&self, executor: Function) -> Promise {
    let Deferred {
      promise,
      resolve,
      reject,
    } = self.defer();
    trace!(brand = self.name(), "running executor");
    let args = [Value::Function(resolve), Value::Function(reject.clone())];
    if let Err(thrown) = executor.call(&Value::Undefined, &args) {
      call_resolving_function(&reject, thrown);
    }
    promise
  }
}

impl fmt::Debug for Brand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Brand").field(&self.name()).finish()
  }
}
