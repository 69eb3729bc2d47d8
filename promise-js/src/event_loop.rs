//! A minimal single-threaded event loop with a virtual clock.
//!
//! This is intended for tests and embeddings that need timer-driven promises without real time:
//! - microtasks run to completion at checkpoints, before any timer fires
//! - timers fire in `(deadline, scheduling order)` order; firing one advances the virtual clock to
//!   its deadline
//! - unhandled rejections are reported after each checkpoint, unless disabled in the options

use crate::brand::Brand;
use crate::error::SchedulerError;
use crate::job_queue::JobQueue;
use crate::jobs::Job;
use crate::jobs::JobKind;
use crate::jobs::JobResult;
use crate::promise::Deferred;
use crate::promise::PromiseState;
use crate::{Promise, Value};
use std::cell::Cell;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::trace;
use tracing::warn;

/// Construction-time event loop options.
#[derive(Debug, Clone)]
pub struct EventLoopOptions {
  /// Maximum number of jobs a single microtask checkpoint may run. `None` is unbounded.
  pub max_jobs_per_checkpoint: Option<usize>,
  /// Log promises that stay rejected without a handler across a checkpoint.
  pub report_unhandled_rejections: bool,
}

impl Default for EventLoopOptions {
  fn default() -> Self {
    Self {
      max_jobs_per_checkpoint: Some(1_000_000),
      report_unhandled_rejections: true,
    }
  }
}

/// A settled promise's outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
  Fulfilled(Value),
  Rejected(Value),
}

impl Settled {
  pub fn is_fulfilled(&self) -> bool {
    matches!(self, Settled::Fulfilled(_))
  }

  pub fn fulfilled(self) -> Option<Value> {
    match self {
      Settled::Fulfilled(v) => Some(v),
      Settled::Rejected(_) => None,
    }
  }

  pub fn rejected(self) -> Option<Value> {
    match self {
      Settled::Fulfilled(_) => None,
      Settled::Rejected(r) => Some(r),
    }
  }
}

struct EventLoopInner {
  options: EventLoopOptions,
  queue: JobQueue,
  brand: Brand,
  now: Cell<u64>,
  next_timer_id: Cell<u64>,
  timers: RefCell<BTreeMap<(u64, u64), Job>>,
}

/// A handle to an event loop. Clones refer to the same loop, so jobs can schedule timers.
#[derive(Clone)]
pub struct EventLoop(Rc<EventLoopInner>);

impl Default for EventLoop {
  fn default() -> Self {
    Self::new(EventLoopOptions::default())
  }
}

impl EventLoop {
  /// Creates a loop with its own job queue and a standard brand bound to it.
  pub fn new(options: EventLoopOptions) -> Self {
    let queue = JobQueue::new();
    let brand = Brand::new("Promise", queue.clone());
    Self::with_brand(options, brand)
  }

  /// Creates a loop driving `brand`'s queue. The queue takes over the loop's unhandled rejection
  /// reporting option.
  pub fn with_brand(options: EventLoopOptions, brand: Brand) -> Self {
    brand
      .queue()
      .set_report_unhandled_rejections(options.report_unhandled_rejections);
    Self(Rc::new(EventLoopInner {
      options,
      queue: brand.queue().clone(),
      brand,
      now: Cell::new(0),
      next_timer_id: Cell::new(0),
      timers: RefCell::new(BTreeMap::new()),
    }))
  }

  pub fn brand(&self) -> &Brand {
    &self.0.brand
  }

  pub fn queue(&self) -> &JobQueue {
    &self.0.queue
  }

  /// The virtual time in milliseconds.
  pub fn now(&self) -> u64 {
    self.0.now.get()
  }

  /// Schedules `callback` to run `delay_ms` virtual milliseconds from now.
  pub fn set_timeout(&self, delay_ms: u64, callback: impl FnOnce() -> JobResult + 'static) {
    let deadline = self.now().saturating_add(delay_ms);
    let id = self.0.next_timer_id.get();
    self.0.next_timer_id.set(id + 1);
    trace!(deadline, id, "set timeout");
    self
      .0
      .timers
      .borrow_mut()
      .insert((deadline, id), Job::new(JobKind::Timeout, callback));
  }

  pub fn pending_timers(&self) -> usize {
    self.0.timers.borrow().len()
  }

  /// Drains the microtask queue; the queue then reports unhandled rejections.
  pub fn perform_microtask_checkpoint(&self) -> Result<(), SchedulerError> {
    let errors = match self.0.options.max_jobs_per_checkpoint {
      Some(max_jobs) => self.0.queue.perform_checkpoint_with_budget(max_jobs)?,
      None => self.0.queue.perform_microtask_checkpoint(),
    };
    if !errors.is_empty() {
      warn!(count = errors.len(), "jobs threw during checkpoint");
    }
    Ok(())
  }

  /// Advances one turn: a microtask checkpoint if microtasks are queued, otherwise the earliest
  /// timer followed by a checkpoint. Returns `false` if there was nothing to do.
  pub fn run_turn(&self) -> Result<bool, SchedulerError> {
    if !self.0.queue.is_empty() {
      self.perform_microtask_checkpoint()?;
      return Ok(true);
    }

    // Release the timer borrow before running: callbacks schedule more timers.
    let next = self.0.timers.borrow_mut().pop_first();
    let Some(((deadline, id), job)) = next else {
      return Ok(false);
    };
    self.0.now.set(self.now().max(deadline));
    trace!(now = self.now(), id, "fire timeout");
    if let Err(err) = job.run() {
      warn!(error = ?err, "uncaught throw in timer callback");
    }
    self.perform_microtask_checkpoint()?;
    Ok(true)
  }

  /// Runs turns until neither microtasks nor timers remain.
  pub fn run_until_idle(&self) -> Result<(), SchedulerError> {
    while self.run_turn()? {}
    Ok(())
  }

  /// Runs turns until `promise` settles and returns its outcome.
  pub fn block_on(&self, promise: &Promise) -> Result<Settled, SchedulerError> {
    loop {
      match promise.state() {
        PromiseState::Pending => {}
        PromiseState::Fulfilled => {
          return Ok(Settled::Fulfilled(promise.result().unwrap_or_default()));
        }
        PromiseState::Rejected => {
          return Ok(Settled::Rejected(promise.result().unwrap_or_default()));
        }
      }
      if !self.run_turn()? {
        return Err(SchedulerError::Stalled);
      }
    }
  }

  /// A promise of this loop's brand that fulfills with `ms` after `ms` virtual milliseconds.
  pub fn fulfilled_after(&self, ms: u64) -> Promise {
    let Deferred {
      promise, resolve, ..
    } = self.0.brand.defer();
    self.set_timeout(ms, move || {
      resolve.call(&Value::Undefined, &[Value::Number(ms as f64)])?;
      Ok(())
    });
    promise
  }

  /// A promise of this loop's brand that rejects with `ms` after `ms` virtual milliseconds.
  pub fn rejected_after(&self, ms: u64) -> Promise {
    let Deferred { promise, reject, .. } = self.0.brand.defer();
    self.set_timeout(ms, move || {
      reject.call(&Value::Undefined, &[Value::Number(ms as f64)])?;
      Ok(())
    });
    promise
  }
}
