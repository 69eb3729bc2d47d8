//! Jobs: the unit of deferred work run by a [`JobQueue`](crate::JobQueue).
//!
//! A job is a parameterless closure that is enqueued and later run to completion by the host,
//! usually as part of a microtask checkpoint. Promise reactions and thenable adoption are always
//! delivered as jobs, which is what keeps callbacks from ever running synchronously with the code
//! that registered or triggered them.

use crate::Value;
use std::fmt;

/// A coarse classification of queued work, used for logging and by hosts that route different
/// kinds of work onto different queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
  /// Runs a `then` handler and settles the derived promise.
  Reaction,
  /// Calls a thenable's `then` to adopt its state.
  Thenable,
  /// A timer callback fired by the event loop.
  Timeout,
  /// Work with no additional ordering constraints.
  Generic,
}

/// The result of running a job.
///
/// Promise jobs capture handler throws as rejections and always return `Ok`. An `Err` here is an
/// uncaught throw from a host-supplied job; the queue reports it and keeps draining.
pub type JobResult = Result<(), Value>;

pub struct Job {
  kind: JobKind,
  run: Box<dyn FnOnce() -> JobResult>,
}

impl Job {
  /// Create a new job of `kind` backed by `run`.
  pub fn new(kind: JobKind, run: impl FnOnce() -> JobResult + 'static) -> Self {
    Self {
      kind,
      run: Box::new(run),
    }
  }

  #[inline]
  pub fn kind(&self) -> JobKind {
    self.kind
  }

  /// Run the job, consuming it.
  #[inline]
  pub fn run(self) -> JobResult {
    (self.run)()
  }
}

impl fmt::Debug for Job {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Job").field("kind", &self.kind).finish()
  }
}
