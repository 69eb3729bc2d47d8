//! The FIFO job queue that all promise callbacks are dispatched through.
//!
//! Each thread lazily creates one process-wide queue ([`JobQueue::global`]) used by the standard
//! [`Brand`](crate::Brand). Independent queues can be created with [`JobQueue::new`] so tests and
//! embeddings can drive ordering deterministically.
//!
//! Queues are never drained implicitly. The host advances turns explicitly, either one job at a
//! time ([`JobQueue::run_next`]) or by performing a microtask checkpoint that drains until empty,
//! including jobs enqueued while draining.

use crate::error::SchedulerError;
use crate::jobs::Job;
use crate::jobs::JobResult;
use crate::promise_rejection_tracker::PromiseRejectionOperation;
use crate::promise_rejection_tracker::PromiseRejectionTracker;
use crate::Promise;
use crate::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::debug;
use tracing::debug_span;
use tracing::trace;
use tracing::warn;

struct QueueState {
  jobs: VecDeque<Job>,
  rejections: PromiseRejectionTracker,
  report_unhandled_rejections: bool,
}

impl Default for QueueState {
  fn default() -> Self {
    Self {
      jobs: VecDeque::new(),
      rejections: PromiseRejectionTracker::default(),
      report_unhandled_rejections: true,
    }
  }
}

/// A shared handle to a FIFO job queue. Clones refer to the same queue.
#[derive(Clone, Default)]
pub struct JobQueue {
  state: Rc<RefCell<QueueState>>,
}

thread_local! {
  static GLOBAL_QUEUE: JobQueue = JobQueue::new();
}

impl JobQueue {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns this thread's process-wide queue.
  pub fn global() -> Self {
    GLOBAL_QUEUE.with(JobQueue::clone)
  }

  /// Enqueue a job. The job never runs before this call returns.
  pub fn enqueue(&self, job: Job) {
    trace!(kind = ?job.kind(), "enqueue job");
    self.state.borrow_mut().jobs.push_back(job);
  }

  /// Runs the oldest queued job, returning `None` if the queue is empty.
  pub fn run_next(&self) -> Option<JobResult> {
    // The borrow must end before the job runs: jobs enqueue more jobs.
    let job = self.state.borrow_mut().jobs.pop_front()?;
    let result = job.run();
    if let Err(err) = &result {
      warn!(error = ?err, "uncaught throw in job");
    }
    Some(result)
  }

  /// Runs all queued jobs (and any jobs enqueued while running) until the queue is empty, then
  /// reports and forgets the promises that were rejected without a handler.
  ///
  /// If a job returns `Err`, this method **continues draining** the queue. Errors are returned to
  /// the caller for reporting.
  pub fn perform_microtask_checkpoint(&self) -> Vec<Value> {
    let _span = debug_span!("microtask_checkpoint").entered();
    let mut errors = Vec::new();
    let mut ran = 0usize;
    while let Some(result) = self.run_next() {
      ran += 1;
      if let Err(err) = result {
        errors.push(err);
      }
    }
    debug!(ran, "microtask checkpoint complete");
    self.notify_unhandled_rejections();
    errors
  }

  /// Like [`JobQueue::perform_microtask_checkpoint`], but stops with an error once `max_jobs` jobs
  /// have run and the queue is still not empty. Remaining jobs and unhandled rejections stay
  /// queued for the next checkpoint.
  pub fn perform_checkpoint_with_budget(
    &self,
    max_jobs: usize,
  ) -> Result<Vec<Value>, SchedulerError> {
    let _span = debug_span!("microtask_checkpoint", max_jobs).entered();
    let mut errors = Vec::new();
    let mut ran = 0usize;
    loop {
      if ran >= max_jobs && !self.is_empty() {
        warn!(ran, "microtask checkpoint budget exhausted");
        return Err(SchedulerError::CheckpointBudgetExhausted { ran });
      }
      let Some(result) = self.run_next() else {
        break;
      };
      ran += 1;
      if let Err(err) = result {
        errors.push(err);
      }
    }
    debug!(ran, "microtask checkpoint complete");
    self.notify_unhandled_rejections();
    Ok(errors)
  }

  /// Drops all queued jobs without running them, returning how many were dropped.
  pub fn drain_and_cancel(&self) -> usize {
    let jobs = std::mem::take(&mut self.state.borrow_mut().jobs);
    jobs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.state.borrow().jobs.is_empty()
  }

  pub fn len(&self) -> usize {
    self.state.borrow().jobs.len()
  }

  pub fn ptr_eq(&self, other: &JobQueue) -> bool {
    Rc::ptr_eq(&self.state, &other.state)
  }

  pub(crate) fn promise_rejection_tracker(
    &self,
    promise: &Promise,
    operation: PromiseRejectionOperation,
  ) {
    self.state.borrow_mut().rejections.track(promise, operation);
  }

  /// Takes the promises that were rejected without a handler and are still unhandled.
  ///
  /// Every completed checkpoint also takes them, so this only sees rejections since the last one.
  pub fn take_unhandled_rejections(&self) -> Vec<Promise> {
    self.state.borrow_mut().rejections.drain_about_to_be_notified()
  }

  /// Whether completed checkpoints log the rejections that stayed unhandled. Defaults to `true`.
  pub fn set_report_unhandled_rejections(&self, report: bool) {
    self.state.borrow_mut().report_unhandled_rejections = report;
  }

  fn notify_unhandled_rejections(&self) {
    let (unhandled, report) = {
      let mut state = self.state.borrow_mut();
      (
        state.rejections.drain_about_to_be_notified(),
        state.report_unhandled_rejections,
      )
    };
    if report {
      for promise in &unhandled {
        warn!(reason = ?promise.result(), "unhandled promise rejection");
      }
    }
  }
}

impl fmt::Debug for JobQueue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let len = self.state.try_borrow().map(|s| s.jobs.len()).ok();
    f.debug_struct("JobQueue").field("len", &len).finish()
  }
}
