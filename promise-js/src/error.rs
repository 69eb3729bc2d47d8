/// A `TypeError` raised by promise machinery.
///
/// These never escape as Rust errors; they are wrapped into an [`ErrorObject`](crate::ErrorObject)
/// and delivered as a rejection reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum TypeError {
  /// A promise was resolved with itself.
  #[error("Promise cannot resolve itself")]
  SelfResolution,

  /// A combinator was given something other than a list.
  #[error("{combinator} requires an array argument")]
  NotIterable { combinator: &'static str },

  /// Attempted to call a non-callable value.
  #[error("{type_name} is not a function")]
  NotCallable { type_name: &'static str },
}

/// Errors surfaced to the host driving the job queue.
///
/// Rejections are never reported through this type; they stay inside the promise graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
  /// A single checkpoint ran more jobs than allowed by its budget. Usually a job that keeps
  /// re-enqueueing itself.
  #[error("microtask checkpoint exhausted its budget after {ran} jobs")]
  CheckpointBudgetExhausted { ran: usize },

  /// The event loop ran out of work while the awaited promise was still pending.
  #[error("event loop went idle before the promise settled")]
  Stalled,
}
