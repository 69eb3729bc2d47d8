//! Unhandled rejection bookkeeping.
//!
//! A promise that is rejected while no rejection handler is attached is recorded in the
//! about-to-be-notified list. Attaching a handler before the host drains the list removes it
//! again, so only rejections that stayed unhandled for a whole checkpoint get reported.

use crate::Promise;
use std::mem;

/// The operation reported to [`PromiseRejectionTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum PromiseRejectionOperation {
  /// A promise was rejected with no handlers attached.
  Reject,
  /// A handler was attached to an already-rejected, previously unhandled promise.
  Handle,
}

#[derive(Debug, Default)]
pub(crate) struct PromiseRejectionTracker {
  about_to_be_notified: Vec<Promise>,
}

impl PromiseRejectionTracker {
  pub(crate) fn track(&mut self, promise: &Promise, operation: PromiseRejectionOperation) {
    match operation {
      PromiseRejectionOperation::Reject => self.about_to_be_notified.push(promise.clone()),
      PromiseRejectionOperation::Handle => {
        self.about_to_be_notified.retain(|p| !p.ptr_eq(promise));
      }
    }
  }

  /// Takes the rejected promises that are still unhandled.
  pub(crate) fn drain_about_to_be_notified(&mut self) -> Vec<Promise> {
    mem::take(&mut self.about_to_be_notified)
  }
}
