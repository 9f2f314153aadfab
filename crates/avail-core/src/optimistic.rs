//! Optimistic update protocol.
//!
//! A value has a confirmed state (last acknowledged by the store) and at most
//! one pending state (applied locally, write in flight). Readers see the pending
//! value if there is one. When the write settles the pending value is either
//! replaced by the store's answer ([`Optimistic::confirm`]) or discarded
//! ([`Optimistic::rollback`]).

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Optimistic<T> {
  confirmed: T,
  pending:   Option<T>,
}

impl<T> Optimistic<T> {
  pub fn new(confirmed: T) -> Self { Self { confirmed, pending: None } }

  /// The value to display: pending if a write is in flight, else confirmed.
  pub fn current(&self) -> &T { self.pending.as_ref().unwrap_or(&self.confirmed) }

  pub fn confirmed(&self) -> &T { &self.confirmed }

  pub fn in_flight(&self) -> bool { self.pending.is_some() }

  /// Apply `value` locally ahead of the store.
  ///
  /// Only one write may be in flight; a second proposal is handed back.
  pub fn propose(&mut self, value: T) -> Result<(), T> {
    if self.pending.is_some() {
      return Err(value);
    }
    self.pending = Some(value);
    Ok(())
  }

  /// The store accepted the write and answered with `value`.
  pub fn confirm(&mut self, value: T) {
    self.confirmed = value;
    self.pending = None;
  }

  /// The write failed: drop the pending value and return it.
  pub fn rollback(&mut self) -> Option<T> { self.pending.take() }

  /// Replace the confirmed value after a fresh read, leaving any in-flight
  /// proposal alone.
  pub fn refresh(&mut self, confirmed: T) { self.confirmed = confirmed; }
}
