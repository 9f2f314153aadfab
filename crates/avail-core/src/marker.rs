//! In-process session marker.

use parking_lot::Mutex;

use crate::store::MarkerStore;

/// A [`MarkerStore`] that lives exactly as long as the value itself.
///
/// Dropping it (closing the tab, exiting the process) forgets the marker, even
/// if the server session it vouched for is still valid.
#[derive(Debug, Default)]
pub struct MemoryMarker {
  subject: Mutex<Option<String>>,
}

impl MemoryMarker {
  pub fn new() -> Self { Self::default() }
}

impl MarkerStore for MemoryMarker {
  fn read(&self) -> Option<String> { self.subject.lock().clone() }

  fn write(&self, subject: &str) { *self.subject.lock() = Some(subject.to_owned()); }

  fn clear(&self) { *self.subject.lock() = None; }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn write_read_clear() {
    let m = MemoryMarker::new();
    assert_eq!(m.read(), None);
    m.write("abc");
    assert_eq!(m.read().as_deref(), Some("abc"));
    m.clear();
    assert_eq!(m.read(), None);
    // Clearing twice is harmless.
    m.clear();
  }

  #[test]
  fn a_new_instance_starts_empty() {
    let first = MemoryMarker::new();
    first.write("abc");
    drop(first);
    assert_eq!(MemoryMarker::new().read(), None);
  }
}
