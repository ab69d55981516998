use std::{
  fmt,
  num::NonZeroU64,
};

use serde::{
  Deserialize,
  Serialize,
};

/// Stable identifier of a node for the lifetime of a document.
///
/// Keys are handed out by a [`KeyAllocator`] and are never reused, so a key
/// that no longer resolves always means the node was destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(NonZeroU64);

impl NodeKey {
  /// Key of the root node. Every document has exactly one.
  pub const ROOT: Self = Self(NonZeroU64::MIN);

  pub const fn new(id: NonZeroU64) -> Self {
    Self(id)
  }

  pub const fn get(self) -> u64 {
    self.0.get()
  }

  #[inline]
  pub fn is_root(self) -> bool {
    self == Self::ROOT
  }
}

impl From<NonZeroU64> for NodeKey {
  fn from(value: NonZeroU64) -> Self {
    Self::new(value)
  }
}

impl fmt::Display for NodeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Monotonic key source. Starts right after [`NodeKey::ROOT`].
#[derive(Debug, Clone)]
pub struct KeyAllocator {
  next: NonZeroU64,
}

impl Default for KeyAllocator {
  fn default() -> Self {
    Self::new()
  }
}

impl KeyAllocator {
  pub fn new() -> Self {
    Self {
      next: NodeKey::ROOT.0.saturating_add(1),
    }
  }

  pub fn alloc(&mut self) -> NodeKey {
    let key = NodeKey(self.next);
    self.next = self.next.saturating_add(1);
    key
  }

  /// Number of keys handed out so far, root included.
  pub fn allocated(&self) -> u64 {
    self.next.get() - 1
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_alloc_is_monotonic_and_skips_root() {
    let mut keys = KeyAllocator::new();
    let a = keys.alloc();
    let b = keys.alloc();
    assert!(!a.is_root());
    assert!(a < b);
    assert_eq!(a.get(), 2);
    assert_eq!(keys.allocated(), 3);
  }

  #[test]
  fn test_display() {
    assert_eq!(NodeKey::ROOT.to_string(), "#1");
  }
}
