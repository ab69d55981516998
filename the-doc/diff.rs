//! Prefix/suffix diffing of node sequences.
//!
//! [`diff_range`] finds the single contiguous range of `prev` that has to be
//! replaced to obtain `next`. It grows the common prefix first, then the
//! common suffix of what is left, so it runs in linear time and never
//! reports a range that fails to reconstruct `next`. It performs no
//! mutation; callers apply the result with [`crate::transaction::Transaction::splice`].

use crate::node::{
  Node,
  NodeKind,
};

/// Replace `prev[from..to]` with `replacement` to obtain `next`.
#[derive(Debug, PartialEq, Eq)]
pub struct DiffRange<'a, T> {
  pub from:        usize,
  pub to:          usize,
  pub replacement: &'a [T],
}

impl<T> DiffRange<'_, T> {
  /// Whether `prev` and `next` were equal.
  pub fn is_empty(&self) -> bool {
    self.from == self.to && self.replacement.is_empty()
  }

  pub fn delete_count(&self) -> usize {
    self.to - self.from
  }
}

pub fn diff_range<'a, T, U>(
  prev: &[T],
  next: &'a [U],
  mut eq: impl FnMut(&T, &U) -> bool,
) -> DiffRange<'a, U> {
  let leading = prev
    .iter()
    .zip(next)
    .take_while(|&(a, b)| eq(a, b))
    .count();

  let max_trailing = prev.len().min(next.len()) - leading;
  let trailing = prev
    .iter()
    .rev()
    .zip(next.iter().rev())
    .take(max_trailing)
    .take_while(|&(a, b)| eq(a, b))
    .count();

  DiffRange {
    from:        leading,
    to:          prev.len() - trailing,
    replacement: &next[leading..next.len() - trailing],
  }
}

/// Default shallow node equality used for reconciliation.
///
/// Only specialized text (text carrying a class) and line breaks can ever be
/// reused. Plain text never compares equal, so it is always replaced.
pub fn node_eq(a: &Node, b: &Node) -> bool {
  match (a.kind(), b.kind()) {
    (NodeKind::Text(a), NodeKind::Text(b)) => {
      a.class.is_some() && a.class == b.class && a.text() == b.text()
    },
    (NodeKind::LineBreak, NodeKind::LineBreak) => true,
    _ => false,
  }
}
