//! Child-list surgery.
//!
//! Elements store their children as a doubly-linked list of keys
//! (`first`/`last` on the element, `prev`/`next` on each child) plus a child
//! count. [`Transaction::splice`] is the single structural primitive every
//! other insertion and removal is built from.

use smallvec::SmallVec;

use crate::{
  error::{
    DocumentError,
    Result,
  },
  key::NodeKey,
  selection::{
    PointKind,
    Selection,
    is_point_removed,
    retarget,
  },
  state::DocumentState,
  transaction::Transaction,
};

/// The child an element point on a spliced parent sits in front of.
#[derive(Debug, Clone, Copy)]
enum ChildSlot {
  Elsewhere,
  Before(NodeKey),
  End,
}

impl Transaction<'_> {
  /// Removes `delete_count` children of `parent` starting at `start` and
  /// inserts `to_insert` in their place.
  ///
  /// Inserted nodes that already have a parent are moved, never duplicated.
  /// Element points on `parent` stay in front of the same child; selection
  /// points on removed nodes are re-targeted to the closest surviving
  /// position. A parent that ends up empty is removed when its kind cannot be
  /// empty.
  pub fn splice(
    &mut self,
    parent: NodeKey,
    start: usize,
    delete_count: usize,
    to_insert: &[NodeKey],
  ) -> Result<()> {
    let parent_node = self.node(parent)?;
    let Some(element) = parent_node.element() else {
      return Err(DocumentError::UnsupportedOperation {
        operation: "splice",
        node_type: parent_node.type_name().to_string(),
      });
    };
    let size = element.size();
    let first = element.first();
    let last = element.last();
    if start > size || delete_count > size - start {
      return Err(DocumentError::invariant(format!(
        "splice range {start}..{} is out of bounds for {parent} with {size} children",
        start.saturating_add(delete_count)
      )));
    }
    self.check_insertable(parent, to_insert)?;
    let slots = self.child_slots(parent);

    tracing::trace!(%parent, start, delete_count, inserted = to_insert.len(), "splice");

    // Locate the nodes around the affected range.
    let mut before = if start == 0 {
      None
    } else if start == size {
      last
    } else {
      let child = self
        .state()
        .get_child_at_index(parent, start - 1)
        .ok_or_else(|| DocumentError::invariant(format!("{parent} is missing child {}", start - 1)))?;
      Some(child.key())
    };

    let mut removed: SmallVec<[NodeKey; 4]> = SmallVec::with_capacity(delete_count);
    let mut cursor = match before {
      Some(key) => self.node(key)?.next(),
      None => first,
    };
    for _ in 0..delete_count {
      let key = cursor.ok_or_else(|| {
        DocumentError::invariant(format!("child list of {parent} is shorter than its size"))
      })?;
      removed.push(key);
      cursor = self.node(key)?.next();
    }
    let mut after = cursor;

    // Detach the removed run and close the gap.
    for &key in &removed {
      let node = self.get_writable(key)?;
      node.parent = None;
      node.prev = None;
      node.next = None;
    }
    if !removed.is_empty() {
      self.link_siblings(parent, before, after)?;
      self.element_mut(parent)?.size -= removed.len();
    }

    // Link the inserted run after `before`.
    let mut cursor = before;
    for &key in to_insert {
      let node = self.node(key)?;
      if let Some(old_parent) = node.parent() {
        if old_parent == parent {
          if cursor == Some(key) {
            cursor = node.prev();
          }
          if before == Some(key) {
            before = node.prev();
          }
          if after == Some(key) {
            after = node.next();
          }
        }
        self.detach(key)?;
      }

      let next = match cursor {
        Some(prev) => self.node(prev)?.next(),
        None => self.node(parent)?.element().and_then(|element| element.first()),
      };
      {
        let node = self.get_writable(key)?;
        node.parent = Some(parent);
        node.prev = cursor;
        node.next = next;
      }
      match cursor {
        Some(prev) => self.get_writable(prev)?.next = Some(key),
        None => self.element_mut(parent)?.first = Some(key),
      }
      match next {
        Some(next) => self.get_writable(next)?.prev = Some(key),
        None => self.element_mut(parent)?.last = Some(key),
      }
      self.element_mut(parent)?.size += 1;
      cursor = Some(key);
    }

    self.restore_child_slots(parent, slots, &removed, before, after);
    if removed.is_empty() {
      return Ok(());
    }

    self.retarget_selection(parent, &removed, to_insert, before, after);

    let parent_node = self.node(parent)?;
    if parent_node.children_size() == 0
      && !parent_node.can_be_empty()
      && !parent_node.is_root()
      && parent_node.parent().is_some()
    {
      tracing::trace!(%parent, "removing element that cannot be empty");
      self.remove(parent)?;
    }
    Ok(())
  }

  /// Appends `nodes` as the last children of `parent`.
  pub fn append(&mut self, parent: NodeKey, nodes: &[NodeKey]) -> Result<()> {
    let size = self.state().get_children_size(parent);
    self.splice(parent, size, 0, nodes)
  }

  fn check_insertable(&self, parent: NodeKey, to_insert: &[NodeKey]) -> Result<()> {
    let is_root = self.node(parent)?.is_root();
    for (idx, &key) in to_insert.iter().enumerate() {
      if key == parent {
        return Err(DocumentError::invariant(format!("cannot splice {key} into itself")));
      }
      if key.is_root() {
        return Err(DocumentError::invariant("the root node cannot be inserted"));
      }
      if to_insert[..idx].contains(&key) {
        return Err(DocumentError::invariant(format!("{key} is inserted twice")));
      }
      let node = self.node(key)?;
      if is_root && !(node.is_element() || node.decorator().is_some()) {
        return Err(DocumentError::invariant(format!(
          "the root only accepts element or decorator children, got {}",
          node.type_name()
        )));
      }
      if self.state().is_ancestor(key, parent) {
        return Err(DocumentError::invariant(format!(
          "cannot splice {key} into its own descendant {parent}"
        )));
      }
    }
    Ok(())
  }

  /// Makes `prev` and `next` adjacent children of `parent`, fixing up the
  /// list ends.
  fn link_siblings(
    &mut self,
    parent: NodeKey,
    prev: Option<NodeKey>,
    next: Option<NodeKey>,
  ) -> Result<()> {
    match prev {
      Some(prev) => self.get_writable(prev)?.next = next,
      None => self.element_mut(parent)?.first = next,
    }
    match next {
      Some(next) => self.get_writable(next)?.prev = prev,
      None => self.element_mut(parent)?.last = prev,
    }
    Ok(())
  }

  /// Unlinks `key` from its parent without any cleanup of the parent.
  pub(crate) fn detach(&mut self, key: NodeKey) -> Result<()> {
    let node = self.node(key)?;
    let Some(parent) = node.parent() else {
      return Ok(());
    };
    let (prev, next) = (node.prev(), node.next());
    let index = self.state().get_index_within_parent(key);
    self.link_siblings(parent, prev, next)?;
    let element = self.element_mut(parent)?;
    element.size = element
      .size
      .checked_sub(1)
      .ok_or_else(|| DocumentError::invariant(format!("{parent} has a child but size 0")))?;

    let node = self.get_writable(key)?;
    node.parent = None;
    node.prev = None;
    node.next = None;

    if let Some(index) = index {
      self.update_points(|_, point| {
        if point.key == parent && point.kind == PointKind::Element && point.offset > index {
          point.offset -= 1;
        }
      });
    }
    Ok(())
  }

  fn child_slots(&self, parent: NodeKey) -> [ChildSlot; 2] {
    let mut slots = [ChildSlot::Elsewhere; 2];
    let Some(range) = self.get_range_selection() else {
      return slots;
    };
    for (slot, point) in slots.iter_mut().zip([&range.anchor, &range.focus]) {
      if point.key == parent && point.kind == PointKind::Element {
        *slot = match self.state().get_child_at_index(parent, point.offset) {
          Some(child) => ChildSlot::Before(child.key()),
          None => ChildSlot::End,
        };
      }
    }
    slots
  }

  /// Re-indexes element points on `parent` after a splice. A point whose
  /// child was removed lands at the start of the gap when that child opened
  /// the removed run, else at the end of the gap.
  fn restore_child_slots(
    &mut self,
    parent: NodeKey,
    slots: [ChildSlot; 2],
    removed: &[NodeKey],
    before: Option<NodeKey>,
    after: Option<NodeKey>,
  ) {
    if slots.iter().all(|slot| matches!(slot, ChildSlot::Elsewhere)) {
      return;
    }
    let state = self.state();
    let size = state.get_children_size(parent);
    let gap_start = before
      .and_then(|key| index_under(state, parent, key))
      .map_or(0, |index| index + 1);
    let gap_end = after
      .and_then(|key| index_under(state, parent, key))
      .unwrap_or(size);

    let mut slots = slots.into_iter();
    self.update_points(|state, point| {
      point.offset = match slots.next() {
        Some(ChildSlot::Before(child)) => {
          match index_under(state, parent, child) {
            Some(index) => index,
            None if removed.first() == Some(&child) => gap_start,
            None => gap_end,
          }
        },
        Some(ChildSlot::End) => size,
        _ => return,
      };
    });
  }

  fn retarget_selection(
    &mut self,
    parent: NodeKey,
    removed: &[NodeKey],
    inserted: &[NodeKey],
    before: Option<NodeKey>,
    after: Option<NodeKey>,
  ) {
    let state = self.state_mut();
    let Some(selection) = state.selection().cloned() else {
      return;
    };
    match selection {
      Selection::Range(mut range) => {
        let mut changed = false;
        for point in range.points_mut() {
          if is_point_removed(state, point, removed, inserted) {
            retarget(state, point, parent, before, after);
            changed = true;
          }
        }
        if changed {
          state.set_selection(Some(Selection::Range(range)));
        }
      },
      Selection::Node(mut nodes) => {
        let mut changed = false;
        for key in removed.iter().filter(|key| !inserted.contains(key)) {
          changed |= nodes.delete(*key);
        }
        if changed {
          let selection = (!nodes.is_empty()).then_some(Selection::Node(nodes));
          state.set_selection(selection);
        }
      },
    }
  }
}

/// Index of `key` among the children of `parent`, `None` when it lives
/// elsewhere.
fn index_under(state: &DocumentState, parent: NodeKey, key: NodeKey) -> Option<usize> {
  state.get(key).filter(|node| node.parent() == Some(parent))?;
  state.get_index_within_parent(key)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    config::{
      DocumentConfig,
      ElementTypeConfig,
    },
    document::Document,
    selection::{
      Point,
      RangeSelection,
    },
  };

  fn list_item_config() -> DocumentConfig {
    DocumentConfig {
      elements: vec![ElementTypeConfig {
        name:         "list-item".into(),
        inline:       false,
        can_be_empty: false,
      }],
      ..DocumentConfig::default()
    }
  }

  /// Builds `root > p > [texts...]` inside an open transaction.
  fn paragraph_with(tx: &mut Transaction<'_>, texts: &[&str]) -> Result<(NodeKey, Vec<NodeKey>)> {
    let p = tx.create_paragraph()?;
    let children = texts
      .iter()
      .map(|text| tx.create_text(*text))
      .collect::<Result<Vec<_>>>()?;
    tx.append(p, &children)?;
    tx.append(NodeKey::ROOT, &[p])?;
    Ok((p, children))
  }

  #[test]
  fn test_splice_replaces_middle_run() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let (p, c) = paragraph_with(tx, &["a", "b", "c", "d"])?;
        let x = tx.create_text("x")?;
        tx.splice(p, 1, 2, &[x])?;

        assert_eq!(tx.state().children_keys(p), vec![c[0], x, c[3]]);
        assert_eq!(tx.state().get_children_size(p), 3);
        for removed in [c[1], c[2]] {
          let node = tx.get(removed).unwrap();
          assert!(node.parent().is_none());
          assert!(node.prev().is_none() && node.next().is_none());
        }
        tx.state().validate()
      })
      .unwrap();
  }

  #[test]
  fn test_splice_out_of_bounds_is_fatal() {
    let mut doc = Document::default();
    let err = doc
      .update(|tx| {
        let (p, _) = paragraph_with(tx, &["a"])?;
        tx.splice(p, 1, 1, &[])
      })
      .unwrap_err();
    assert!(err.is_fatal());
  }

  #[test]
  fn test_splice_into_self_or_descendant_is_fatal() {
    let mut doc = Document::default();
    let err = doc
      .update(|tx| {
        let p = tx.create_paragraph()?;
        tx.append(p, &[p])
      })
      .unwrap_err();
    assert!(err.is_fatal());

    let err = doc
      .update(|tx| {
        let quote = tx.create_quote()?;
        let p = tx.create_paragraph()?;
        tx.append(quote, &[p])?;
        tx.append(p, &[quote])
      })
      .unwrap_err();
    assert!(err.is_fatal());
  }

  #[test]
  fn test_root_rejects_text_children() {
    let mut doc = Document::default();
    let err = doc
      .update(|tx| {
        let t = tx.create_text("loose")?;
        tx.append(NodeKey::ROOT, &[t])
      })
      .unwrap_err();
    assert!(matches!(err, DocumentError::InvariantViolation(_)));
  }

  #[test]
  fn test_splice_moves_node_between_parents() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let (p1, a) = paragraph_with(tx, &["a1", "a2"])?;
        let (p2, b) = paragraph_with(tx, &["b1"])?;
        tx.splice(p2, 0, 0, &[a[1]])?;

        assert_eq!(tx.state().children_keys(p1), vec![a[0]]);
        assert_eq!(tx.state().children_keys(p2), vec![a[1], b[0]]);
        assert_eq!(tx.get(a[1]).unwrap().parent(), Some(p2));
        tx.state().validate()
      })
      .unwrap();
  }

  #[test]
  fn test_splice_reinserting_removed_node_keeps_selection() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let (p, c) = paragraph_with(tx, &["ab", "cd"])?;
        tx.set_text_node_range(c[1], 1, c[1], 1)?;
        tx.splice(p, 0, 2, &[c[1], c[0]])?;

        assert_eq!(tx.state().children_keys(p), vec![c[1], c[0]]);
        assert_eq!(tx.get_range_selection().unwrap().anchor, Point::text(c[1], 1));
        tx.state().validate()
      })
      .unwrap();
  }

  #[test]
  fn test_retarget_prefers_previous_sibling() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let (p, c) = paragraph_with(tx, &["abc", "de", "fgh"])?;
        tx.set_text_node_range(c[1], 1, c[1], 2)?;
        tx.remove(c[1])?;
        let range = tx.get_range_selection().unwrap();
        assert_eq!(range.anchor, Point::text(c[0], 3));
        assert_eq!(range.focus, Point::text(c[0], 3));

        tx.set_text_node_range(c[0], 1, c[0], 1)?;
        tx.remove(c[0])?;
        assert_eq!(tx.get_range_selection().unwrap().anchor, Point::text(c[2], 0));

        tx.set_text_node_range(c[2], 2, c[2], 2)?;
        tx.remove(c[2])?;
        assert_eq!(tx.get_range_selection().unwrap().anchor, Point::element(p, 0));
        Ok(())
      })
      .unwrap();
  }

  #[test]
  fn test_retarget_around_non_text_leaf() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let (p, c) = paragraph_with(tx, &["a"])?;
        let br = tx.create_line_break()?;
        tx.insert_before(c[0], br)?;
        tx.set_text_node_range(c[0], 1, c[0], 1)?;
        tx.remove(c[0])?;
        assert_eq!(tx.get_range_selection().unwrap().anchor, Point::element(p, 1));
        Ok(())
      })
      .unwrap();
  }

  #[test]
  fn test_retarget_point_inside_removed_subtree() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let (p1, _) = paragraph_with(tx, &["one"])?;
        let (p2, c2) = paragraph_with(tx, &["two"])?;
        tx.set_text_node_range(c2[0], 1, c2[0], 1)?;
        tx.remove(p2)?;
        assert_eq!(tx.get_range_selection().unwrap().anchor, Point::element(p1, 1));
        tx.state().validate()
      })
      .unwrap();
  }

  #[test]
  fn test_removing_last_child_keeps_end_caret() {
    let mut doc = Document::default();
    let p = doc
      .update(|tx| {
        let (p, c) = paragraph_with(tx, &["a"])?;
        let br = tx.create_line_break()?;
        let b = tx.create_text("b")?;
        tx.append(p, &[br, b])?;
        tx.select_end(p)?;
        tx.remove(b)?;
        assert_eq!(tx.get_range_selection().unwrap().anchor, Point::element(p, 2));
        assert_eq!(tx.state().children_keys(p), vec![c[0], br]);
        Ok(p)
      })
      .unwrap();

    let range = doc.state().selection().and_then(Selection::as_range).unwrap();
    assert_eq!(range.anchor, Point::element(p, 2));
    assert_eq!(range.focus, Point::element(p, 2));
  }

  #[test]
  fn test_insertion_shifts_element_points() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let (p, c) = paragraph_with(tx, &["a", "b"])?;
        tx.select(p, Some(1), Some(2))?;

        let x = tx.create_text("x")?;
        tx.insert_before(c[0], x)?;
        let range = tx.get_range_selection().unwrap();
        assert_eq!(range.anchor, Point::element(p, 2));
        assert_eq!(range.focus, Point::element(p, 3));

        let y = tx.create_text("y")?;
        tx.insert_after(c[0], y)?;
        let range = tx.get_range_selection().unwrap();
        assert_eq!(range.anchor, Point::element(p, 3));
        assert_eq!(range.focus, Point::element(p, 4));

        tx.clear(p)?;
        let range = tx.get_range_selection().unwrap();
        assert_eq!(range.anchor, Point::element(p, 0));
        assert_eq!(range.focus, Point::element(p, 0));
        Ok(())
      })
      .unwrap();
  }

  #[test]
  fn test_replaced_run_keeps_points_at_its_edges() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let (p, c) = paragraph_with(tx, &["a", "b", "c", "d"])?;
        tx.select(p, Some(1), Some(3))?;
        let x = tx.create_text("x")?;
        tx.splice(p, 1, 2, &[x])?;

        assert_eq!(tx.state().children_keys(p), vec![c[0], x, c[3]]);
        let range = tx.get_range_selection().unwrap();
        assert_eq!(range.anchor, Point::element(p, 1));
        assert_eq!(range.focus, Point::element(p, 2));
        Ok(())
      })
      .unwrap();
  }

  #[test]
  fn test_moving_child_out_shifts_points_on_old_parent() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let (p1, c1) = paragraph_with(tx, &["a", "b"])?;
        let (p2, c2) = paragraph_with(tx, &["c"])?;
        tx.select_end(p1)?;
        tx.append(p2, &[c1[0]])?;

        assert_eq!(tx.state().children_keys(p2), vec![c2[0], c1[0]]);
        assert_eq!(tx.get_range_selection().unwrap().anchor, Point::element(p1, 1));
        tx.state().validate()
      })
      .unwrap();
  }

  #[test]
  fn test_commit_normalization_keeps_end_caret() {
    let mut doc = Document::default();
    let p = doc
      .update(|tx| {
        let (p, _) = paragraph_with(tx, &["ab", "cd"])?;
        tx.select_end(p)?;
        Ok(p)
      })
      .unwrap();

    assert_eq!(doc.state().get_children_size(p), 1);
    let range = doc.state().selection().and_then(Selection::as_range).unwrap();
    assert_eq!(range.anchor, Point::element(p, 1));
  }

  #[test]
  fn test_node_selection_drops_removed_keys() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let (_, c) = paragraph_with(tx, &["a", "b"])?;
        tx.set_node_selection([c[0], c[1]])?;
        tx.remove(c[0])?;
        let nodes = tx.get_selection().and_then(Selection::as_node).unwrap();
        assert!(!nodes.has(c[0]));
        assert!(nodes.has(c[1]));

        tx.remove(c[1])?;
        assert!(tx.get_selection().is_none());
        Ok(())
      })
      .unwrap();
  }

  #[test]
  fn test_emptied_element_that_cannot_be_empty_is_removed() {
    let mut doc = Document::new(list_item_config());
    doc
      .update(|tx| {
        let item = tx.create_custom_element("list-item")?;
        let other = tx.create_paragraph()?;
        let a = tx.create_text("a")?;
        let b = tx.create_text("b")?;
        tx.append(item, &[a, b])?;
        tx.append(NodeKey::ROOT, &[other, item])?;
        tx.set_selection(Some(Selection::Range(RangeSelection::collapsed(Point::text(b, 1)))))?;

        tx.splice(item, 0, 2, &[])?;

        assert!(tx.get(item).unwrap().parent().is_none());
        assert_eq!(tx.state().children_keys(NodeKey::ROOT), vec![other]);
        assert_eq!(tx.get_range_selection().unwrap().anchor, Point::element(other, 0));
        tx.state().validate()
      })
      .unwrap();
  }

  #[test]
  fn test_emptied_paragraph_survives() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let (p, _) = paragraph_with(tx, &["a", "b"])?;
        tx.splice(p, 0, 2, &[])?;
        assert_eq!(tx.get(p).unwrap().parent(), Some(NodeKey::ROOT));
        assert_eq!(tx.state().get_children_size(p), 0);
        Ok(())
      })
      .unwrap();
  }

  #[test]
  fn test_emptying_link_cascades() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let (p, c) = paragraph_with(tx, &["before"])?;
        let link = tx.create_link("https://example.com")?;
        let label = tx.create_text("label")?;
        tx.append(link, &[label])?;
        tx.append(p, &[link])?;

        tx.remove(label)?;
        assert!(tx.get(link).unwrap().parent().is_none());
        assert_eq!(tx.state().children_keys(p), vec![c[0]]);
        Ok(())
      })
      .unwrap();
  }

  quickcheck::quickcheck! {
    fn prop_splice_matches_vec_model(initial: u8, start: u8, delete: u8, insert: u8) -> bool {
      let initial = usize::from(initial % 16);
      let start = usize::from(start) % (initial + 1);
      let delete = usize::from(delete) % (initial - start + 1);
      let insert = usize::from(insert % 8);

      let mut doc = Document::default();
      doc
        .update(|tx| {
          let (p, children) = paragraph_with(tx, &vec!["c"; initial])?;
          let fresh = (0..insert)
            .map(|_| tx.create_text("n"))
            .collect::<Result<Vec<_>>>()?;
          tx.splice(p, start, delete, &fresh)?;

          let mut expected = children.clone();
          let removed: Vec<_> = expected.splice(start..start + delete, fresh).collect();
          let state = tx.state();
          Ok(
            state.children_keys(p) == expected
              && state.get_children_size(p) == initial - delete + insert
              && removed.iter().all(|key| !state.is_attached(*key))
              && state.validate().is_ok(),
          )
        })
        .unwrap_or(false)
    }

    fn prop_splice_moves_match_vec_model(
      initial: u8,
      start: u8,
      delete: u8,
      picks: Vec<u8>,
      caret: u8
    ) -> bool {
      let initial = usize::from(initial % 12) + 1;
      let start = usize::from(start) % (initial + 1);
      let delete = usize::from(delete) % (initial - start + 1);
      let caret = usize::from(caret) % (initial + 1);

      let mut doc = Document::default();
      doc
        .update(|tx| {
          let (p, children) = paragraph_with(tx, &vec!["c"; initial])?;
          let mut to_insert = Vec::new();
          for pick in picks.iter().take(8) {
            let key = if pick % 3 == 0 {
              tx.create_text("n")?
            } else {
              children[usize::from(*pick) % initial]
            };
            if !to_insert.contains(&key) {
              to_insert.push(key);
            }
          }
          tx.select(p, Some(caret), Some(caret))?;
          tx.splice(p, start, delete, &to_insert)?;

          // Moved children leave their old slot and land in the gap.
          let mut expected = children.clone();
          let removed: Vec<_> = expected.drain(start..start + delete).collect();
          let gap = children[..start]
            .iter()
            .filter(|key| !to_insert.contains(key))
            .count();
          expected.retain(|key| !to_insert.contains(key));
          for (offset, key) in to_insert.iter().enumerate() {
            expected.insert(gap + offset, *key);
          }

          let expected_caret = match children.get(caret) {
            Some(child) => expected.iter().position(|key| key == child),
            None => Some(expected.len()),
          };
          let caret_ok = expected_caret.is_none_or(|offset| {
            tx.get_range_selection()
              .is_some_and(|range| range.anchor == Point::element(p, offset))
          });

          let state = tx.state();
          Ok(
            state.children_keys(p) == expected
              && state.get_children_size(p) == expected.len()
              && removed
                .iter()
                .filter(|key| !to_insert.contains(key))
                .all(|key| !state.is_attached(*key))
              && caret_ok
              && state.validate().is_ok(),
          )
        })
        .unwrap_or(false)
    }
  }
}
