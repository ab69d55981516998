//! Cursor and selection model.
//!
//! A [`Point`] addresses a position either inside a text node (`offset` is a
//! char offset) or between the children of an element (`offset` is a child
//! index). A [`RangeSelection`] is an `anchor`/`focus` pair of points; a
//! [`NodeSelection`] picks whole nodes by key.
//!
//! Points only store keys. When a structural edit removes the node a point
//! refers to, [`retarget`] moves the point to the closest surviving position:
//!
//! ```text
//! before present  -> end of `before`
//! after present   -> start of `after`
//! neither         -> (parent, 0)
//! ```
//!
//! so a committed selection never dangles on a missing key. Element points
//! on a spliced parent keep sitting in front of the same child.

use std::collections::BTreeSet;

use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  Tendril,
  error::{
    DocumentError,
    Result,
  },
  key::NodeKey,
  node::{
    Node,
    TextFormat,
  },
  state::DocumentState,
  transaction::Transaction,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
  Text,
  Element,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
  pub key:    NodeKey,
  pub offset: usize,
  pub kind:   PointKind,
}

impl Point {
  pub fn text(key: NodeKey, offset: usize) -> Self {
    Self {
      key,
      offset,
      kind: PointKind::Text,
    }
  }

  pub fn element(key: NodeKey, offset: usize) -> Self {
    Self {
      key,
      offset,
      kind: PointKind::Element,
    }
  }

  pub fn set(&mut self, key: NodeKey, offset: usize, kind: PointKind) {
    self.key = key;
    self.offset = offset;
    self.kind = kind;
  }

  /// The node this point refers to, if it still exists.
  pub fn node<'a>(&self, state: &'a DocumentState) -> Option<&'a Node> {
    state.get(self.key)
  }

  /// Whether the point resolves to a node of the right kind with an offset
  /// inside its bounds.
  pub fn is_valid(&self, state: &DocumentState) -> bool {
    let Some(node) = state.get(self.key) else {
      return false;
    };
    match self.kind {
      PointKind::Text => node.text().is_some_and(|text| self.offset <= text.len()),
      PointKind::Element => node.element().is_some_and(|element| self.offset <= element.size()),
    }
  }

  /// Document-order position of the point: the child index path from the
  /// root followed by the offset. Prefixes sort first.
  fn position(&self, state: &DocumentState) -> Vec<usize> {
    let mut path: Vec<usize> = std::iter::once(self.key)
      .chain(state.get_parent_keys(self.key))
      .filter_map(|key| state.get_index_within_parent(key))
      .collect();
    path.reverse();
    path.push(self.offset);
    path
  }

  /// Whether this point comes strictly before `other` in document order.
  pub fn is_before(&self, other: &Point, state: &DocumentState) -> bool {
    if self.key == other.key {
      return self.offset < other.offset;
    }
    self.position(state) < other.position(state)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSelection {
  pub anchor: Point,
  pub focus:  Point,
  /// Format applied to text typed at a collapsed caret.
  pub format: TextFormat,
  pub style:  Tendril,
}

impl RangeSelection {
  pub fn new(anchor: Point, focus: Point) -> Self {
    Self {
      anchor,
      focus,
      format: TextFormat::empty(),
      style: Tendril::new(),
    }
  }

  pub fn collapsed(point: Point) -> Self {
    Self::new(point, point)
  }

  #[inline]
  pub fn is_collapsed(&self) -> bool {
    self.anchor == self.focus
  }

  /// Whether the focus precedes the anchor.
  pub fn is_backward(&self, state: &DocumentState) -> bool {
    self.focus.is_before(&self.anchor, state)
  }

  /// `(start, end)` in document order.
  pub fn start_end(&self, state: &DocumentState) -> (Point, Point) {
    if self.is_backward(state) {
      (self.focus, self.anchor)
    } else {
      (self.anchor, self.focus)
    }
  }

  pub fn points_mut(&mut self) -> [&mut Point; 2] {
    [&mut self.anchor, &mut self.focus]
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSelection {
  keys: BTreeSet<NodeKey>,
}

impl NodeSelection {
  pub fn new(keys: impl IntoIterator<Item = NodeKey>) -> Self {
    Self {
      keys: keys.into_iter().collect(),
    }
  }

  pub fn add(&mut self, key: NodeKey) {
    self.keys.insert(key);
  }

  pub fn delete(&mut self, key: NodeKey) -> bool {
    self.keys.remove(&key)
  }

  pub fn has(&self, key: NodeKey) -> bool {
    self.keys.contains(&key)
  }

  pub fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
    self.keys.iter().copied()
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
  Range(RangeSelection),
  Node(NodeSelection),
}

impl Selection {
  pub fn as_range(&self) -> Option<&RangeSelection> {
    match self {
      Self::Range(range) => Some(range),
      Self::Node(_) => None,
    }
  }

  pub fn as_range_mut(&mut self) -> Option<&mut RangeSelection> {
    match self {
      Self::Range(range) => Some(range),
      Self::Node(_) => None,
    }
  }

  pub fn as_node(&self) -> Option<&NodeSelection> {
    match self {
      Self::Node(nodes) => Some(nodes),
      Self::Range(_) => None,
    }
  }

  /// Whether every key the selection mentions resolves to a valid position.
  pub fn is_valid(&self, state: &DocumentState) -> bool {
    match self {
      Self::Range(range) => range.anchor.is_valid(state) && range.focus.is_valid(state),
      Self::Node(nodes) => nodes.keys().all(|key| state.contains(key)),
    }
  }
}

/// Moves `point` off a removed node onto the closest surviving position
/// around the removed range of `parent`.
///
/// `before`/`after` are the siblings immediately around the removed range and
/// must already be relinked when this runs.
pub(crate) fn retarget(
  state: &DocumentState,
  point: &mut Point,
  parent: NodeKey,
  before: Option<NodeKey>,
  after: Option<NodeKey>,
) {
  let sibling = |key: NodeKey| state.get(key).map(|node| (key, node));

  if let Some((key, node)) = before.and_then(sibling) {
    if let Some(text) = node.text() {
      point.set(key, text.len(), PointKind::Text);
    } else if let Some(element) = node.element() {
      point.set(key, element.size(), PointKind::Element);
    } else {
      let index = state.get_index_within_parent(key).map_or(0, |index| index + 1);
      point.set(parent, index, PointKind::Element);
    }
  } else if let Some((key, node)) = after.and_then(sibling) {
    if node.is_text() {
      point.set(key, 0, PointKind::Text);
    } else if node.is_element() {
      point.set(key, 0, PointKind::Element);
    } else {
      let index = state.get_index_within_parent(key).unwrap_or(0);
      point.set(parent, index, PointKind::Element);
    }
  } else {
    point.set(parent, 0, PointKind::Element);
  }
}

/// Whether `point` sits on a removed node, or below one.
pub(crate) fn is_point_removed(
  state: &DocumentState,
  point: &Point,
  removed: &[NodeKey],
  inserted: &[NodeKey],
) -> bool {
  let mut cursor = Some(point.key);
  while let Some(key) = cursor {
    if removed.contains(&key) && !inserted.contains(&key) {
      return true;
    }
    cursor = state.get(key).and_then(Node::parent);
  }
  false
}

impl Transaction<'_> {
  pub fn get_selection(&self) -> Option<&Selection> {
    self.state().selection()
  }

  pub fn get_range_selection(&self) -> Option<&RangeSelection> {
    self.state().selection().and_then(Selection::as_range)
  }

  pub fn set_selection(&mut self, selection: Option<Selection>) -> Result<()> {
    if let Some(selection) = &selection {
      if !selection.is_valid(self.state()) {
        return Err(DocumentError::InvalidSelection(format!(
          "{selection:?} does not resolve"
        )));
      }
    }
    self.state_mut().set_selection(selection);
    Ok(())
  }

  pub fn clear_selection(&mut self) {
    self.state_mut().set_selection(None);
  }

  /// Selects whole nodes.
  pub fn set_node_selection(&mut self, keys: impl IntoIterator<Item = NodeKey>) -> Result<()> {
    self.set_selection(Some(Selection::Node(NodeSelection::new(keys))))
  }

  /// Places a range selection between two text positions.
  pub fn set_text_node_range(
    &mut self,
    anchor: NodeKey,
    anchor_offset: usize,
    focus: NodeKey,
    focus_offset: usize,
  ) -> Result<()> {
    for (key, offset) in [(anchor, anchor_offset), (focus, focus_offset)] {
      let node = self.node(key)?;
      let text = node.text().ok_or_else(|| {
        DocumentError::InvalidSelection(format!("{key} is a {} node, not text", node.type_name()))
      })?;
      if offset > text.len() {
        return Err(DocumentError::InvalidSelection(format!(
          "offset {offset} is past the end of {key} (length {})",
          text.len()
        )));
      }
    }

    let format = self.node(anchor)?.text().map(|text| text.format).unwrap_or_default();
    let mut range = RangeSelection::new(
      Point::text(anchor, anchor_offset),
      Point::text(focus, focus_offset),
    );
    range.format = format;
    self.state_mut().set_selection(Some(Selection::Range(range)));
    Ok(())
  }

  /// Selects inside `key`: a text range for text nodes, a child range for
  /// elements. Offsets default to the end of the node.
  pub fn select(
    &mut self,
    key: NodeKey,
    anchor_offset: Option<usize>,
    focus_offset: Option<usize>,
  ) -> Result<()> {
    let node = self.node(key)?;
    let (kind, len) = if let Some(text) = node.text() {
      (PointKind::Text, text.len())
    } else if let Some(element) = node.element() {
      (PointKind::Element, element.size())
    } else {
      return Err(DocumentError::UnsupportedOperation {
        operation: "select",
        node_type: node.type_name().to_string(),
      });
    };

    let anchor_offset = anchor_offset.unwrap_or(len).min(len);
    let focus_offset = focus_offset.unwrap_or(len).min(len);
    let point = |offset| {
      Point {
        key,
        offset,
        kind,
      }
    };
    self
      .state_mut()
      .set_selection(Some(Selection::Range(RangeSelection::new(
        point(anchor_offset),
        point(focus_offset),
      ))));
    Ok(())
  }

  pub fn select_start(&mut self, key: NodeKey) -> Result<()> {
    self.select(key, Some(0), Some(0))
  }

  pub fn select_end(&mut self, key: NodeKey) -> Result<()> {
    self.select(key, None, None)
  }

  /// Applies `f` to both points of the active range selection, if any.
  pub(crate) fn update_points(&mut self, mut f: impl FnMut(&DocumentState, &mut Point)) {
    let state = self.state_mut();
    let Some(mut selection) = state.selection().cloned() else {
      return;
    };
    if let Selection::Range(range) = &mut selection {
      for point in range.points_mut() {
        f(state, point);
      }
      state.set_selection(Some(selection));
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::document::Document;

  #[test]
  fn test_set_text_node_range_validates() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let p = tx.create_paragraph()?;
        let t = tx.create_text("hello")?;
        let br = tx.create_line_break()?;
        tx.append(p, &[t, br])?;
        tx.append(NodeKey::ROOT, &[p])?;

        tx.set_text_node_range(t, 1, t, 4)?;
        let range = tx.get_range_selection().unwrap();
        assert_eq!(range.anchor, Point::text(t, 1));
        assert_eq!(range.focus, Point::text(t, 4));
        assert!(!range.is_collapsed());

        assert!(matches!(
          tx.set_text_node_range(t, 9, t, 9),
          Err(DocumentError::InvalidSelection(_))
        ));
        assert!(matches!(
          tx.set_text_node_range(br, 0, t, 0),
          Err(DocumentError::InvalidSelection(_))
        ));
        Ok(())
      })
      .unwrap();
  }

  #[test]
  fn test_is_backward_across_nodes() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let p1 = tx.create_paragraph()?;
        let p2 = tx.create_paragraph()?;
        let a = tx.create_text("aaa")?;
        let b = tx.create_text("bbb")?;
        tx.append(p1, &[a])?;
        tx.append(p2, &[b])?;
        tx.append(NodeKey::ROOT, &[p1, p2])?;

        tx.set_text_node_range(b, 1, a, 2)?;
        let state = tx.state();
        let range = tx.get_range_selection().unwrap();
        assert!(range.is_backward(state));
        let (start, end) = range.start_end(state);
        assert_eq!(start, Point::text(a, 2));
        assert_eq!(end, Point::text(b, 1));

        assert!(Point::element(p1, 0).is_before(&Point::text(a, 0), state));
        assert!(Point::text(a, 3).is_before(&Point::element(p1, 1), state));
        Ok(())
      })
      .unwrap();
  }

  #[test]
  fn test_select_element_and_node_selection() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let p = tx.create_paragraph()?;
        let a = tx.create_text("a")?;
        let b = tx.create_text("b")?;
        tx.append(p, &[a, b])?;
        tx.append(NodeKey::ROOT, &[p])?;

        tx.select_end(p)?;
        assert_eq!(
          tx.get_range_selection().unwrap().anchor,
          Point::element(p, 2)
        );

        tx.select_start(a)?;
        assert_eq!(tx.get_range_selection().unwrap().focus, Point::text(a, 0));

        tx.set_node_selection([a, b])?;
        let nodes = tx.get_selection().and_then(Selection::as_node).unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.has(b));
        Ok(())
      })
      .unwrap();
  }

  #[test]
  fn test_set_selection_rejects_dangling() {
    let mut doc = Document::default();
    let result = doc.update(|tx| {
      let t = tx.create_text("x")?;
      tx.set_selection(Some(Selection::Range(RangeSelection::collapsed(
        Point::text(t, 5),
      ))))
    });
    assert!(matches!(result, Err(DocumentError::InvalidSelection(_))));
  }
}
