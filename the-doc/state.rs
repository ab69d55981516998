//! Node registry snapshots.
//!
//! A [`DocumentState`] maps [`NodeKey`]s to nodes. Two generations exist at
//! any time a transaction is open: the committed ("current") state, which is
//! frozen and shared behind an `Arc`, and the pending state forked from it.
//!
//! Forking is shallow: both generations point at the same `Arc<Node>` values.
//! Each slot carries the epoch of the generation that created its node, so
//! [`DocumentState::get_writable`] knows whether the node already belongs to
//! the pending generation or must be cloned first. A node is cloned at most
//! once per transaction no matter how many times it is written.

use std::{
  collections::{
    HashMap,
    HashSet,
  },
  sync::Arc,
};

use the_core::chars::char_len;

use crate::{
  error::{
    DocumentError,
    Result,
  },
  key::NodeKey,
  node::{
    DOUBLE_LINE_BREAK,
    ElementData,
    Node,
    NodeKind,
  },
  selection::Selection,
};

#[derive(Debug, Clone)]
struct Slot {
  epoch: u64,
  node:  Arc<Node>,
}

#[derive(Debug, Clone)]
pub struct DocumentState {
  nodes:       HashMap<NodeKey, Slot>,
  selection:   Option<Selection>,
  composition: Option<NodeKey>,
  epoch:       u64,
  read_only:   bool,
  dirty:       HashSet<NodeKey>,
}

impl Default for DocumentState {
  fn default() -> Self {
    Self::new()
  }
}

impl DocumentState {
  /// A frozen state holding only an empty root.
  pub fn new() -> Self {
    let root = Node::new(NodeKey::ROOT, NodeKind::Root(ElementData::default()));
    let mut nodes = HashMap::new();
    nodes.insert(NodeKey::ROOT, Slot {
      epoch: 0,
      node:  Arc::new(root),
    });
    Self {
      nodes,
      selection: None,
      composition: None,
      epoch: 0,
      read_only: true,
      dirty: HashSet::new(),
    }
  }

  /// Opens the next generation on top of this one.
  pub(crate) fn fork(&self) -> Self {
    Self {
      nodes:       self.nodes.clone(),
      selection:   self.selection.clone(),
      composition: self.composition,
      epoch:       self.epoch + 1,
      read_only:   false,
      dirty:       HashSet::new(),
    }
  }

  pub(crate) fn freeze(&mut self) {
    self.read_only = true;
  }

  pub fn epoch(&self) -> u64 {
    self.epoch
  }

  pub fn is_read_only(&self) -> bool {
    self.read_only
  }

  /// Number of registered nodes, root included.
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn contains(&self, key: NodeKey) -> bool {
    self.nodes.contains_key(&key)
  }

  pub fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
    self.nodes.keys().copied()
  }

  /// Resolves `key` in this generation. Unknown keys are not an error.
  #[inline]
  pub fn get(&self, key: NodeKey) -> Option<&Node> {
    self.nodes.get(&key).map(|slot| slot.node.as_ref())
  }

  /// Returns a node that is safe to mutate in this generation, cloning it
  /// into the generation on first access.
  pub fn get_writable(&mut self, key: NodeKey) -> Result<&mut Node> {
    if self.read_only {
      return Err(DocumentError::IllegalMutation);
    }
    let epoch = self.epoch;
    let slot = self
      .nodes
      .get_mut(&key)
      .ok_or(DocumentError::NodeNotFound(key))?;
    if slot.epoch != epoch {
      slot.node = Arc::new(Node::clone(&slot.node));
      slot.epoch = epoch;
      self.dirty.insert(key);
    }
    Ok(Arc::make_mut(&mut slot.node))
  }

  /// Whether `key` was cloned into, or created in, this generation.
  pub fn is_writable(&self, key: NodeKey) -> bool {
    !self.read_only
      && self
        .nodes
        .get(&key)
        .is_some_and(|slot| slot.epoch == self.epoch)
  }

  pub(crate) fn register(&mut self, node: Node) -> Result<()> {
    if self.read_only {
      return Err(DocumentError::IllegalMutation);
    }
    let key = node.key;
    self.dirty.insert(key);
    self.nodes.insert(key, Slot {
      epoch: self.epoch,
      node:  Arc::new(node),
    });
    Ok(())
  }

  pub(crate) fn unregister(&mut self, key: NodeKey) -> Option<Arc<Node>> {
    self.dirty.remove(&key);
    self.nodes.remove(&key).map(|slot| slot.node)
  }

  /// Keys written or created in this generation.
  pub fn dirty(&self) -> &HashSet<NodeKey> {
    &self.dirty
  }

  pub fn selection(&self) -> Option<&Selection> {
    self.selection.as_ref()
  }

  pub(crate) fn set_selection(&mut self, selection: Option<Selection>) {
    self.selection = selection;
  }

  /// Text node currently under IME composition.
  pub fn composition_key(&self) -> Option<NodeKey> {
    self.composition
  }

  pub(crate) fn set_composition_key(&mut self, key: Option<NodeKey>) {
    self.composition = key;
  }

  // Navigation.
  //

  pub fn root(&self) -> Option<&Node> {
    self.get(NodeKey::ROOT)
  }

  pub fn get_parent(&self, key: NodeKey) -> Option<&Node> {
    self.get(key)?.parent.and_then(|parent| self.get(parent))
  }

  pub fn get_first_child(&self, key: NodeKey) -> Option<&Node> {
    self.get(key)?.element()?.first.and_then(|first| self.get(first))
  }

  pub fn get_last_child(&self, key: NodeKey) -> Option<&Node> {
    self.get(key)?.element()?.last.and_then(|last| self.get(last))
  }

  pub fn get_next_sibling(&self, key: NodeKey) -> Option<&Node> {
    self.get(key)?.next.and_then(|next| self.get(next))
  }

  pub fn get_previous_sibling(&self, key: NodeKey) -> Option<&Node> {
    self.get(key)?.prev.and_then(|prev| self.get(prev))
  }

  /// Child of `key` at `index`, walking from whichever end is closer.
  pub fn get_child_at_index(&self, key: NodeKey, index: usize) -> Option<&Node> {
    let element = self.get(key)?.element()?;
    if index >= element.size {
      return None;
    }
    if index <= element.size / 2 {
      let mut node = self.get(element.first?)?;
      for _ in 0..index {
        node = self.get(node.next?)?;
      }
      Some(node)
    } else {
      let mut node = self.get(element.last?)?;
      for _ in 0..(element.size - 1 - index) {
        node = self.get(node.prev?)?;
      }
      Some(node)
    }
  }

  pub fn children(&self, key: NodeKey) -> Children<'_> {
    Children {
      state: self,
      next:  self.get(key).and_then(Node::element).and_then(ElementData::first),
    }
  }

  pub fn children_keys(&self, key: NodeKey) -> Vec<NodeKey> {
    self.children(key).map(Node::key).collect()
  }

  pub fn get_children_size(&self, key: NodeKey) -> usize {
    self.get(key).map_or(0, Node::children_size)
  }

  /// Position of `key` among its siblings, `None` when detached.
  pub fn get_index_within_parent(&self, key: NodeKey) -> Option<usize> {
    let node = self.get(key)?;
    node.parent?;
    let mut index = 0;
    let mut prev = node.prev;
    while let Some(prev_key) = prev {
      index += 1;
      prev = self.get(prev_key)?.prev;
    }
    Some(index)
  }

  /// Keys of all ancestors of `key`, nearest first.
  pub fn get_parent_keys(&self, key: NodeKey) -> Vec<NodeKey> {
    let mut keys = Vec::new();
    let mut parent = self.get(key).and_then(Node::parent);
    while let Some(parent_key) = parent {
      keys.push(parent_key);
      parent = self.get(parent_key).and_then(Node::parent);
    }
    keys
  }

  /// Whether `ancestor` is a strict ancestor of `key`.
  pub fn is_ancestor(&self, ancestor: NodeKey, key: NodeKey) -> bool {
    let mut parent = self.get(key).and_then(Node::parent);
    while let Some(parent_key) = parent {
      if parent_key == ancestor {
        return true;
      }
      parent = self.get(parent_key).and_then(Node::parent);
    }
    false
  }

  /// Whether `key` is reachable from the root by parent links.
  pub fn is_attached(&self, key: NodeKey) -> bool {
    key.is_root() || self.is_ancestor(NodeKey::ROOT, key)
  }

  /// The child of the root that contains `key`.
  pub fn get_top_level_element(&self, key: NodeKey) -> Option<NodeKey> {
    let mut current = key;
    loop {
      let parent = self.get(current)?.parent?;
      if parent.is_root() {
        return Some(current);
      }
      current = parent;
    }
  }

  /// Concatenated leaf text. Non-inline element siblings are separated by a
  /// double line break.
  pub fn get_text_content(&self, key: NodeKey) -> String {
    let mut out = String::new();
    self.write_text_content(key, &mut out);
    out
  }

  /// Length of [`Self::get_text_content`] in chars.
  pub fn get_text_content_size(&self, key: NodeKey) -> usize {
    match self.get(key) {
      Some(node) => {
        match node.text() {
          Some(text) => text.len(),
          None => char_len(&self.get_text_content(key)),
        }
      },
      None => 0,
    }
  }

  fn write_text_content(&self, key: NodeKey, out: &mut String) {
    let Some(node) = self.get(key) else {
      return;
    };
    if let Some(text) = node.leaf_text() {
      out.push_str(text);
      return;
    }
    for child in self.children(key) {
      self.write_text_content(child.key, out);
      if child.is_element() && child.next.is_some() && !child.is_inline() {
        out.push_str(DOUBLE_LINE_BREAK);
      }
    }
  }

  /// Checks the linked-list invariants of every element reachable from the
  /// root.
  pub fn validate(&self) -> Result<()> {
    let root = self
      .root()
      .ok_or_else(|| DocumentError::InvariantViolation("root is missing".into()))?;
    if root.parent.is_some() || root.prev.is_some() || root.next.is_some() {
      return Err(DocumentError::InvariantViolation(
        "root must not have a parent or siblings".into(),
      ));
    }

    let mut stack = vec![NodeKey::ROOT];
    let mut visited = HashSet::new();
    while let Some(key) = stack.pop() {
      if !visited.insert(key) {
        return Err(DocumentError::InvariantViolation(format!(
          "{key} is reachable twice"
        )));
      }
      let Some(element) = self.get(key).and_then(Node::element) else {
        continue;
      };

      let mut count = 0;
      let mut prev = None;
      let mut cursor = element.first;
      while let Some(child_key) = cursor {
        let child = self.get(child_key).ok_or_else(|| {
          DocumentError::InvariantViolation(format!("{key} links to missing child {child_key}"))
        })?;
        if child.parent != Some(key) {
          return Err(DocumentError::InvariantViolation(format!(
            "{child_key} is linked under {key} but its parent is {:?}",
            child.parent
          )));
        }
        if child.prev != prev {
          return Err(DocumentError::InvariantViolation(format!(
            "{child_key} has a broken previous link"
          )));
        }
        count += 1;
        if count > element.size {
          return Err(DocumentError::InvariantViolation(format!(
            "{key} has more children than its size {}",
            element.size
          )));
        }
        stack.push(child_key);
        prev = Some(child_key);
        cursor = child.next;
      }

      if count != element.size || prev != element.last {
        return Err(DocumentError::InvariantViolation(format!(
          "{key} has size {} but {count} linked children",
          element.size
        )));
      }
    }

    Ok(())
  }
}

/// Iterator over the children of an element, first to last.
pub struct Children<'a> {
  state: &'a DocumentState,
  next:  Option<NodeKey>,
}

impl<'a> Iterator for Children<'a> {
  type Item = &'a Node;

  fn next(&mut self) -> Option<Self::Item> {
    let node = self.state.get(self.next?)?;
    self.next = node.next;
    Some(node)
  }
}
