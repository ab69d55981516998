//! The mutation context.
//!
//! A [`Transaction`] is the only way to obtain writable nodes. It borrows the
//! pending [`DocumentState`] of a [`crate::document::Document`] together with
//! the document's key allocator and configuration, and is threaded explicitly
//! through every mutating call instead of living in ambient global state.
//!
//! ```ignore
//! use the_doc::{document::Document, key::NodeKey};
//!
//! let mut doc = Document::default();
//! doc.update(|tx| {
//!   let p = tx.create_paragraph()?;
//!   let t = tx.create_text("hello")?;
//!   tx.append(p, &[t])?;
//!   tx.append(NodeKey::ROOT, &[p])
//! })?;
//! ```
//!
//! Operations that change structure live next to the algorithms they use:
//! splicing in [`crate::tree`], text edits in [`crate::text`], selection
//! updates in [`crate::selection`].

use crate::{
  Tendril,
  config::DocumentConfig,
  error::{
    DocumentError,
    Result,
  },
  key::{
    KeyAllocator,
    NodeKey,
  },
  node::{
    DecoratorData,
    Direction,
    ElementData,
    ElementFormat,
    ElementKind,
    HeadingTag,
    Node,
    NodeKind,
    TextData,
  },
  selection::{
    Selection,
    retarget,
  },
  state::DocumentState,
};

pub struct Transaction<'a> {
  state:  &'a mut DocumentState,
  keys:   &'a mut KeyAllocator,
  config: &'a DocumentConfig,
}

impl<'a> Transaction<'a> {
  pub(crate) fn new(
    state: &'a mut DocumentState,
    keys: &'a mut KeyAllocator,
    config: &'a DocumentConfig,
  ) -> Self {
    Self {
      state,
      keys,
      config,
    }
  }

  /// The pending generation.
  pub fn state(&self) -> &DocumentState {
    self.state
  }

  pub(crate) fn state_mut(&mut self) -> &mut DocumentState {
    self.state
  }

  pub fn config(&self) -> &DocumentConfig {
    self.config
  }

  /// Runs `f` inside this transaction. Nesting never opens a new generation.
  pub fn update<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
    f(self)
  }

  #[inline]
  pub fn get(&self, key: NodeKey) -> Option<&Node> {
    self.state.get(key)
  }

  pub(crate) fn node(&self, key: NodeKey) -> Result<&Node> {
    self.state.get(key).ok_or(DocumentError::NodeNotFound(key))
  }

  pub fn get_writable(&mut self, key: NodeKey) -> Result<&mut Node> {
    self.state.get_writable(key)
  }

  pub(crate) fn element_mut(&mut self, key: NodeKey) -> Result<&mut ElementData> {
    let node = self.state.get_writable(key)?;
    if !node.is_element() {
      return Err(DocumentError::UnsupportedOperation {
        operation: "element mutation",
        node_type: node.type_name().to_string(),
      });
    }
    node
      .element_mut()
      .ok_or_else(|| DocumentError::invariant(format!("{key} lost its child list")))
  }

  pub(crate) fn text_mut(
    &mut self,
    key: NodeKey,
    operation: &'static str,
  ) -> Result<&mut TextData> {
    let node = self.state.get_writable(key)?;
    if !node.is_text() {
      return Err(DocumentError::UnsupportedOperation {
        operation,
        node_type: node.type_name().to_string(),
      });
    }
    node
      .text_mut()
      .ok_or_else(|| DocumentError::invariant(format!("{key} lost its text")))
  }

  // Construction.
  //

  /// Registers a new detached node.
  pub fn create_node(&mut self, kind: NodeKind) -> Result<NodeKey> {
    if matches!(kind, NodeKind::Root(_)) {
      return Err(DocumentError::invariant("a document has exactly one root"));
    }
    let key = self.keys.alloc();
    self.state.register(Node::new(key, kind))?;
    Ok(key)
  }

  pub fn create_element(&mut self, kind: ElementKind) -> Result<NodeKey> {
    self.create_node(NodeKind::Element(kind, ElementData::default()))
  }

  pub fn create_paragraph(&mut self) -> Result<NodeKey> {
    self.create_element(ElementKind::Paragraph)
  }

  pub fn create_heading(&mut self, tag: HeadingTag) -> Result<NodeKey> {
    self.create_element(ElementKind::Heading(tag))
  }

  pub fn create_quote(&mut self) -> Result<NodeKey> {
    self.create_element(ElementKind::Quote)
  }

  pub fn create_link(&mut self, url: impl Into<Tendril>) -> Result<NodeKey> {
    self.create_element(ElementKind::Link { url: url.into() })
  }

  /// Creates an element of a type registered in the configuration.
  pub fn create_custom_element(&mut self, type_name: &str) -> Result<NodeKey> {
    let custom = self
      .config
      .custom_element(type_name)
      .ok_or_else(|| DocumentError::UnknownNodeType(type_name.to_string()))?;
    self.create_element(ElementKind::Custom(custom))
  }

  pub fn create_text(&mut self, text: impl Into<String>) -> Result<NodeKey> {
    self.create_node(NodeKind::Text(TextData::new(text)))
  }

  pub fn create_line_break(&mut self) -> Result<NodeKey> {
    self.create_node(NodeKind::LineBreak)
  }

  /// Creates a decorator of a type registered in the configuration.
  pub fn create_decorator(&mut self, type_name: &str, data: serde_json::Value) -> Result<NodeKey> {
    let inline = self
      .config
      .decorator(type_name)
      .map(|decorator| decorator.inline)
      .ok_or_else(|| DocumentError::UnknownNodeType(type_name.to_string()))?;
    self.create_node(NodeKind::Decorator(DecoratorData {
      type_name: type_name.into(),
      inline,
      data,
    }))
  }

  // Element and decorator properties.
  //

  pub fn set_element_format(&mut self, key: NodeKey, format: ElementFormat) -> Result<()> {
    self.element_mut(key)?.format = format;
    Ok(())
  }

  pub fn set_indent(&mut self, key: NodeKey, indent: u32) -> Result<()> {
    self.element_mut(key)?.indent = indent;
    Ok(())
  }

  pub fn set_direction(&mut self, key: NodeKey, direction: Option<Direction>) -> Result<()> {
    self.element_mut(key)?.direction = direction;
    Ok(())
  }

  pub fn set_url(&mut self, key: NodeKey, url: impl Into<Tendril>) -> Result<()> {
    let node = self.get_writable(key)?;
    match &mut node.kind {
      NodeKind::Element(ElementKind::Link { url: current }, _) => {
        *current = url.into();
        Ok(())
      },
      _ => {
        Err(DocumentError::UnsupportedOperation {
          operation: "set_url",
          node_type: node.type_name().to_string(),
        })
      },
    }
  }

  pub fn set_decorator_data(&mut self, key: NodeKey, data: serde_json::Value) -> Result<()> {
    let node = self.get_writable(key)?;
    match &mut node.kind {
      NodeKind::Decorator(decorator) => {
        decorator.data = data;
        Ok(())
      },
      _ => {
        Err(DocumentError::UnsupportedOperation {
          operation: "set_decorator_data",
          node_type: node.type_name().to_string(),
        })
      },
    }
  }

  // Structural sugar over `splice`.
  //

  fn parent_and_index(&self, key: NodeKey) -> Result<Option<(NodeKey, usize)>> {
    let node = self.node(key)?;
    let Some(parent) = node.parent else {
      return Ok(None);
    };
    let index = self
      .state
      .get_index_within_parent(key)
      .ok_or_else(|| DocumentError::invariant(format!("{key} is not linked under {parent}")))?;
    Ok(Some((parent, index)))
  }

  /// Detaches `key` from its parent. Detached nodes are left alone; the root
  /// can never be removed.
  pub fn remove(&mut self, key: NodeKey) -> Result<()> {
    if key.is_root() {
      return Err(DocumentError::invariant("the root node cannot be removed"));
    }
    match self.parent_and_index(key)? {
      Some((parent, index)) => self.splice(parent, index, 1, &[]),
      None => Ok(()),
    }
  }

  /// Puts `with` in the place of `key`. Selection points on `key` move to
  /// the end of `with`.
  pub fn replace(&mut self, key: NodeKey, with: NodeKey) -> Result<()> {
    if key.is_root() || with.is_root() {
      return Err(DocumentError::invariant("the root node cannot be replaced"));
    }
    if key == with {
      return Ok(());
    }
    let (parent, index) = self
      .parent_and_index(key)?
      .ok_or_else(|| DocumentError::invariant(format!("cannot replace detached node {key}")))?;

    let on_replaced = match self.get_range_selection() {
      Some(range) => [range.anchor.key == key, range.focus.key == key],
      None => [false, false],
    };

    self.splice(parent, index, 1, &[with])?;

    if on_replaced.contains(&true) {
      let state = self.state_mut();
      let mut selection = state.selection().cloned();
      if let Some(Selection::Range(range)) = &mut selection {
        for (point, moved) in range.points_mut().into_iter().zip(on_replaced) {
          if moved {
            retarget(state, point, parent, Some(with), None);
          }
        }
      }
      state.set_selection(selection);
    }
    Ok(())
  }

  pub fn insert_after(&mut self, key: NodeKey, node: NodeKey) -> Result<()> {
    let (parent, index) = self
      .parent_and_index(key)?
      .ok_or_else(|| DocumentError::invariant(format!("{key} has no parent to insert into")))?;
    self.splice(parent, index + 1, 0, &[node])
  }

  pub fn insert_before(&mut self, key: NodeKey, node: NodeKey) -> Result<()> {
    let (parent, index) = self
      .parent_and_index(key)?
      .ok_or_else(|| DocumentError::invariant(format!("{key} has no parent to insert into")))?;
    self.splice(parent, index, 0, &[node])
  }

  /// Removes every child of `key`.
  pub fn clear(&mut self, key: NodeKey) -> Result<()> {
    let size = self.state.get_children_size(key);
    self.splice(key, 0, size, &[])
  }
}
