//! Node variants and their shared base contract.
//!
//! Every node carries its own [`NodeKey`], the key of its parent and the keys
//! of its neighbouring siblings. Nodes never own other nodes: containers only
//! record the keys of their first and last child plus a child count, and the
//! registry in [`crate::state`] resolves keys to values.
//!
//! The set of node kinds is closed ([`NodeKind`]); per-kind behaviour
//! (type names, emptiness rules, inline-ness) is dispatched with `match`.

use bitflags::bitflags;
use serde::{
  Deserialize,
  Serialize,
};
use the_core::chars::char_len;

use crate::{
  Tendril,
  key::NodeKey,
};

pub const LINE_BREAK: &str = "\n";
pub const DOUBLE_LINE_BREAK: &str = "\n\n";

bitflags! {
  /// Inline formatting of a text run.
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
  pub struct TextFormat: u32 {
    const BOLD          = 1;
    const ITALIC        = 1 << 1;
    const STRIKETHROUGH = 1 << 2;
    const UNDERLINE     = 1 << 3;
    const CODE          = 1 << 4;
    const SUBSCRIPT     = 1 << 5;
    const SUPERSCRIPT   = 1 << 6;
    const HIGHLIGHT     = 1 << 7;
  }
}

bitflags! {
  #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
  pub struct TextDetail: u32 {
    /// Excluded from bidi direction detection.
    const DIRECTIONLESS = 1;
    /// Never merged with adjacent text during normalization.
    const UNMERGEABLE   = 1 << 1;
  }
}

impl TextFormat {
  /// Toggles `flag`, keeping subscript and superscript mutually exclusive.
  #[must_use]
  pub fn toggled(self, flag: TextFormat) -> Self {
    let mut format = self ^ flag;
    if flag.contains(TextFormat::SUBSCRIPT) && format.contains(TextFormat::SUBSCRIPT) {
      format.remove(TextFormat::SUPERSCRIPT);
    } else if flag.contains(TextFormat::SUPERSCRIPT) && format.contains(TextFormat::SUPERSCRIPT) {
      format.remove(TextFormat::SUBSCRIPT);
    }
    format
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextMode {
  #[default]
  Normal,
  /// Edited as a single unit: any change replaces the whole text.
  Token,
  /// Edited segment-wise; splitting never reuses the node.
  Segmented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementFormat {
  #[default]
  #[serde(rename = "")]
  None,
  Left,
  Start,
  Center,
  Right,
  Justify,
  End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Ltr,
  Rtl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingTag {
  H1,
  H2,
  H3,
  H4,
  H5,
  H6,
}

/// Behaviour of an element type registered through configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomElement {
  pub type_name:    Tendril,
  pub inline:       bool,
  pub can_be_empty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
  Paragraph,
  Heading(HeadingTag),
  Quote,
  Link { url: Tendril },
  Custom(CustomElement),
}

impl ElementKind {
  pub fn type_name(&self) -> &str {
    match self {
      Self::Paragraph => "paragraph",
      Self::Heading(_) => "heading",
      Self::Quote => "quote",
      Self::Link { .. } => "link",
      Self::Custom(custom) => custom.type_name.as_str(),
    }
  }

  pub fn is_inline(&self) -> bool {
    match self {
      Self::Link { .. } => true,
      Self::Custom(custom) => custom.inline,
      _ => false,
    }
  }

  /// Whether an element of this kind survives losing its last child.
  pub fn can_be_empty(&self) -> bool {
    match self {
      Self::Link { .. } => false,
      Self::Custom(custom) => custom.can_be_empty,
      _ => true,
    }
  }
}

/// Child list bookkeeping and block formatting shared by Root and elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementData {
  pub(crate) first: Option<NodeKey>,
  pub(crate) last:  Option<NodeKey>,
  pub(crate) size:  usize,
  pub format:       ElementFormat,
  pub indent:       u32,
  pub direction:    Option<Direction>,
}

impl ElementData {
  pub fn first(&self) -> Option<NodeKey> {
    self.first
  }

  pub fn last(&self) -> Option<NodeKey> {
    self.last
  }

  pub fn size(&self) -> usize {
    self.size
  }

  pub fn is_empty(&self) -> bool {
    self.size == 0
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextData {
  pub(crate) text: String,
  pub format:      TextFormat,
  pub style:       Tendril,
  pub mode:        TextMode,
  pub detail:      TextDetail,
  /// Classification assigned by a tokenizer. Classified runs are
  /// "specialized" text and take part in minimal-diff reuse.
  pub class:       Option<Tendril>,
}

impl TextData {
  pub fn new(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      ..Self::default()
    }
  }

  pub fn text(&self) -> &str {
    &self.text
  }

  /// Length of the text in chars.
  pub fn len(&self) -> usize {
    char_len(&self.text)
  }

  pub fn is_empty(&self) -> bool {
    self.text.is_empty()
  }

  /// Plain editable text: normal mode and no classification.
  pub fn is_simple(&self) -> bool {
    self.mode == TextMode::Normal && self.class.is_none()
  }

  /// Whether `other` may be fused into this run during normalization.
  pub fn can_merge_with(&self, other: &TextData) -> bool {
    self.is_simple()
      && other.is_simple()
      && !self.detail.contains(TextDetail::UNMERGEABLE)
      && !other.detail.contains(TextDetail::UNMERGEABLE)
      && self.format == other.format
      && self.style == other.style
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecoratorData {
  pub type_name: Tendril,
  pub inline:    bool,
  /// Opaque state handed to the external renderer.
  pub data:      serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
  Root,
  Element,
  Text,
  LineBreak,
  Decorator,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
  Root(ElementData),
  Element(ElementKind, ElementData),
  Text(TextData),
  LineBreak,
  Decorator(DecoratorData),
}

impl NodeKind {
  pub fn node_type(&self) -> NodeType {
    match self {
      Self::Root(_) => NodeType::Root,
      Self::Element(..) => NodeType::Element,
      Self::Text(_) => NodeType::Text,
      Self::LineBreak => NodeType::LineBreak,
      Self::Decorator(_) => NodeType::Decorator,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
  pub(crate) key:    NodeKey,
  pub(crate) parent: Option<NodeKey>,
  pub(crate) prev:   Option<NodeKey>,
  pub(crate) next:   Option<NodeKey>,
  pub(crate) kind:   NodeKind,
}

impl Node {
  /// Creates a detached node.
  pub(crate) fn new(key: NodeKey, kind: NodeKind) -> Self {
    Self {
      key,
      parent: None,
      prev: None,
      next: None,
      kind,
    }
  }

  pub fn key(&self) -> NodeKey {
    self.key
  }

  pub fn parent(&self) -> Option<NodeKey> {
    self.parent
  }

  pub fn prev(&self) -> Option<NodeKey> {
    self.prev
  }

  pub fn next(&self) -> Option<NodeKey> {
    self.next
  }

  pub fn kind(&self) -> &NodeKind {
    &self.kind
  }

  pub fn node_type(&self) -> NodeType {
    self.kind.node_type()
  }

  /// Serialized type name, e.g. `"paragraph"` or `"text"`.
  pub fn type_name(&self) -> &str {
    match &self.kind {
      NodeKind::Root(_) => "root",
      NodeKind::Element(kind, _) => kind.type_name(),
      NodeKind::Text(_) => "text",
      NodeKind::LineBreak => "linebreak",
      NodeKind::Decorator(decorator) => decorator.type_name.as_str(),
    }
  }

  pub fn is_root(&self) -> bool {
    matches!(self.kind, NodeKind::Root(_))
  }

  /// Root or element.
  pub fn is_element(&self) -> bool {
    matches!(self.kind, NodeKind::Root(_) | NodeKind::Element(..))
  }

  pub fn is_text(&self) -> bool {
    matches!(self.kind, NodeKind::Text(_))
  }

  pub fn is_inline(&self) -> bool {
    match &self.kind {
      NodeKind::Root(_) => false,
      NodeKind::Element(kind, _) => kind.is_inline(),
      NodeKind::Text(_) | NodeKind::LineBreak => true,
      NodeKind::Decorator(decorator) => decorator.inline,
    }
  }

  pub fn can_be_empty(&self) -> bool {
    match &self.kind {
      NodeKind::Root(_) => true,
      NodeKind::Element(kind, _) => kind.can_be_empty(),
      _ => true,
    }
  }

  pub fn element(&self) -> Option<&ElementData> {
    match &self.kind {
      NodeKind::Root(data) | NodeKind::Element(_, data) => Some(data),
      _ => None,
    }
  }

  pub fn element_mut(&mut self) -> Option<&mut ElementData> {
    match &mut self.kind {
      NodeKind::Root(data) | NodeKind::Element(_, data) => Some(data),
      _ => None,
    }
  }

  pub fn element_kind(&self) -> Option<&ElementKind> {
    match &self.kind {
      NodeKind::Element(kind, _) => Some(kind),
      _ => None,
    }
  }

  pub fn text(&self) -> Option<&TextData> {
    match &self.kind {
      NodeKind::Text(data) => Some(data),
      _ => None,
    }
  }

  pub fn text_mut(&mut self) -> Option<&mut TextData> {
    match &mut self.kind {
      NodeKind::Text(data) => Some(data),
      _ => None,
    }
  }

  pub fn decorator(&self) -> Option<&DecoratorData> {
    match &self.kind {
      NodeKind::Decorator(data) => Some(data),
      _ => None,
    }
  }

  /// Child count for containers, `0` for leaves.
  pub fn children_size(&self) -> usize {
    self.element().map_or(0, ElementData::size)
  }

  /// Text contributed by a leaf. Containers return `None`; their content is
  /// assembled by [`crate::state::DocumentState::get_text_content`].
  pub fn leaf_text(&self) -> Option<&str> {
    match &self.kind {
      NodeKind::Text(data) => Some(data.text()),
      NodeKind::LineBreak => Some(LINE_BREAK),
      NodeKind::Decorator(_) => Some(""),
      NodeKind::Root(_) | NodeKind::Element(..) => None,
    }
  }
}
