//! JSON codec for nodes.
//!
//! Every node serializes to an object carrying its `type` name and the
//! codec `version`, followed by the fields of its kind. Elements, the root
//! included, always carry a `children` array:
//!
//! ```json
//! { "type": "paragraph", "version": 1, "children": [
//!     { "type": "text", "version": 1, "text": "hi", "format": 1,
//!       "detail": 0, "mode": "normal", "style": "" } ],
//!   "direction": null, "format": "", "indent": 0 }
//! ```
//!
//! Keys are not part of the format. Importing creates fresh detached nodes.

use serde::{
  Deserialize,
  Serialize,
};
use serde_json::{
  Value,
  json,
};

use crate::{
  error::{
    DocumentError,
    Result,
  },
  key::NodeKey,
  node::{
    Direction,
    ElementData,
    ElementFormat,
    ElementKind,
    HeadingTag,
    NodeKind,
    TextData,
    TextDetail,
    TextFormat,
    TextMode,
  },
  state::DocumentState,
  transaction::Transaction,
};

/// Codec version written on export. Import accepts `1..=CURRENT_VERSION`.
pub const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct Header {
  #[serde(rename = "type")]
  node_type: String,
  version:   u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<F> {
  #[serde(rename = "type")]
  node_type: String,
  version:   u32,
  #[serde(flatten)]
  fields:    F,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ElementFields {
  #[serde(default)]
  children:  Vec<Value>,
  #[serde(default)]
  direction: Option<Direction>,
  #[serde(default)]
  format:    ElementFormat,
  #[serde(default)]
  indent:    u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct HeadingFields {
  #[serde(flatten)]
  element: ElementFields,
  tag:     HeadingTag,
}

#[derive(Debug, Serialize, Deserialize)]
struct LinkFields {
  #[serde(flatten)]
  element: ElementFields,
  url:     String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TextFields {
  text:   String,
  #[serde(default)]
  format: u32,
  #[serde(default)]
  detail: u32,
  #[serde(default)]
  mode:   TextMode,
  #[serde(default)]
  style:  String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  class:  Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DecoratorFields {
  #[serde(default)]
  data: Value,
}

fn envelope<F: Serialize>(node_type: &str, fields: F) -> Result<Value> {
  Ok(serde_json::to_value(Envelope {
    node_type: node_type.to_string(),
    version: CURRENT_VERSION,
    fields,
  })?)
}

fn fields<F: for<'de> Deserialize<'de>>(value: &Value) -> Result<F> {
  Ok(Envelope::<F>::deserialize(value)?.fields)
}

fn check_version(header: &Header) -> Result<()> {
  if header.version == 0 || header.version > CURRENT_VERSION {
    return Err(DocumentError::UnsupportedVersion {
      node_type: header.node_type.clone(),
      version:   header.version,
    });
  }
  Ok(())
}

impl DocumentState {
  /// Serializes `key` and its subtree.
  pub fn export_json(&self, key: NodeKey) -> Result<Value> {
    let node = self.get(key).ok_or(DocumentError::NodeNotFound(key))?;
    match node.kind() {
      NodeKind::Root(element) => envelope("root", self.element_fields(key, element)?),
      NodeKind::Element(kind, element) => {
        let element = self.element_fields(key, element)?;
        match kind {
          ElementKind::Heading(tag) => envelope("heading", HeadingFields { element, tag: *tag }),
          ElementKind::Link { url } => {
            envelope("link", LinkFields {
              element,
              url: url.to_string(),
            })
          },
          kind => envelope(kind.type_name(), element),
        }
      },
      NodeKind::Text(text) => {
        envelope("text", TextFields {
          text:   text.text().to_string(),
          format: text.format.bits(),
          detail: text.detail.bits(),
          mode:   text.mode,
          style:  text.style.to_string(),
          class:  text.class.as_ref().map(ToString::to_string),
        })
      },
      NodeKind::LineBreak => Ok(json!({ "type": "linebreak", "version": CURRENT_VERSION })),
      NodeKind::Decorator(decorator) => {
        envelope(&decorator.type_name, DecoratorFields {
          data: decorator.data.clone(),
        })
      },
    }
  }

  fn element_fields(&self, key: NodeKey, element: &ElementData) -> Result<ElementFields> {
    let children = self
      .children(key)
      .map(|child| self.export_json(child.key()))
      .collect::<Result<Vec<_>>>()?;
    Ok(ElementFields {
      children,
      direction: element.direction,
      format: element.format,
      indent: element.indent,
    })
  }
}

impl Transaction<'_> {
  /// Creates a detached subtree from its serialized form and returns the key
  /// of its top node.
  pub fn import_json(&mut self, value: &Value) -> Result<NodeKey> {
    let header = Header::deserialize(value)?;
    check_version(&header)?;

    match header.node_type.as_str() {
      "root" => Err(DocumentError::invariant("a root node cannot be imported as a child")),
      "paragraph" => self.import_element(ElementKind::Paragraph, fields(value)?),
      "quote" => self.import_element(ElementKind::Quote, fields(value)?),
      "heading" => {
        let HeadingFields { element, tag } = fields(value)?;
        self.import_element(ElementKind::Heading(tag), element)
      },
      "link" => {
        let LinkFields { element, url } = fields(value)?;
        self.import_element(ElementKind::Link { url: url.into() }, element)
      },
      "text" => {
        let fields: TextFields = fields(value)?;
        self.create_node(NodeKind::Text(TextData {
          text:   fields.text,
          format: TextFormat::from_bits_truncate(fields.format),
          style:  fields.style.into(),
          mode:   fields.mode,
          detail: TextDetail::from_bits_truncate(fields.detail),
          class:  fields.class.map(Into::into),
        }))
      },
      "linebreak" => self.create_line_break(),
      name => {
        if let Some(custom) = self.config().custom_element(name) {
          self.import_element(ElementKind::Custom(custom), fields(value)?)
        } else if self.config().decorator(name).is_some() {
          let DecoratorFields { data } = fields(value)?;
          self.create_decorator(name, data)
        } else {
          Err(DocumentError::UnknownNodeType(name.to_string()))
        }
      },
    }
  }

  /// Applies a serialized root onto the document root, appending its
  /// children.
  pub(crate) fn import_root(&mut self, value: &Value) -> Result<()> {
    let header = Header::deserialize(value)?;
    if header.node_type != "root" {
      return Err(DocumentError::UnknownNodeType(header.node_type));
    }
    check_version(&header)?;
    let fields: ElementFields = fields(value)?;
    self.fill_element(NodeKey::ROOT, fields)
  }

  fn import_element(&mut self, kind: ElementKind, fields: ElementFields) -> Result<NodeKey> {
    let key = self.create_element(kind)?;
    self.fill_element(key, fields)?;
    Ok(key)
  }

  fn fill_element(&mut self, key: NodeKey, fields: ElementFields) -> Result<()> {
    let element = self.element_mut(key)?;
    element.format = fields.format;
    element.indent = fields.indent;
    element.direction = fields.direction;

    let children = fields
      .children
      .iter()
      .map(|child| self.import_json(child))
      .collect::<Result<Vec<_>>>()?;
    self.append(key, &children)
  }
}
