use serde::{
  Deserialize,
  Serialize,
};

use crate::{
  error::Result,
  node::CustomElement,
};

/// Document engine configuration.
///
/// ```toml
/// normalize-on-commit = true
/// validate-on-commit = false
///
/// [[elements]]
/// name = "list-item"
/// can-be-empty = false
///
/// [[decorators]]
/// name = "image"
/// inline = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DocumentConfig {
  /// Drop empty text and fuse compatible adjacent text when committing.
  pub normalize_on_commit: bool,
  /// Check the linked-list invariants of the whole tree when committing.
  pub validate_on_commit:  bool,
  pub elements:            Vec<ElementTypeConfig>,
  pub decorators:          Vec<DecoratorTypeConfig>,
}

impl Default for DocumentConfig {
  fn default() -> Self {
    Self {
      normalize_on_commit: true,
      validate_on_commit:  cfg!(debug_assertions),
      elements:            Vec::new(),
      decorators:          Vec::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ElementTypeConfig {
  pub name:         String,
  pub inline:       bool,
  pub can_be_empty: bool,
}

impl Default for ElementTypeConfig {
  fn default() -> Self {
    Self {
      name:         String::new(),
      inline:       false,
      can_be_empty: true,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DecoratorTypeConfig {
  pub name:   String,
  pub inline: bool,
}

impl DocumentConfig {
  pub fn from_toml(contents: &str) -> Result<Self> {
    Ok(toml::from_str(contents)?)
  }

  pub fn custom_element(&self, name: &str) -> Option<CustomElement> {
    self
      .elements
      .iter()
      .find(|element| element.name == name)
      .map(|element| {
        CustomElement {
          type_name:    element.name.as_str().into(),
          inline:       element.inline,
          can_be_empty: element.can_be_empty,
        }
      })
  }

  pub fn decorator(&self, name: &str) -> Option<&DecoratorTypeConfig> {
    self.decorators.iter().find(|decorator| decorator.name == name)
  }
}
