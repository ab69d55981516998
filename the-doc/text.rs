//! Text edits, splitting and merging.
//!
//! Offsets are char offsets. Every edit keeps the selection attached to the
//! characters it pointed at: splitting moves points to the part that now
//! holds their character, merging folds the points of the absorbed sibling
//! into the surviving node.

use the_core::chars::{
  char_len,
  partition_at_chars,
  splice_chars,
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
    NodeKind,
    TextData,
    TextDetail,
    TextFormat,
    TextMode,
  },
  selection::{
    Point,
    PointKind,
    RangeSelection,
    Selection,
  },
  transaction::Transaction,
};

impl Transaction<'_> {
  fn text_data(&self, key: NodeKey, operation: &'static str) -> Result<&TextData> {
    let node = self.node(key)?;
    node.text().ok_or_else(|| {
      DocumentError::UnsupportedOperation {
        operation,
        node_type: node.type_name().to_string(),
      }
    })
  }

  /// Clamps text points on `key` to its current length.
  fn clamp_points(&mut self, key: NodeKey, len: usize) {
    self.update_points(|_, point| {
      if point.key == key && point.kind == PointKind::Text {
        point.offset = point.offset.min(len);
      }
    });
  }

  pub fn set_text_content(&mut self, key: NodeKey, text: impl Into<String>) -> Result<()> {
    let data = self.text_mut(key, "set_text_content")?;
    data.text = text.into();
    let len = data.len();
    self.clamp_points(key, len);
    Ok(())
  }

  /// Replaces `delete_count` chars at `offset` with `insert`.
  ///
  /// With `move_selection` the caret collapses right after the inserted
  /// text; otherwise points past the edit shift with the text around them.
  pub fn splice_text(
    &mut self,
    key: NodeKey,
    offset: usize,
    delete_count: usize,
    insert: &str,
    move_selection: bool,
  ) -> Result<()> {
    let data = self.text_mut(key, "splice_text")?;
    let len = data.len();
    let offset = offset.min(len);
    let delete_count = delete_count.min(len - offset);
    splice_chars(&mut data.text, offset, delete_count, insert);
    let new_len = data.len();
    let inserted = char_len(insert);
    let caret = offset + inserted;

    if move_selection {
      let state = self.state_mut();
      let mut range = match state.selection() {
        Some(Selection::Range(range)) => range.clone(),
        _ => RangeSelection::collapsed(Point::text(key, caret)),
      };
      range.anchor = Point::text(key, caret);
      range.focus = range.anchor;
      state.set_selection(Some(Selection::Range(range)));
      return Ok(());
    }

    let deleted_end = offset + delete_count;
    self.update_points(|_, point| {
      if point.key != key || point.kind != PointKind::Text || point.offset <= offset {
        return;
      }
      point.offset = if point.offset >= deleted_end {
        point.offset - delete_count + inserted
      } else {
        offset
      };
      point.offset = point.offset.min(new_len);
    });
    Ok(())
  }

  // Attributes.
  //

  pub fn set_format(&mut self, key: NodeKey, format: TextFormat) -> Result<()> {
    self.text_mut(key, "set_format")?.format = format;
    Ok(())
  }

  pub fn toggle_format(&mut self, key: NodeKey, flag: TextFormat) -> Result<()> {
    let data = self.text_mut(key, "toggle_format")?;
    data.format = data.format.toggled(flag);
    Ok(())
  }

  pub fn set_style(&mut self, key: NodeKey, style: impl Into<Tendril>) -> Result<()> {
    self.text_mut(key, "set_style")?.style = style.into();
    Ok(())
  }

  pub fn set_mode(&mut self, key: NodeKey, mode: TextMode) -> Result<()> {
    self.text_mut(key, "set_mode")?.mode = mode;
    Ok(())
  }

  pub fn set_detail(&mut self, key: NodeKey, detail: TextDetail) -> Result<()> {
    self.text_mut(key, "set_detail")?.detail = detail;
    Ok(())
  }

  pub fn set_class(&mut self, key: NodeKey, class: Option<Tendril>) -> Result<()> {
    self.text_mut(key, "set_class")?.class = class;
    Ok(())
  }

  pub fn composition_key(&self) -> Option<NodeKey> {
    self.state().composition_key()
  }

  /// Marks `key` as the text node under IME composition.
  pub fn set_composition_key(&mut self, key: Option<NodeKey>) -> Result<()> {
    if let Some(key) = key {
      self.text_data(key, "set_composition_key")?;
    }
    self.state_mut().set_composition_key(key);
    Ok(())
  }

  // Split and merge.
  //

  /// Splits the text of `key` at the given char offsets and returns the keys
  /// of the parts in order.
  ///
  /// The first part keeps the original key unless the node is segmented, in
  /// which case every part is a fresh node and the original is removed.
  /// Offsets that would produce an empty part are ignored; if nothing is
  /// left to split the result is `[key]` and the node is untouched.
  pub fn split_text(&mut self, key: NodeKey, offsets: &[usize]) -> Result<Vec<NodeKey>> {
    let template = self.text_data(key, "split_text")?.clone();
    let parts = partition_at_chars(template.text(), offsets);
    if parts.len() <= 1 {
      return Ok(vec![key]);
    }
    let parent = self.node(key)?.parent();
    let segmented = template.mode == TextMode::Segmented;

    let mut keys = Vec::with_capacity(parts.len());
    for (idx, part) in parts.iter().enumerate() {
      if idx == 0 && !segmented {
        self.text_mut(key, "split_text")?.text = part.clone();
        keys.push(key);
      } else {
        let data = TextData {
          text: part.clone(),
          ..template.clone()
        };
        keys.push(self.create_node(NodeKind::Text(data))?);
      }
    }

    tracing::trace!(%key, parts = keys.len(), segmented, "split text");

    let lens: Vec<usize> = parts.iter().map(|part| char_len(part)).collect();
    self.update_points(|_, point| {
      if point.key != key || point.kind != PointKind::Text {
        return;
      }
      let mut prior = 0;
      for (part, &len) in keys.iter().zip(&lens) {
        if point.offset <= prior + len {
          point.key = *part;
          point.offset -= prior;
          return;
        }
        prior += len;
      }
    });

    if self.state().composition_key() == Some(key) {
      self.state_mut().set_composition_key(keys.last().copied());
    }

    let Some(parent) = parent else {
      return Ok(keys);
    };
    let index = self
      .state()
      .get_index_within_parent(key)
      .ok_or_else(|| DocumentError::invariant(format!("{key} is not linked under {parent}")))?;
    if segmented {
      self.splice(parent, index, 1, &keys)?;
    } else {
      self.splice(parent, index + 1, 0, &keys[1..])?;
    }

    Ok(keys)
  }

  /// Merges the adjacent text sibling `target` into `key` and removes
  /// `target`. Returns `key`.
  pub fn merge_with_sibling(&mut self, key: NodeKey, target: NodeKey) -> Result<NodeKey> {
    let invalid = || DocumentError::InvalidMerge { node: key, target };

    let node = self.node(key)?;
    let target_is_before = node.prev() == Some(target);
    let adjacent = target_is_before || node.next() == Some(target);
    if key == target || !adjacent || node.parent().is_none() {
      return Err(invalid());
    }
    let text = self.text_data(key, "merge_with_sibling")?.text().to_owned();
    let target_text = self
      .get(target)
      .and_then(Node::text)
      .ok_or_else(invalid)?
      .text()
      .to_owned();

    let (len, target_len) = (char_len(&text), char_len(&target_text));
    let merged = if target_is_before {
      target_text + text.as_str()
    } else {
      text + target_text.as_str()
    };
    self.text_mut(key, "merge_with_sibling")?.text = merged;

    tracing::trace!(%key, %target, "merge text");

    self.update_points(|_, point| {
      match point.kind {
        PointKind::Text if point.key == target => {
          point.key = key;
          if !target_is_before {
            point.offset += len;
          }
        },
        PointKind::Text if point.key == key && target_is_before => {
          point.offset += target_len;
        },
        _ => {},
      }
    });
    if self.state().composition_key() == Some(target) {
      self.state_mut().set_composition_key(Some(key));
    }

    self.remove(target)?;
    Ok(key)
  }

  // Normalization.
  //

  /// Removes empty simple text and fuses adjacent compatible text among
  /// the nodes touched in this generation.
  pub(crate) fn normalize(&mut self) -> Result<()> {
    let mut dirty: Vec<NodeKey> = self.state().dirty().iter().copied().collect();
    dirty.sort_unstable();
    for key in dirty {
      self.normalize_text_node(key)?;
    }
    Ok(())
  }

  fn holds_caret(&self, key: NodeKey) -> bool {
    self.state().composition_key() == Some(key)
      || self
        .get_range_selection()
        .is_some_and(|range| range.anchor.key == key || range.focus.key == key)
  }

  fn is_removable_empty(&self, key: NodeKey) -> bool {
    self.get(key).and_then(Node::text).is_some_and(|text| {
      text.is_empty() && text.is_simple() && !text.detail.contains(TextDetail::UNMERGEABLE)
    }) && !self.holds_caret(key)
  }

  fn normalize_text_node(&mut self, key: NodeKey) -> Result<()> {
    if !self.get(key).is_some_and(Node::is_text) || !self.state().is_attached(key) {
      return Ok(());
    }
    if self.is_removable_empty(key) {
      return self.remove(key);
    }

    // Fold compatible previous siblings into `key`, then absorb the next.
    loop {
      let Some(prev) = self.get(key).and_then(Node::prev) else {
        break;
      };
      if self.is_removable_empty(prev) {
        self.remove(prev)?;
      } else if self.can_merge(prev, key) {
        self.merge_with_sibling(key, prev)?;
      } else {
        break;
      }
    }
    loop {
      let Some(next) = self.get(key).and_then(Node::next) else {
        break;
      };
      if self.is_removable_empty(next) {
        self.remove(next)?;
      } else if self.can_merge(key, next) {
        self.merge_with_sibling(key, next)?;
      } else {
        break;
      }
    }
    Ok(())
  }

  fn can_merge(&self, a: NodeKey, b: NodeKey) -> bool {
    match (self.get(a).and_then(Node::text), self.get(b).and_then(Node::text)) {
      (Some(a), Some(b)) => a.can_merge_with(b),
      _ => false,
    }
  }
}
