//! Re-deriving an element's children from a tokenizer.
//!
//! The tokenizer itself is external. [`Transaction::retokenize`] only turns
//! its output into nodes, reconciles them against the current children with
//! [`diff_range`] and splices the difference, so runs that did not change
//! keep their keys.

use std::time::Instant;

use crate::{
  Tendril,
  diff::{
    diff_range,
    node_eq,
  },
  error::{
    DocumentError,
    Result,
  },
  key::NodeKey,
  node::{
    LINE_BREAK,
    NodeKind,
    TextData,
  },
  selection::{
    Point,
    PointKind,
    Selection,
  },
  transaction::Transaction,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub text:  String,
  pub class: Option<Tendril>,
}

impl Token {
  pub fn new(text: impl Into<String>, class: Option<&str>) -> Self {
    Self {
      text:  text.into(),
      class: class.map(Tendril::from),
    }
  }
}

/// Splits text into classified runs. `"\n"` tokens become line breaks.
pub trait Tokenizer {
  fn tokenize(&self, text: &str) -> Vec<Token>;
}

impl<F> Tokenizer for F
where
  F: Fn(&str) -> Vec<Token>,
{
  fn tokenize(&self, text: &str) -> Vec<Token> {
    self(text)
  }
}

impl Transaction<'_> {
  /// Rebuilds the children of `parent` from the tokens of its text content.
  ///
  /// Only the range [`diff_range`] reports as changed is replaced. A range
  /// selection inside `parent` keeps its text offset.
  pub fn retokenize(&mut self, parent: NodeKey, tokenizer: &impl Tokenizer) -> Result<()> {
    let node = self.node(parent)?;
    if !node.is_element() {
      return Err(DocumentError::UnsupportedOperation {
        operation: "retokenize",
        node_type: node.type_name().to_string(),
      });
    }
    let start = tracing::enabled!(tracing::Level::DEBUG).then(Instant::now);

    let carets = self.get_range_selection().map(|range| {
      [
        self.text_offset_of(parent, &range.anchor),
        self.text_offset_of(parent, &range.focus),
      ]
    });

    let text = self.state().get_text_content(parent);
    let mut next = Vec::new();
    for token in tokenizer.tokenize(&text) {
      if token.text.is_empty() {
        continue;
      }
      let key = if token.text == LINE_BREAK {
        self.create_line_break()?
      } else {
        let mut data = TextData::new(token.text);
        data.class = token.class;
        self.create_node(NodeKind::Text(data))?
      };
      next.push(key);
    }

    let prev = self.state().children_keys(parent);
    let state = self.state();
    let range = diff_range(&prev, &next, |a, b| {
      match (state.get(*a), state.get(*b)) {
        (Some(a), Some(b)) => node_eq(a, b),
        _ => false,
      }
    });
    let (from, delete_count) = (range.from, range.delete_count());
    let replacement = range.replacement.to_vec();
    if !range.is_empty() {
      self.splice(parent, from, delete_count, &replacement)?;
    }

    if let Some(carets) = carets {
      self.restore_carets(parent, carets);
    }

    if let Some(start) = start {
      tracing::debug!(
        %parent,
        replaced = delete_count,
        inserted = replacement.len(),
        "retokenize took {}s",
        Instant::now().duration_since(start).as_secs_f64()
      );
    }
    Ok(())
  }

  /// Char offset of `point` within the text content of `parent`, when the
  /// point sits on `parent` itself or on one of its leaf children.
  fn text_offset_of(&self, parent: NodeKey, point: &Point) -> Option<usize> {
    let state = self.state();
    let mut offset = 0;
    for (index, child) in state.children(parent).enumerate() {
      if point.kind == PointKind::Element && point.key == parent && point.offset == index {
        return Some(offset);
      }
      if point.key == child.key() {
        return match point.kind {
          PointKind::Text => Some(offset + point.offset),
          PointKind::Element => None,
        };
      }
      offset += state.get_text_content_size(child.key());
    }
    (point.kind == PointKind::Element && point.key == parent).then_some(offset)
  }

  /// Resolves a char offset within `parent` back to a point, preferring the
  /// end of a text run over the start of the next child.
  fn point_at_text_offset(&self, parent: NodeKey, target: usize) -> Point {
    let state = self.state();
    let mut offset = 0;
    for (index, child) in state.children(parent).enumerate() {
      if let Some(text) = child.text() {
        if target <= offset + text.len() {
          return Point::text(child.key(), target - offset);
        }
      } else if target <= offset {
        return Point::element(parent, index);
      }
      offset += state.get_text_content_size(child.key());
    }
    Point::element(parent, state.get_children_size(parent))
  }

  fn restore_carets(&mut self, parent: NodeKey, carets: [Option<usize>; 2]) {
    let Some(mut selection) = self.state().selection().cloned() else {
      return;
    };
    if let Selection::Range(range) = &mut selection {
      for (point, caret) in range.points_mut().into_iter().zip(carets) {
        if let Some(caret) = caret {
          *point = self.point_at_text_offset(parent, caret);
        }
      }
    }
    self.state_mut().set_selection(Some(selection));
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{
    document::Document,
    node::Node,
  };

  /// Words, whitespace runs and single newlines.
  fn words(text: &str) -> Vec<Token> {
    fn class_of(ch: char) -> Option<&'static str> {
      match ch {
        '\n' => None,
        ch if ch.is_whitespace() => Some("space"),
        _ => Some("word"),
      }
    }

    let mut tokens: Vec<Token> = Vec::new();
    for ch in text.chars() {
      let class = class_of(ch);
      match tokens.last_mut() {
        Some(last) if ch != '\n' && !last.text.ends_with('\n') && last.class.as_deref() == class => {
          last.text.push(ch);
        },
        _ => tokens.push(Token::new(ch, class)),
      }
    }
    tokens
  }

  fn child_texts(tx: &Transaction<'_>, parent: NodeKey) -> Vec<String> {
    tx.state()
      .children(parent)
      .map(|child| child.leaf_text().unwrap_or_default().to_string())
      .collect()
  }

  #[test]
  fn test_retokenize_classifies_plain_text() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let p = tx.create_paragraph()?;
        let t = tx.create_text("let x\ny")?;
        tx.append(p, &[t])?;
        tx.append(NodeKey::ROOT, &[p])?;

        tx.retokenize(p, &words)?;
        assert_eq!(child_texts(tx, p), vec!["let", " ", "x", "\n", "y"]);
        let classes: Vec<_> = tx
          .state()
          .children(p)
          .filter_map(Node::text)
          .map(|text| text.class.as_deref().map(str::to_string))
          .collect();
        assert_eq!(classes, vec![
          Some("word".to_string()),
          Some("space".to_string()),
          Some("word".to_string()),
          Some("word".to_string()),
        ]);
        assert!(!tx.state().is_attached(t));
        Ok(())
      })
      .unwrap();
  }

  #[test]
  fn test_retokenize_reuses_unchanged_runs_and_keeps_caret() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let p = tx.create_paragraph()?;
        let t = tx.create_text("let xy")?;
        tx.append(p, &[t])?;
        tx.append(NodeKey::ROOT, &[p])?;
        tx.retokenize(p, &words)?;
        let before = tx.state().children_keys(p);

        // Type a space inside the last word, caret after it.
        tx.splice_text(before[2], 1, 0, " ", true)?;
        tx.retokenize(p, &words)?;

        let after = tx.state().children_keys(p);
        assert_eq!(child_texts(tx, p), vec!["let", " ", "x", " ", "y"]);
        assert_eq!(&after[..2], &before[..2]);
        assert!(!after.contains(&before[2]));
        assert_eq!(tx.get_range_selection().unwrap().anchor, Point::text(after[3], 1));
        tx.state().validate()
      })
      .unwrap();
  }

  #[test]
  fn test_retokenize_identical_output_is_noop() {
    let mut doc = Document::default();
    doc
      .update(|tx| {
        let p = tx.create_paragraph()?;
        let t = tx.create_text("a b")?;
        tx.append(p, &[t])?;
        tx.append(NodeKey::ROOT, &[p])?;
        tx.retokenize(p, &words)?;
        let before = tx.state().children_keys(p);
        tx.retokenize(p, &words)?;
        assert_eq!(tx.state().children_keys(p), before);
        Ok(())
      })
      .unwrap();
  }

  #[test]
  fn test_retokenize_text_node_is_unsupported() {
    let mut doc = Document::default();
    let result = doc.update(|tx| {
      let t = tx.create_text("x")?;
      tx.retokenize(t, &words)
    });
    assert!(matches!(result, Err(DocumentError::UnsupportedOperation { .. })));
  }
}
