//! Character-offset arithmetic over UTF-8 strings.
//!
//! Document offsets count Unicode scalar values, not bytes. These helpers
//! translate between the two so callers never slice a `str` in the middle of
//! a code point.

use std::ops::Range;

/// Number of chars in `text`.
#[inline]
#[must_use]
pub fn char_len(text: &str) -> usize {
  text.chars().count()
}

/// Byte index of the char at `char_idx`. Offsets past the end clamp to
/// `text.len()`.
#[must_use]
pub fn char_to_byte(text: &str, char_idx: usize) -> usize {
  if char_idx == 0 {
    return 0;
  }
  text
    .char_indices()
    .nth(char_idx)
    .map_or(text.len(), |(byte_idx, _)| byte_idx)
}

/// Converts a char range into a byte range, clamping both ends.
#[must_use]
pub fn char_range_to_bytes(text: &str, range: Range<usize>) -> Range<usize> {
  let start = char_to_byte(text, range.start);
  let end = if range.end <= range.start {
    start
  } else {
    start + char_to_byte(&text[start..], range.end - range.start)
  };
  start..end
}

/// Slice of `text` covering the chars in `range`.
#[inline]
#[must_use]
pub fn char_slice(text: &str, range: Range<usize>) -> &str {
  &text[char_range_to_bytes(text, range)]
}

/// Splits `text` at a char offset.
#[inline]
#[must_use]
pub fn split_at_char(text: &str, char_idx: usize) -> (&str, &str) {
  text.split_at(char_to_byte(text, char_idx))
}

/// Replaces `delete_count` chars starting at `offset` with `insert`.
///
/// Both `offset` and the deleted span are clamped to the text length.
pub fn splice_chars(text: &mut String, offset: usize, delete_count: usize, insert: &str) {
  let range = char_range_to_bytes(text, offset..offset.saturating_add(delete_count));
  text.replace_range(range, insert);
}

/// Partitions `text` at the given char offsets.
///
/// Offsets are visited in scan order, so they do not need to be sorted.
/// Duplicates, `0` and offsets at or past the end never produce empty parts.
pub fn partition_at_chars(text: &str, offsets: &[usize]) -> Vec<String> {
  let mut parts = Vec::with_capacity(offsets.len() + 1);
  let mut part = String::new();
  for (idx, ch) in text.chars().enumerate() {
    if !part.is_empty() && offsets.contains(&idx) {
      parts.push(std::mem::take(&mut part));
    }
    part.push(ch);
  }
  if !part.is_empty() {
    parts.push(part);
  }
  parts
}
