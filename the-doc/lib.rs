//! In-memory rich-text document engine.
//!
//! A [`document::Document`] owns a tree of nodes addressed by
//! [`key::NodeKey`]. All mutation happens inside a
//! [`transaction::Transaction`] against a copy-on-write generation that is
//! published atomically on commit.

use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod config;
pub mod decorator;
pub mod diff;
pub mod document;
pub mod error;
pub mod key;
pub mod node;
pub mod selection;
pub mod serialize;
pub mod state;
pub mod text;
pub mod tokenize;
pub mod transaction;
pub mod tree;

pub type Tendril = SmartString<LazyCompact>;
