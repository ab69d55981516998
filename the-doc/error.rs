use thiserror::Error;

use crate::key::NodeKey;

pub type Result<T> = std::result::Result<T, DocumentError>;

/// Errors raised by the document engine.
///
/// Variants fall in two classes. Fatal ones ([`DocumentError::is_fatal`])
/// mean a collaborator broke a structural invariant: the transaction that
/// produced them is discarded as a whole. Everything else is a guard error
/// the caller can correct and retry.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DocumentError {
  #[error("invariant violation: {0}")]
  InvariantViolation(String),
  #[error("cannot merge {node} with {target}: target must be an adjacent text sibling")]
  InvalidMerge { node: NodeKey, target: NodeKey },
  #[error("cannot mutate the document outside of an open transaction")]
  IllegalMutation,
  #[error("node {0} does not exist")]
  NodeNotFound(NodeKey),
  #[error("{node_type} node does not support {operation}")]
  UnsupportedOperation {
    operation: &'static str,
    node_type: String,
  },
  #[error("invalid selection: {0}")]
  InvalidSelection(String),
  #[error("unsupported version {version} for {node_type} node")]
  UnsupportedVersion { node_type: String, version: u32 },
  #[error("unknown node type `{0}`")]
  UnknownNodeType(String),
  #[error(transparent)]
  Json(#[from] serde_json::Error),
  #[error(transparent)]
  Config(#[from] toml::de::Error),
}

impl DocumentError {
  /// Fatal errors signal a programming error in a collaborator and always
  /// abort the whole transaction.
  pub fn is_fatal(&self) -> bool {
    matches!(self, Self::InvariantViolation(_) | Self::InvalidMerge { .. })
  }

  pub(crate) fn invariant(message: impl Into<String>) -> Self {
    Self::InvariantViolation(message.into())
  }
}
