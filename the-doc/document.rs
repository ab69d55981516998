//! The document: committed state, the pending generation and the commit
//! pipeline.
//!
//! ```text
//! begin ──► pending = current.fork()
//!             │  Transaction: create / splice / split / merge / select
//!             ▼
//! commit ──► normalize ─► collect unreachable ─► check selection
//!            ─► validate ─► freeze ─► current = pending ─► listeners
//! ```
//!
//! A failed update never leaves a partial generation behind: the pending
//! state is dropped and `current` is untouched.

use std::{
  collections::HashSet,
  fmt,
  sync::Arc,
  time::Instant,
};

use serde::Deserialize;
use serde_json::{
  Value,
  json,
};

use crate::{
  config::DocumentConfig,
  error::{
    DocumentError,
    Result,
  },
  key::{
    KeyAllocator,
    NodeKey,
  },
  node::Node,
  state::DocumentState,
  transaction::Transaction,
};

/// Handed to update listeners after every commit.
#[derive(Debug, Clone)]
pub struct Update {
  pub prev:  Arc<DocumentState>,
  pub next:  Arc<DocumentState>,
  /// Keys created or written during the committed transaction that are still
  /// registered.
  pub dirty: HashSet<NodeKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&Update)>;

pub struct Document {
  current:       Arc<DocumentState>,
  pending:       Option<DocumentState>,
  keys:          KeyAllocator,
  config:        DocumentConfig,
  listeners:     Vec<(ListenerId, Listener)>,
  next_listener: u64,
}

impl Default for Document {
  fn default() -> Self {
    Self::new(DocumentConfig::default())
  }
}

impl fmt::Debug for Document {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Document")
      .field("epoch", &self.current.epoch())
      .field("nodes", &self.current.len())
      .field("updating", &self.pending.is_some())
      .field("listeners", &self.listeners.len())
      .finish()
  }
}

#[derive(Deserialize)]
struct SerializedDocument {
  root: Value,
}

impl Document {
  pub fn new(config: DocumentConfig) -> Self {
    Self {
      current: Arc::new(DocumentState::new()),
      pending: None,
      keys: KeyAllocator::new(),
      config,
      listeners: Vec::new(),
      next_listener: 0,
    }
  }

  pub fn config(&self) -> &DocumentConfig {
    &self.config
  }

  /// The active generation: pending while a transaction is open, current
  /// otherwise.
  pub fn state(&self) -> &DocumentState {
    self.pending.as_ref().unwrap_or(&self.current)
  }

  /// The last committed generation.
  pub fn current(&self) -> Arc<DocumentState> {
    Arc::clone(&self.current)
  }

  pub fn get(&self, key: NodeKey) -> Option<&Node> {
    self.state().get(key)
  }

  pub fn is_updating(&self) -> bool {
    self.pending.is_some()
  }

  // Transaction lifecycle.
  //

  /// Opens a pending generation. Returns `false` if one was already open.
  pub fn begin(&mut self) -> bool {
    if self.pending.is_some() {
      return false;
    }
    self.pending = Some(self.current.fork());
    true
  }

  /// The mutation context of the open generation.
  pub fn transaction(&mut self) -> Result<Transaction<'_>> {
    let state = self.pending.as_mut().ok_or(DocumentError::IllegalMutation)?;
    Ok(Transaction::new(state, &mut self.keys, &self.config))
  }

  /// Drops the pending generation. Returns `false` if none was open.
  pub fn discard(&mut self) -> bool {
    self.pending.take().is_some()
  }

  /// Runs `f` against the pending generation, opening one if needed.
  ///
  /// The generation is committed only when this call opened it. If `f`
  /// fails the generation it opened is discarded as a whole. A fatal error
  /// discards the pending generation even when an outer caller opened it.
  pub fn update<R>(&mut self, f: impl FnOnce(&mut Transaction<'_>) -> Result<R>) -> Result<R> {
    let opened = self.begin();
    let result = self.transaction().and_then(|mut tx| f(&mut tx));
    match result {
      Ok(value) => {
        if opened {
          self.commit()?;
        }
        Ok(value)
      },
      Err(err) => {
        if opened || err.is_fatal() {
          self.discard();
          log_abort(&err);
        }
        Err(err)
      },
    }
  }

  /// Publishes the pending generation as the new current state.
  pub fn commit(&mut self) -> Result<()> {
    let mut pending = self.pending.take().ok_or(DocumentError::IllegalMutation)?;
    let start = tracing::enabled!(tracing::Level::DEBUG).then(Instant::now);

    if let Err(err) = self.finalize(&mut pending) {
      log_abort(&err);
      return Err(err);
    }
    pending.freeze();

    let dirty = pending.dirty().clone();
    let next = Arc::new(pending);
    let prev = std::mem::replace(&mut self.current, Arc::clone(&next));
    let update = Update { prev, next, dirty };
    for (_, listener) in &mut self.listeners {
      listener(&update);
    }

    if let Some(start) = start {
      tracing::debug!(
        epoch = update.next.epoch(),
        dirty = update.dirty.len(),
        nodes = update.next.len(),
        "commit took {}s",
        Instant::now().duration_since(start).as_secs_f64()
      );
    }
    Ok(())
  }

  fn finalize(&mut self, pending: &mut DocumentState) -> Result<()> {
    if self.config.normalize_on_commit {
      Transaction::new(pending, &mut self.keys, &self.config).normalize()?;
    }

    let collected = collect_garbage(pending);
    if collected > 0 {
      tracing::trace!(collected, "collected unreachable nodes");
    }

    if let Some(selection) = pending.selection() {
      if !selection.is_valid(pending) {
        tracing::warn!(?selection, "dropping selection that no longer resolves");
        pending.set_selection(None);
      }
    }
    if let Some(key) = pending.composition_key() {
      if !pending.get(key).is_some_and(Node::is_text) {
        pending.set_composition_key(None);
      }
    }

    if self.config.validate_on_commit {
      pending.validate()?;
    }
    Ok(())
  }

  // Listeners.
  //

  pub fn register_update_listener(
    &mut self,
    listener: impl FnMut(&Update) + 'static,
  ) -> ListenerId {
    let id = ListenerId(self.next_listener);
    self.next_listener += 1;
    self.listeners.push((id, Box::new(listener)));
    id
  }

  pub fn remove_update_listener(&mut self, id: ListenerId) -> bool {
    let len = self.listeners.len();
    self.listeners.retain(|(listener, _)| *listener != id);
    self.listeners.len() != len
  }

  // Serialization.
  //

  /// Serializes the committed document as `{"root": {...}}`.
  pub fn to_json(&self) -> Result<Value> {
    let root = self.current.export_json(NodeKey::ROOT)?;
    Ok(json!({ "root": root }))
  }

  pub fn from_json(value: &Value, config: DocumentConfig) -> Result<Self> {
    let SerializedDocument { root } = SerializedDocument::deserialize(value)?;
    let mut doc = Self::new(config);
    doc.update(|tx| tx.import_root(&root))?;
    Ok(doc)
  }
}

fn log_abort(err: &DocumentError) {
  if err.is_fatal() {
    tracing::error!(%err, "transaction aborted");
  } else {
    tracing::warn!(%err, "transaction rolled back");
  }
}

/// Unregisters every node that is not reachable from the root. Returns the
/// number of nodes removed.
fn collect_garbage(state: &mut DocumentState) -> usize {
  let mut reachable = HashSet::with_capacity(state.len());
  let mut stack = vec![NodeKey::ROOT];
  while let Some(key) = stack.pop() {
    if reachable.insert(key) {
      stack.extend(state.children(key).map(Node::key));
    }
  }

  let unreachable: Vec<NodeKey> = state.keys().filter(|key| !reachable.contains(key)).collect();
  for &key in &unreachable {
    state.unregister(key);
  }
  unreachable.len()
}
