//! Rendering contract for decorator nodes.
//!
//! The engine stores a decorator's payload but never interprets it. Hosts
//! implement [`DecoratorRenderer`] for whatever output type their view layer
//! needs and collect the results with [`Document::decorate`].

use std::collections::HashMap;

use crate::{
  document::Document,
  key::NodeKey,
  node::DecoratorData,
};

pub trait DecoratorRenderer<T> {
  fn render(&self, key: NodeKey, decorator: &DecoratorData) -> T;
}

impl<T, F> DecoratorRenderer<T> for F
where
  F: Fn(NodeKey, &DecoratorData) -> T,
{
  fn render(&self, key: NodeKey, decorator: &DecoratorData) -> T {
    self(key, decorator)
  }
}

impl Document {
  /// Renders every decorator attached to the committed tree.
  pub fn decorate<T>(&self, renderer: &impl DecoratorRenderer<T>) -> HashMap<NodeKey, T> {
    let state = self.current();
    let mut out = HashMap::new();
    let mut stack = vec![NodeKey::ROOT];
    while let Some(key) = stack.pop() {
      let Some(node) = state.get(key) else {
        continue;
      };
      if let Some(decorator) = node.decorator() {
        out.insert(key, renderer.render(key, decorator));
      }
      stack.extend(state.children(key).map(|child| child.key()));
    }
    out
  }
}
