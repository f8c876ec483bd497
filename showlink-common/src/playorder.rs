//! Play order and play flow
//!
//! A `PlayOrder` maps play-sequence positions onto media attributes,
//! built from a base media list plus a default traversal order. Each
//! traversal happens through a `PlayFlow`, which owns a private copy of
//! the position map so redirecting one node's flow never affects
//! another consumer of the same order.
//!
//! A flow supports one pending branch redirection: `set_next_flow`
//! rewrites the item at the position *after* the one currently being
//! served. The in-flight position can never be redirected, so triggers
//! already computed for the current item stay valid.

use crate::media::MediaAttribute;
use crate::{Error, Result};
use std::collections::HashMap;

/// Ordered, validated sequence of media items
#[derive(Debug, Clone)]
pub struct PlayOrder {
    /// Media list keyed by stable item index
    base: HashMap<u32, MediaAttribute>,
    /// Default traversal: position -> item index
    order: Vec<u32>,
}

impl PlayOrder {
    /// Build a play order from a base media list and a default order.
    ///
    /// Fails if the order is empty or references an index missing from
    /// the base list. Attributes are cloned in, so later mutation of
    /// the caller's list cannot reach flows created from this order.
    pub fn new(base: &[MediaAttribute], default_order: &[u32]) -> Result<Self> {
        if default_order.is_empty() {
            return Err(Error::PlayOrder("default order is empty".to_string()));
        }
        let map: HashMap<u32, MediaAttribute> =
            base.iter().map(|a| (a.index, a.clone())).collect();
        for index in default_order {
            if !map.contains_key(index) {
                return Err(Error::PlayOrder(format!(
                    "order references unknown media index {}",
                    index
                )));
            }
        }
        Ok(Self {
            base: map,
            order: default_order.to_vec(),
        })
    }

    /// Number of positions in the default order
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Look up a media attribute by its stable index
    pub fn attribute(&self, index: u32) -> Option<&MediaAttribute> {
        self.base.get(&index)
    }

    /// Whether an index identifies a known media item
    pub fn contains(&self, index: u32) -> bool {
        self.base.contains_key(&index)
    }

    /// Create a traversal with its own position cursor and a private
    /// copy of the order map
    pub fn create_play_flow(&self) -> PlayFlow {
        let items = self
            .order
            .iter()
            .map(|index| self.base[index].clone())
            .collect();
        PlayFlow {
            base: self.base.clone(),
            items,
            state: FlowState::NotStarted,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowState {
    NotStarted,
    Serving(usize),
    Exhausted,
}

/// One traversal over a `PlayOrder`
///
/// `has_next` advances the position as a side effect, even when it
/// returns false; `next` serves the item at the advanced position.
/// Callers must not call `has_next` more than once before calling
/// `next`. Shared flows are serialized behind a single mutex by their
/// owner.
#[derive(Debug, Clone)]
pub struct PlayFlow {
    base: HashMap<u32, MediaAttribute>,
    /// Private copy: position -> attribute
    items: Vec<MediaAttribute>,
    state: FlowState,
}

impl PlayFlow {
    /// Advance to the next position, reporting whether an item exists
    /// there. The position moves even when this returns false.
    pub fn has_next(&mut self) -> bool {
        let next = match self.state {
            FlowState::NotStarted => 0,
            FlowState::Serving(pos) => pos + 1,
            FlowState::Exhausted => return false,
        };
        if next < self.items.len() {
            self.state = FlowState::Serving(next);
            true
        } else {
            self.state = FlowState::Exhausted;
            false
        }
    }

    /// Item at the position `has_next` advanced to
    pub fn next(&self) -> Option<&MediaAttribute> {
        match self.state {
            FlowState::Serving(pos) => self.items.get(pos),
            _ => None,
        }
    }

    /// Whether the traversal has advanced at least once
    pub fn started(&self) -> bool {
        self.state != FlowState::NotStarted
    }

    /// Position currently being served, if any
    pub fn current_position(&self) -> Option<usize> {
        match self.state {
            FlowState::Serving(pos) => Some(pos),
            _ => None,
        }
    }

    /// Redirect the *next* position to the item identified by `index`.
    ///
    /// The position currently being served is never altered. An unknown
    /// index, or a flow with no next position, leaves the flow
    /// unchanged; a malformed remote command must not crash the render
    /// loop, so there is no error here.
    pub fn set_next_flow(&mut self, index: u32) {
        let target = match self.state {
            FlowState::NotStarted => 0,
            FlowState::Serving(pos) => pos + 1,
            FlowState::Exhausted => return,
        };
        if target >= self.items.len() {
            return;
        }
        if let Some(attribute) = self.base.get(&index) {
            self.items[target] = attribute.clone();
        }
    }
}
