// src/engine/gate.rs

//! Readiness gate between "a viewer is attached" and "content is compiled".
//!
//! Content is delivered only once both hold, and compile attempts re-arm the
//! content half. The gate is a plain synchronous state machine: it returns a
//! [`Delivery`] instead of performing it, and the runtime feeds it from a
//! single event loop, so every transition and its push are atomic and in
//! arrival order.
//!
//! | event            | Idle        | ViewerOnly     | ContentOnly    | Ready          |
//! |------------------|-------------|----------------|----------------|----------------|
//! | viewer attaches  | ViewerOnly  | ViewerOnly     | Ready + push   | Ready + push   |
//! | compile starts   | Idle        | ViewerOnly     | Idle           | ViewerOnly     |
//! | compile succeeds | ContentOnly | Ready + push   | ContentOnly    | Ready + push   |

use tracing::debug;

use crate::types::{ComponentArgs, ViewerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    ViewerOnly,
    ContentOnly,
    Ready,
}

/// Push of the current payload to one viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub viewer: ViewerId,
    pub payload: ComponentArgs,
}

#[derive(Debug)]
pub struct ReadinessGate {
    state: GateState,
    viewer: Option<ViewerId>,
    payload: Option<ComponentArgs>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Idle,
            viewer: None,
            payload: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Most recently attached viewer.
    pub fn viewer(&self) -> Option<ViewerId> {
        self.viewer
    }

    /// A viewer attached (or re-attached). The latest viewer becomes the
    /// delivery address; if content is ready it gets the latest payload.
    pub fn on_viewer_attached(&mut self, viewer: ViewerId) -> Option<Delivery> {
        self.viewer = Some(viewer);
        let next = match self.state {
            GateState::Idle | GateState::ViewerOnly => GateState::ViewerOnly,
            GateState::ContentOnly | GateState::Ready => GateState::Ready,
        };
        self.transition(next, "viewer attached")
    }

    /// A compile attempt started: the content half is cleared.
    pub fn on_compile_started(&mut self) {
        let next = match self.state {
            GateState::Idle | GateState::ContentOnly => GateState::Idle,
            GateState::ViewerOnly | GateState::Ready => GateState::ViewerOnly,
        };
        // Never delivers: the target state is never Ready.
        let _ = self.transition(next, "compile started");
    }

    /// The current compile attempt succeeded with `payload`.
    pub fn on_compile_succeeded(&mut self, payload: ComponentArgs) -> Option<Delivery> {
        self.payload = Some(payload);
        let next = match self.state {
            GateState::Idle | GateState::ContentOnly => GateState::ContentOnly,
            GateState::ViewerOnly | GateState::Ready => GateState::Ready,
        };
        self.transition(next, "compile succeeded")
    }

    fn transition(&mut self, next: GateState, cause: &'static str) -> Option<Delivery> {
        debug!(from = ?self.state, to = ?next, cause, "readiness gate transition");
        self.state = next;

        if next != GateState::Ready {
            return None;
        }
        Some(Delivery {
            viewer: self.viewer?,
            payload: self.payload.clone()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delivers_once_both_halves_are_ready() {
        let mut gate = ReadinessGate::new();
        assert_eq!(gate.on_viewer_attached(1), None);
        assert_eq!(gate.state(), GateState::ViewerOnly);

        gate.on_compile_started();
        let d = gate.on_compile_succeeded(json!({"doc": "A"})).unwrap();
        assert_eq!(d.viewer, 1);
        assert_eq!(d.payload, json!({"doc": "A"}));
        assert_eq!(gate.state(), GateState::Ready);
    }

    #[test]
    fn content_first_then_viewer() {
        let mut gate = ReadinessGate::new();
        gate.on_compile_started();
        assert_eq!(gate.on_compile_succeeded(json!(1)), None);
        assert_eq!(gate.state(), GateState::ContentOnly);

        let d = gate.on_viewer_attached(7).unwrap();
        assert_eq!((d.viewer, d.payload), (7, json!(1)));
    }

    #[test]
    fn compile_start_clears_content_but_keeps_viewer() {
        let mut gate = ReadinessGate::new();
        gate.on_viewer_attached(1);
        gate.on_compile_succeeded(json!("A"));
        gate.on_compile_started();
        assert_eq!(gate.state(), GateState::ViewerOnly);

        let mut gate = ReadinessGate::new();
        gate.on_compile_succeeded(json!("A"));
        gate.on_compile_started();
        assert_eq!(gate.state(), GateState::Idle);
        assert_eq!(gate.on_viewer_attached(1), None);
    }

    #[test]
    fn newer_content_replaces_pending_payload() {
        let mut gate = ReadinessGate::new();
        gate.on_compile_succeeded(json!("A"));
        gate.on_compile_succeeded(json!("B"));
        let d = gate.on_viewer_attached(2).unwrap();
        assert_eq!(d.payload, json!("B"));
    }
}
