// tests/readiness_gate.rs

use proptest::prelude::*;
use serde_json::json;

use bundlewatch::engine::{Delivery, GateState, ReadinessGate};

#[derive(Debug, Clone)]
enum Step {
    Attach(u64),
    Start,
    Succeed(u32),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1..4u64).prop_map(Step::Attach),
        Just(Step::Start),
        any::<u32>().prop_map(Step::Succeed),
    ]
}

/// Two plain flags plus the latest viewer and payload: what the gate must
/// behave like.
#[derive(Default)]
struct Model {
    viewer: Option<u64>,
    compiled: bool,
    payload: Option<u32>,
}

impl Model {
    fn apply(&mut self, step: &Step) -> Option<(u64, u32)> {
        match *step {
            Step::Attach(v) => self.viewer = Some(v),
            Step::Start => {
                self.compiled = false;
                return None;
            }
            Step::Succeed(p) => {
                self.compiled = true;
                self.payload = Some(p);
            }
        }
        match (self.viewer, self.compiled, self.payload) {
            (Some(v), true, Some(p)) => Some((v, p)),
            _ => None,
        }
    }
}

fn apply(gate: &mut ReadinessGate, step: &Step) -> Option<Delivery> {
    match *step {
        Step::Attach(v) => gate.on_viewer_attached(v),
        Step::Start => {
            gate.on_compile_started();
            None
        }
        Step::Succeed(p) => gate.on_compile_succeeded(json!(p)),
    }
}

proptest! {
    #[test]
    fn gate_delivers_exactly_when_viewer_and_content_are_ready(
        steps in proptest::collection::vec(step_strategy(), 0..40)
    ) {
        let mut gate = ReadinessGate::new();
        let mut model = Model::default();

        for step in &steps {
            let actual = apply(&mut gate, step)
                .map(|d| (d.viewer, d.payload));
            let expected = model.apply(step)
                .map(|(v, p)| (v, json!(p)));
            prop_assert_eq!(actual, expected, "after {:?}", step);

            let ready = model.viewer.is_some() && model.compiled;
            prop_assert_eq!(gate.state() == GateState::Ready, ready);
        }
    }
}

#[test]
fn second_attach_in_ready_redelivers_once() {
    let mut gate = ReadinessGate::new();
    assert_eq!(gate.on_viewer_attached(1), None);
    gate.on_compile_started();

    let first = gate.on_compile_succeeded(json!("A")).expect("first delivery");
    assert_eq!(first.payload, json!("A"));

    let again = gate.on_viewer_attached(1).expect("re-delivery on attach");
    assert_eq!(again, Delivery { viewer: 1, payload: json!("A") });
    assert_eq!(gate.state(), GateState::Ready);
}

#[test]
fn recompile_rearms_and_delivers_only_the_new_payload() {
    let mut gate = ReadinessGate::new();
    gate.on_viewer_attached(1);
    gate.on_compile_started();
    assert_eq!(gate.on_compile_succeeded(json!("A")).map(|d| d.payload), Some(json!("A")));

    gate.on_compile_started();
    assert_eq!(gate.state(), GateState::ViewerOnly);
    // Nothing is delivered while the new compile runs, even on re-attach.
    assert_eq!(gate.on_viewer_attached(1), None);

    let d = gate.on_compile_succeeded(json!("B")).expect("delivery of B");
    assert_eq!(d.payload, json!("B"));
}

#[test]
fn failed_compile_never_delivers_the_previous_payload() {
    let mut gate = ReadinessGate::new();
    gate.on_compile_started();
    gate.on_compile_succeeded(json!("A"));
    // Compile starts and fails: no success follows.
    gate.on_compile_started();
    assert_eq!(gate.on_viewer_attached(2), None);
    assert_eq!(gate.state(), GateState::ViewerOnly);
}

#[test]
fn latest_viewer_receives_the_push() {
    let mut gate = ReadinessGate::new();
    gate.on_viewer_attached(1);
    gate.on_viewer_attached(2);
    gate.on_compile_started();
    let d = gate.on_compile_succeeded(json!({})).unwrap();
    assert_eq!(d.viewer, 2);
    assert_eq!(gate.viewer(), Some(2));
}
