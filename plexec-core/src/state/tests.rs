//! Life-cycle tests driven by a minimal pass loop.

use super::*;
use crate::error::PlexecError;
use crate::node::{Expr, ExprContext, NodeSpec, PlanTree};
use crate::types::{ActionId, CommandHandle, FailureType, NodeId, NodeState, Outcome};
use crate::value::Value;
use std::collections::HashMap;

#[derive(Default)]
struct Env {
    lookups: HashMap<String, Value>,
}

impl Env {
    fn set(&mut self, name: &str, value: bool) {
        self.lookups.insert(name.to_string(), Value::bool(value));
    }
}

impl ExprContext for Env {
    fn lookup(&self, state: &str) -> Value {
        self.lookups.get(state).cloned().unwrap_or_default()
    }

    fn variable(&self, _name: &str) -> Value {
        Value::unknown()
    }
}

struct Harness {
    tree: PlanTree,
    registry: StateTableRegistry,
    env: Env,
    effects: Effects,
}

impl Harness {
    fn new(plan: NodeSpec) -> Self {
        let mut harness = Self {
            tree: PlanTree::new(),
            registry: StateTableRegistry::standard().unwrap(),
            env: Env::default(),
            effects: Effects::default(),
        };
        let ids = harness.tree.insert_plan(&plan, None).unwrap();
        for id in ids {
            harness
                .registry
                .initialize(&mut harness.tree, &harness.env, &mut harness.effects, id)
                .unwrap();
            harness.registry.verify_activation(&harness.tree, id).unwrap();
        }
        harness
    }

    /// Run passes until nothing is eligible. Returns the pass count.
    fn settle(&mut self) -> usize {
        for pass in 0..200 {
            let mut eligible = Vec::new();
            for id in self.tree.dfs_order() {
                let dest = self
                    .registry
                    .dest_state(&self.tree, &self.env, id)
                    .unwrap();
                let current = self.tree.node(id).unwrap().state();
                if dest != NodeState::NoState && dest != current {
                    eligible.push((id, dest));
                }
            }
            if eligible.is_empty() {
                return pass;
            }
            for (id, dest) in eligible {
                self.registry
                    .transition(&mut self.tree, &self.env, &mut self.effects, id, dest)
                    .unwrap();
                self.registry.verify_activation(&self.tree, id).unwrap();
            }
        }
        panic!("no quiescence");
    }

    fn id(&self, name: &str) -> NodeId {
        self.tree.find(name).unwrap()
    }

    fn state(&self, name: &str) -> NodeState {
        self.tree.node(self.id(name)).unwrap().state()
    }

    fn outcome(&self, name: &str) -> (Option<Outcome>, Option<FailureType>) {
        let node = self.tree.node(self.id(name)).unwrap();
        (node.outcome(), node.failure_type())
    }
}

#[test]
fn standard_registry_covers_every_type() {
    let registry = StateTableRegistry::standard().unwrap();
    assert_eq!(
        registry.table(crate::node::NodeType::LibraryNodeCall).unwrap().name(),
        "library_call"
    );
    assert!(matches!(
        StateTableRegistry::new().validate(),
        Err(PlexecError::MissingStateTable { .. })
    ));
}

#[test]
fn specializing_an_unhandled_state_is_rejected() {
    let executing = *default_table().get(NodeState::Executing).unwrap();
    assert!(matches!(
        base_table()
            .specialize("broken")
            .override_state(NodeState::Executing, executing),
        Err(PlexecError::InvalidSpecialization { .. })
    ));
}

#[test]
fn incomplete_table_fails_validation() {
    let mut registry = StateTableRegistry::standard().unwrap();
    registry.register(
        crate::node::NodeType::Command,
        std::sync::Arc::new(default_table()),
    );
    assert!(matches!(
        registry.validate(),
        Err(PlexecError::MissingStateHandler {
            state: NodeState::Failing,
            ..
        })
    ));
}

#[test]
fn empty_root_succeeds() {
    let mut h = Harness::new(NodeSpec::empty("Root"));
    h.settle();
    assert_eq!(h.state("Root"), NodeState::Finished);
    assert_eq!(h.outcome("Root"), (Some(Outcome::Success), None));
}

#[test]
fn failed_precondition_ends_iteration() {
    let mut h = Harness::new(NodeSpec::empty("Root").pre(Expr::falsity()));
    h.settle();
    assert_eq!(h.state("Root"), NodeState::Finished);
    assert_eq!(
        h.outcome("Root"),
        (Some(Outcome::Failure), Some(FailureType::PreConditionFailed))
    );
}

#[test]
fn skipped_node() {
    let mut h = Harness::new(NodeSpec::empty("Root").skip(Expr::truth()));
    h.settle();
    assert_eq!(h.outcome("Root"), (Some(Outcome::Skipped), None));
}

#[test]
fn waiting_node_holds_until_start() {
    let mut h = Harness::new(NodeSpec::empty("Root").start(Expr::lookup("go")));
    h.settle();
    assert_eq!(h.state("Root"), NodeState::Waiting);
    h.env.set("go", true);
    h.settle();
    assert_eq!(h.state("Root"), NodeState::Finished);
}

#[test]
fn list_waits_for_children() {
    let plan = NodeSpec::list(
        "Root",
        vec![
            NodeSpec::empty("A"),
            NodeSpec::empty("B").start(Expr::lookup("b")),
        ],
    );
    let mut h = Harness::new(plan);
    h.settle();
    assert_eq!(h.state("A"), NodeState::Finished);
    assert_eq!(h.state("B"), NodeState::Waiting);
    assert_eq!(h.state("Root"), NodeState::Executing);

    h.env.set("b", true);
    h.settle();
    assert_eq!(h.state("Root"), NodeState::Finished);
    assert_eq!(h.outcome("Root"), (Some(Outcome::Success), None));
}

#[test]
fn list_invariant_failure_stops_children() {
    let plan = NodeSpec::list(
        "Root",
        vec![NodeSpec::empty("Child").end(Expr::lookup("done"))],
    )
    .invariant(Expr::lookup("ok").not().not());
    let mut h = Harness::new(plan);
    h.env.set("ok", true);
    h.settle();
    assert_eq!(h.state("Child"), NodeState::Executing);

    h.env.set("ok", false);
    h.settle();
    assert_eq!(h.state("Root"), NodeState::Finished);
    assert_eq!(
        h.outcome("Root"),
        (
            Some(Outcome::Failure),
            Some(FailureType::InvariantConditionFailed)
        )
    );
    assert_eq!(
        h.outcome("Child"),
        (Some(Outcome::Failure), Some(FailureType::ParentFailed))
    );
}

#[test]
fn command_success_releases_resources() {
    let mut h = Harness::new(NodeSpec::command("Drive", "drive"));
    h.settle();
    assert_eq!(h.state("Drive"), NodeState::Executing);
    assert_eq!(h.effects.commands.len(), 1);
    let action = h.effects.commands[0].action;
    assert_eq!(action, ActionId::new(h.id("Drive"), 1));

    assert!(h.tree.apply_command_ack(action, CommandHandle::Success));
    h.settle();
    assert_eq!(h.state("Drive"), NodeState::Finished);
    assert_eq!(h.outcome("Drive"), (Some(Outcome::Success), None));
    assert_eq!(h.effects.releases, vec![h.id("Drive")]);
}

#[test]
fn command_invariant_failure_aborts() {
    let plan = NodeSpec::command("Drive", "drive")
        .invariant(Expr::lookup("safe"))
        .end(Expr::CommandHandle(CommandHandle::Success));
    let mut h = Harness::new(plan);
    h.env.set("safe", true);
    h.settle();
    let action = h.effects.commands[0].action;
    assert!(h.tree.apply_command_ack(action, CommandHandle::Accepted));
    h.settle();

    h.env.set("safe", false);
    h.settle();
    assert_eq!(h.state("Drive"), NodeState::Failing);
    assert_eq!(h.effects.aborts.len(), 1);
    assert!(h.effects.releases.is_empty());

    assert!(h.tree.apply_abort_ack(action, true));
    h.settle();
    assert_eq!(h.state("Drive"), NodeState::Finished);
    assert_eq!(
        h.outcome("Drive"),
        (
            Some(Outcome::Failure),
            Some(FailureType::InvariantConditionFailed)
        )
    );
    assert_eq!(h.effects.releases, vec![h.id("Drive")]);
}

#[test]
fn denied_command_ends_without_abort() {
    let plan = NodeSpec::command("Drive", "drive");
    let mut h = Harness::new(plan);
    h.settle();
    let id = h.id("Drive");
    h.tree.set_command_handle(id, CommandHandle::Denied).unwrap();
    h.settle();
    assert_eq!(h.state("Drive"), NodeState::Finished);
    assert!(h.effects.aborts.is_empty());
}

#[test]
fn update_waits_for_ack() {
    let plan = NodeSpec::update("Report", vec![("x".to_string(), Value::int(1))]);
    let mut h = Harness::new(plan);
    h.settle();
    assert_eq!(h.state("Report"), NodeState::Executing);
    let action = h.effects.updates[0].action;
    assert!(h.tree.apply_update_ack(action, true));
    h.settle();
    assert_eq!(h.outcome("Report"), (Some(Outcome::Success), None));
}

#[test]
fn assignment_needs_ack() {
    let mut h = Harness::new(NodeSpec::assignment("Set", "x", Value::int(3)));
    h.settle();
    assert_eq!(h.state("Set"), NodeState::Executing);
    assert_eq!(h.effects.assignments.len(), 1);
    assert!(h.tree.ack_assignment(h.id("Set")).unwrap());
    h.settle();
    assert_eq!(h.outcome("Set"), (Some(Outcome::Success), None));
}

#[test]
fn library_call_checks_invariant_while_finishing() {
    let plan = NodeSpec::library_call("Call", "Lib").invariant(Expr::lookup("ok"));
    let mut h = Harness {
        tree: PlanTree::new(),
        registry: StateTableRegistry::standard().unwrap(),
        env: Env::default(),
        effects: Effects::default(),
    };
    h.tree
        .add_library(NodeSpec::empty("Lib").end(Expr::lookup("lib_done")))
        .unwrap();
    let ids = h.tree.insert_plan(&plan, None).unwrap();
    for id in ids {
        h.registry
            .initialize(&mut h.tree, &h.env, &mut h.effects, id)
            .unwrap();
    }
    h.env.set("ok", true);
    h.settle();
    assert_eq!(h.state("Call"), NodeState::Executing);
    assert_eq!(h.state("Lib"), NodeState::Executing);

    h.env.set("lib_done", true);
    h.settle();
    assert_eq!(h.state("Call"), NodeState::Finished);
    assert_eq!(h.outcome("Call"), (Some(Outcome::Success), None));
}

#[test]
fn list_finishing_keeps_outcome_when_invariant_flips_mid_pass() {
    // X finishes earlier in the pass that moves L to FINISHING, which
    // falsifies L's invariant before L's own transition runs.
    let plan = NodeSpec::list(
        "Root",
        vec![
            NodeSpec::empty("X"),
            NodeSpec::list("L", vec![NodeSpec::empty("C")])
                .start(Expr::node_state("X", NodeState::Executing))
                .end(Expr::truth())
                .invariant(Expr::node_state("X", NodeState::Finished).not()),
        ],
    );
    let mut h = Harness::new(plan);
    h.settle();

    assert_eq!(h.state("Root"), NodeState::Finished);
    assert_eq!(h.state("L"), NodeState::Finished);
    assert_eq!(h.outcome("L"), (Some(Outcome::Success), None));
    assert_eq!(h.outcome("Root"), (Some(Outcome::Success), None));
}

#[test]
fn failing_destination_records_failure_after_invariant_recovers() {
    // L's invariant is false when its destination is computed and true
    // again by the time L transitions.
    let plan = NodeSpec::list(
        "Root",
        vec![
            NodeSpec::empty("X").start(Expr::lookup("go")),
            NodeSpec::list("L", vec![NodeSpec::empty("C").start(Expr::lookup("never"))])
                .invariant(Expr::node_state("X", NodeState::Executing).not()),
        ],
    );
    let mut h = Harness::new(plan);
    h.settle();
    assert_eq!(h.state("L"), NodeState::Executing);
    assert_eq!(h.state("X"), NodeState::Waiting);

    h.env.set("go", true);
    h.settle();
    assert_eq!(h.state("L"), NodeState::Finished);
    assert_eq!(
        h.outcome("L"),
        (
            Some(Outcome::Failure),
            Some(FailureType::InvariantConditionFailed)
        )
    );
}

#[test]
fn false_postcondition_fails_command_without_abort() {
    let plan = NodeSpec::command("Drive", "drive").post(Expr::lookup("ok"));
    let mut h = Harness::new(plan);
    h.env.set("ok", false);
    h.settle();
    let action = h.effects.commands[0].action;

    assert!(h.tree.apply_command_ack(action, CommandHandle::Success));
    h.settle();
    assert_eq!(h.state("Drive"), NodeState::Finished);
    assert_eq!(
        h.outcome("Drive"),
        (Some(Outcome::Failure), Some(FailureType::PostConditionFailed))
    );
    assert!(h.effects.aborts.is_empty());
    assert_eq!(h.effects.releases, vec![h.id("Drive")]);
}

#[test]
fn list_passes_through_finishing_to_success() {
    let plan = NodeSpec::list(
        "Root",
        vec![NodeSpec::empty("A"), NodeSpec::empty("B").start(Expr::lookup("b"))],
    );
    let mut h = Harness::new(plan);
    h.settle();
    assert_eq!(h.state("Root"), NodeState::Executing);

    h.env.set("b", true);
    let mut seen = Vec::new();
    for _ in 0..10 {
        seen.push(h.state("Root"));
        if h.state("Root") == NodeState::Finished {
            break;
        }
        // One pass at a time to observe the intermediate states.
        let eligible: Vec<_> = h
            .tree
            .dfs_order()
            .into_iter()
            .filter_map(|id| {
                let dest = h.registry.dest_state(&h.tree, &h.env, id).unwrap();
                let current = h.tree.node(id).unwrap().state();
                (dest != NodeState::NoState && dest != current).then_some((id, dest))
            })
            .collect();
        for (id, dest) in eligible {
            h.registry
                .transition(&mut h.tree, &h.env, &mut h.effects, id, dest)
                .unwrap();
        }
    }
    assert!(seen.contains(&NodeState::Finishing));
    assert_eq!(h.outcome("Root"), (Some(Outcome::Success), None));
}

#[test]
fn denied_command_enters_executing_undispatched() {
    let mut h = Harness::new(NodeSpec::command("Drive", "drive").start(Expr::lookup("go")));
    h.settle();
    let id = h.id("Drive");
    h.tree.set_command_denied(id, true).unwrap();
    h.env.set("go", true);
    h.settle();

    assert!(h.effects.commands.is_empty());
    assert_eq!(h.state("Drive"), NodeState::Finished);
    let node = h.tree.node(id).unwrap();
    assert_eq!(node.command_handle(), Some(CommandHandle::Denied));
    assert_eq!(node.outcome(), Some(Outcome::Success));
}
