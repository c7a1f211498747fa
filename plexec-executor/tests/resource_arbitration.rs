//! Integration tests for resource arbitration.
//!
//! Commands contend for named resources; the ledger must return to zero
//! for renewable amounts once every command has finished. A refused
//! command never reaches the interface and ends on its own conditions.

mod common;

use common::{Harness, RecordingHandler, Reply, drive, drive_with, ready_app, test_app_config};
use plexec_core::error::PlexecError;
use plexec_core::node::{Expr, NodeSpec};
use plexec_core::resource::{ResourceHierarchy, ResourceRequest};
use plexec_core::types::{CommandHandle, FailureType, NodeState, Outcome};
use plexec_executor::{ApplicationState, ExecApplication};
use std::io::Write;

fn node_handle(h: &Harness, name: &str) -> Option<CommandHandle> {
    let id = h.exec.tree().find(name)?;
    h.exec.tree().node(id).ok()?.command_handle()
}

#[test]
fn denied_command_ends_through_its_own_conditions() {
    let mut h = Harness::new();
    let handler = RecordingHandler::new(Reply::Hold);
    h.manager
        .register_command_handler("drive", handler.clone())
        .unwrap();

    let plan = NodeSpec::list("Root", vec![drive_with("A", "arm"), drive_with("B", "arm")]);
    h.sink().add_plan(plan, None);
    h.settle();

    // B is refused, enters EXECUTING undispatched and ends on its handle.
    assert_eq!(handler.count(), 1);
    assert_eq!(node_handle(&h, "A"), Some(CommandHandle::SentToSystem));
    assert_eq!(node_handle(&h, "B"), Some(CommandHandle::Denied));
    assert_eq!(h.state("B"), Some(NodeState::Finished));
    assert_eq!(h.exec.arbiter().locked("arm"), 1.0);
    assert_eq!(h.exec.metrics().snapshot().commands_denied, 1);

    handler.complete_all(&h.sink());
    h.settle();
    assert!(h.exec.all_plans_finished());
    assert_eq!(handler.count(), 1);
    assert!(h.exec.arbiter().locked_resources().is_empty());
}

#[test]
fn exhausted_consumable_does_not_hang_the_plan() {
    let mut h = Harness::new();
    h.exec
        .set_resource_hierarchy(ResourceHierarchy::parse("fuel 1 1\n").unwrap())
        .unwrap();
    let handler = RecordingHandler::new(Reply::Immediate(CommandHandle::Success));
    h.manager
        .register_command_handler("drive", handler.clone())
        .unwrap();

    let burn = |name: &str| drive(name).with_resource(ResourceRequest::new("fuel").consumable());
    let plan = NodeSpec::list(
        "Root",
        vec![
            burn("A"),
            burn("B").start(Expr::node_state("A", NodeState::Finished)),
        ],
    );
    h.sink().add_plan(plan, None);
    h.settle();

    assert_eq!(handler.count(), 1);
    assert_eq!(h.state("A"), Some(NodeState::Finished));
    assert_eq!(h.state("B"), Some(NodeState::Finished));
    assert_eq!(node_handle(&h, "B"), Some(CommandHandle::Denied));
    assert!(h.exec.all_plans_finished());
    assert_eq!(h.exec.arbiter().locked("fuel"), 1.0);
}

#[test]
fn denied_command_classified_by_postcondition() {
    let mut h = Harness::new();
    let handler = RecordingHandler::new(Reply::Hold);
    h.manager
        .register_command_handler("drive", handler.clone())
        .unwrap();

    let plan = NodeSpec::list(
        "Root",
        vec![
            drive_with("A", "arm"),
            drive_with("B", "arm").post(Expr::CommandHandle(CommandHandle::Success)),
        ],
    );
    h.sink().add_plan(plan, None);
    h.settle();

    let id = h.exec.tree().find("B").unwrap();
    let node = h.exec.tree().node(id).unwrap();
    assert_eq!(node.state(), NodeState::Finished);
    assert_eq!(node.outcome(), Some(Outcome::Failure));
    assert_eq!(node.failure_type(), Some(FailureType::PostConditionFailed));
    assert!(handler.aborts.lock().is_empty());
}

#[test]
fn higher_priority_admitted_first() {
    let mut h = Harness::new();
    let handler = RecordingHandler::new(Reply::Hold);
    h.manager
        .register_command_handler("drive", handler.clone())
        .unwrap();

    let plan = NodeSpec::list(
        "Root",
        vec![
            drive("Low").with_resource(ResourceRequest::new("arm").with_priority(1)),
            drive("High").with_resource(ResourceRequest::new("arm").with_priority(9)),
        ],
    );
    h.sink().add_plan(plan, None);
    h.settle();

    assert_eq!(handler.count(), 1);
    assert_eq!(handler.commands.lock()[0].node_name, "High");
    assert_eq!(node_handle(&h, "Low"), Some(CommandHandle::Denied));
}

#[test]
fn unconstrained_commands_never_denied() {
    let mut h = Harness::new();
    let handler = RecordingHandler::new(Reply::Hold);
    h.manager
        .register_command_handler("drive", handler.clone())
        .unwrap();

    let plan = NodeSpec::list("Root", (0..5).map(|i| drive(&format!("C{i}"))).collect());
    h.sink().add_plan(plan, None);
    h.settle();
    assert_eq!(handler.count(), 5);
    assert_eq!(h.exec.metrics().snapshot().commands_denied, 0);
}

#[test]
fn consumable_amount_stays_locked() {
    let mut h = Harness::new();
    h.exec
        .set_resource_hierarchy(ResourceHierarchy::parse("fuel 1 1\n").unwrap())
        .unwrap();
    let handler = RecordingHandler::new(Reply::Immediate(CommandHandle::Success));
    h.manager
        .register_command_handler("drive", handler.clone())
        .unwrap();

    h.sink().add_plan(
        drive("Burn").with_resource(ResourceRequest::new("fuel").consumable()),
        None,
    );
    h.settle();
    assert_eq!(h.state("Burn"), Some(NodeState::Finished));
    assert_eq!(h.exec.arbiter().locked("fuel"), 1.0);
}

#[test]
fn resource_file_raises_capacity() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "% arm can serve two commands").unwrap();
    writeln!(file, "arm 2 2").unwrap();

    let app = ExecApplication::new(test_app_config().with_resource_file(file.path())).unwrap();
    let handler = RecordingHandler::new(Reply::Hold);
    app.manager()
        .register_command_handler("drive", handler.clone())
        .unwrap();
    app.initialize().unwrap();
    app.start_interfaces().unwrap();

    app.add_plan(
        NodeSpec::list("Root", vec![drive_with("A", "arm"), drive_with("B", "arm")]),
        None,
    );
    while app.step().unwrap() {}

    assert_eq!(handler.count(), 2);
    assert_eq!(app.with_exec(|e| e.arbiter().locked("arm")), 2.0);

    handler.complete_all(&app.sink());
    while app.step().unwrap() {}
    assert!(app.status().plans_finished);
    assert!(app.with_exec(|e| e.arbiter().locked_resources().is_empty()));
}

#[test]
fn malformed_resource_file_blocks_initialize() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "arm two").unwrap();

    let app = ExecApplication::new(test_app_config().with_resource_file(file.path())).unwrap();
    assert!(matches!(
        app.initialize(),
        Err(PlexecError::ResourceParse { line: 1, .. })
    ));
    assert_eq!(app.state(), ApplicationState::Uninited);
}

#[test]
fn ledger_balanced_after_many_contending_commands() {
    let app = ready_app();
    let handler = RecordingHandler::new(Reply::Immediate(CommandHandle::Success));
    app.manager()
        .register_command_handler("drive", handler.clone())
        .unwrap();

    let children = (0..6)
        .map(|i| drive_with(&format!("C{i}"), if i % 2 == 0 { "arm" } else { "mast" }))
        .collect();
    app.add_plan(NodeSpec::list("Root", children), None);
    for _ in 0..50 {
        if !app.step().unwrap() && app.manager().queue().is_empty() {
            break;
        }
    }

    // One command per resource runs, the others are denied in the same pass.
    assert!(app.status().plans_finished);
    assert_eq!(handler.count(), 2);
    assert_eq!(app.metrics().commands_denied, 4);
    assert!(app.with_exec(|e| e.arbiter().locked_resources().is_empty()));
}
