//! Arena of plan nodes.
//!
//! Nodes live in one `Vec` and refer to each other by [`NodeId`]. Nodes
//! are never removed, so IDs stay valid for the lifetime of the tree.

use super::body::{AssignmentBody, CommandBody, NodeBody, NodeType, UpdateBody};
use super::condition::ConditionKind;
use super::expr::{Expr, ExprContext, and3, or3};
use super::node::Node;
use super::spec::{BodySpec, NodeSpec};
use crate::error::{PlexecError, Result};
use crate::types::{ActionId, CommandHandle, NodeId, NodeState};
use crate::value::Value;
use std::collections::HashMap;

/// The plan tree: every node of every plan added to an executive.
#[derive(Debug, Default, Clone)]
pub struct PlanTree {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    names: HashMap<String, NodeId>,
    libraries: HashMap<String, NodeSpec>,
}

impl PlanTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Root nodes in insertion order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Get a node.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a node, failing on an unknown ID.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.index()).ok_or(PlexecError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.index())
            .ok_or(PlexecError::UnknownNode(id))
    }

    /// Look up a node by name. The first node inserted under a name wins.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Iterate all nodes in arena order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Every node, depth-first pre-order, roots in insertion order.
    ///
    /// This is the scan order of a scheduler pass.
    pub fn dfs_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(node) = self.get(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    // ------------------------------------------------------------------
    // Libraries and plan insertion
    // ------------------------------------------------------------------

    /// Register a library. A library with the same name is replaced.
    ///
    /// Returns true if a previous definition was replaced.
    pub fn add_library(&mut self, library: NodeSpec) -> Result<bool> {
        library.validate()?;
        let replaced = self.libraries.insert(library.name.clone(), library).is_some();
        Ok(replaced)
    }

    /// Check if a library is registered.
    pub fn has_library(&self, name: &str) -> bool {
        self.libraries.contains_key(name)
    }

    /// Library names called by a plan that are not registered.
    pub fn missing_libraries(&self, plan: &NodeSpec) -> Vec<String> {
        let mut missing: Vec<String> = plan
            .library_calls()
            .into_iter()
            .filter(|name| !self.has_library(name))
            .map(str::to_string)
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Insert a plan, either as a new root or grafted under a named list.
    ///
    /// Returns the IDs of the new nodes in pre-order; the first is the
    /// plan's top node. Nothing is inserted if the plan is rejected. New
    /// nodes start INACTIVE with no active conditions.
    pub fn insert_plan(&mut self, plan: &NodeSpec, parent: Option<&str>) -> Result<Vec<NodeId>> {
        plan.validate()?;
        let parent_id = match parent {
            Some(name) => {
                let id = self.find(name).ok_or_else(|| PlexecError::GraftTarget {
                    parent: name.to_string(),
                    cause: "no node with that name".to_string(),
                })?;
                let node_type = self.node(id)?.node_type();
                if node_type != NodeType::List {
                    return Err(PlexecError::GraftTarget {
                        parent: name.to_string(),
                        cause: format!("node is a {} node, not a List", node_type),
                    });
                }
                Some(id)
            }
            None => None,
        };
        self.check_expansion(plan, &mut Vec::new())?;

        let mut created = Vec::new();
        let top = self.build(plan, parent_id, &mut created)?;
        match parent_id {
            Some(p) => self.node_mut(p)?.children.push(top),
            None => self.roots.push(top),
        }
        Ok(created)
    }

    /// Verify every library call resolves and no library expands itself.
    fn check_expansion<'a>(&'a self, spec: &'a NodeSpec, stack: &mut Vec<&'a str>) -> Result<()> {
        if let BodySpec::LibraryNodeCall { library } = &spec.body {
            if stack.contains(&library.as_str()) {
                return Err(PlexecError::LibraryRecursion {
                    library: library.clone(),
                });
            }
            let body = self
                .libraries
                .get(library)
                .ok_or_else(|| PlexecError::LibraryNotFound {
                    library: library.clone(),
                    node: spec.name.clone(),
                })?;
            stack.push(library.as_str());
            self.check_expansion(body, stack)?;
            stack.pop();
        }
        spec.children
            .iter()
            .try_for_each(|child| self.check_expansion(child, stack))
    }

    fn build(
        &mut self,
        spec: &NodeSpec,
        parent: Option<NodeId>,
        created: &mut Vec<NodeId>,
    ) -> Result<NodeId> {
        let id = NodeId::new(self.nodes.len() as u32);
        let mut node = Node::new(id, spec.name.clone(), parent, body_from_spec(&spec.body));
        for (kind, expr) in &spec.conditions {
            node.user[kind.index()] = Some(expr.clone());
        }
        self.nodes.push(node);
        self.names.entry(spec.name.clone()).or_insert(id);
        created.push(id);

        let mut children = Vec::with_capacity(spec.children.len());
        for child in &spec.children {
            children.push(self.build(child, Some(id), created)?);
        }
        if let BodySpec::LibraryNodeCall { library } = &spec.body {
            let body = self
                .libraries
                .get(library)
                .cloned()
                .ok_or_else(|| PlexecError::LibraryNotFound {
                    library: library.clone(),
                    node: spec.name.clone(),
                })?;
            children.push(self.build(&body, Some(id), created)?);
        }
        self.node_mut(id)?.children = children;
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Conditions
    // ------------------------------------------------------------------

    /// Read an active condition.
    pub fn condition(
        &self,
        id: NodeId,
        kind: ConditionKind,
        env: &dyn ExprContext,
    ) -> Result<Option<bool>> {
        if !self.node(id)?.is_active(kind) {
            return Err(PlexecError::ConditionInactive {
                node: id,
                condition: kind,
            });
        }
        self.raw_condition(id, kind, env)
    }

    /// Evaluate a condition regardless of its activation.
    ///
    /// Derived conditions read the parent's values through this path, since
    /// the parent's activation is not the child's concern.
    pub fn raw_condition(
        &self,
        id: NodeId,
        kind: ConditionKind,
        env: &dyn ExprContext,
    ) -> Result<Option<bool>> {
        use ConditionKind::*;
        let node = self.node(id)?;
        let value = match kind {
            StartCondition | PreCondition | PostCondition | InvariantCondition => {
                self.user_or(node, kind, env, Some(true))
            }
            SkipCondition | RepeatCondition => self.user_or(node, kind, env, Some(false)),
            EndCondition => self.end_condition(node, env),
            AncestorInvariantCondition => match node.parent {
                None => Some(true),
                Some(p) => and3([
                    self.raw_condition(p, AncestorInvariantCondition, env)?,
                    self.raw_condition(p, InvariantCondition, env)?,
                ]),
            },
            AncestorEndCondition => match node.parent {
                None => Some(false),
                Some(p) => or3([
                    self.raw_condition(p, AncestorEndCondition, env)?,
                    self.raw_condition(p, EndCondition, env)?,
                ]),
            },
            ParentExecutingCondition => self.parent_in(node, NodeState::Executing, true)?,
            ParentWaitingCondition => self.parent_in(node, NodeState::Waiting, false)?,
            ParentFinishedCondition => self.parent_in(node, NodeState::Finished, false)?,
            ChildrenWaitingOrFinishedCondition => {
                if node.node_type().has_children() {
                    Some(node.children.iter().all(|c| {
                        self.get(*c).is_some_and(|child| {
                            matches!(child.state, NodeState::Waiting | NodeState::Finished)
                        })
                    }))
                } else {
                    None
                }
            }
            AbortCompleteCondition => node.body.abort_complete(),
            CommandHandleReceivedCondition => match &node.body {
                NodeBody::Command(body) => Some(body.handle.is_some()),
                _ => Some(true),
            },
        };
        Ok(value)
    }

    fn user_or(
        &self,
        node: &Node,
        kind: ConditionKind,
        env: &dyn ExprContext,
        default: Option<bool>,
    ) -> Option<bool> {
        match node.user_condition(kind) {
            Some(expr) => self.eval(node, expr, env),
            None => default,
        }
    }

    fn end_condition(&self, node: &Node, env: &dyn ExprContext) -> Option<bool> {
        let kind = ConditionKind::EndCondition;
        match &node.body {
            NodeBody::Empty => self.user_or(node, kind, env, Some(true)),
            NodeBody::Command(body) => match body.handle {
                Some(handle) if handle.is_interruptible() => Some(true),
                Some(_) => self.user_or(node, kind, env, Some(true)),
                None => Some(false),
            },
            NodeBody::Assignment(AssignmentBody { ack, .. })
            | NodeBody::Update(UpdateBody { ack, .. })
            | NodeBody::Request(UpdateBody { ack, .. }) => {
                and3([*ack, self.user_or(node, kind, env, Some(true))])
            }
            NodeBody::List | NodeBody::LibraryNodeCall { .. } => match node.user_condition(kind) {
                Some(expr) => self.eval(node, expr, env),
                None => Some(node.children.iter().all(|c| {
                    self.get(*c)
                        .is_some_and(|child| child.state == NodeState::Finished)
                })),
            },
        }
    }

    fn parent_in(&self, node: &Node, state: NodeState, root: bool) -> Result<Option<bool>> {
        Ok(Some(match node.parent {
            None => root,
            Some(p) => self.node(p)?.state == state,
        }))
    }

    /// Evaluate an expression in the scope of a node.
    pub fn eval(&self, node: &Node, expr: &Expr, env: &dyn ExprContext) -> Option<bool> {
        match expr {
            Expr::Const(value) => *value,
            Expr::Lookup(state) => env.lookup(state).as_bool(),
            Expr::Variable(name) => env.variable(name).as_bool(),
            Expr::LookupEquals { state, value } => env.lookup(state).equals(value),
            Expr::VariableEquals { name, value } => env.variable(name).equals(value),
            Expr::NodeState { node: other, state } => self
                .find(other)
                .and_then(|id| self.get(id))
                .map(|n| n.state == *state),
            Expr::NodeOutcome {
                node: other,
                outcome,
            } => self
                .find(other)
                .and_then(|id| self.get(id))
                .and_then(|n| n.outcome)
                .map(|o| o == *outcome),
            Expr::CommandHandle(expected) => node.command_handle().map(|h| h == *expected),
            Expr::Not(inner) => self.eval(node, inner, env).map(|v| !v),
            Expr::And(terms) => and3(terms.iter().map(|t| self.eval(node, t, env))),
            Expr::Or(terms) => or3(terms.iter().map(|t| self.eval(node, t, env))),
        }
    }

    // ------------------------------------------------------------------
    // Acknowledgements
    //
    // Each returns false when the acknowledgement no longer applies: the
    // node is of another type, has been re-executed since, or has left
    // the states in which its action is outstanding.
    // ------------------------------------------------------------------

    fn live_command(&mut self, action: ActionId) -> Option<&mut CommandBody> {
        let node = self.nodes.get_mut(action.node.index())?;
        if !matches!(node.state, NodeState::Executing | NodeState::Failing) {
            return None;
        }
        match &mut node.body {
            NodeBody::Command(body) if body.serial == action.serial => Some(body),
            _ => None,
        }
    }

    fn live_update(&mut self, action: ActionId) -> Option<&mut UpdateBody> {
        let node = self.nodes.get_mut(action.node.index())?;
        if !matches!(node.state, NodeState::Executing | NodeState::Failing) {
            return None;
        }
        match &mut node.body {
            NodeBody::Update(body) | NodeBody::Request(body) if body.serial == action.serial => {
                Some(body)
            }
            _ => None,
        }
    }

    /// Apply a command handle reported by the external system.
    pub fn apply_command_ack(&mut self, action: ActionId, handle: CommandHandle) -> bool {
        match self.live_command(action) {
            Some(body) => {
                body.handle = Some(handle);
                true
            }
            None => false,
        }
    }

    /// Store a command's return value.
    ///
    /// Returns the destination variable to write, if the ack applies and
    /// the command names one.
    pub fn apply_command_return(&mut self, action: ActionId, value: Value) -> Option<Option<String>> {
        let body = self.live_command(action)?;
        body.return_value = Some(value);
        Some(body.destination.clone())
    }

    /// Record the acknowledgement of a command abort.
    pub fn apply_abort_ack(&mut self, action: ActionId, acknowledged: bool) -> bool {
        match self.live_command(action) {
            Some(body) => {
                body.abort_complete = Some(acknowledged);
                true
            }
            None => false,
        }
    }

    /// Record the planner's acknowledgement of an update or request.
    pub fn apply_update_ack(&mut self, action: ActionId, acknowledged: bool) -> bool {
        match self.live_update(action) {
            Some(body) => {
                body.ack = Some(acknowledged);
                true
            }
            None => false,
        }
    }

    /// Mark an assignment as performed.
    pub fn ack_assignment(&mut self, id: NodeId) -> Result<bool> {
        let node = self.node_mut(id)?;
        if node.state != NodeState::Executing {
            return Ok(false);
        }
        match &mut node.body {
            NodeBody::Assignment(body) => {
                body.ack = Some(true);
                body.performed = true;
                Ok(true)
            }
            _ => Err(PlexecError::NodeKindMismatch {
                node: id,
                expected: "Assignment",
            }),
        }
    }

    /// Set a command node's handle directly, for scheduler-originated
    /// handles such as denial and dispatch.
    pub fn set_command_handle(&mut self, id: NodeId, handle: CommandHandle) -> Result<()> {
        match &mut self.node_mut(id)?.body {
            NodeBody::Command(body) => {
                body.handle = Some(handle);
                Ok(())
            }
            _ => Err(PlexecError::NodeKindMismatch {
                node: id,
                expected: "Command",
            }),
        }
    }

    /// Mark a command refused by arbitration, or withdraw the mark from one
    /// that did not start. A marked command enters EXECUTING holding
    /// COMMAND_DENIED and is never dispatched.
    pub fn set_command_denied(&mut self, id: NodeId, denied: bool) -> Result<()> {
        match &mut self.node_mut(id)?.body {
            NodeBody::Command(body) => {
                body.denied = denied;
                if denied {
                    body.handle = Some(CommandHandle::Denied);
                } else if body.handle == Some(CommandHandle::Denied) {
                    body.handle = None;
                }
                Ok(())
            }
            _ => Err(PlexecError::NodeKindMismatch {
                node: id,
                expected: "Command",
            }),
        }
    }
}

fn body_from_spec(spec: &BodySpec) -> NodeBody {
    match spec {
        BodySpec::Empty => NodeBody::Empty,
        BodySpec::Assignment { variable, value } => NodeBody::Assignment(AssignmentBody {
            variable: variable.clone(),
            value: value.clone(),
            ack: None,
            performed: false,
        }),
        BodySpec::Command {
            command,
            args,
            resources,
            destination,
        } => NodeBody::Command(CommandBody {
            name: command.clone(),
            args: args.clone(),
            resources: resources.clone(),
            destination: destination.clone(),
            handle: None,
            abort_complete: None,
            return_value: None,
            serial: 0,
            denied: false,
        }),
        BodySpec::Update { pairs } => NodeBody::Update(UpdateBody {
            pairs: pairs.clone(),
            ack: None,
            abort_complete: None,
            serial: 0,
        }),
        BodySpec::Request { pairs } => NodeBody::Request(UpdateBody {
            pairs: pairs.clone(),
            ack: None,
            abort_complete: None,
            serial: 0,
        }),
        BodySpec::List => NodeBody::List,
        BodySpec::LibraryNodeCall { library } => NodeBody::LibraryNodeCall {
            library: library.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::EmptyContext;
    use crate::types::Outcome;

    fn sample() -> NodeSpec {
        NodeSpec::list(
            "Root",
            vec![
                NodeSpec::list("A", vec![NodeSpec::empty("A1"), NodeSpec::empty("A2")]),
                NodeSpec::command("B", "drive"),
            ],
        )
    }

    #[test]
    fn dfs_order_is_preorder() {
        let mut tree = PlanTree::new();
        tree.insert_plan(&sample(), None).unwrap();
        let names: Vec<&str> = tree
            .dfs_order()
            .into_iter()
            .map(|id| tree.get(id).unwrap().name())
            .collect();
        assert_eq!(names, vec!["Root", "A", "A1", "A2", "B"]);
    }

    #[test]
    fn grafting_requires_list_parent() {
        let mut tree = PlanTree::new();
        tree.insert_plan(&sample(), None).unwrap();
        let ids = tree.insert_plan(&NodeSpec::empty("Late"), Some("A")).unwrap();
        let a = tree.find("A").unwrap();
        assert_eq!(tree.get(a).unwrap().children().last(), Some(&ids[0]));
        assert_eq!(tree.roots().len(), 1);

        assert!(matches!(
            tree.insert_plan(&NodeSpec::empty("X"), Some("B")),
            Err(PlexecError::GraftTarget { .. })
        ));
        assert!(matches!(
            tree.insert_plan(&NodeSpec::empty("X"), Some("Nope")),
            Err(PlexecError::GraftTarget { .. })
        ));
    }

    #[test]
    fn library_expansion() {
        let mut tree = PlanTree::new();
        let plan = NodeSpec::list("Root", vec![NodeSpec::library_call("Call", "Lib")]);
        assert!(matches!(
            tree.insert_plan(&plan, None),
            Err(PlexecError::LibraryNotFound { .. })
        ));
        assert!(tree.is_empty());
        assert_eq!(tree.missing_libraries(&plan), vec!["Lib".to_string()]);

        tree.add_library(NodeSpec::list("Lib", vec![NodeSpec::empty("Inner")]))
            .unwrap();
        let ids = tree.insert_plan(&plan, None).unwrap();
        assert_eq!(ids.len(), 4);
        let call = tree.find("Call").unwrap();
        let child = tree.get(call).unwrap().children()[0];
        assert_eq!(tree.get(child).unwrap().name(), "Lib");
    }

    #[test]
    fn recursive_library_is_rejected() {
        let mut tree = PlanTree::new();
        tree.add_library(NodeSpec::list(
            "Loop",
            vec![NodeSpec::library_call("Again", "Loop")],
        ))
        .unwrap();
        let plan = NodeSpec::library_call("Call", "Loop");
        assert!(matches!(
            tree.insert_plan(&plan, None),
            Err(PlexecError::LibraryRecursion { .. })
        ));
    }

    #[test]
    fn derived_conditions_follow_parent() {
        let mut tree = PlanTree::new();
        let plan = NodeSpec::list("Root", vec![NodeSpec::empty("Child")])
            .invariant(Expr::falsity());
        tree.insert_plan(&plan, None).unwrap();
        let root = tree.find("Root").unwrap();
        let child = tree.find("Child").unwrap();
        let env = EmptyContext;

        assert_eq!(
            tree.raw_condition(root, ConditionKind::ParentExecutingCondition, &env)
                .unwrap(),
            Some(true)
        );
        assert_eq!(
            tree.raw_condition(child, ConditionKind::ParentExecutingCondition, &env)
                .unwrap(),
            Some(false)
        );
        assert_eq!(
            tree.raw_condition(child, ConditionKind::AncestorInvariantCondition, &env)
                .unwrap(),
            Some(false)
        );
        assert!(matches!(
            tree.condition(child, ConditionKind::StartCondition, &env),
            Err(PlexecError::ConditionInactive { .. })
        ));
    }

    #[test]
    fn stale_acks_are_ignored() {
        let mut tree = PlanTree::new();
        tree.insert_plan(&NodeSpec::command("Cmd", "drive"), None)
            .unwrap();
        let id = tree.find("Cmd").unwrap();
        {
            let node = tree.node_mut(id).unwrap();
            node.state = NodeState::Executing;
            if let NodeBody::Command(body) = &mut node.body {
                body.serial = 2;
            }
        }
        assert!(!tree.apply_command_ack(ActionId::new(id, 1), CommandHandle::Success));
        assert!(tree.apply_command_ack(ActionId::new(id, 2), CommandHandle::Success));
        assert_eq!(
            tree.get(id).unwrap().command_handle(),
            Some(CommandHandle::Success)
        );
    }

    #[test]
    fn node_outcome_expression() {
        let mut tree = PlanTree::new();
        tree.insert_plan(&sample(), None).unwrap();
        let a1 = tree.find("A1").unwrap();
        let expr = Expr::node_outcome("A1", Outcome::Success);
        let b = tree.get(tree.find("B").unwrap()).unwrap().clone();
        assert_eq!(tree.eval(&b, &expr, &EmptyContext), None);
        tree.node_mut(a1)
            .unwrap()
            .set_outcome(Outcome::Success, None)
            .unwrap();
        assert_eq!(tree.eval(&b, &expr, &EmptyContext), Some(true));
    }
}
