//! Plan descriptions handed to the executive by a plan parser.

use super::condition::ConditionKind;
use super::expr::Expr;
use crate::error::{PlexecError, Result};
use crate::resource::ResourceRequest;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of a node description, tagged by node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BodySpec {
    /// Empty node.
    Empty,
    /// Assignment of a value to a plan variable.
    Assignment {
        /// Destination variable.
        variable: String,
        /// Value written.
        value: Value,
    },
    /// External command.
    Command {
        /// Command name.
        command: String,
        /// Arguments.
        #[serde(default)]
        args: Vec<Value>,
        /// Resources needed while running.
        #[serde(default)]
        resources: Vec<ResourceRequest>,
        /// Variable receiving the return value.
        #[serde(default)]
        destination: Option<String>,
    },
    /// Planner update.
    Update {
        /// Name/value pairs.
        #[serde(default)]
        pairs: Vec<(String, Value)>,
    },
    /// Planner request.
    Request {
        /// Name/value pairs.
        #[serde(default)]
        pairs: Vec<(String, Value)>,
    },
    /// List of children.
    List,
    /// Call of a registered library.
    LibraryNodeCall {
        /// Library name.
        library: String,
    },
}

/// Description of a plan node and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Node name. Used by node-reference expressions and library lookup.
    pub name: String,
    /// Type and payload.
    #[serde(flatten)]
    pub body: BodySpec,
    /// User conditions; absent ones take the type's default.
    #[serde(default)]
    pub conditions: BTreeMap<ConditionKind, Expr>,
    /// Children, for list nodes.
    #[serde(default)]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    /// Create a node description with the given body.
    pub fn new(name: impl Into<String>, body: BodySpec) -> Self {
        Self {
            name: name.into(),
            body,
            conditions: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// An empty node.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, BodySpec::Empty)
    }

    /// A list node with children.
    pub fn list(name: impl Into<String>, children: Vec<NodeSpec>) -> Self {
        let mut spec = Self::new(name, BodySpec::List);
        spec.children = children;
        spec
    }

    /// A command node without arguments or resources.
    pub fn command(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(
            name,
            BodySpec::Command {
                command: command.into(),
                args: Vec::new(),
                resources: Vec::new(),
                destination: None,
            },
        )
    }

    /// An assignment node.
    pub fn assignment(
        name: impl Into<String>,
        variable: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::new(
            name,
            BodySpec::Assignment {
                variable: variable.into(),
                value: value.into(),
            },
        )
    }

    /// An update node.
    pub fn update(name: impl Into<String>, pairs: Vec<(String, Value)>) -> Self {
        Self::new(name, BodySpec::Update { pairs })
    }

    /// A library call node.
    pub fn library_call(name: impl Into<String>, library: impl Into<String>) -> Self {
        Self::new(
            name,
            BodySpec::LibraryNodeCall {
                library: library.into(),
            },
        )
    }

    /// Parse a node description from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| PlexecError::PlanParse(e.to_string()))
    }

    /// Set a user condition.
    pub fn with_condition(mut self, kind: ConditionKind, expr: Expr) -> Self {
        self.conditions.insert(kind, expr);
        self
    }

    /// Set the start condition.
    pub fn start(self, expr: Expr) -> Self {
        self.with_condition(ConditionKind::StartCondition, expr)
    }

    /// Set the end condition.
    pub fn end(self, expr: Expr) -> Self {
        self.with_condition(ConditionKind::EndCondition, expr)
    }

    /// Set the pre-condition.
    pub fn pre(self, expr: Expr) -> Self {
        self.with_condition(ConditionKind::PreCondition, expr)
    }

    /// Set the post-condition.
    pub fn post(self, expr: Expr) -> Self {
        self.with_condition(ConditionKind::PostCondition, expr)
    }

    /// Set the invariant condition.
    pub fn invariant(self, expr: Expr) -> Self {
        self.with_condition(ConditionKind::InvariantCondition, expr)
    }

    /// Set the skip condition.
    pub fn skip(self, expr: Expr) -> Self {
        self.with_condition(ConditionKind::SkipCondition, expr)
    }

    /// Set the repeat condition.
    pub fn repeat(self, expr: Expr) -> Self {
        self.with_condition(ConditionKind::RepeatCondition, expr)
    }

    /// Add a resource request. Only meaningful on command nodes.
    pub fn with_resource(mut self, request: ResourceRequest) -> Self {
        if let BodySpec::Command { resources, .. } = &mut self.body {
            resources.push(request);
        }
        self
    }

    /// Set the return-value destination. Only meaningful on command nodes.
    pub fn with_destination(mut self, variable: impl Into<String>) -> Self {
        if let BodySpec::Command { destination, .. } = &mut self.body {
            *destination = Some(variable.into());
        }
        self
    }

    /// Add a child. Only meaningful on list nodes.
    pub fn with_child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    /// Names of every library called in this subtree.
    pub fn library_calls(&self) -> Vec<&str> {
        let mut calls = Vec::new();
        let mut stack = vec![self];
        while let Some(spec) = stack.pop() {
            if let BodySpec::LibraryNodeCall { library } = &spec.body {
                calls.push(library.as_str());
            }
            stack.extend(spec.children.iter());
        }
        calls
    }

    /// Check the structural rules that do not depend on loaded libraries.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(PlexecError::InvalidPlan {
                node: self.name.clone(),
                cause: "node name is empty".to_string(),
            });
        }
        if let Some(kind) = self.conditions.keys().find(|k| !k.is_user_settable()) {
            return Err(PlexecError::InvalidPlan {
                node: self.name.clone(),
                cause: format!("{} cannot be supplied by a plan", kind),
            });
        }
        if !self.children.is_empty() && !matches!(self.body, BodySpec::List) {
            return Err(PlexecError::InvalidPlan {
                node: self.name.clone(),
                cause: "only list nodes may declare children".to_string(),
            });
        }
        if let BodySpec::Command { resources, .. } = &self.body {
            if let Some(bad) = resources
                .iter()
                .find(|r| !r.upper_bound.is_finite() || r.upper_bound < 0.0)
            {
                return Err(PlexecError::InvalidPlan {
                    node: self.name.clone(),
                    cause: format!("resource '{}' has invalid amount", bad.name),
                });
            }
        }
        self.children.iter().try_for_each(NodeSpec::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_json_plan() {
        let plan = NodeSpec::from_json(
            r#"{
                "name": "Root",
                "type": "list",
                "conditions": {"EndCondition": {"lookup": "done"}},
                "children": [
                    {"name": "Drive", "type": "command",
                     "resources": [{"name": "motor", "priority": 2}]}
                ]
            }"#,
        );
        assert!(plan.is_err());

        let plan = NodeSpec::from_json(
            r#"{
                "name": "Root",
                "type": "list",
                "conditions": {"EndCondition": {"lookup": "done"}},
                "children": [
                    {"name": "Set", "type": "assignment", "variable": "x", "value": 3},
                    {"name": "Call", "type": "library_node_call", "library": "Drive"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(plan.children.len(), 2);
        assert_eq!(plan.library_calls(), vec!["Drive"]);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn rejects_derived_conditions() {
        let spec = NodeSpec::empty("A")
            .with_condition(ConditionKind::AncestorEndCondition, Expr::truth());
        assert!(matches!(
            spec.validate(),
            Err(PlexecError::InvalidPlan { .. })
        ));
    }

    #[test]
    fn rejects_children_on_leaves() {
        let spec = NodeSpec::empty("A").with_child(NodeSpec::empty("B"));
        assert!(spec.validate().is_err());
        let spec = NodeSpec::list("A", vec![NodeSpec::empty("B")]);
        assert!(spec.validate().is_ok());
    }
}
