//! Error types for the executive.
//!
//! Only configuration problems and internal invariant violations are
//! errors. Plan-logic failures, resource denial and adapter failures are
//! recorded as node outcomes and command handles instead and never show up
//! here.

use crate::node::{ConditionKind, NodeType};
use crate::types::{NodeId, NodeState, Outcome};
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for executive operations.
#[derive(Error, Debug)]
pub enum PlexecError {
    // =========================================================================
    // Configuration Errors (E001-E099)
    // =========================================================================
    /// No state table is registered for a node type.
    #[error("E001: No state table registered for node type {node_type}")]
    MissingStateTable {
        /// The node type without a table.
        node_type: NodeType,
    },

    /// A state table lacks a handler for a state its node type can reach.
    #[error("E002: State table '{table}' has no handler for state {state}")]
    MissingStateHandler {
        /// Name of the incomplete table.
        table: String,
        /// The state without a handler.
        state: NodeState,
    },

    /// A specialization names a state the base table does not define.
    #[error("E003: Cannot specialize state {state} of table '{table}': base defines none")]
    InvalidSpecialization {
        /// Name of the base table.
        table: String,
        /// The state that was specialized.
        state: NodeState,
    },

    /// The resource definition file could not be read.
    #[error("E004: Failed to read resource file {path}: {cause}")]
    ResourceFile {
        /// Path of the file.
        path: PathBuf,
        /// Reason for the failure.
        cause: String,
    },

    /// A line of the resource definition could not be parsed.
    #[error("E005: Malformed resource definition at line {line}: {cause}")]
    ResourceParse {
        /// One-based line number.
        line: usize,
        /// Description of the problem.
        cause: String,
    },

    /// The resource hierarchy is inconsistent.
    #[error("E006: Invalid resource hierarchy at '{resource}': {cause}")]
    ResourceHierarchy {
        /// The offending resource.
        resource: String,
        /// Description of the problem.
        cause: String,
    },

    /// A configuration value is invalid.
    #[error("E007: Invalid configuration value for '{field}': {cause}")]
    ConfigValue {
        /// The configuration field.
        field: String,
        /// Why the value is invalid.
        cause: String,
    },

    // =========================================================================
    // Plan Construction Errors (E100-E199)
    // =========================================================================
    /// A library node call names a library that was never added.
    #[error("E101: Library '{library}' called by node '{node}' is not loaded")]
    LibraryNotFound {
        /// The missing library.
        library: String,
        /// The calling node.
        node: String,
    },

    /// A library calls itself, directly or indirectly.
    #[error("E102: Recursive expansion of library '{library}'")]
    LibraryRecursion {
        /// The library being expanded again.
        library: String,
    },

    /// A plan description could not be decoded.
    #[error("E103: Failed to parse plan: {0}")]
    PlanParse(String),

    /// A plan could not be grafted under the requested parent.
    #[error("E104: Cannot graft plan under '{parent}': {cause}")]
    GraftTarget {
        /// The requested parent node name.
        parent: String,
        /// Why grafting failed.
        cause: String,
    },

    /// A plan node is structurally invalid.
    #[error("E105: Invalid plan node '{node}': {cause}")]
    InvalidPlan {
        /// The offending node name.
        node: String,
        /// Description of the problem.
        cause: String,
    },

    // =========================================================================
    // Internal Invariant Violations (E200-E299)
    // =========================================================================
    /// A condition was read while inactive.
    #[error("E201: Condition {condition} of {node} read while inactive")]
    ConditionInactive {
        /// The node.
        node: NodeId,
        /// The condition.
        condition: ConditionKind,
    },

    /// A condition was activated twice, or deactivated while inactive.
    #[error("E202: Unpaired {operation} of condition {condition} on {node}")]
    ConditionPairing {
        /// The node.
        node: NodeId,
        /// The condition.
        condition: ConditionKind,
        /// "activation" or "deactivation".
        operation: &'static str,
    },

    /// A transition was requested that no table entry covers.
    #[error("E203: No transition handler for {node} ({node_type}) from {from} to {to}")]
    NoTransitionHandler {
        /// The node.
        node: NodeId,
        /// Its type.
        node_type: NodeType,
        /// Current state.
        from: NodeState,
        /// Requested destination.
        to: NodeState,
    },

    /// An outcome was written twice in one iteration.
    #[error("E204: Outcome of {node} already set to {existing}")]
    OutcomeAlreadySet {
        /// The node.
        node: NodeId,
        /// The outcome already recorded.
        existing: Outcome,
    },

    /// A node ID does not refer to a node in the tree.
    #[error("E205: Unknown node {0}")]
    UnknownNode(NodeId),

    /// A step did not reach quiescence within the configured pass bound.
    #[error("E206: Quiescence not reached after {passes} passes")]
    QuiescenceNotReached {
        /// Passes performed.
        passes: usize,
    },

    /// A node payload did not match its type.
    #[error("E207: Node {node} is not a {expected} node")]
    NodeKindMismatch {
        /// The node.
        node: NodeId,
        /// The expected kind.
        expected: &'static str,
    },

    // =========================================================================
    // Resource Errors (E300-E399)
    // =========================================================================
    /// A command's resource request is malformed.
    #[error("E301: Invalid resource request '{resource}' for {node}: {cause}")]
    ResourceRequest {
        /// The requesting command node.
        node: NodeId,
        /// The requested resource.
        resource: String,
        /// Description of the problem.
        cause: String,
    },

    // =========================================================================
    // Interface Errors (E400-E499)
    // =========================================================================
    /// A handler was registered twice under one name.
    #[error("E401: Handler '{name}' already registered")]
    DuplicateHandler {
        /// The handler name.
        name: String,
    },

    /// An interface adapter failed to start or stop.
    #[error("E402: Interface adapter '{adapter}' failed: {cause}")]
    InterfaceAdapter {
        /// The adapter name.
        adapter: String,
        /// Reason for the failure.
        cause: String,
    },

    // =========================================================================
    // Application Errors (E500-E599)
    // =========================================================================
    /// An application state transition is not permitted.
    #[error("E501: Illegal application state transition from {from} to {to}")]
    IllegalAppTransition {
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },

    /// An operation is not permitted in the current application state.
    #[error("E502: Cannot {operation} while application is {state}")]
    AppState {
        /// The attempted operation.
        operation: &'static str,
        /// Current state.
        state: String,
    },

    /// The worker thread could not be spawned.
    #[error("E503: Failed to spawn exec worker: {0}")]
    ThreadSpawn(String),

    /// Work was cancelled by a forced stop.
    #[error("E504: Execution cancelled")]
    Cancelled,

    /// The worker halted on a fatal error.
    #[error("E505: Exec worker halted: {0}")]
    WorkerHalted(String),
}

impl PlexecError {
    /// Whether this error must halt the executive.
    ///
    /// Configuration problems and internal invariant violations leave the
    /// state machine in a state that cannot be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingStateTable { .. }
                | Self::MissingStateHandler { .. }
                | Self::InvalidSpecialization { .. }
                | Self::ResourceFile { .. }
                | Self::ResourceParse { .. }
                | Self::ResourceHierarchy { .. }
                | Self::ConfigValue { .. }
                | Self::ConditionInactive { .. }
                | Self::ConditionPairing { .. }
                | Self::NoTransitionHandler { .. }
                | Self::OutcomeAlreadySet { .. }
                | Self::UnknownNode(_)
                | Self::QuiescenceNotReached { .. }
                | Self::NodeKindMismatch { .. }
                | Self::ResourceRequest { .. }
                | Self::Cancelled
                | Self::WorkerHalted(_)
        )
    }
}

/// Result type alias for executive operations.
pub type Result<T> = std::result::Result<T, PlexecError>;
