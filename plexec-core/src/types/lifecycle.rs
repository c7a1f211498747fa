//! Life-cycle enumerations read and written by the node state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Node life-cycle state.
///
/// `NoState` is the "no eligible transition" answer of a state computer and
/// never a resting state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    /// Not yet eligible to run.
    Inactive,
    /// Waiting for the start condition.
    Waiting,
    /// Performing its body.
    Executing,
    /// List-like node waiting for its children to settle.
    Finishing,
    /// Cleaning up after a failure.
    Failing,
    /// One iteration complete; may repeat.
    IterationEnded,
    /// Done until the parent repeats.
    Finished,
    /// Sentinel: no transition.
    NoState,
}

impl NodeState {
    /// Number of states, including the sentinel.
    pub const COUNT: usize = 8;

    /// Every state in declaration order.
    pub const ALL: [NodeState; Self::COUNT] = [
        NodeState::Inactive,
        NodeState::Waiting,
        NodeState::Executing,
        NodeState::Finishing,
        NodeState::Failing,
        NodeState::IterationEnded,
        NodeState::Finished,
        NodeState::NoState,
    ];

    /// Table index of this state.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "INACTIVE",
            Self::Waiting => "WAITING",
            Self::Executing => "EXECUTING",
            Self::Finishing => "FINISHING",
            Self::Failing => "FAILING",
            Self::IterationEnded => "ITERATION_ENDED",
            Self::Finished => "FINISHED",
            Self::NoState => "NO_STATE",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal classification of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// The iteration completed and its post-condition held.
    Success,
    /// The iteration failed; see the failure type.
    Failure,
    /// The node never executed.
    Skipped,
    /// The node was interrupted by an exit request.
    Interrupted,
}

impl Outcome {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Skipped => "SKIPPED",
            Self::Interrupted => "INTERRUPTED",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason attached to a `FAILURE` outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    /// Start condition held but the pre-condition did not.
    PreConditionFailed,
    /// End condition held but the post-condition did not.
    PostConditionFailed,
    /// The node's own invariant went false.
    InvariantConditionFailed,
    /// An ancestor's invariant went false.
    ParentFailed,
    /// The node exited.
    Exited,
    /// An ancestor exited.
    ParentExited,
}

impl FailureType {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreConditionFailed => "PRE_CONDITION_FAILED",
            Self::PostConditionFailed => "POST_CONDITION_FAILED",
            Self::InvariantConditionFailed => "INVARIANT_CONDITION_FAILED",
            Self::ParentFailed => "PARENT_FAILED",
            Self::Exited => "EXITED",
            Self::ParentExited => "PARENT_EXITED",
        }
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a dispatched command, as reported by the external system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandHandle {
    /// Handed to the interface layer.
    #[serde(rename = "COMMAND_SENT_TO_SYSTEM")]
    SentToSystem,
    /// Accepted by the external system.
    #[serde(rename = "COMMAND_ACCEPTED")]
    Accepted,
    /// Received by the external system.
    #[serde(rename = "COMMAND_RCVD_BY_SYSTEM")]
    ReceivedBySystem,
    /// The external system failed to perform it.
    #[serde(rename = "COMMAND_FAILED")]
    Failed,
    /// Refused by resource arbitration.
    #[serde(rename = "COMMAND_DENIED")]
    Denied,
    /// Completed successfully.
    #[serde(rename = "COMMAND_SUCCESS")]
    Success,
}

impl CommandHandle {
    /// Handles that end a command regardless of its end condition.
    pub fn is_interruptible(&self) -> bool {
        matches!(self, Self::Denied | Self::Failed)
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SentToSystem => "COMMAND_SENT_TO_SYSTEM",
            Self::Accepted => "COMMAND_ACCEPTED",
            Self::ReceivedBySystem => "COMMAND_RCVD_BY_SYSTEM",
            Self::Failed => "COMMAND_FAILED",
            Self::Denied => "COMMAND_DENIED",
            Self::Success => "COMMAND_SUCCESS",
        }
    }
}

impl fmt::Display for CommandHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_indices_follow_declaration_order() {
        for (i, state) in NodeState::ALL.iter().enumerate() {
            assert_eq!(state.index(), i);
        }
    }

    #[test]
    fn interruptible_handles() {
        assert!(CommandHandle::Denied.is_interruptible());
        assert!(CommandHandle::Failed.is_interruptible());
        assert!(!CommandHandle::Success.is_interruptible());
        assert!(!CommandHandle::SentToSystem.is_interruptible());
    }

    #[test]
    fn serde_names_match_display() {
        let json = serde_json::to_string(&CommandHandle::ReceivedBySystem).unwrap();
        assert_eq!(json, "\"COMMAND_RCVD_BY_SYSTEM\"");
        let state: NodeState = serde_json::from_str("\"ITERATION_ENDED\"").unwrap();
        assert_eq!(state, NodeState::IterationEnded);
        assert_eq!(FailureType::ParentFailed.to_string(), "PARENT_FAILED");
    }
}
