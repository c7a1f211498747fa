//! Condition names and activation sets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a condition gating a node's transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConditionKind {
    /// User: may the node start.
    StartCondition,
    /// User: is the node's work done.
    EndCondition,
    /// User: checked once the start condition holds.
    PreCondition,
    /// User: checked once the end condition holds.
    PostCondition,
    /// User: must hold while executing.
    InvariantCondition,
    /// Derived: every ancestor's invariant holds.
    AncestorInvariantCondition,
    /// Derived: some ancestor's end condition holds.
    AncestorEndCondition,
    /// User: skip the node entirely.
    SkipCondition,
    /// User: run another iteration.
    RepeatCondition,
    /// Derived: parent is EXECUTING.
    ParentExecutingCondition,
    /// Derived: parent is FINISHED.
    ParentFinishedCondition,
    /// Derived: parent is WAITING.
    ParentWaitingCondition,
    /// Derived: every child is WAITING or FINISHED.
    ChildrenWaitingOrFinishedCondition,
    /// Derived: an abort request has been acknowledged.
    AbortCompleteCondition,
    /// Derived: a command handle has been received.
    CommandHandleReceivedCondition,
}

impl ConditionKind {
    /// Number of condition kinds.
    pub const COUNT: usize = 15;

    /// Every kind in declaration order.
    pub const ALL: [ConditionKind; Self::COUNT] = [
        ConditionKind::StartCondition,
        ConditionKind::EndCondition,
        ConditionKind::PreCondition,
        ConditionKind::PostCondition,
        ConditionKind::InvariantCondition,
        ConditionKind::AncestorInvariantCondition,
        ConditionKind::AncestorEndCondition,
        ConditionKind::SkipCondition,
        ConditionKind::RepeatCondition,
        ConditionKind::ParentExecutingCondition,
        ConditionKind::ParentFinishedCondition,
        ConditionKind::ParentWaitingCondition,
        ConditionKind::ChildrenWaitingOrFinishedCondition,
        ConditionKind::AbortCompleteCondition,
        ConditionKind::CommandHandleReceivedCondition,
    ];

    /// Table index of this kind.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether a plan may supply an expression for this condition.
    ///
    /// The others are computed from the tree and the node's own slots.
    pub const fn is_user_settable(self) -> bool {
        matches!(
            self,
            Self::StartCondition
                | Self::EndCondition
                | Self::PreCondition
                | Self::PostCondition
                | Self::InvariantCondition
                | Self::SkipCondition
                | Self::RepeatCondition
        )
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartCondition => "StartCondition",
            Self::EndCondition => "EndCondition",
            Self::PreCondition => "PreCondition",
            Self::PostCondition => "PostCondition",
            Self::InvariantCondition => "InvariantCondition",
            Self::AncestorInvariantCondition => "AncestorInvariantCondition",
            Self::AncestorEndCondition => "AncestorEndCondition",
            Self::SkipCondition => "SkipCondition",
            Self::RepeatCondition => "RepeatCondition",
            Self::ParentExecutingCondition => "ParentExecutingCondition",
            Self::ParentFinishedCondition => "ParentFinishedCondition",
            Self::ParentWaitingCondition => "ParentWaitingCondition",
            Self::ChildrenWaitingOrFinishedCondition => "ChildrenWaitingOrFinishedCondition",
            Self::AbortCompleteCondition => "AbortCompleteCondition",
            Self::CommandHandleReceivedCondition => "CommandHandleReceivedCondition",
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of condition kinds, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ConditionSet(u16);

impl ConditionSet {
    /// The empty set.
    pub const EMPTY: ConditionSet = ConditionSet(0);

    /// Build a set from a list of kinds.
    pub const fn of(kinds: &[ConditionKind]) -> Self {
        let mut bits = 0u16;
        let mut i = 0;
        while i < kinds.len() {
            bits |= 1 << kinds[i].index();
            i += 1;
        }
        Self(bits)
    }

    /// Check membership.
    pub const fn contains(&self, kind: ConditionKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    /// Add a kind. Returns false if it was already present.
    pub fn insert(&mut self, kind: ConditionKind) -> bool {
        let present = self.contains(kind);
        self.0 |= 1 << kind.index();
        !present
    }

    /// Remove a kind. Returns false if it was absent.
    pub fn remove(&mut self, kind: ConditionKind) -> bool {
        let present = self.contains(kind);
        self.0 &= !(1 << kind.index());
        present
    }

    /// Number of kinds in the set.
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Check if the set is empty.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate the kinds in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = ConditionKind> + '_ {
        ConditionKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl fmt::Display for ConditionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|k| k.as_str()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConditionKind::*;

    #[test]
    fn set_operations() {
        let mut set = ConditionSet::of(&[StartCondition, SkipCondition]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(SkipCondition));
        assert!(!set.insert(SkipCondition));
        assert!(set.insert(EndCondition));
        assert!(set.remove(StartCondition));
        assert!(!set.remove(StartCondition));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![EndCondition, SkipCondition]);
    }

    #[test]
    fn user_settable_kinds() {
        let settable: Vec<_> = ConditionKind::ALL
            .into_iter()
            .filter(|k| k.is_user_settable())
            .collect();
        assert_eq!(settable.len(), 7);
        assert!(!AncestorEndCondition.is_user_settable());
    }

    #[test]
    fn display_lists_names() {
        let set = ConditionSet::of(&[RepeatCondition]);
        assert_eq!(set.to_string(), "{RepeatCondition}");
        assert_eq!(ConditionSet::EMPTY.to_string(), "{}");
    }
}
