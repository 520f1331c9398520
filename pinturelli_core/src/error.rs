// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene error taxonomy.

use alloc::string::String;
use core::fmt;

use thiserror::Error;

use crate::node::NodeId;

/// Errors produced by tree mutation, traversal, and lookup operations.
///
/// Structural errors (unknown handles, attaching into an inactive parent,
/// cycles) are always reported. Contract errors of the debug mode
/// ([`TypeMismatch`](Self::TypeMismatch),
/// [`InvalidCounter`](Self::InvalidCounter),
/// [`NotImplemented`](Self::NotImplemented),
/// [`MissingMethod`](Self::MissingMethod)) are only reported when
/// [`SceneConfig::validate`](crate::SceneConfig::validate) is set.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum SceneError {
    /// The node cannot become a child of the requested parent.
    #[error("cannot attach `{child}`: {fault}")]
    InvalidChild {
        /// Id of the rejected child.
        child: String,
        /// Why it was rejected.
        fault: ChildFault,
    },
    /// A structural operation targeted a node that is not active.
    #[error("node `{node}` is not in the active tree")]
    NotInTree {
        /// Id of the inactive node.
        node: String,
    },
    /// No widget constructor is registered under the requested type name.
    #[error("no widget type registered as `{kind}`")]
    UnknownType {
        /// The requested type name.
        kind: String,
    },
    /// The parent named by a construction spec does not exist.
    #[error("no parent node with id `{parent}`")]
    UnknownParent {
        /// The requested parent id.
        parent: String,
    },
    /// No node carries the requested id.
    #[error("no node with id `{id}`")]
    UnknownNode {
        /// The requested id.
        id: String,
    },
    /// A node with the same id already exists.
    #[error("node id `{id}` is already in use")]
    DuplicateId {
        /// The duplicated id.
        id: String,
    },
    /// A traversal was started from a handle this tree does not own.
    #[error("{target:?} is not a node of this tree")]
    InvalidTarget {
        /// The rejected handle.
        target: NodeId,
    },
    /// A node lacks the capability a traversal operation requires.
    #[error("node `{node}` does not implement `{method}`")]
    MissingMethod {
        /// Id of the node.
        node: String,
        /// Name of the missing operation.
        method: &'static str,
    },
    /// A widget did not override one of its per-frame hooks.
    #[error("node `{node}` does not override `{hook}`")]
    NotImplemented {
        /// Id of the node.
        node: String,
        /// The hook left at its default body.
        hook: Hook,
    },
    /// A numeric input was not a finite number.
    #[error("`{field}` of node `{node}` must be a finite number, got {value}")]
    TypeMismatch {
        /// Id of the node.
        node: String,
        /// Name of the rejected field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// A countdown was negative without being the "no limit" value `-1`.
    #[error("`{field}` of node `{node}` must be -1 or a non-negative count, got {value}")]
    InvalidCounter {
        /// Id of the node.
        node: String,
        /// Name of the rejected field.
        field: &'static str,
        /// The rejected value.
        value: i32,
    },
    /// A selector string could not be parsed.
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector {
        /// The selector as given.
        selector: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Reason an attach was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChildFault {
    /// The handle does not belong to this tree.
    UnknownHandle,
    /// The root can never be a child.
    Root,
    /// The node is already linked under a parent.
    AlreadyParented,
    /// The node is the parent itself or one of its ancestors.
    Cycle,
    /// The node is already active.
    AlreadyActive,
    /// The node has no parent to be reactivated under.
    Orphan,
}

impl fmt::Display for ChildFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnknownHandle => "handle does not belong to this tree",
            Self::Root => "the root cannot be a child",
            Self::AlreadyParented => "node already has a parent",
            Self::Cycle => "node is an ancestor of the parent",
            Self::AlreadyActive => "node is already active",
            Self::Orphan => "node has no parent",
        })
    }
}

/// Per-frame widget hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hook {
    /// [`Widget::local_update`](crate::widget::Widget::local_update).
    LocalUpdate,
    /// [`Widget::local_draw`](crate::widget::Widget::local_draw).
    LocalDraw,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LocalUpdate => "local_update",
            Self::LocalDraw => "local_draw",
        })
    }
}
