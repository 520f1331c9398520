// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Path selectors over the node tree.
//!
//! A selector is a `/`-separated path of segments:
//!
//! - `""` selects the root.
//! - A leading `#id` starts from the node with that id; a leading `/` starts
//!   from the root.
//! - Each following segment is `kind`, `kind[n]`, or `[n]`. A `kind` segment
//!   keeps the children of that registered type: *all* of them when the
//!   selector starts with `#id`, only the *first* when it starts with `/`.
//!   A bare `[n]` considers every child.
//! - `[n]` picks one match; negative indices count from the end. An index out
//!   of range drops that branch.
//! - Empty segments (such as in `a//b`) are ignored, and `#` is only allowed
//!   in the first segment.
//!
//! ```text
//! "#panel/button"      every button directly under `panel`
//! "#panel/button[-1]"  the last of them
//! "/container/[0]"     the first child of the root's first container
//! ```

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::SceneError;
use crate::node::{NodeId, NodeTree};

/// One parsed path segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Segment<'a> {
    kind: Option<&'a str>,
    index: Option<i64>,
}

impl NodeTree {
    /// Resolves a path selector.
    ///
    /// # Errors
    ///
    /// - [`SceneError::InvalidSelector`] for malformed selectors.
    /// - [`SceneError::UnknownNode`] if a leading `#id` names no node.
    pub fn select(&self, selector: &str) -> Result<Vec<NodeId>, SceneError> {
        if selector.is_empty() {
            return Ok(vec![NodeId::ROOT]);
        }
        let invalid = |reason| SceneError::InvalidSelector {
            selector: String::from(selector),
            reason,
        };

        let mut parts = selector.split('/');
        let head = parts.next().unwrap_or_default();
        let from_id = head.starts_with('#');
        let mut current = if let Some(id) = head.strip_prefix('#') {
            vec![self.lookup(id)?]
        } else if head.is_empty() {
            vec![NodeId::ROOT]
        } else {
            return Err(invalid("must start with `#` or `/`"));
        };

        for part in parts {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let segment = parse_segment(part).ok_or_else(|| invalid("malformed segment"))?;
            if segment.kind.is_some_and(|k| k.starts_with('#')) {
                return Err(invalid("`#` is only allowed in the first segment"));
            }

            let mut next = Vec::new();
            for &node in &current {
                let mut matches: Vec<NodeId> = match segment.kind {
                    Some(kind) => self
                        .children(node)
                        .filter(|&c| self.kind(c) == kind)
                        .collect(),
                    None => self.children(node).collect(),
                };
                if segment.kind.is_some() && !from_id {
                    matches.truncate(1);
                }
                match segment.index {
                    Some(index) => next.extend(pick(&matches, index)),
                    None => next.extend(matches),
                }
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }
        Ok(current)
    }
}

/// Parses `kind`, `kind[n]`, or `[n]`.
fn parse_segment(part: &str) -> Option<Segment<'_>> {
    let (kind, index) = match part.find('[') {
        Some(open) => {
            let inner = part[open..].strip_prefix('[')?.strip_suffix(']')?;
            let digits = inner.strip_prefix('-').unwrap_or(inner);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            (&part[..open], Some(inner.parse::<i64>().ok()?))
        }
        None => (part, None),
    };
    if kind.contains([']', '[']) {
        return None;
    }
    Some(Segment {
        kind: (!kind.is_empty()).then_some(kind),
        index,
    })
}

fn pick(matches: &[NodeId], index: i64) -> Option<NodeId> {
    let len = i64::try_from(matches.len()).ok()?;
    let at = if index < 0 { len + index } else { index };
    usize::try_from(at).ok().and_then(|at| matches.get(at).copied())
}
