// Copyright 2026 the Pinturelli Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Debug-mode contract checks.
//!
//! Every check takes the scene's `validate` flag and becomes a pass-through
//! when it is off, so callers never branch on the flag themselves.

use alloc::string::String;

use crate::error::SceneError;

/// Rejects non-finite numbers.
pub(crate) fn finite(
    enabled: bool,
    node: &str,
    field: &'static str,
    value: f64,
) -> Result<f64, SceneError> {
    if enabled && !value.is_finite() {
        return Err(SceneError::TypeMismatch {
            node: String::from(node),
            field,
            value,
        });
    }
    Ok(value)
}

/// Reads a countdown where `-1` means no limit.
///
/// Other negative values are rejected in debug mode and read as no limit
/// otherwise.
pub(crate) fn counter(
    enabled: bool,
    node: &str,
    field: &'static str,
    value: i32,
) -> Result<Option<u32>, SceneError> {
    match u32::try_from(value) {
        Ok(limit) => Ok(Some(limit)),
        Err(_) if enabled && value != -1 => Err(SceneError::InvalidCounter {
            node: String::from(node),
            field,
            value,
        }),
        Err(_) => Ok(None),
    }
}

/// Settles the result of a widget hook.
///
/// An un-overridden hook is an error in debug mode and a silent no-op
/// otherwise. Other errors always propagate.
pub(crate) fn hook(enabled: bool, result: Result<(), SceneError>) -> Result<(), SceneError> {
    match result {
        Err(SceneError::NotImplemented { node, hook }) if !enabled => {
            tracing::trace!(%node, %hook, "widget hook not overridden");
            Ok(())
        }
        other => other,
    }
}

/// Reports a missing capability in debug mode.
///
/// Returns `Ok(false)` when the node should simply be skipped.
pub(crate) fn capability(
    enabled: bool,
    present: bool,
    node: &str,
    method: &'static str,
) -> Result<bool, SceneError> {
    match (present, enabled) {
        (true, _) => Ok(true),
        (false, true) => Err(SceneError::MissingMethod {
            node: String::from(node),
            method,
        }),
        (false, false) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Hook;

    #[test]
    fn finite_passes_through_when_disabled() {
        assert!(finite(false, "n", "local_x", f64::NAN).unwrap().is_nan());
        assert_eq!(finite(true, "n", "local_x", 3.0), Ok(3.0));
    }

    #[test]
    fn finite_rejects_nan_and_infinity() {
        assert!(matches!(
            finite(true, "n", "local_y", f64::INFINITY),
            Err(SceneError::TypeMismatch { field: "local_y", .. })
        ));
        assert!(finite(true, "n", "local_y", f64::NAN).is_err());
    }

    #[test]
    fn counter_reads_minus_one_as_unlimited() {
        assert_eq!(counter(true, "n", "countdown", 3), Ok(Some(3)));
        assert_eq!(counter(true, "n", "countdown", 0), Ok(Some(0)));
        assert_eq!(counter(true, "n", "countdown", -1), Ok(None));
    }

    #[test]
    fn counter_rejects_other_negatives_when_enabled() {
        assert_eq!(
            counter(true, "n", "countdown", -4),
            Err(SceneError::InvalidCounter {
                node: "n".into(),
                field: "countdown",
                value: -4,
            })
        );
        assert_eq!(counter(false, "n", "countdown", -4), Ok(None));
    }

    #[test]
    fn unimplemented_hook_is_silent_only_in_production() {
        let missing = || {
            Err(SceneError::NotImplemented {
                node: "n".into(),
                hook: Hook::LocalDraw,
            })
        };
        assert_eq!(hook(false, missing()), Ok(()));
        assert!(hook(true, missing()).is_err());
    }

    #[test]
    fn other_hook_errors_always_propagate() {
        let err = SceneError::NotInTree { node: "n".into() };
        assert_eq!(hook(false, Err(err.clone())), Err(err));
    }

    #[test]
    fn capability_skips_or_fails() {
        assert_eq!(capability(false, true, "n", "on_click"), Ok(true));
        assert_eq!(capability(false, false, "n", "on_click"), Ok(false));
        assert!(matches!(
            capability(true, false, "n", "on_click"),
            Err(SceneError::MissingMethod { method: "on_click", .. })
        ));
    }
}
