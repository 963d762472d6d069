//! Unit state as reported by the supervisor's query commands.

use std::fmt;

/// Answer to an `is-active` or `is-enabled` query.
///
/// `Unknown` covers both unrecognised output and a query that could not be
/// run at all; callers treat it as "not active" / "not enabled".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Active,
    Inactive,
    Enabled,
    Disabled,
    Unknown,
}

impl UnitState {
    pub fn is_active(self) -> bool {
        self == UnitState::Active
    }

    pub fn is_enabled(self) -> bool {
        self == UnitState::Enabled
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitState::Active => "active",
            UnitState::Inactive => "inactive",
            UnitState::Enabled => "enabled",
            UnitState::Disabled => "disabled",
            UnitState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Classify `is-active` output. Negative states are matched first because
/// "inactive" and "deactivating" both contain "activ".
pub fn classify_active(output: &str) -> UnitState {
    let out = output.trim();
    if out.contains("inactive") || out.contains("failed") || out.contains("deactivating") {
        UnitState::Inactive
    } else if out.contains("active") || out.contains("activating") || out.contains("reloading") {
        UnitState::Active
    } else {
        UnitState::Unknown
    }
}

/// Classify `is-enabled` output.
pub fn classify_enablement(output: &str) -> UnitState {
    let out = output.trim();
    if out.contains("disabled") || out.contains("masked") {
        UnitState::Disabled
    } else if out.contains("enabled") {
        UnitState::Enabled
    } else {
        UnitState::Unknown
    }
}
