use std::fmt;

use serde::Serialize;

/// Lifecycle state of the agent.
///
/// `Parsed → Installing → Installed → Activating → Active`; a failed install
/// ends in `Redundant`, from which a fresh install may be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

impl LifecycleState {
    /// Only an active agent answers requests from its caches.
    pub fn intercepts(self) -> bool {
        self == LifecycleState::Active
    }

    pub fn can_install(self) -> bool {
        matches!(self, LifecycleState::Parsed | LifecycleState::Redundant)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Parsed => "parsed",
            LifecycleState::Installing => "installing",
            LifecycleState::Installed => "installed",
            LifecycleState::Activating => "activating",
            LifecycleState::Active => "active",
            LifecycleState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_active_intercepts() {
        assert!(LifecycleState::Active.intercepts());
        assert!(!LifecycleState::Installed.intercepts());
        assert!(!LifecycleState::Activating.intercepts());
    }

    #[test]
    fn test_install_allowed_from_fresh_or_failed() {
        assert!(LifecycleState::Parsed.can_install());
        assert!(LifecycleState::Redundant.can_install());
        assert!(!LifecycleState::Installing.can_install());
        assert!(!LifecycleState::Active.can_install());
    }
}
