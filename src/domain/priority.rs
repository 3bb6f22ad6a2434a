//! Priority levels and discovery-driven priority arithmetic
//!
//! Priorities are integers 0..=3 where P0 is the most urgent. The mapping
//! from discovery kind to child priority is deterministic: the model's
//! advisory priority hint never participates.

use serde::{Deserialize, Serialize};

use super::analysis::DiscoveryKind;

/// Urgency band for an issue. Lower value means more urgent.
///
/// Values outside 0..=3 are clamped at construction and deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const P0: Priority = Priority(0);
    pub const P1: Priority = Priority(1);
    pub const P2: Priority = Priority(2);
    pub const P3: Priority = Priority(3);

    /// Create a priority, clamping to the valid 0..=3 range
    pub fn new(value: u8) -> Self {
        Self(value.min(3))
    }

    /// Numeric value (0 = most urgent)
    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// One band less urgent, saturating at P3
    pub fn relaxed(self) -> Self {
        Self::new(self.0 + 1)
    }

    pub fn is_urgent(self) -> bool {
        self.0 == 0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::P2
    }
}

impl From<u8> for Priority {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix(['P', 'p']).unwrap_or(trimmed);
        digits
            .parse::<u8>()
            .map(Self::new)
            .map_err(|_| format!("Unknown priority: {}", s))
    }
}

/// Map a discovery to the priority its new issue receives.
///
/// - `blocker` always lands at P0
/// - `related` lands one band below the parent, saturating at P3
/// - `background` always lands at P2
/// - `unspecified` inherits the parent priority
pub fn discovered_priority(parent: Priority, kind: DiscoveryKind) -> Priority {
    match kind {
        DiscoveryKind::Blocker => Priority::P0,
        DiscoveryKind::Related => parent.relaxed(),
        DiscoveryKind::Background => Priority::P2,
        DiscoveryKind::Unspecified => parent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_clamps() {
        assert_eq!(Priority::new(0), Priority::P0);
        assert_eq!(Priority::new(3), Priority::P3);
        assert_eq!(Priority::new(7), Priority::P3);
    }

    #[test]
    fn test_priority_display_and_parse() {
        assert_eq!(Priority::P1.to_string(), "P1");
        assert_eq!("P0".parse::<Priority>().unwrap(), Priority::P0);
        assert_eq!("p2".parse::<Priority>().unwrap(), Priority::P2);
        assert_eq!("3".parse::<Priority>().unwrap(), Priority::P3);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_priority_serde_clamps() {
        let priority: Priority = serde_json::from_str("9").unwrap();
        assert_eq!(priority, Priority::P3);

        let json = serde_json::to_string(&Priority::P1).unwrap();
        assert_eq!(json, "1");
    }

    #[test]
    fn test_blocker_always_p0() {
        for parent in 0..=3 {
            assert_eq!(
                discovered_priority(Priority::new(parent), DiscoveryKind::Blocker),
                Priority::P0
            );
        }
    }

    #[test]
    fn test_related_relaxes_one_band() {
        assert_eq!(
            discovered_priority(Priority::P0, DiscoveryKind::Related),
            Priority::P1
        );
        assert_eq!(
            discovered_priority(Priority::P2, DiscoveryKind::Related),
            Priority::P3
        );
        assert_eq!(
            discovered_priority(Priority::P3, DiscoveryKind::Related),
            Priority::P3
        );
    }

    #[test]
    fn test_background_always_p2() {
        for parent in 0..=3 {
            assert_eq!(
                discovered_priority(Priority::new(parent), DiscoveryKind::Background),
                Priority::P2
            );
        }
    }

    #[test]
    fn test_unspecified_inherits_parent() {
        for parent in 0..=3 {
            let parent = Priority::new(parent);
            assert_eq!(discovered_priority(parent, DiscoveryKind::Unspecified), parent);
        }
    }
}
