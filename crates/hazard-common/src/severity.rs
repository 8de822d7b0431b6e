//! Winter-weather impact severity categories.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity category of a hazard polygon.
///
/// The derived ordering is the compositing priority:
/// `Extreme > Major > Moderate > Minor > Elevated > None`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityCategory {
    #[default]
    None,
    Elevated,
    Minor,
    Moderate,
    Major,
    Extreme,
}

impl SeverityCategory {
    /// All categories in ascending priority order.
    pub const ALL: [SeverityCategory; 6] = [
        SeverityCategory::None,
        SeverityCategory::Elevated,
        SeverityCategory::Minor,
        SeverityCategory::Moderate,
        SeverityCategory::Major,
        SeverityCategory::Extreme,
    ];

    /// Numeric priority stored in a priority grid (0 = no hazard).
    pub fn priority(self) -> u8 {
        match self {
            SeverityCategory::None => 0,
            SeverityCategory::Elevated => 1,
            SeverityCategory::Minor => 2,
            SeverityCategory::Moderate => 3,
            SeverityCategory::Major => 4,
            SeverityCategory::Extreme => 5,
        }
    }

    /// Inverse of [`SeverityCategory::priority`]; out-of-range values map to `None`.
    pub fn from_priority(priority: u8) -> Self {
        match priority {
            1 => SeverityCategory::Elevated,
            2 => SeverityCategory::Minor,
            3 => SeverityCategory::Moderate,
            4 => SeverityCategory::Major,
            5 => SeverityCategory::Extreme,
            _ => SeverityCategory::None,
        }
    }

    /// Fill color (r, g, b) used when rendering this category.
    pub fn color(self) -> (u8, u8, u8) {
        match self {
            SeverityCategory::None => (0, 0, 0),
            SeverityCategory::Elevated => (142, 202, 230),
            SeverityCategory::Minor => (255, 230, 100),
            SeverityCategory::Moderate => (255, 160, 50),
            SeverityCategory::Major => (230, 40, 40),
            SeverityCategory::Extreme => (170, 40, 190),
        }
    }

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            SeverityCategory::None => "None",
            SeverityCategory::Elevated => "Elevated",
            SeverityCategory::Minor => "Minor",
            SeverityCategory::Moderate => "Moderate",
            SeverityCategory::Major => "Major",
            SeverityCategory::Extreme => "Extreme",
        }
    }

    pub fn is_none(self) -> bool {
        self == SeverityCategory::None
    }
}

impl fmt::Display for SeverityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order_matches_ord() {
        for pair in SeverityCategory::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].priority() < pair[1].priority());
        }
    }

    #[test]
    fn test_priority_roundtrip() {
        for category in SeverityCategory::ALL {
            assert_eq!(SeverityCategory::from_priority(category.priority()), category);
        }
        assert_eq!(SeverityCategory::from_priority(42), SeverityCategory::None);
    }

    #[test]
    fn test_colors_distinct() {
        let colors: std::collections::HashSet<_> =
            SeverityCategory::ALL.iter().map(|c| c.color()).collect();
        assert_eq!(colors.len(), SeverityCategory::ALL.len());
    }
}
