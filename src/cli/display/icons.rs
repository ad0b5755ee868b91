//! Status icons for CLI output

use crate::domain::api::RunningModes;

/// Status icons for different states
pub struct StatusIcon;

impl StatusIcon {
    pub const SUCCESS: &'static str = "✓";

    pub const WARNING: &'static str = "⚠";

    pub const ERROR: &'static str = "✗";

    /// Not running anywhere
    pub const IDLE: &'static str = "○";

    /// Marks the devfile component and the active namespace
    pub const CURRENT: &'static str = "*";

    /// Icon in front of the running modes of a component
    pub fn running_icon(modes: &RunningModes) -> &'static str {
        if modes.is_empty() {
            Self::IDLE
        } else {
            Self::SUCCESS
        }
    }

    /// "Yes" or "No" with an icon, for boolean columns
    pub fn yes_no(value: bool) -> String {
        if value {
            format!("{} Yes", Self::SUCCESS)
        } else {
            format!("{} No", Self::ERROR)
        }
    }
}
