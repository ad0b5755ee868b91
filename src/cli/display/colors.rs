//! Color theme for CLI output

use crate::domain::api::RunningModes;
use comfy_table::Color as TableColor;

/// Color theme for terminal output
#[derive(Debug, Clone)]
pub struct ColorTheme {
    pub success: TableColor,
    pub warning: TableColor,
    pub error: TableColor,
    pub info: TableColor,
    pub muted: TableColor,
}

impl Default for ColorTheme {
    fn default() -> Self {
        Self {
            success: TableColor::Green,
            warning: TableColor::Yellow,
            error: TableColor::Red,
            info: TableColor::Cyan,
            muted: TableColor::DarkGrey,
        }
    }
}

impl ColorTheme {
    /// Color of a RUNNING IN cell
    pub fn running_color(&self, modes: &RunningModes) -> TableColor {
        match (modes.dev, modes.deploy) {
            (false, false) => self.muted,
            (true, true) => self.success,
            (true, false) => self.info,
            (false, true) => self.success,
        }
    }

    pub fn flag_color(&self, on: bool) -> TableColor {
        if on {
            self.success
        } else {
            self.muted
        }
    }
}
