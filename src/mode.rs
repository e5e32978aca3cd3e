//! # Global operating mode.
//!
//! [`Mode`] is the closed set of phases the controlled system moves through.
//! The [`Supervisor`](crate::Supervisor) owns the authoritative value and copies
//! it into every task's slot on [`broadcast`](crate::Supervisor::broadcast).
//!
//! ```text
//!   Disabled ──► Autonomous ──► Disabled ──► Teleoperated ──► Disabled
//!      ▲                                                         │
//!      └─────────────────────────────────────────────────────────┘
//! ```
//! Any transition is legal; the supervisor does not enforce an order.

use std::fmt;
use std::str::FromStr;

/// Operating phase of the controlled system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    /// Outputs must stay idle. Initial phase.
    #[default]
    Disabled,
    /// Pre-programmed behavior without operator input.
    Autonomous,
    /// Operator-driven behavior.
    Teleoperated,
}

impl Mode {
    /// Every mode, in declaration order.
    pub const ALL: [Mode; 3] = [Mode::Disabled, Mode::Autonomous, Mode::Teleoperated];

    /// Returns a short stable label (lowercase) for logs and events.
    pub fn as_label(&self) -> &'static str {
        match self {
            Mode::Disabled => "disabled",
            Mode::Autonomous => "autonomous",
            Mode::Teleoperated => "teleop",
        }
    }

    /// True for the two enabled phases.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Mode::Disabled)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Error returned when parsing an unknown mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode {0:?} (expected disabled, autonomous or teleop)")]
pub struct ParseModeError(String);

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" => Ok(Mode::Disabled),
            "autonomous" | "auto" => Ok(Mode::Autonomous),
            "teleop" | "teleoperated" => Ok(Mode::Teleoperated),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}
