//! Keyboard-driven calibration session.
//!
//! The host starts and stops the session explicitly and routes key presses
//! into it; the session turns them into [`SessionCommand`]s for the engine.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationFamily;

/// Which overlay the keys currently edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalibrationMode {
    #[default]
    Ref,
    Overlay,
}

impl CalibrationMode {
    pub const ALL: [Self; 2] = [Self::Ref, Self::Overlay];

    pub fn family(self) -> CalibrationFamily {
        match self {
            Self::Ref => CalibrationFamily::Reference,
            Self::Overlay => CalibrationFamily::Overlay,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Ref => Self::Overlay,
            Self::Overlay => Self::Ref,
        }
    }

    /// Next mode in declaration order, wrapping around.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }

    pub fn as_str(self) -> &'static str {
        self.family().as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    Left,
    Right,
    Up,
    Down,
    Plus,
    Minus,
    ToggleMode,
    NextMode,
    SelectRef,
    SelectOverlay,
}

impl SessionKey {
    /// Maps a DOM `KeyboardEvent.key` value.
    pub fn from_dom_key(key: &str) -> Option<Self> {
        Some(match key {
            "ArrowLeft" => Self::Left,
            "ArrowRight" => Self::Right,
            "ArrowUp" => Self::Up,
            "ArrowDown" => Self::Down,
            "+" | "=" => Self::Plus,
            "-" | "_" => Self::Minus,
            "m" | "M" => Self::ToggleMode,
            "n" | "N" => Self::NextMode,
            "r" | "R" => Self::SelectRef,
            "o" | "O" => Self::SelectOverlay,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: SessionKey,
    /// Modifier held: use the large translation step.
    pub large_step: bool,
    /// Focus is on a text-entry element.
    pub from_text_input: bool,
}

impl KeyPress {
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            large_step: false,
            from_text_input: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    pub step: f64,
    pub large_step: f64,
    pub scale_step: f64,
    pub initial_mode: CalibrationMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            step: 1.0,
            large_step: 10.0,
            scale_step: 0.005,
            initial_mode: CalibrationMode::Ref,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionCommand {
    Nudge {
        family: CalibrationFamily,
        dx: f64,
        dy: f64,
    },
    Scale {
        family: CalibrationFamily,
        delta: f64,
    },
    ModeChanged(CalibrationMode),
}

#[derive(Debug, Clone)]
pub struct CalibrationSession {
    config: SessionConfig,
    active: bool,
    mode: CalibrationMode,
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl CalibrationSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            active: false,
            mode: config.initial_mode,
            config,
        }
    }

    pub fn start(&mut self) {
        if !self.active {
            self.active = true;
            tracing::info!(mode = self.mode.as_str(), "calibration session started");
        }
    }

    pub fn stop(&mut self) {
        if self.active {
            self.active = false;
            tracing::info!("calibration session stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn mode(&self) -> CalibrationMode {
        self.mode
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SessionConfig) {
        self.config = config;
    }

    /// Interprets one key press. Returns `None` when inactive, when typing
    /// into a text field, or when the key changes nothing.
    pub fn handle_key(&mut self, press: KeyPress) -> Option<SessionCommand> {
        if !self.active || press.from_text_input {
            return None;
        }
        let family = self.mode.family();
        let step = if press.large_step {
            self.config.large_step
        } else {
            self.config.step
        };
        let nudge = |dx: f64, dy: f64| SessionCommand::Nudge { family, dx, dy };

        match press.key {
            SessionKey::Left => Some(nudge(-step, 0.0)),
            SessionKey::Right => Some(nudge(step, 0.0)),
            SessionKey::Up => Some(nudge(0.0, -step)),
            SessionKey::Down => Some(nudge(0.0, step)),
            SessionKey::Plus => Some(SessionCommand::Scale {
                family,
                delta: self.config.scale_step,
            }),
            SessionKey::Minus => Some(SessionCommand::Scale {
                family,
                delta: -self.config.scale_step,
            }),
            SessionKey::ToggleMode => self.switch_to(self.mode.toggled()),
            SessionKey::NextMode => self.switch_to(self.mode.next()),
            SessionKey::SelectRef => self.switch_to(CalibrationMode::Ref),
            SessionKey::SelectOverlay => self.switch_to(CalibrationMode::Overlay),
        }
    }

    fn switch_to(&mut self, mode: CalibrationMode) -> Option<SessionCommand> {
        if mode == self.mode {
            return None;
        }
        self.mode = mode;
        tracing::info!(mode = mode.as_str(), "calibration mode switched");
        Some(SessionCommand::ModeChanged(mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active() -> CalibrationSession {
        let mut session = CalibrationSession::default();
        session.start();
        session
    }

    #[test]
    fn test_inactive_session_ignores_keys() {
        let mut session = CalibrationSession::default();
        assert_eq!(session.handle_key(KeyPress::new(SessionKey::Left)), None);
        session.start();
        session.stop();
        assert_eq!(session.handle_key(KeyPress::new(SessionKey::Left)), None);
    }

    #[test]
    fn test_text_input_suppresses_keys() {
        let mut session = active();
        let press = KeyPress {
            from_text_input: true,
            ..KeyPress::new(SessionKey::Plus)
        };
        assert_eq!(session.handle_key(press), None);
    }

    #[test]
    fn test_arrow_steps() {
        let mut session = active();
        assert_eq!(
            session.handle_key(KeyPress::new(SessionKey::Up)),
            Some(SessionCommand::Nudge {
                family: CalibrationFamily::Reference,
                dx: 0.0,
                dy: -1.0
            })
        );
        let large = KeyPress {
            large_step: true,
            ..KeyPress::new(SessionKey::Right)
        };
        assert_eq!(
            session.handle_key(large),
            Some(SessionCommand::Nudge {
                family: CalibrationFamily::Reference,
                dx: 10.0,
                dy: 0.0
            })
        );
    }

    #[test]
    fn test_scale_keys_follow_mode() {
        let mut session = active();
        session.handle_key(KeyPress::new(SessionKey::SelectOverlay));
        assert_eq!(
            session.handle_key(KeyPress::new(SessionKey::Minus)),
            Some(SessionCommand::Scale {
                family: CalibrationFamily::Overlay,
                delta: -0.005
            })
        );
    }

    #[test]
    fn test_mode_switching() {
        let mut session = active();
        assert_eq!(session.mode(), CalibrationMode::Ref);
        assert_eq!(
            session.handle_key(KeyPress::new(SessionKey::ToggleMode)),
            Some(SessionCommand::ModeChanged(CalibrationMode::Overlay))
        );
        assert_eq!(
            session.handle_key(KeyPress::new(SessionKey::NextMode)),
            Some(SessionCommand::ModeChanged(CalibrationMode::Ref))
        );
        // Selecting the current mode is a no-op.
        assert_eq!(session.handle_key(KeyPress::new(SessionKey::SelectRef)), None);
        assert_eq!(
            session.handle_key(KeyPress::new(SessionKey::SelectOverlay)),
            Some(SessionCommand::ModeChanged(CalibrationMode::Overlay))
        );
    }

    #[test]
    fn test_dom_key_mapping() {
        assert_eq!(SessionKey::from_dom_key("ArrowLeft"), Some(SessionKey::Left));
        assert_eq!(SessionKey::from_dom_key("="), Some(SessionKey::Plus));
        assert_eq!(SessionKey::from_dom_key("_"), Some(SessionKey::Minus));
        assert_eq!(SessionKey::from_dom_key("n"), Some(SessionKey::NextMode));
        assert_eq!(SessionKey::from_dom_key("N"), Some(SessionKey::NextMode));
        // Tab keeps moving focus.
        assert_eq!(SessionKey::from_dom_key("Tab"), None);
        assert_eq!(SessionKey::from_dom_key("O"), Some(SessionKey::SelectOverlay));
        assert_eq!(SessionKey::from_dom_key("x"), None);
    }
}
