//! Application settings model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Behaviour profile the app runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AppMode {
    /// Plain reminders
    #[default]
    Standard,
    /// Short, frequent nudges
    Adhd,
    /// Caregiver-assisted reminders
    Memory,
    /// Project-grouped work reminders
    Work,
}

impl AppMode {
    pub const ALL: [Self; 4] = [Self::Standard, Self::Adhd, Self::Memory, Self::Work];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Adhd => "adhd",
            Self::Memory => "memory",
            Self::Work => "work",
        }
    }
}

impl fmt::Display for AppMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or_else(|| {
                format!("unknown mode '{wanted}' (expected standard, adhd, memory or work)")
            })
    }
}

/// Application settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Active behaviour profile
    #[serde(default)]
    pub mode: AppMode,
    /// Whether the user opted into cloud sync
    #[serde(default)]
    pub sync_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.mode, AppMode::Standard);
        assert!(!settings.sync_enabled);
    }

    #[test]
    fn test_settings_tolerates_missing_fields() {
        let settings: Settings = serde_json::from_str(r#"{"mode":"adhd"}"#).unwrap();
        assert_eq!(settings.mode, AppMode::Adhd);
        assert!(!settings.sync_enabled);
    }

    #[test]
    fn test_mode_parses_its_own_label() {
        for mode in AppMode::ALL {
            assert_eq!(mode.to_string().parse::<AppMode>(), Ok(mode));
        }
        assert_eq!(" ADHD ".parse::<AppMode>(), Ok(AppMode::Adhd));
        assert!("focus".parse::<AppMode>().is_err());
    }
}
