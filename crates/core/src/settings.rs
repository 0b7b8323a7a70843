//! Runtime settings and the per-mission snapshot taken from them.

use serde::{Deserialize, Serialize};

/// Operator-adjustable settings, persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Model used for new missions
    #[serde(default = "default_model")]
    pub model: String,

    /// Turn budget for chat replies and scans
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Require human approval before any command runs
    #[serde(default = "default_monitor_mode")]
    pub monitor_mode: bool,
}

fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_max_requests() -> u32 {
    15
}
fn default_monitor_mode() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_requests: default_max_requests(),
            monitor_mode: default_monitor_mode(),
        }
    }
}

impl Settings {
    /// Apply a partial update, returning the merged settings.
    pub fn merged(mut self, patch: SettingsPatch) -> Self {
        if let Some(model) = patch.model {
            self.model = model;
        }
        if let Some(max_requests) = patch.max_requests {
            self.max_requests = max_requests;
        }
        if let Some(monitor_mode) = patch.monitor_mode {
            self.monitor_mode = monitor_mode;
        }
        self
    }

    /// Freeze these settings for one mission.
    pub fn snapshot(&self) -> MissionSettings {
        MissionSettings {
            model: self.model.clone(),
            monitor_enabled: self.monitor_mode,
            max_turns: self.max_requests,
        }
    }
}

/// Partial settings update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub model: Option<String>,
    pub max_requests: Option<u32>,
    pub monitor_mode: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.model.is_none() && self.max_requests.is_none() && self.monitor_mode.is_none()
    }
}

/// Settings captured when a mission is submitted.
///
/// A mission reads only its snapshot, so a concurrent settings update never
/// changes the model, budget, or monitor flag of work already in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionSettings {
    pub model: String,
    pub monitor_enabled: bool,
    pub max_turns: u32,
}

impl MissionSettings {
    /// Same snapshot with a different turn budget.
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_first_run_values() {
        let settings = Settings::default();
        assert_eq!(settings.model, "gpt-3.5-turbo");
        assert_eq!(settings.max_requests, 15);
        assert!(settings.monitor_mode);
    }

    #[test]
    fn merge_only_touches_given_fields() {
        let merged = Settings::default().merged(SettingsPatch {
            monitor_mode: Some(false),
            ..Default::default()
        });
        assert!(!merged.monitor_mode);
        assert_eq!(merged.model, "gpt-3.5-turbo");
        assert_eq!(merged.max_requests, 15);
    }

    #[test]
    fn snapshot_is_detached_from_later_updates() {
        let settings = Settings::default();
        let snapshot = settings.snapshot();
        let updated = settings.merged(SettingsPatch {
            model: Some("gpt-4-turbo-preview".into()),
            max_requests: Some(3),
            monitor_mode: Some(false),
        });
        assert_eq!(snapshot.model, "gpt-3.5-turbo");
        assert_eq!(snapshot.max_turns, 15);
        assert!(snapshot.monitor_enabled);
        assert_eq!(updated.snapshot().max_turns, 3);
    }

    #[test]
    fn empty_patch_detected() {
        assert!(SettingsPatch::default().is_empty());
        assert!(!SettingsPatch { max_requests: Some(1), ..Default::default() }.is_empty());
    }
}
