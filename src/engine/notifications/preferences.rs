//! Notification preferences and quiet hours

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Language of notification copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Pt,
}

/// Daily window during which notifications are held back
///
/// `start == end` is an empty window. A window whose end is earlier than its
/// start wraps midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub enabled: bool,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: true,
            start: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl QuietHours {
    /// Whether `time` falls inside the window, ignoring `enabled`
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// Whether notifications are held back at `now`
pub fn is_quiet_time(now: NaiveTime, quiet_hours: &QuietHours) -> bool {
    quiet_hours.enabled && quiet_hours.contains(now)
}

/// Categories and whether they are on by default
pub const DEFAULT_CATEGORIES: &[(&str, bool)] = &[
    ("matches", true),
    ("messages", true),
    ("events", true),
    ("connections", true),
    ("system", true),
    ("cultural", true),
    ("business", false),
];

/// User notification settings, transmitted with the push registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub enabled: bool,
    pub category_flags: BTreeMap<String, bool>,
    pub quiet_hours: QuietHours,
    pub language: Language,
    /// Deliver only priority notifications
    pub priority_only: bool,
    /// Cultural region filter, `"all"` for no filter
    pub region: String,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            enabled: false,
            category_flags: DEFAULT_CATEGORIES
                .iter()
                .map(|(name, on)| (name.to_string(), *on))
                .collect(),
            quiet_hours: QuietHours::default(),
            language: Language::default(),
            priority_only: false,
            region: "all".to_string(),
        }
    }
}

impl NotificationPreferences {
    /// Whether a category is switched on; unknown categories are off
    pub fn category_enabled(&self, category: &str) -> bool {
        self.category_flags.get(category).copied().unwrap_or(false)
    }
}

/// Partial update of [`NotificationPreferences`]
///
/// `enabled` is not patchable; it follows the permission and subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencesPatch {
    /// Merged into the existing flags
    #[serde(default)]
    pub category_flags: BTreeMap<String, bool>,
    pub quiet_hours: Option<QuietHours>,
    pub language: Option<Language>,
    pub priority_only: Option<bool>,
    pub region: Option<String>,
}

impl PreferencesPatch {
    pub fn category(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.category_flags.insert(name.into(), enabled);
        self
    }

    pub fn quiet_hours(mut self, quiet_hours: QuietHours) -> Self {
        self.quiet_hours = Some(quiet_hours);
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn priority_only(mut self, priority_only: bool) -> Self {
        self.priority_only = Some(priority_only);
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Merge into `preferences`; returns whether anything changed
    pub fn apply(self, preferences: &mut NotificationPreferences) -> bool {
        let before = preferences.clone();

        preferences.category_flags.extend(self.category_flags);
        if let Some(quiet_hours) = self.quiet_hours {
            preferences.quiet_hours = quiet_hours;
        }
        if let Some(language) = self.language {
            preferences.language = language;
        }
        if let Some(priority_only) = self.priority_only {
            preferences.priority_only = priority_only;
        }
        if let Some(region) = self.region {
            preferences.region = region;
        }

        *preferences != before
    }
}
