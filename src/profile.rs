//! User profile and notification preferences.
//!
//! Every save is recorded as a full snapshot; the latest one wins.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::fields::{self, FieldPolicy, FieldValue};
use crate::onboarding::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub daily_reminders: bool,
    pub weekly_reports: bool,
    pub challenge_updates: bool,
    pub tips: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            daily_reminders: true,
            weekly_reports: true,
            challenge_updates: true,
            tips: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub location: Option<Location>,
    /// Replaces the server-wide monthly savings goal when set.
    pub monthly_goal_kg: Option<f64>,
    pub notifications: NotificationPreferences,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "Eco Warrior".to_string(),
            email: "eco.warrior@example.com".to_string(),
            location: Some(Location::Chennai),
            monthly_goal_kg: None,
            notifications: NotificationPreferences::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationUpdate {
    pub daily_reminders: Option<bool>,
    pub weekly_reports: Option<bool>,
    pub challenge_updates: Option<bool>,
    pub tips: Option<bool>,
}

/// Profile edits as the client sends them. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub location: Option<FieldValue>,
    /// A blank goal clears the override.
    pub monthly_goal_kg: Option<FieldValue>,
    #[serde(default)]
    pub notifications: NotificationUpdate,
    /// Overrides the server's default field policy for this request.
    pub policy: Option<FieldPolicy>,
}

fn looks_like_email(raw: &str) -> bool {
    if raw.contains(char::is_whitespace) {
        return false;
    }
    match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

impl ProfileUpdate {
    /// Applies the edits on top of `current`.
    ///
    /// Name and email are checked under both policies. Under `Fallback` an
    /// unknown location or a goal that is not a positive number leaves the
    /// current value in place.
    pub fn apply(
        &self,
        current: &UserProfile,
        policy: FieldPolicy,
    ) -> Result<UserProfile, ValidationError> {
        let mut profile = current.clone();

        if let Some(name) = &self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ValidationError::Missing { field: "name" });
            }
            profile.name = name.to_string();
        }

        if let Some(email) = &self.email {
            let email = email.trim();
            if !looks_like_email(email) {
                return Err(ValidationError::Malformed {
                    field: "email",
                    value: email.to_string(),
                    expected: "an address like name@example.com",
                });
            }
            profile.email = email.to_string();
        }

        let location = fields::optional_option::<Location>(self.location.as_ref(), policy)?;
        if let Some(location) = location {
            profile.location = Some(location);
        }

        if let Some(goal) = &self.monthly_goal_kg {
            if goal.as_text().is_empty() {
                profile.monthly_goal_kg = None;
            } else {
                let kg = fields::quantity("monthlyGoalKg", Some(goal), policy, None)?;
                if kg > 0.0 {
                    profile.monthly_goal_kg = Some(kg);
                } else if policy == FieldPolicy::Strict {
                    return Err(ValidationError::Malformed {
                        field: "monthlyGoalKg",
                        value: goal.as_text().into_owned(),
                        expected: "a positive number of kg",
                    });
                }
            }
        }

        let n = self.notifications;
        let prefs = &mut profile.notifications;
        prefs.daily_reminders = n.daily_reminders.unwrap_or(prefs.daily_reminders);
        prefs.weekly_reports = n.weekly_reports.unwrap_or(prefs.weekly_reports);
        prefs.challenge_updates = n.challenge_updates.unwrap_or(prefs.challenge_updates);
        prefs.tips = n.tips.unwrap_or(prefs.tips);

        Ok(profile)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileStats {
    pub monthly_saved_kg: f64,
    pub current_streak: u32,
    pub garden_level: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub effective_monthly_goal_kg: f64,
    pub stats: ProfileStats,
}
