use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::emissions::{ActivityEntry, ActivityForm, FeedbackTone, ImpactEstimate};
use crate::fields::FieldPolicy;
use crate::onboarding::OnboardingProfile;
use crate::profile::UserProfile;

/// Activity submission from the API
#[derive(Debug, Deserialize)]
pub struct ActivityInput {
    pub category: String,
    #[serde(default)]
    pub fields: ActivityForm,
    /// Overrides the server's default field policy for this request.
    pub policy: Option<FieldPolicy>,
}

/// One line of the append-only activity log
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogEvent {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub event: EventKind,
}

impl LogEvent {
    pub fn now(event: EventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            event,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    ActivityLogged {
        entry: ActivityEntry,
        estimate: ImpactEstimate,
        tone: FeedbackTone,
    },
    OnboardingCompleted {
        profile: OnboardingProfile,
        baseline_kg: i64,
    },
    ChallengeJoined {
        challenge_id: String,
    },
    TipAdopted {
        tip_id: String,
    },
    ProfileUpdated {
        profile: UserProfile,
    },
}

/// API Response
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl ApiResponse {
    pub fn success(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Query result
#[derive(Debug, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub result_type: String,
    pub data: serde_json::Value,
}

/// A logged activity as read back from the log
#[derive(Debug, Serialize, Clone)]
pub struct LoggedActivity {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub entry: ActivityEntry,
    pub estimate: ImpactEstimate,
    pub tone: FeedbackTone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}
