use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

mod community;
mod config;
mod emissions;
mod error;
mod fields;
mod garden;
mod models;
mod onboarding;
mod profile;
mod projections;
mod sensors;
mod tips;


use anyhow::Context;
use config::{AppConfig, SensorSource};
use emissions::{estimate_impact, ActivityCategory, EmissionFactorTable, FeedbackTone};
use error::ApiError;
use garden::GardenView;
use models::{ActivityInput, ApiResponse, EventKind, LogEvent, LoggedActivity, QueryResult};
use onboarding::{compute_baseline, OnboardingForm, OnboardingProfile, OnboardingWizard, WizardState};
use projections::{CategoryBreakdown, Dashboard, ImpactProjector};
use sensors::{DemandLevel, SensorHub, SensorReading, SensorSample};
use profile::{ProfileUpdate, ProfileView};
use tips::{TipFilter, TipView, TipsSummary};

/// Event-driven HTTP API
/// Never edits the activity log, only appends
/// All user state derived from the log
#[derive(Clone)]
struct AppState {
    log_path: PathBuf,
    config: Arc<AppConfig>,
    factors: Arc<EmissionFactorTable>,
    /// Onboarding wizards in progress. Never persisted.
    wizards: Arc<Mutex<HashMap<Uuid, OnboardingWizard>>>,
    sensors: SensorHub,
    /// Serializes appends, and check-then-append sequences.
    log_lock: Arc<Mutex<()>>,
}

impl AppState {
    fn new(config: AppConfig) -> Self {
        Self {
            log_path: config.log_path.clone(),
            config: Arc::new(config),
            factors: Arc::new(EmissionFactorTable::default()),
            wizards: Arc::new(Mutex::new(HashMap::new())),
            sensors: SensorHub::new(),
            log_lock: Arc::new(Mutex::new(())),
        }
    }

    fn projector(&self) -> ImpactProjector {
        ImpactProjector::new(&self.log_path)
    }

    async fn append(&self, event: &LogEvent) -> Result<(), ApiError> {
        let _guard = self.log_lock.lock().await;
        write_event(&self.log_path, event)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_json);

    if let Some(parent) = config.log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }

    match serde_json::to_string(&config) {
        Ok(dump) => info!(config = %dump, "configuration loaded"),
        Err(err) => warn!(error = %err, "configuration could not be serialized"),
    }

    let state = AppState::new(config.clone());
    if let Some(source) = config.sensor_source.clone() {
        spawn_sensor_reader(source, state.sensors.clone());
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!(
        addr = %config.bind_addr,
        log_path = %config.log_path.display(),
        field_policy = ?config.field_policy,
        "server running"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn spawn_sensor_reader(source: SensorSource, hub: SensorHub) {
    tokio::spawn(async move {
        info!(source = ?source, "starting sensor bridge");
        let result = match &source {
            SensorSource::Stdin => {
                sensors::run_line_reader(BufReader::new(tokio::io::stdin()), hub).await
            }
            SensorSource::Path(path) => match tokio::fs::File::open(path).await {
                Ok(file) => sensors::run_line_reader(BufReader::new(file), hub).await,
                Err(err) => Err(err),
            },
        };
        if let Err(err) = result {
            error!(source = ?source, error = %err, "sensor bridge stopped");
        }
    });
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/events", get(list_events))
        .route("/activities/categories", get(list_categories))
        .route("/activities/estimate", post(estimate_activity))
        .route("/activities", post(create_activity).get(list_activities))
        .route("/onboarding/baseline", post(onboarding_baseline))
        .route("/onboarding/sessions", post(create_wizard))
        .route("/onboarding/sessions/:id", get(get_wizard))
        .route("/onboarding/sessions/:id/answers", post(answer_wizard))
        .route("/onboarding/sessions/:id/next", post(next_wizard_step))
        .route("/onboarding/sessions/:id/previous", post(previous_wizard_step))
        .route("/garden", get(get_garden))
        .route("/dashboard", get(get_dashboard))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/export", get(export_profile))
        .route("/projections/categories", get(get_categories))
        .route("/projections/trend", get(get_trend))
        .route("/query", post(handle_query))
        .route("/community/challenges", get(list_challenges))
        .route("/community/challenges/:id/join", post(join_challenge))
        .route("/community/leaderboard", get(get_leaderboard))
        .route("/tips", get(list_tips))
        .route("/tips/summary", get(tips_summary))
        .route("/tips/:id/adopt", post(adopt_tip))
        .route("/sensors", get(get_sensors))
        .route("/api/data", get(get_sensors))
        .route("/sensors/history", get(get_sensor_history))
        .route("/sensors/demand", get(get_sensor_demand))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "Carbon Crusaders API v0.1.0"
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// Raw event log (read-only)
async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let lines = match read_log(&state.log_path) {
        Ok(lines) => lines,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let events = lines
        .iter()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();
    Ok(Json(events))
}

#[derive(Serialize)]
struct CategoryInfo {
    id: ActivityCategory,
    label: &'static str,
}

async fn list_categories() -> Json<Vec<CategoryInfo>> {
    Json(
        ActivityCategory::ALL
            .iter()
            .map(|&id| CategoryInfo { id, label: id.label() })
            .collect(),
    )
}

/// Estimate an activity without recording it
async fn estimate_activity(
    State(state): State<AppState>,
    Json(input): Json<ActivityInput>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let category = ActivityCategory::parse(&input.category)?;
    let policy = input.policy.unwrap_or(state.config.field_policy);
    let (entry, estimate) = estimate_impact(category, &input.fields, policy, &state.factors)?;

    Ok(Json(serde_json::json!({
        "entry": entry,
        "estimate": estimate,
    })))
}

/// Log an activity
/// Appends to the activity log (append-only, never edit)
async fn create_activity(
    State(state): State<AppState>,
    Json(input): Json<ActivityInput>,
) -> Result<Json<ApiResponse>, ApiError> {
    let category = ActivityCategory::parse(&input.category)?;
    let policy = input.policy.unwrap_or(state.config.field_policy);
    let (entry, estimate) = estimate_impact(category, &input.fields, policy, &state.factors)?;
    let tone = FeedbackTone::draw(&mut rand::thread_rng(), state.config.positive_tone_probability);

    let event = LogEvent::now(EventKind::ActivityLogged {
        entry: entry.clone(),
        estimate: estimate.clone(),
        tone,
    });
    state.append(&event).await?;

    let garden = state.projector().history().garden();
    info!(
        id = %event.id,
        category = ?category,
        co2_kg = estimate.co2_kg,
        co2_saved_kg = estimate.co2_saved_kg,
        garden_level = garden.level,
        "activity logged"
    );

    Ok(Json(ApiResponse::success(
        tone.describe(estimate.co2_kg),
        serde_json::json!({
            "id": event.id,
            "title": tone.title(),
            "tone": tone,
            "entry": entry,
            "estimate": estimate,
            "garden": garden,
        }),
    )))
}

async fn list_activities(State(state): State<AppState>) -> Json<Vec<LoggedActivity>> {
    Json(state.projector().history().activities)
}

fn baseline_message(baseline_kg: i64) -> String {
    format!(
        "Your baseline carbon footprint: {baseline_kg} kg CO₂/month. Let's reduce it together!"
    )
}

async fn record_baseline(
    state: &AppState,
    profile: OnboardingProfile,
    baseline_kg: i64,
) -> Result<(), ApiError> {
    let event = LogEvent::now(EventKind::OnboardingCompleted { profile, baseline_kg });
    state.append(&event).await?;
    info!(id = %event.id, baseline_kg, "onboarding completed");
    Ok(())
}

/// Score a complete profile in one request
async fn onboarding_baseline(
    State(state): State<AppState>,
    Json(form): Json<OnboardingForm>,
) -> Result<Json<ApiResponse>, ApiError> {
    let profile = OnboardingProfile::from_form(&form, state.config.field_policy)?;
    let baseline_kg = compute_baseline(&profile);
    record_baseline(&state, profile.clone(), baseline_kg).await?;

    Ok(Json(ApiResponse::success(
        baseline_message(baseline_kg),
        serde_json::json!({
            "profile": profile,
            "baseline_kg": baseline_kg,
        }),
    )))
}

#[derive(Serialize)]
struct WizardResponse {
    session_id: Uuid,
    #[serde(flatten)]
    state: WizardState,
}

async fn create_wizard(State(state): State<AppState>) -> Json<WizardResponse> {
    let wizard = OnboardingWizard::new();
    let session_id = Uuid::new_v4();
    let response = WizardResponse {
        session_id,
        state: wizard.state(),
    };
    state.wizards.lock().await.insert(session_id, wizard);
    Json(response)
}

fn missing_wizard(id: Uuid) -> ApiError {
    ApiError::NotFound(format!("onboarding session {id}"))
}

async fn get_wizard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardResponse>, ApiError> {
    let wizards = state.wizards.lock().await;
    let wizard = wizards.get(&id).ok_or_else(|| missing_wizard(id))?;
    Ok(Json(WizardResponse {
        session_id: id,
        state: wizard.state(),
    }))
}

async fn answer_wizard(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(answers): Json<OnboardingForm>,
) -> Result<Json<WizardResponse>, ApiError> {
    let mut wizards = state.wizards.lock().await;
    let wizard = wizards.get_mut(&id).ok_or_else(|| missing_wizard(id))?;
    wizard.answer(answers);
    Ok(Json(WizardResponse {
        session_id: id,
        state: wizard.state(),
    }))
}

/// Advance the wizard; the last step scores the profile and closes the session
///
/// The session closes only once the baseline is on the log. A failed append
/// leaves the wizard on its last step so the client can retry.
async fn next_wizard_step(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardResponse>, ApiError> {
    let mut wizards = state.wizards.lock().await;
    let mut advanced = wizards.get(&id).ok_or_else(|| missing_wizard(id))?.clone();
    let wizard_state = advanced.next(state.config.field_policy)?;

    match &wizard_state {
        WizardState::Complete { profile, baseline_kg } => {
            record_baseline(&state, profile.clone(), *baseline_kg).await?;
            wizards.remove(&id);
        }
        WizardState::InProgress { .. } => {
            wizards.insert(id, advanced);
        }
    }
    drop(wizards);

    Ok(Json(WizardResponse {
        session_id: id,
        state: wizard_state,
    }))
}

async fn previous_wizard_step(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WizardResponse>, ApiError> {
    let mut wizards = state.wizards.lock().await;
    let wizard = wizards.get_mut(&id).ok_or_else(|| missing_wizard(id))?;
    Ok(Json(WizardResponse {
        session_id: id,
        state: wizard.previous(),
    }))
}

async fn get_garden(State(state): State<AppState>) -> Json<GardenView> {
    Json(state.projector().history().garden())
}

async fn get_dashboard(State(state): State<AppState>) -> Json<Dashboard> {
    let today = Utc::now().date_naive();
    Json(
        state
            .projector()
            .history()
            .dashboard(today, state.config.monthly_goal_kg),
    )
}

async fn get_profile(State(state): State<AppState>) -> Json<ProfileView> {
    let today = Utc::now().date_naive();
    Json(
        state
            .projector()
            .history()
            .profile_view(today, state.config.monthly_goal_kg),
    )
}

/// Save profile edits as a fresh `profile_updated` snapshot
async fn update_profile(
    State(state): State<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ApiResponse>, ApiError> {
    let policy = update.policy.unwrap_or(state.config.field_policy);
    let _guard = state.log_lock.lock().await;
    let current = state.projector().history().profile();
    let profile = update.apply(&current, policy)?;

    let event = LogEvent::now(EventKind::ProfileUpdated {
        profile: profile.clone(),
    });
    write_event(&state.log_path, &event)?;
    info!(id = %event.id, monthly_goal_kg = ?profile.monthly_goal_kg, "profile updated");

    Ok(Json(ApiResponse::success(
        "Your profile changes have been saved successfully.",
        serde_json::json!({
            "title": "Profile Updated! ✅",
            "profile": profile,
        }),
    )))
}

/// Download every recorded event, one JSON object per line
async fn export_profile(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let events = state.projector().events();
    let mut body = String::new();
    for event in &events {
        body.push_str(&serde_json::to_string(event)?);
        body.push('\n');
    }
    info!(events = events.len(), "data export started");

    Ok((
        [
            (header::CONTENT_TYPE, "application/x-ndjson"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"carbon-crusaders-export.ndjson\"",
            ),
        ],
        body,
    ))
}

async fn get_categories(State(state): State<AppState>) -> Json<CategoryBreakdown> {
    Json(state.projector().history().breakdown())
}

async fn get_trend(State(state): State<AppState>) -> Json<QueryResult> {
    Json(state.projector().get_trend(Utc::now().date_naive()))
}

const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Handle free-text queries
async fn handle_query(
    State(state): State<AppState>,
    Json(query): Json<serde_json::Value>,
) -> Json<QueryResult> {
    let query_str = query
        .get("query")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let projector = state.projector();
    // Route to the matching projection
    let result = if ["categor", "breakdown", "share"].iter().any(|k| query_str.contains(k)) {
        projector.get_breakdown()
    } else if ["trend", "streak", "week", "timeline"].iter().any(|k| query_str.contains(k)) {
        projector.get_trend(Utc::now().date_naive())
    } else if ["garden", "plant"].iter().any(|k| query_str.contains(k)) {
        projector.get_garden()
    } else {
        // Default: most recent activities
        let activities = projector.history().activities;
        let recent: Vec<&LoggedActivity> =
            activities.iter().rev().take(RECENT_ACTIVITY_LIMIT).collect();
        QueryResult {
            query: query_str.clone(),
            result_type: "recent".to_string(),
            data: serde_json::json!({ "activities": recent }),
        }
    };

    Json(result)
}

async fn list_challenges(State(state): State<AppState>) -> Json<Vec<community::ChallengeView>> {
    let history = state.projector().history();
    Json(community::challenge_board(&history.joined_challenges))
}

async fn join_challenge(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let _guard = state.log_lock.lock().await;
    let history = state.projector().history();
    let challenge = community::validate_join(&id, &history.joined_challenges)?;

    let event = LogEvent::now(EventKind::ChallengeJoined {
        challenge_id: challenge.id.to_string(),
    });
    write_event(&state.log_path, &event)?;
    info!(challenge = challenge.id, "challenge joined");

    Ok(Json(ApiResponse::success(
        "You've successfully joined the challenge. Start logging activities to make progress!",
        serde_json::json!({
            "title": "Challenge Joined! 🎯",
            "challenge": challenge,
        }),
    )))
}

async fn get_leaderboard(State(state): State<AppState>) -> Json<Vec<community::LeaderboardEntry>> {
    let history = state.projector().history();
    let today = Utc::now().date_naive();
    let saved = history.total_saved();
    Json(community::leaderboard(
        saved,
        history.streak(today),
        garden::garden_level(saved),
    ))
}

async fn list_tips(
    State(state): State<AppState>,
    Query(filter): Query<TipFilter>,
) -> Json<Vec<TipView>> {
    let history = state.projector().history();
    Json(tips::list_tips(&filter, &history.adopted_tips))
}

async fn tips_summary(State(state): State<AppState>) -> Json<TipsSummary> {
    Json(tips::summary(&state.projector().history().adopted_tips))
}

async fn adopt_tip(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    let _guard = state.log_lock.lock().await;
    let history = state.projector().history();
    let tip = tips::validate_adopt(&id, &history.adopted_tips)?;

    let event = LogEvent::now(EventKind::TipAdopted {
        tip_id: tip.id.to_string(),
    });
    write_event(&state.log_path, &event)?;
    info!(tip = tip.id, "tip adopted");

    Ok(Json(ApiResponse::success(
        tips::adoption_message(tip),
        serde_json::json!({
            "title": FeedbackTone::Positive.title(),
            "tip": tip,
        }),
    )))
}

async fn get_sensors(State(state): State<AppState>) -> Json<SensorReading> {
    Json(state.sensors.latest().await)
}

async fn get_sensor_history(State(state): State<AppState>) -> Json<Vec<SensorSample>> {
    Json(state.sensors.history().await)
}

async fn get_sensor_demand(State(state): State<AppState>) -> Json<serde_json::Value> {
    let reading = state.sensors.latest().await;
    let level = DemandLevel::classify(&reading);
    Json(serde_json::json!({
        "level": level,
        "label": level.label(),
        "reading": reading,
    }))
}

// Helper functions

fn write_event(path: &FsPath, event: &LogEvent) -> Result<(), ApiError> {
    let line = format!("{}\n", serde_json::to_string(event)?);
    append_to_log(path, &line)?;
    Ok(())
}

fn append_to_log(path: &FsPath, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    file.write_all(line.as_bytes())?;
    Ok(())
}

fn read_log(path: &FsPath) -> std::io::Result<Vec<String>> {
    use std::io::BufRead;

    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);

    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            events.push(line);
        }
    }

    Ok(events)
}
