use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::emissions::{ActivityCategory, ActivityEntry, Meal, Vehicle};
use crate::garden::{garden_level, GardenView};
use crate::models::{EventKind, LogEvent, LoggedActivity, QueryResult};
use crate::onboarding::OnboardingProfile;
use crate::profile::{ProfileStats, ProfileView, UserProfile};

pub const DEFAULT_MONTHLY_GOAL_KG: f64 = 150.0;

const WEEK_WARRIOR_DAYS: u32 = 7;
const GREEN_COMMUTER_TRIPS: u32 = 10;
const PLANT_PIONEER_MEALS: u32 = 50;
const ENERGY_SAVER_REDUCTION_PCT: u32 = 20;

/// Reads the append-only log and derives every user-facing aggregate.
/// Nothing here writes; all state is recomputed per call.
pub struct ImpactProjector {
    log_path: PathBuf,
}

impl ImpactProjector {
    pub fn new(log_path: &Path) -> Self {
        Self {
            log_path: log_path.to_path_buf(),
        }
    }

    /// Every well-formed event in log order. Malformed lines are skipped.
    pub fn events(&self) -> Vec<LogEvent> {
        let file = match std::fs::File::open(&self.log_path) {
            Ok(file) => file,
            Err(_) => return Vec::new(),
        };

        std::io::BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(idx, line)| match serde_json::from_str::<LogEvent>(&line) {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::warn!(line = idx + 1, error = %err, "skipping malformed log line");
                    None
                }
            })
            .collect()
    }

    pub fn history(&self) -> History {
        History::from_events(self.events())
    }

    pub fn get_breakdown(&self) -> QueryResult {
        QueryResult {
            query: "categories".to_string(),
            result_type: "breakdown".to_string(),
            data: serde_json::to_value(self.history().breakdown()).unwrap_or_default(),
        }
    }

    pub fn get_trend(&self, today: NaiveDate) -> QueryResult {
        let history = self.history();
        QueryResult {
            query: "trend".to_string(),
            result_type: "timeline".to_string(),
            data: serde_json::json!({
                "days": history.weekly_trend(today),
                "streak": history.streak(today),
            }),
        }
    }

    pub fn get_garden(&self) -> QueryResult {
        QueryResult {
            query: "garden".to_string(),
            result_type: "garden".to_string(),
            data: serde_json::to_value(self.history().garden()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BaselineRecord {
    pub profile: OnboardingProfile,
    pub baseline_kg: i64,
}

/// Everything the log says, split by event kind, in log order.
#[derive(Debug, Clone, Default)]
pub struct History {
    pub activities: Vec<LoggedActivity>,
    pub baseline: Option<BaselineRecord>,
    pub joined_challenges: BTreeSet<String>,
    pub adopted_tips: BTreeSet<String>,
    /// Latest saved profile, if the user ever saved one.
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryShare {
    pub category: ActivityCategory,
    pub label: &'static str,
    pub count: usize,
    pub co2_kg: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryBreakdown {
    pub categories: Vec<CategoryShare>,
    pub total_activities: usize,
    pub total_co2_kg: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub day: String,
    pub co2_kg: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Badge {
    pub name: &'static str,
    pub description: &'static str,
    pub earned: bool,
    pub progress: u32,
    pub target: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub current_streak: u32,
    pub monthly_saved_kg: f64,
    pub monthly_goal_kg: f64,
    pub goal_percent: i64,
    pub badges_earned: usize,
    pub badges_total: usize,
    pub badges: Vec<Badge>,
    pub weekly_trend: Vec<DayTotal>,
    pub categories: CategoryBreakdown,
    pub baseline_kg: Option<i64>,
    pub garden_level: usize,
}

impl History {
    pub fn from_events(events: Vec<LogEvent>) -> Self {
        let mut history = History::default();
        for LogEvent { id, recorded_at, event } in events {
            match event {
                EventKind::ActivityLogged { entry, estimate, tone } => {
                    history.activities.push(LoggedActivity {
                        id,
                        recorded_at,
                        entry,
                        estimate,
                        tone,
                    });
                }
                EventKind::OnboardingCompleted { profile, baseline_kg } => {
                    history.baseline = Some(BaselineRecord { profile, baseline_kg });
                }
                EventKind::ChallengeJoined { challenge_id } => {
                    history.joined_challenges.insert(challenge_id);
                }
                EventKind::TipAdopted { tip_id } => {
                    history.adopted_tips.insert(tip_id);
                }
                EventKind::ProfileUpdated { profile } => {
                    history.profile = Some(profile);
                }
            }
        }
        history
    }

    pub fn total_saved(&self) -> f64 {
        self.activities.iter().map(|a| a.estimate.co2_saved_kg).sum()
    }

    pub fn garden(&self) -> GardenView {
        GardenView::new(self.total_saved())
    }

    fn days_logged(&self) -> BTreeSet<NaiveDate> {
        self.activities
            .iter()
            .map(|a| a.recorded_at.date_naive())
            .collect()
    }

    /// Consecutive logging days ending today, or yesterday if today is still
    /// empty.
    pub fn streak(&self, today: NaiveDate) -> u32 {
        let days = self.days_logged();
        let mut cursor = if days.contains(&today) {
            Some(today)
        } else {
            today.pred_opt()
        };

        let mut streak = 0;
        while let Some(day) = cursor.filter(|d| days.contains(d)) {
            streak += 1;
            cursor = day.pred_opt();
        }
        streak
    }

    /// CO₂ logged per day for the seven days ending `today`, oldest first.
    pub fn weekly_trend(&self, today: NaiveDate) -> Vec<DayTotal> {
        let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for activity in &self.activities {
            *per_day.entry(activity.recorded_at.date_naive()).or_insert(0.0) +=
                activity.estimate.co2_kg;
        }

        (0..7u64)
            .rev()
            .filter_map(|offset| today.checked_sub_days(Days::new(offset)))
            .map(|date| DayTotal {
                date,
                day: date.format("%a").to_string(),
                co2_kg: per_day.get(&date).copied().unwrap_or(0.0),
            })
            .collect()
    }

    fn in_month(&self, year: i32, month: u32) -> impl Iterator<Item = &LoggedActivity> {
        self.activities.iter().filter(move |a| {
            let d = a.recorded_at.date_naive();
            d.year() == year && d.month() == month
        })
    }

    pub fn monthly_saved(&self, today: NaiveDate) -> f64 {
        self.in_month(today.year(), today.month())
            .map(|a| a.estimate.co2_saved_kg)
            .sum()
    }

    fn monthly_kwh(&self, year: i32, month: u32) -> f64 {
        self.in_month(year, month)
            .filter_map(|a| match a.entry {
                ActivityEntry::Energy { kwh, .. } => Some(kwh),
                _ => None,
            })
            .sum()
    }

    pub fn breakdown(&self) -> CategoryBreakdown {
        let positive_total: f64 = self
            .activities
            .iter()
            .map(|a| a.estimate.co2_kg.max(0.0))
            .sum();

        let mut categories: Vec<CategoryShare> = ActivityCategory::ALL
            .iter()
            .map(|&category| {
                let mine: Vec<&LoggedActivity> = self
                    .activities
                    .iter()
                    .filter(|a| a.estimate.category == category)
                    .collect();
                let positive: f64 = mine.iter().map(|a| a.estimate.co2_kg.max(0.0)).sum();
                CategoryShare {
                    category,
                    label: category.label(),
                    count: mine.len(),
                    co2_kg: mine.iter().map(|a| a.estimate.co2_kg).sum(),
                    percentage: if positive_total > 0.0 {
                        positive / positive_total * 100.0
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        categories.sort_by(|a, b| b.co2_kg.total_cmp(&a.co2_kg));

        CategoryBreakdown {
            total_activities: self.activities.len(),
            total_co2_kg: self.activities.iter().map(|a| a.estimate.co2_kg).sum(),
            categories,
        }
    }

    pub fn badges(&self, today: NaiveDate) -> Vec<Badge> {
        let streak = self.streak(today);

        let eco_trips = self
            .activities
            .iter()
            .filter(|a| {
                matches!(
                    a.entry,
                    ActivityEntry::Transport {
                        vehicle: Vehicle::Bus | Vehicle::Bike | Vehicle::Walk,
                        ..
                    }
                )
            })
            .count() as u32;

        let plant_meals = self
            .activities
            .iter()
            .filter(|a| {
                matches!(
                    a.entry,
                    ActivityEntry::Food {
                        meal: Meal::Vegetarian | Meal::Vegan,
                        ..
                    }
                )
            })
            .count() as u32;

        let (prev_year, prev_month) = match today.month() {
            1 => (today.year() - 1, 12),
            m => (today.year(), m - 1),
        };
        let last_kwh = self.monthly_kwh(prev_year, prev_month);
        let this_kwh = self.monthly_kwh(today.year(), today.month());
        let reduction_pct = if last_kwh > 0.0 {
            ((last_kwh - this_kwh) / last_kwh * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        vec![
            Badge {
                name: "Week Warrior",
                description: "7-day logging streak",
                earned: streak >= WEEK_WARRIOR_DAYS,
                progress: streak.min(WEEK_WARRIOR_DAYS),
                target: WEEK_WARRIOR_DAYS,
            },
            Badge {
                name: "Green Commuter",
                description: "Used eco transport 10 times",
                earned: eco_trips >= GREEN_COMMUTER_TRIPS,
                progress: eco_trips.min(GREEN_COMMUTER_TRIPS),
                target: GREEN_COMMUTER_TRIPS,
            },
            Badge {
                name: "Plant Pioneer",
                description: "Logged 50 plant-based meals",
                earned: plant_meals >= PLANT_PIONEER_MEALS,
                progress: plant_meals.min(PLANT_PIONEER_MEALS),
                target: PLANT_PIONEER_MEALS,
            },
            Badge {
                name: "Energy Saver",
                description: "Reduced energy use by 20%",
                earned: reduction_pct >= f64::from(ENERGY_SAVER_REDUCTION_PCT),
                progress: (reduction_pct.floor() as u32).min(ENERGY_SAVER_REDUCTION_PCT),
                target: ENERGY_SAVER_REDUCTION_PCT,
            },
        ]
    }

    pub fn profile(&self) -> UserProfile {
        self.profile.clone().unwrap_or_default()
    }

    /// The user's own goal when they set one, else `default_goal_kg`.
    pub fn monthly_goal(&self, default_goal_kg: f64) -> f64 {
        self.profile
            .as_ref()
            .and_then(|p| p.monthly_goal_kg)
            .unwrap_or(default_goal_kg)
    }

    pub fn profile_view(&self, today: NaiveDate, default_goal_kg: f64) -> ProfileView {
        ProfileView {
            profile: self.profile(),
            effective_monthly_goal_kg: self.monthly_goal(default_goal_kg),
            stats: ProfileStats {
                monthly_saved_kg: self.monthly_saved(today),
                current_streak: self.streak(today),
                garden_level: garden_level(self.total_saved()),
            },
        }
    }

    pub fn dashboard(&self, today: NaiveDate, default_goal_kg: f64) -> Dashboard {
        let monthly_goal_kg = self.monthly_goal(default_goal_kg);
        let monthly_saved_kg = self.monthly_saved(today);
        let badges = self.badges(today);
        let goal_percent = if monthly_goal_kg > 0.0 {
            (monthly_saved_kg / monthly_goal_kg * 100.0).round() as i64
        } else {
            0
        };

        Dashboard {
            current_streak: self.streak(today),
            monthly_saved_kg,
            monthly_goal_kg,
            goal_percent,
            badges_earned: badges.iter().filter(|b| b.earned).count(),
            badges_total: badges.len(),
            badges,
            weekly_trend: self.weekly_trend(today),
            categories: self.breakdown(),
            baseline_kg: self.baseline.as_ref().map(|b| b.baseline_kg),
            garden_level: garden_level(self.total_saved()),
        }
    }
}
