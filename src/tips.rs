use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::Difficulty;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipCategory {
    Transport,
    Food,
    Energy,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Tip {
    pub id: &'static str,
    pub category: TipCategory,
    pub title: &'static str,
    pub description: &'static str,
    pub impact: Impact,
    pub co2_savings_kg: f64,
    pub difficulty: Difficulty,
    /// Implemented before tracking began.
    #[serde(skip)]
    pub preset_completed: bool,
}

pub const TIPS: [Tip; 6] = [
    Tip {
        id: "1",
        category: TipCategory::Transport,
        title: "Switch to Public Transport",
        description: "Replace 3 car trips per week with bus or metro. Save money and reduce emissions significantly.",
        impact: Impact::High,
        co2_savings_kg: 15.2,
        difficulty: Difficulty::Easy,
        preset_completed: false,
    },
    Tip {
        id: "2",
        category: TipCategory::Food,
        title: "Meatless Monday",
        description: "Try plant-based meals one day per week. Start small and gradually increase for bigger impact.",
        impact: Impact::Medium,
        co2_savings_kg: 8.5,
        difficulty: Difficulty::Easy,
        preset_completed: true,
    },
    Tip {
        id: "3",
        category: TipCategory::Energy,
        title: "LED Light Upgrade",
        description: "Replace old bulbs with LED lights. They use 75% less energy and last 25 times longer.",
        impact: Impact::Medium,
        co2_savings_kg: 12.3,
        difficulty: Difficulty::Easy,
        preset_completed: false,
    },
    Tip {
        id: "4",
        category: TipCategory::Transport,
        title: "Bike to Work",
        description: "Cycle for short distances under 5km. Great for health and zero emissions.",
        impact: Impact::High,
        co2_savings_kg: 22.1,
        difficulty: Difficulty::Medium,
        preset_completed: false,
    },
    Tip {
        id: "5",
        category: TipCategory::Energy,
        title: "Smart Thermostat",
        description: "Install a programmable thermostat to optimize heating and cooling automatically.",
        impact: Impact::High,
        co2_savings_kg: 18.7,
        difficulty: Difficulty::Hard,
        preset_completed: false,
    },
    Tip {
        id: "6",
        category: TipCategory::Food,
        title: "Local & Seasonal Food",
        description: "Buy locally grown, seasonal produce to reduce transportation emissions.",
        impact: Impact::Medium,
        co2_savings_kg: 6.8,
        difficulty: Difficulty::Medium,
        preset_completed: false,
    },
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TipFilter {
    pub category: Option<TipCategory>,
    pub impact: Option<Impact>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TipView {
    #[serde(flatten)]
    pub tip: Tip,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TipsSummary {
    pub potential_monthly_savings_kg: f64,
    pub implemented: usize,
    pub total: usize,
    pub progress_percent: i64,
}

fn is_completed(tip: &Tip, adopted: &BTreeSet<String>) -> bool {
    tip.preset_completed || adopted.contains(tip.id)
}

pub fn list_tips(filter: &TipFilter, adopted: &BTreeSet<String>) -> Vec<TipView> {
    TIPS.iter()
        .filter(|t| filter.category.map_or(true, |c| t.category == c))
        .filter(|t| filter.impact.map_or(true, |i| t.impact == i))
        .map(|t| TipView {
            tip: *t,
            completed: is_completed(t, adopted),
        })
        .collect()
}

pub fn summary(adopted: &BTreeSet<String>) -> TipsSummary {
    let implemented = TIPS.iter().filter(|t| is_completed(t, adopted)).count();
    TipsSummary {
        potential_monthly_savings_kg: TIPS.iter().map(|t| t.co2_savings_kg).sum(),
        implemented,
        total: TIPS.len(),
        progress_percent: (implemented as f64 / TIPS.len() as f64 * 100.0).round() as i64,
    }
}

/// Checks that `id` exists and has not been implemented yet.
pub fn validate_adopt(id: &str, adopted: &BTreeSet<String>) -> Result<&'static Tip, ApiError> {
    let tip = TIPS
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| ApiError::NotFound(format!("tip {id}")))?;
    if is_completed(tip, adopted) {
        return Err(ApiError::Conflict(format!("tip {:?} already implemented", tip.title)));
    }
    Ok(tip)
}

pub fn adoption_message(tip: &Tip) -> String {
    format!(
        "You'll save approximately {} kg CO₂ per month with this action.",
        tip.co2_savings_kg
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_combine() {
        let none = BTreeSet::new();
        let filter = TipFilter {
            category: Some(TipCategory::Transport),
            impact: Some(Impact::High),
        };
        let tips = list_tips(&filter, &none);
        assert_eq!(tips.len(), 2);
        assert!(tips.iter().all(|t| t.tip.category == TipCategory::Transport));
        assert_eq!(list_tips(&TipFilter::default(), &none).len(), 6);
    }

    #[test]
    fn summary_counts_preset_and_adopted() {
        let mut adopted = BTreeSet::new();
        let before = summary(&adopted);
        assert_eq!(before.implemented, 1);
        assert_eq!(before.progress_percent, 17);
        assert!((before.potential_monthly_savings_kg - 83.6).abs() < 1e-9);

        adopted.insert("4".to_string());
        assert_eq!(summary(&adopted).implemented, 2);
    }

    #[test]
    fn adopting_a_completed_tip_conflicts() {
        let adopted = BTreeSet::new();
        assert!(matches!(validate_adopt("2", &adopted), Err(ApiError::Conflict(_))));
        assert!(matches!(validate_adopt("42", &adopted), Err(ApiError::NotFound(_))));
        let tip = validate_adopt("4", &adopted).unwrap();
        assert_eq!(
            adoption_message(tip),
            "You'll save approximately 22.1 kg CO₂ per month with this action."
        );
    }
}
