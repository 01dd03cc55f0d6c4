use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::fields::{self, FieldPolicy, FieldValue, FormOption};

/// Probability that a logged activity is framed positively.
pub const DEFAULT_POSITIVE_TONE_PROBABILITY: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityCategory {
    Transport,
    Food,
    Energy,
    Waste,
}

impl ActivityCategory {
    pub const ALL: [ActivityCategory; 4] = [Self::Transport, Self::Food, Self::Energy, Self::Waste];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Transport => "Transport",
            Self::Food => "Food",
            Self::Energy => "Energy",
            Self::Waste => "Waste",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value = FieldValue::from(raw);
        fields::optional_option::<Self>(Some(&value), FieldPolicy::Strict)?
            .ok_or(ValidationError::Missing { field: Self::FIELD })
    }
}

impl FormOption for ActivityCategory {
    const FIELD: &'static str = "category";
    const OPTIONS: &'static [(&'static str, Self)] = &[
        ("transport", Self::Transport),
        ("food", Self::Food),
        ("energy", Self::Energy),
        ("waste", Self::Waste),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vehicle {
    Car,
    Bus,
    Bike,
    Walk,
}

impl FormOption for Vehicle {
    const FIELD: &'static str = "vehicle";
    const OPTIONS: &'static [(&'static str, Self)] = &[
        ("car", Self::Car),
        ("bus", Self::Bus),
        ("bike", Self::Bike),
        ("walk", Self::Walk),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Meal {
    Meat,
    Vegetarian,
    Vegan,
}

impl FormOption for Meal {
    const FIELD: &'static str = "meal";
    const OPTIONS: &'static [(&'static str, Self)] = &[
        ("meat", Self::Meat),
        ("vegetarian", Self::Vegetarian),
        ("vegan", Self::Vegan),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnergySource {
    Electricity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WasteDisposal {
    Recycled,
    Landfill,
}

impl FormOption for WasteDisposal {
    const FIELD: &'static str = "waste";
    const OPTIONS: &'static [(&'static str, Self)] = &[
        ("recycled", Self::Recycled),
        ("landfill", Self::Landfill),
    ];
}

/// Raw activity form as submitted by the client.
///
/// `energy` is a kWh amount, `waste` a disposal route and `weight` its mass
/// in kg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityForm {
    pub distance: Option<FieldValue>,
    pub vehicle: Option<FieldValue>,
    pub meal: Option<FieldValue>,
    pub servings: Option<FieldValue>,
    pub energy: Option<FieldValue>,
    pub waste: Option<FieldValue>,
    pub weight: Option<FieldValue>,
}

/// A validated activity, ready to be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum ActivityEntry {
    Transport { distance_km: f64, vehicle: Vehicle },
    Food { meal: Meal, servings: f64 },
    Energy { source: EnergySource, kwh: f64 },
    Waste { disposal: WasteDisposal, kg: f64 },
}

impl ActivityEntry {
    /// Validates `form` for `category`. Fields belonging to other categories
    /// are ignored.
    ///
    /// Under [`FieldPolicy::Fallback`] an unset or unknown option resolves to
    /// the category's highest-emitting choice (car, meat, landfill).
    pub fn from_form(
        category: ActivityCategory,
        form: &ActivityForm,
        policy: FieldPolicy,
    ) -> Result<Self, ValidationError> {
        let entry = match category {
            ActivityCategory::Transport => Self::Transport {
                distance_km: fields::quantity("distance", form.distance.as_ref(), policy, None)?,
                vehicle: fields::required_option(form.vehicle.as_ref(), policy, Vehicle::Car)?,
            },
            ActivityCategory::Food => Self::Food {
                meal: fields::required_option(form.meal.as_ref(), policy, Meal::Meat)?,
                servings: fields::quantity("servings", form.servings.as_ref(), policy, Some(1.0))?,
            },
            ActivityCategory::Energy => Self::Energy {
                source: EnergySource::Electricity,
                kwh: fields::quantity("energy", form.energy.as_ref(), policy, None)?,
            },
            ActivityCategory::Waste => Self::Waste {
                disposal: fields::required_option(
                    form.waste.as_ref(),
                    policy,
                    WasteDisposal::Landfill,
                )?,
                kg: fields::quantity("weight", form.weight.as_ref(), policy, None)?,
            },
        };
        Ok(entry)
    }

    /// The form field and value the estimate scales with.
    pub fn quantity(&self) -> (&'static str, f64) {
        match *self {
            Self::Transport { distance_km, .. } => ("distance", distance_km),
            Self::Food { servings, .. } => ("servings", servings),
            Self::Energy { kwh, .. } => ("energy", kwh),
            Self::Waste { kg, .. } => ("weight", kg),
        }
    }

    pub fn category(&self) -> ActivityCategory {
        match self {
            Self::Transport { .. } => ActivityCategory::Transport,
            Self::Food { .. } => ActivityCategory::Food,
            Self::Energy { .. } => ActivityCategory::Energy,
            Self::Waste { .. } => ActivityCategory::Waste,
        }
    }
}

/// kg CO₂e per unit: km, meal, kWh and kg of waste.
#[derive(Debug, Clone, Serialize)]
pub struct EmissionFactorTable {
    pub car: f64,
    pub bus: f64,
    pub bike: f64,
    pub walk: f64,
    pub meat: f64,
    pub vegetarian: f64,
    pub vegan: f64,
    pub electricity: f64,
    pub recycled: f64,
    pub landfill: f64,
}

impl Default for EmissionFactorTable {
    fn default() -> Self {
        Self {
            car: 0.21,
            bus: 0.08,
            bike: 0.0,
            walk: 0.0,
            meat: 5.5,
            vegetarian: 2.1,
            vegan: 1.5,
            electricity: 0.45,
            recycled: -0.5,
            landfill: 0.8,
        }
    }
}

impl EmissionFactorTable {
    pub fn vehicle(&self, vehicle: Vehicle) -> f64 {
        match vehicle {
            Vehicle::Car => self.car,
            Vehicle::Bus => self.bus,
            Vehicle::Bike => self.bike,
            Vehicle::Walk => self.walk,
        }
    }

    pub fn meal(&self, meal: Meal) -> f64 {
        match meal {
            Meal::Meat => self.meat,
            Meal::Vegetarian => self.vegetarian,
            Meal::Vegan => self.vegan,
        }
    }

    pub fn energy(&self, source: EnergySource) -> f64 {
        match source {
            EnergySource::Electricity => self.electricity,
        }
    }

    pub fn disposal(&self, disposal: WasteDisposal) -> f64 {
        match disposal {
            WasteDisposal::Recycled => self.recycled,
            WasteDisposal::Landfill => self.landfill,
        }
    }

    /// Scores one entry. Savings are measured against the highest factor in
    /// the same category.
    pub fn estimate(&self, entry: &ActivityEntry) -> ImpactEstimate {
        let (quantity, factor, reference) = match *entry {
            ActivityEntry::Transport { distance_km, vehicle } => {
                (distance_km, self.vehicle(vehicle), self.vehicle(Vehicle::Car))
            }
            ActivityEntry::Food { meal, servings } => {
                (servings, self.meal(meal), self.meal(Meal::Meat))
            }
            ActivityEntry::Energy { source, kwh } => (kwh, self.energy(source), self.energy(source)),
            ActivityEntry::Waste { disposal, kg } => {
                (kg, self.disposal(disposal), self.disposal(WasteDisposal::Landfill))
            }
        };

        ImpactEstimate {
            category: entry.category(),
            co2_kg: quantity * factor,
            co2_saved_kg: quantity * (reference - factor),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEstimate {
    pub category: ActivityCategory,
    pub co2_kg: f64,
    pub co2_saved_kg: f64,
}

/// Validates `form` and scores it in one step.
pub fn estimate_impact(
    category: ActivityCategory,
    form: &ActivityForm,
    policy: FieldPolicy,
    table: &EmissionFactorTable,
) -> Result<(ActivityEntry, ImpactEstimate), ValidationError> {
    let entry = ActivityEntry::from_form(category, form, policy)?;
    let estimate = table.estimate(&entry);
    // JSON has no encoding for infinities; such a line could never be read back.
    if !(estimate.co2_kg.is_finite() && estimate.co2_saved_kg.is_finite()) {
        let (field, value) = entry.quantity();
        return Err(ValidationError::OutOfRange { field, value });
    }
    Ok((entry, estimate))
}

/// How a logged activity is framed to the user. Drawn independently of the
/// estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackTone {
    Positive,
    Neutral,
}

impl FeedbackTone {
    /// `positive_probability` must lie in `[0, 1]`.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R, positive_probability: f64) -> Self {
        if rng.gen_bool(positive_probability) {
            Self::Positive
        } else {
            Self::Neutral
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Positive => "Great choice! 🌱",
            Self::Neutral => "Activity logged 📊",
        }
    }

    pub fn describe(&self, co2_kg: f64) -> String {
        match self {
            Self::Positive => {
                format!("You saved {co2_kg:.1} kg CO₂e! Your garden is growing.")
            }
            Self::Neutral => {
                format!("{co2_kg:.1} kg CO₂e logged. Consider greener alternatives!")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn transport(distance: &str, vehicle: &str) -> ActivityForm {
        ActivityForm {
            distance: Some(distance.into()),
            vehicle: Some(vehicle.into()),
            ..Default::default()
        }
    }

    #[test]
    fn bus_trip_uses_bus_factor() {
        let table = EmissionFactorTable::default();
        let (_, estimate) = estimate_impact(
            ActivityCategory::Transport,
            &transport("15", "bus"),
            FieldPolicy::Strict,
            &table,
        )
        .unwrap();
        assert!(close(estimate.co2_kg, 1.2));
        assert!(close(estimate.co2_saved_kg, 15.0 * (0.21 - 0.08)));
    }

    #[test]
    fn unknown_vehicle_falls_back_to_car() {
        let table = EmissionFactorTable::default();
        let (entry, estimate) = estimate_impact(
            ActivityCategory::Transport,
            &transport("10", "unknown"),
            FieldPolicy::Fallback,
            &table,
        )
        .unwrap();
        assert_eq!(
            entry,
            ActivityEntry::Transport { distance_km: 10.0, vehicle: Vehicle::Car }
        );
        assert!(close(estimate.co2_kg, 2.1));
        assert!(close(estimate.co2_saved_kg, 0.0));
    }

    #[test]
    fn unset_vehicle_and_bad_distance_fall_back() {
        let form = ActivityForm {
            distance: Some("lots".into()),
            ..Default::default()
        };
        let entry =
            ActivityEntry::from_form(ActivityCategory::Transport, &form, FieldPolicy::Fallback)
                .unwrap();
        assert_eq!(entry, ActivityEntry::Transport { distance_km: 0.0, vehicle: Vehicle::Car });
    }

    #[test]
    fn strict_policy_surfaces_unknown_vehicle() {
        let err = ActivityEntry::from_form(
            ActivityCategory::Transport,
            &transport("10", "buss"),
            FieldPolicy::Strict,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownOption {
                field: "vehicle",
                value: "buss".to_string(),
                suggestion: Some("bus"),
            }
        );
    }

    #[test]
    fn strict_policy_requires_distance() {
        let form = ActivityForm {
            vehicle: Some("car".into()),
            ..Default::default()
        };
        let err = ActivityEntry::from_form(ActivityCategory::Transport, &form, FieldPolicy::Strict)
            .unwrap_err();
        assert_eq!(err, ValidationError::Missing { field: "distance" });
    }

    #[test]
    fn cycling_and_walking_emit_nothing() {
        let table = EmissionFactorTable::default();
        for vehicle in ["bike", "walk"] {
            let (_, estimate) = estimate_impact(
                ActivityCategory::Transport,
                &transport("8", vehicle),
                FieldPolicy::Strict,
                &table,
            )
            .unwrap();
            assert_eq!(estimate.co2_kg, 0.0);
            assert!(close(estimate.co2_saved_kg, 8.0 * 0.21));
        }
    }

    #[test]
    fn meals_default_to_one_serving() {
        let table = EmissionFactorTable::default();
        let form = ActivityForm {
            meal: Some("vegan".into()),
            ..Default::default()
        };
        let (entry, estimate) =
            estimate_impact(ActivityCategory::Food, &form, FieldPolicy::Strict, &table).unwrap();
        assert_eq!(entry, ActivityEntry::Food { meal: Meal::Vegan, servings: 1.0 });
        assert!(close(estimate.co2_kg, 1.5));
        assert!(close(estimate.co2_saved_kg, 4.0));
    }

    #[test]
    fn energy_scales_with_kwh_and_saves_nothing() {
        let table = EmissionFactorTable::default();
        let form = ActivityForm {
            energy: Some(FieldValue::Number(12.0)),
            ..Default::default()
        };
        let (_, estimate) =
            estimate_impact(ActivityCategory::Energy, &form, FieldPolicy::Strict, &table).unwrap();
        assert!(close(estimate.co2_kg, 5.4));
        assert_eq!(estimate.co2_saved_kg, 0.0);
    }

    #[test]
    fn recycling_is_a_net_negative() {
        let table = EmissionFactorTable::default();
        let form = ActivityForm {
            waste: Some("recycled".into()),
            weight: Some("2".into()),
            ..Default::default()
        };
        let (_, estimate) =
            estimate_impact(ActivityCategory::Waste, &form, FieldPolicy::Strict, &table).unwrap();
        assert!(close(estimate.co2_kg, -1.0));
        assert!(close(estimate.co2_saved_kg, 2.6));
    }

    #[test]
    fn unrepresentable_estimate_is_rejected() {
        let table = EmissionFactorTable::default();
        let form = ActivityForm {
            meal: Some("vegan".into()),
            servings: Some(1e308.into()),
            ..Default::default()
        };
        for policy in [FieldPolicy::Strict, FieldPolicy::Fallback] {
            let err = estimate_impact(ActivityCategory::Food, &form, policy, &table).unwrap_err();
            assert_eq!(err, ValidationError::OutOfRange { field: "servings", value: 1e308 });
        }
    }

    #[test]
    fn other_categories_fields_are_ignored() {
        let form = ActivityForm {
            meal: Some("meat".into()),
            vehicle: Some("spaceship".into()),
            ..Default::default()
        };
        assert!(ActivityEntry::from_form(ActivityCategory::Food, &form, FieldPolicy::Strict).is_ok());
    }

    #[test]
    fn category_parse_rejects_unknown() {
        assert_eq!(ActivityCategory::parse("Energy").unwrap(), ActivityCategory::Energy);
        assert!(matches!(
            ActivityCategory::parse("wast"),
            Err(ValidationError::UnknownOption { suggestion: Some("waste"), .. })
        ));
    }

    #[test]
    fn entry_serializes_with_category_tag() {
        let entry = ActivityEntry::Transport { distance_km: 3.0, vehicle: Vehicle::Bus };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["category"], "transport");
        assert_eq!(json["vehicle"], "bus");
    }

    #[test]
    fn tone_draw_respects_probability_extremes() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert_eq!(FeedbackTone::draw(&mut rng, 1.0), FeedbackTone::Positive);
            assert_eq!(FeedbackTone::draw(&mut rng, 0.0), FeedbackTone::Neutral);
        }
    }

    #[test]
    fn tone_text_formats_one_decimal() {
        assert_eq!(
            FeedbackTone::Positive.describe(1.2000000000000002),
            "You saved 1.2 kg CO₂e! Your garden is growing."
        );
        assert_eq!(
            FeedbackTone::Neutral.describe(2.1),
            "2.1 kg CO₂e logged. Consider greener alternatives!"
        );
    }
}
