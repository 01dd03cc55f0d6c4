use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::fields::{self, FieldPolicy, FieldValue, FormOption};

pub const BASELINE_BASE_KG: f64 = 500.0;
pub const TOTAL_STEPS: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Mumbai,
    Delhi,
    Bangalore,
    Chennai,
    Kolkata,
    Other,
}

impl FormOption for Location {
    const FIELD: &'static str = "location";
    const OPTIONS: &'static [(&'static str, Self)] = &[
        ("mumbai", Self::Mumbai),
        ("delhi", Self::Delhi),
        ("bangalore", Self::Bangalore),
        ("chennai", Self::Chennai),
        ("kolkata", Self::Kolkata),
        ("other", Self::Other),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HomeType {
    Apartment,
    House,
    Shared,
}

impl FormOption for HomeType {
    const FIELD: &'static str = "homeType";
    const OPTIONS: &'static [(&'static str, Self)] = &[
        ("apartment", Self::Apartment),
        ("house", Self::House),
        ("shared", Self::Shared),
    ];
}

impl HomeType {
    pub fn baseline_delta(&self) -> f64 {
        match self {
            Self::Apartment => -100.0,
            Self::House => 200.0,
            Self::Shared => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HouseholdSize {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5+")]
    FivePlus,
}

impl FormOption for HouseholdSize {
    const FIELD: &'static str = "householdSize";
    const OPTIONS: &'static [(&'static str, Self)] = &[
        ("1", Self::One),
        ("2", Self::Two),
        ("3", Self::Three),
        ("4", Self::Four),
        ("5+", Self::FivePlus),
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimaryTransport {
    Car,
    Public,
    Bike,
    Mixed,
}

impl FormOption for PrimaryTransport {
    const FIELD: &'static str = "primaryTransport";
    const OPTIONS: &'static [(&'static str, Self)] = &[
        ("car", Self::Car),
        ("public", Self::Public),
        ("bike", Self::Bike),
        ("mixed", Self::Mixed),
    ];
}

impl PrimaryTransport {
    pub fn baseline_delta(&self) -> f64 {
        match self {
            Self::Car => 300.0,
            Self::Public => 100.0,
            Self::Bike => -150.0,
            Self::Mixed => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DietType {
    Meat,
    Vegetarian,
    Vegan,
    Flexitarian,
}

impl FormOption for DietType {
    const FIELD: &'static str = "dietType";
    const OPTIONS: &'static [(&'static str, Self)] = &[
        ("meat", Self::Meat),
        ("vegetarian", Self::Vegetarian),
        ("vegan", Self::Vegan),
        ("flexitarian", Self::Flexitarian),
    ];
}

impl DietType {
    pub fn baseline_delta(&self) -> f64 {
        match self {
            Self::Meat => 200.0,
            Self::Vegetarian => 50.0,
            Self::Vegan => -100.0,
            Self::Flexitarian => 0.0,
        }
    }
}

/// Raw onboarding answers, field names as the client sends them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingForm {
    pub location: Option<FieldValue>,
    pub home_type: Option<FieldValue>,
    pub household_size: Option<FieldValue>,
    pub primary_transport: Option<FieldValue>,
    pub diet_type: Option<FieldValue>,
    pub energy_source: Option<FieldValue>,
}

impl OnboardingForm {
    /// Overwrites fields present in `answers`, keeping the rest.
    pub fn merge(&mut self, answers: OnboardingForm) {
        let OnboardingForm {
            location,
            home_type,
            household_size,
            primary_transport,
            diet_type,
            energy_source,
        } = answers;
        if location.is_some() {
            self.location = location;
        }
        if home_type.is_some() {
            self.home_type = home_type;
        }
        if household_size.is_some() {
            self.household_size = household_size;
        }
        if primary_transport.is_some() {
            self.primary_transport = primary_transport;
        }
        if diet_type.is_some() {
            self.diet_type = diet_type;
        }
        if energy_source.is_some() {
            self.energy_source = energy_source;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingProfile {
    pub location: Option<Location>,
    pub home_type: Option<HomeType>,
    pub household_size: Option<HouseholdSize>,
    pub primary_transport: Option<PrimaryTransport>,
    pub diet_type: Option<DietType>,
    pub energy_source: Option<String>,
}

impl OnboardingProfile {
    /// Missing answers are never an error. Unrecognized ones are under
    /// `Strict` and contribute nothing under `Fallback`.
    pub fn from_form(form: &OnboardingForm, policy: FieldPolicy) -> Result<Self, ValidationError> {
        Ok(Self {
            location: fields::optional_option(form.location.as_ref(), policy)?,
            home_type: fields::optional_option(form.home_type.as_ref(), policy)?,
            household_size: fields::optional_option(form.household_size.as_ref(), policy)?,
            primary_transport: fields::optional_option(form.primary_transport.as_ref(), policy)?,
            diet_type: fields::optional_option(form.diet_type.as_ref(), policy)?,
            energy_source: form
                .energy_source
                .as_ref()
                .map(|v| v.as_text().into_owned())
                .filter(|s| !s.is_empty()),
        })
    }

    /// The independent adjustments applied on top of the base value.
    pub fn baseline_deltas(&self) -> [f64; 3] {
        [
            self.home_type.map_or(0.0, |h| h.baseline_delta()),
            self.primary_transport.map_or(0.0, |t| t.baseline_delta()),
            self.diet_type.map_or(0.0, |d| d.baseline_delta()),
        ]
    }
}

/// Estimated monthly footprint in kg CO₂.
pub fn compute_baseline(profile: &OnboardingProfile) -> i64 {
    let total: f64 = BASELINE_BASE_KG + profile.baseline_deltas().iter().sum::<f64>();
    total.round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnboardingStep {
    Location = 1,
    Home = 2,
    Transport = 3,
    Diet = 4,
}

impl OnboardingStep {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn following(self) -> Option<Self> {
        match self {
            Self::Location => Some(Self::Home),
            Self::Home => Some(Self::Transport),
            Self::Transport => Some(Self::Diet),
            Self::Diet => None,
        }
    }

    pub fn preceding(self) -> Self {
        match self {
            Self::Location | Self::Home => Self::Location,
            Self::Transport => Self::Home,
            Self::Diet => Self::Transport,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WizardState {
    InProgress { step: OnboardingStep, step_number: u8, progress_percent: f64 },
    Complete { profile: OnboardingProfile, baseline_kg: i64 },
}

/// The four-step onboarding sequencer.
#[derive(Debug, Clone)]
pub struct OnboardingWizard {
    step: OnboardingStep,
    answers: OnboardingForm,
    completed: Option<(OnboardingProfile, i64)>,
}

impl Default for OnboardingWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl OnboardingWizard {
    pub fn new() -> Self {
        Self {
            step: OnboardingStep::Location,
            answers: OnboardingForm::default(),
            completed: None,
        }
    }

    pub fn step(&self) -> OnboardingStep {
        self.step
    }

    pub fn is_complete(&self) -> bool {
        self.completed.is_some()
    }

    pub fn answer(&mut self, answers: OnboardingForm) {
        if !self.is_complete() {
            self.answers.merge(answers);
        }
    }

    pub fn state(&self) -> WizardState {
        match &self.completed {
            Some((profile, baseline_kg)) => WizardState::Complete {
                profile: profile.clone(),
                baseline_kg: *baseline_kg,
            },
            None => WizardState::InProgress {
                step: self.step,
                step_number: self.step.number(),
                progress_percent: f64::from(self.step.number()) / f64::from(TOTAL_STEPS) * 100.0,
            },
        }
    }

    /// Advances one step, or scores the profile from the last step. A
    /// validation failure leaves the wizard on the last step.
    pub fn next(&mut self, policy: FieldPolicy) -> Result<WizardState, ValidationError> {
        if self.completed.is_none() {
            match self.step.following() {
                Some(step) => self.step = step,
                None => {
                    let profile = OnboardingProfile::from_form(&self.answers, policy)?;
                    let baseline = compute_baseline(&profile);
                    self.completed = Some((profile, baseline));
                }
            }
        }
        Ok(self.state())
    }

    pub fn previous(&mut self) -> WizardState {
        if self.completed.is_none() {
            self.step = self.step.preceding();
        }
        self.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn profile(home: &str, transport: &str, diet: &str) -> OnboardingProfile {
        let form = OnboardingForm {
            home_type: Some(home.into()),
            primary_transport: Some(transport.into()),
            diet_type: Some(diet.into()),
            ..Default::default()
        };
        OnboardingProfile::from_form(&form, FieldPolicy::Strict).unwrap()
    }

    #[test]
    fn greenest_profile_scores_150() {
        assert_eq!(compute_baseline(&profile("apartment", "bike", "vegan")), 150);
    }

    #[test]
    fn empty_profile_scores_base() {
        assert_eq!(compute_baseline(&OnboardingProfile::default()), 500);
    }

    #[test]
    fn heaviest_profile_scores_1200() {
        assert_eq!(compute_baseline(&profile("house", "car", "meat")), 1200);
    }

    #[test]
    fn neutral_answers_add_nothing() {
        assert_eq!(compute_baseline(&profile("shared", "mixed", "flexitarian")), 500);
    }

    #[test]
    fn deltas_commute() {
        let p = profile("house", "public", "vegetarian");
        let [a, b, c] = p.baseline_deltas();
        let orders = [[a, b, c], [a, c, b], [b, a, c], [b, c, a], [c, a, b], [c, b, a]];
        for order in orders {
            let total = order.iter().fold(BASELINE_BASE_KG, |acc, d| acc + d);
            assert_eq!(total.round() as i64, compute_baseline(&p));
        }
    }

    #[test]
    fn strict_rejects_unknown_diet() {
        let form = OnboardingForm {
            diet_type: Some("pescatarian".into()),
            ..Default::default()
        };
        let err = OnboardingProfile::from_form(&form, FieldPolicy::Strict).unwrap_err();
        assert_eq!(err.field(), "dietType");
    }

    #[test]
    fn fallback_ignores_unknown_answers() {
        let form = OnboardingForm {
            home_type: Some("castle".into()),
            diet_type: Some("vegan".into()),
            household_size: Some("5+".into()),
            ..Default::default()
        };
        let p = OnboardingProfile::from_form(&form, FieldPolicy::Fallback).unwrap();
        assert_eq!(p.home_type, None);
        assert_eq!(p.household_size, Some(HouseholdSize::FivePlus));
        assert_eq!(compute_baseline(&p), 400);
    }

    #[test]
    fn previous_never_goes_below_first_step() {
        let mut wizard = OnboardingWizard::new();
        wizard.previous();
        assert_eq!(wizard.step(), OnboardingStep::Location);
    }

    #[test]
    fn blank_steps_can_be_advanced_to_completion() {
        let mut wizard = OnboardingWizard::new();
        for expected in [OnboardingStep::Home, OnboardingStep::Transport, OnboardingStep::Diet] {
            wizard.next(FieldPolicy::Strict).unwrap();
            assert_eq!(wizard.step(), expected);
        }
        let state = wizard.next(FieldPolicy::Strict).unwrap();
        assert!(matches!(state, WizardState::Complete { baseline_kg: 500, .. }));
    }

    #[test]
    fn answers_merge_across_steps() {
        let mut wizard = OnboardingWizard::new();
        wizard.answer(OnboardingForm { location: Some("chennai".into()), ..Default::default() });
        wizard.next(FieldPolicy::Strict).unwrap();
        wizard.answer(OnboardingForm { home_type: Some("apartment".into()), ..Default::default() });
        wizard.next(FieldPolicy::Strict).unwrap();
        wizard.answer(OnboardingForm { primary_transport: Some("bike".into()), ..Default::default() });
        wizard.next(FieldPolicy::Strict).unwrap();
        wizard.answer(OnboardingForm { diet_type: Some("vegan".into()), ..Default::default() });

        match wizard.next(FieldPolicy::Strict).unwrap() {
            WizardState::Complete { profile, baseline_kg } => {
                assert_eq!(profile.location, Some(Location::Chennai));
                assert_eq!(baseline_kg, 150);
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn failed_completion_stays_on_last_step() {
        let mut wizard = OnboardingWizard::new();
        wizard.answer(OnboardingForm { home_type: Some("igloo".into()), ..Default::default() });
        for _ in 0..3 {
            wizard.next(FieldPolicy::Strict).unwrap();
        }
        assert!(wizard.next(FieldPolicy::Strict).is_err());
        assert_eq!(wizard.step(), OnboardingStep::Diet);
        assert!(!wizard.is_complete());
    }

    #[test]
    fn progress_tracks_step() {
        let mut wizard = OnboardingWizard::new();
        wizard.next(FieldPolicy::Strict).unwrap();
        match wizard.state() {
            WizardState::InProgress { step_number, progress_percent, .. } => {
                assert_eq!(step_number, 2);
                assert_eq!(progress_percent, 50.0);
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn step_stays_in_bounds_for_any_sequence() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let mut wizard = OnboardingWizard::new();
            for _ in 0..40 {
                if rng.gen_bool(0.5) {
                    wizard.next(FieldPolicy::Fallback).unwrap();
                } else {
                    wizard.previous();
                }
                let n = wizard.step().number();
                assert!((1..=TOTAL_STEPS).contains(&n));
            }
        }
    }
}
