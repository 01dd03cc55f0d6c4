use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlantTier {
    pub id: &'static str,
    pub name: &'static str,
    pub level: u8,
    pub co2_required_kg: f64,
    pub description: &'static str,
}

/// Ordered by ascending threshold.
pub const PLANT_TIERS: [PlantTier; 4] = [
    PlantTier {
        id: "sprout",
        name: "Climate Sprout",
        level: 1,
        co2_required_kg: 0.0,
        description: "Your journey begins",
    },
    PlantTier {
        id: "flower",
        name: "Eco Flower",
        level: 2,
        co2_required_kg: 25.0,
        description: "Beautiful progress blooms",
    },
    PlantTier {
        id: "sapling",
        name: "Green Sapling",
        level: 3,
        co2_required_kg: 75.0,
        description: "Growing strong and tall",
    },
    PlantTier {
        id: "tree",
        name: "Carbon Tree",
        level: 4,
        co2_required_kg: 150.0,
        description: "Mighty environmental guardian",
    },
];

pub fn garden_level(co2_saved_kg: f64) -> usize {
    PLANT_TIERS
        .iter()
        .filter(|tier| tier.co2_required_kg <= co2_saved_kg)
        .count()
}

pub fn next_plant(co2_saved_kg: f64) -> Option<&'static PlantTier> {
    PLANT_TIERS
        .iter()
        .find(|tier| tier.co2_required_kg > co2_saved_kg)
}

#[derive(Debug, Clone, Serialize)]
pub struct PlantStatus {
    #[serde(flatten)]
    pub tier: PlantTier,
    pub unlocked: bool,
    pub kg_remaining: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GardenView {
    pub co2_saved_kg: f64,
    pub level: usize,
    pub next_plant: Option<PlantTier>,
    pub kg_until_next: f64,
    pub plants: Vec<PlantStatus>,
}

impl GardenView {
    pub fn new(co2_saved_kg: f64) -> Self {
        let next = next_plant(co2_saved_kg).copied();
        let plants = PLANT_TIERS
            .iter()
            .map(|tier| PlantStatus {
                tier: *tier,
                unlocked: tier.co2_required_kg <= co2_saved_kg,
                kg_remaining: (tier.co2_required_kg - co2_saved_kg).max(0.0),
            })
            .collect();

        Self {
            co2_saved_kg,
            level: garden_level(co2_saved_kg),
            kg_until_next: next.map_or(0.0, |tier| tier.co2_required_kg - co2_saved_kg),
            next_plant: next,
            plants,
        }
    }
}
