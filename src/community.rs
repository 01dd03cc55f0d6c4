use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::ApiError;
use crate::models::Difficulty;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Challenge {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub duration: &'static str,
    pub participants: u32,
    pub reward: &'static str,
    pub progress: u8,
    pub difficulty: Difficulty,
    pub category: &'static str,
    /// Joined before tracking began.
    #[serde(skip)]
    pub preset_joined: bool,
}

pub const CHALLENGES: [Challenge; 3] = [
    Challenge {
        id: "1",
        title: "Car-Free Week",
        description: "Avoid using personal vehicles for 7 days straight",
        duration: "7 days",
        participants: 234,
        reward: "500 XP + Green Commuter Badge",
        progress: 45,
        difficulty: Difficulty::Medium,
        category: "Transport",
        preset_joined: false,
    },
    Challenge {
        id: "2",
        title: "Plant-Based Pioneer",
        description: "Log 10 plant-based meals this month",
        duration: "30 days",
        participants: 156,
        reward: "300 XP + Veggie Hero Badge",
        progress: 70,
        difficulty: Difficulty::Easy,
        category: "Food",
        preset_joined: true,
    },
    Challenge {
        id: "3",
        title: "Energy Saver Supreme",
        description: "Reduce home energy consumption by 20%",
        duration: "14 days",
        participants: 89,
        reward: "750 XP + Efficiency Expert Badge",
        progress: 25,
        difficulty: Difficulty::Hard,
        category: "Energy",
        preset_joined: false,
    },
];

pub fn find_challenge(id: &str) -> Option<&'static Challenge> {
    CHALLENGES.iter().find(|c| c.id == id)
}

fn is_joined(challenge: &Challenge, joined: &BTreeSet<String>) -> bool {
    challenge.preset_joined || joined.contains(challenge.id)
}

#[derive(Debug, Clone, Serialize)]
pub struct ChallengeView {
    #[serde(flatten)]
    pub challenge: Challenge,
    pub joined: bool,
}

pub fn challenge_board(joined: &BTreeSet<String>) -> Vec<ChallengeView> {
    CHALLENGES
        .iter()
        .map(|c| ChallengeView {
            challenge: *c,
            joined: is_joined(c, joined),
        })
        .collect()
}

/// Checks that `id` can be joined given the ids already joined.
pub fn validate_join(id: &str, joined: &BTreeSet<String>) -> Result<&'static Challenge, ApiError> {
    let challenge = find_challenge(id).ok_or_else(|| ApiError::NotFound(format!("challenge {id}")))?;
    if is_joined(challenge, joined) {
        return Err(ApiError::Conflict(format!(
            "challenge {:?} already joined",
            challenge.title
        )));
    }
    Ok(challenge)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub name: String,
    pub co2_saved_kg: f64,
    pub streak_days: u32,
    pub level: usize,
    pub rank: usize,
    pub is_you: bool,
}

const PEERS: [(&str, f64, u32, usize); 4] = [
    ("EcoWarrior23", 245.0, 28, 12),
    ("GreenGuardian", 198.0, 15, 10),
    ("ClimateCrusader", 167.0, 22, 9),
    ("SustainableSam", 76.0, 8, 5),
];

pub const YOU: &str = "You";

/// Ranks the current user among the community peers by CO₂ saved.
pub fn leaderboard(co2_saved_kg: f64, streak_days: u32, level: usize) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = PEERS
        .iter()
        .map(|&(name, saved, streak, peer_level)| LeaderboardEntry {
            name: name.to_string(),
            co2_saved_kg: saved,
            streak_days: streak,
            level: peer_level,
            rank: 0,
            is_you: false,
        })
        .collect();

    entries.push(LeaderboardEntry {
        name: YOU.to_string(),
        co2_saved_kg,
        streak_days,
        level,
        rank: 0,
        is_you: true,
    });

    entries.sort_by(|a, b| {
        b.co2_saved_kg
            .total_cmp(&a.co2_saved_kg)
            .then_with(|| a.name.cmp(&b.name))
    });
    for (idx, entry) in entries.iter_mut().enumerate() {
        entry.rank = idx + 1;
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn you_are_ranked_by_savings() {
        let board = leaderboard(89.0, 12, 3);
        assert_eq!(board.len(), 5);
        let you = board.iter().find(|e| e.is_you).unwrap();
        assert_eq!(you.rank, 4);
        assert_eq!(board[0].name, "EcoWarrior23");
        assert_eq!(board[4].name, "SustainableSam");
    }

    #[test]
    fn top_saver_takes_first_place() {
        let board = leaderboard(300.0, 1, 4);
        assert!(board[0].is_you);
        assert_eq!(board[0].rank, 1);
    }

    #[test]
    fn join_rejects_unknown_and_duplicate() {
        let mut joined = BTreeSet::new();
        assert!(matches!(validate_join("9", &joined), Err(ApiError::NotFound(_))));
        assert_eq!(validate_join("1", &joined).unwrap().title, "Car-Free Week");

        joined.insert("1".to_string());
        assert!(matches!(validate_join("1", &joined), Err(ApiError::Conflict(_))));
    }

    #[test]
    fn plant_based_pioneer_starts_joined() {
        let board = challenge_board(&BTreeSet::new());
        let joined: Vec<&str> = board.iter().filter(|c| c.joined).map(|c| c.challenge.id).collect();
        assert_eq!(joined, ["2"]);
        assert!(matches!(
            validate_join("2", &BTreeSet::new()),
            Err(ApiError::Conflict(_))
        ));
    }

    #[test]
    fn board_marks_joined_challenges() {
        let joined: BTreeSet<String> = ["3".to_string()].into_iter().collect();
        let board = challenge_board(&joined);
        assert_eq!(board.iter().filter(|c| c.joined).count(), 2);
        assert!(board[2].joined);
        assert!(!board[0].joined);
    }
}
