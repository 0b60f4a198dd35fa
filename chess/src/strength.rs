//! Difficulty tiers offered to players and the engine ratings behind them.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// User-facing difficulty tier. Each tier maps to an engine Elo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrengthLevel {
    Beginner,
    Casual,
    Intermediate,
    Advanced,
    Expert,
    Master,
}

/// Named opponent attached to a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Personality {
    pub name: &'static str,
    pub quips: &'static [&'static str],
}

impl StrengthLevel {
    pub const ALL: [StrengthLevel; 6] = [
        Self::Beginner,
        Self::Casual,
        Self::Intermediate,
        Self::Advanced,
        Self::Expert,
        Self::Master,
    ];

    /// Rating sent to the engine. Stockfish accepts UCI_Elo 1320..=3190.
    pub fn elo(self) -> u16 {
        match self {
            Self::Beginner => 1350,
            Self::Casual => 1500,
            Self::Intermediate => 1700,
            Self::Advanced => 2000,
            Self::Expert => 2400,
            Self::Master => 2850,
        }
    }

    /// Stable identifier used in menus and events.
    pub fn id(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Casual => "casual",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
            Self::Master => "master",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.id().eq_ignore_ascii_case(id.trim()))
    }

    pub fn label(self) -> String {
        let name = match self {
            Self::Beginner => "Beginner",
            Self::Casual => "Casual",
            Self::Intermediate => "Intermediate",
            Self::Advanced => "Advanced",
            Self::Expert => "Expert",
            Self::Master => "Master",
        };
        format!("{} ({})", name, self.elo())
    }

    pub fn personality(self) -> Personality {
        match self {
            Self::Beginner => Personality {
                name: "Pip the Pawn",
                quips: &[
                    "Is this the part where I move a piece?",
                    "I read half a chess book once.",
                    "Oops. Was that good?",
                ],
            },
            Self::Casual => Personality {
                name: "Sunday Sam",
                quips: &[
                    "No pressure, just vibes.",
                    "I play this one every Sunday.",
                    "Let's keep it friendly.",
                ],
            },
            Self::Intermediate => Personality {
                name: "Club Carla",
                quips: &[
                    "Development first, then we talk.",
                    "I've seen this structure before.",
                    "Control the center, they said.",
                ],
            },
            Self::Advanced => Personality {
                name: "Tactician Theo",
                quips: &[
                    "Careful, that square is loose.",
                    "Every move is a threat.",
                    "Did you see my idea?",
                ],
            },
            Self::Expert => Personality {
                name: "Grandmaster Greta",
                quips: &[
                    "Interesting. Let me think about that.",
                    "Your king looks cold.",
                    "Prophylaxis is underrated.",
                ],
            },
            Self::Master => Personality {
                name: "The Machine",
                quips: &[
                    "Calculated.",
                    "The evaluation does not favor you.",
                    "Resistance is noted.",
                ],
            },
        }
    }
}

impl std::fmt::Display for StrengthLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl Personality {
    /// Pick a quip index, avoiding `last` whenever more than one quip exists.
    pub fn pick_quip<R: Rng + ?Sized>(&self, last: Option<usize>, rng: &mut R) -> Option<usize> {
        match self.quips.len() {
            0 => None,
            1 => Some(0),
            len => loop {
                let idx = rng.gen_range(0..len);
                if Some(idx) != last {
                    break Some(idx);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elo_increases_with_tier() {
        let elos: Vec<u16> = StrengthLevel::ALL.iter().map(|l| l.elo()).collect();
        assert!(elos.windows(2).all(|w| w[0] < w[1]));
        assert!(elos.iter().all(|&e| (1320..=3190).contains(&e)));
    }

    #[test]
    fn test_id_round_trip() {
        for level in StrengthLevel::ALL {
            assert_eq!(StrengthLevel::from_id(level.id()), Some(level));
        }
        assert_eq!(StrengthLevel::from_id("Expert"), Some(StrengthLevel::Expert));
        assert_eq!(StrengthLevel::from_id("godlike"), None);
    }

    #[test]
    fn test_quips_do_not_repeat() {
        let personality = StrengthLevel::Beginner.personality();
        let mut rng = rand::thread_rng();
        let mut last = None;
        for _ in 0..50 {
            let next = personality.pick_quip(last, &mut rng);
            assert!(next.is_some());
            assert_ne!(next, last);
            last = next;
        }
    }
}
