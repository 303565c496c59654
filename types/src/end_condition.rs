use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Why a game stopped. The numeric values are what gets persisted, and every
/// value above `Normal` is an abnormal stop.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum EndCondition {
    #[default]
    InProgress,
    Normal,
    Strikeout,
    Timeout,
    Terminated,
    SpeedrunFail,
    IdleTimeout,
    CharacterSoftlock,
}

impl EndCondition {
    pub fn as_i32(self) -> i32 {
        match self {
            EndCondition::InProgress => 0,
            EndCondition::Normal => 1,
            EndCondition::Strikeout => 2,
            EndCondition::Timeout => 3,
            EndCondition::Terminated => 4,
            EndCondition::SpeedrunFail => 5,
            EndCondition::IdleTimeout => 6,
            EndCondition::CharacterSoftlock => 7,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            0 => EndCondition::InProgress,
            1 => EndCondition::Normal,
            2 => EndCondition::Strikeout,
            3 => EndCondition::Timeout,
            4 => EndCondition::Terminated,
            5 => EndCondition::SpeedrunFail,
            6 => EndCondition::IdleTimeout,
            7 => EndCondition::CharacterSoftlock,
            _ => return None,
        })
    }

    pub fn is_abnormal(self) -> bool {
        self > EndCondition::Normal
    }

    /// Conditions that get an extra persisted "game over" action.
    pub fn needs_game_over_action(self) -> bool {
        matches!(
            self,
            EndCondition::Timeout | EndCondition::Terminated | EndCondition::IdleTimeout
        )
    }
}

impl Display for EndCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EndCondition::InProgress => "in progress",
            EndCondition::Normal => "normal",
            EndCondition::Strikeout => "strikeout",
            EndCondition::Timeout => "timeout",
            EndCondition::Terminated => "terminated",
            EndCondition::SpeedrunFail => "speedrun fail",
            EndCondition::IdleTimeout => "idle timeout",
            EndCondition::CharacterSoftlock => "character softlock",
        };
        write!(f, "{s}")
    }
}
