//! Core types for learning progress and collection interactions.

use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};

/// Learning status of one card for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    None,
    Learning,
    Reviewing,
    Mastered,
}

impl Default for CardStatus {
    fn default() -> Self {
        Self::None
    }
}

impl CardStatus {
    /// Status the ladder assigns to a level.
    pub fn for_level(level: Level) -> Self {
        match level.value() {
            0 => Self::Learning,
            1 | 2 => Self::Reviewing,
            _ => Self::Mastered,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Learning => "learning",
            Self::Reviewing => "reviewing",
            Self::Mastered => "mastered",
        }
    }
}

impl fmt::Display for CardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CardStatus {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "learning" => Ok(Self::Learning),
            "reviewing" => Ok(Self::Reviewing),
            "mastered" => Ok(Self::Mastered),
            other => Err(PolicyError::UnknownStatus(other.to_string())),
        }
    }
}

/// Position on the learning ladder, 0 through 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Level(u8);

impl Level {
    pub const ZERO: Level = Level(0);
    pub const ONE: Level = Level(1);
    pub const TWO: Level = Level(2);
    pub const TOP: Level = Level(3);

    pub fn new(value: i64) -> Result<Self> {
        match value {
            0..=3 => Ok(Self(value as u8)),
            other => Err(PolicyError::InvalidLevel(other)),
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Level {
    type Error = PolicyError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(i64::from(value))
    }
}

impl TryFrom<i16> for Level {
    type Error = PolicyError;

    fn try_from(value: i16) -> Result<Self> {
        Self::new(i64::from(value))
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-user, per-card ladder position.
///
/// The status is always the one [`CardStatus::for_level`] assigns, except that
/// rows created before the ladder existed may carry `None` at level 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CardProgress {
    status: CardStatus,
    level: Level,
}

impl CardProgress {
    /// Validate a stored `(status, level)` pair.
    pub fn new(status: CardStatus, level: Level) -> Result<Self> {
        let expected = CardStatus::for_level(level);
        let legacy_fresh = status == CardStatus::None && level == Level::ZERO;
        if status != expected && !legacy_fresh {
            return Err(PolicyError::StatusMismatch {
                status: status.to_string(),
                level: level.value(),
            });
        }
        Ok(Self { status, level })
    }

    /// Progress at a level with the status the ladder assigns to it.
    pub fn at(level: Level) -> Self {
        Self {
            status: CardStatus::for_level(level),
            level,
        }
    }

    pub fn status(&self) -> CardStatus {
        self.status
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

/// Signed unit changes to a [`CollectionProgress`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressDelta {
    pub mastered: i32,
    pub reviewing: i32,
    pub learning: i32,
}

impl ProgressDelta {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Per-user, per-collection cache of card statuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionProgress {
    pub mastered: u32,
    pub reviewing: u32,
    pub learning: u32,
}

impl CollectionProgress {
    /// Apply a delta, clamping every counter at zero.
    pub fn apply(self, delta: ProgressDelta) -> Self {
        Self {
            mastered: step(self.mastered, delta.mastered),
            reviewing: step(self.reviewing, delta.reviewing),
            learning: step(self.learning, delta.learning),
        }
    }

    pub fn total(&self) -> u64 {
        u64::from(self.mastered) + u64::from(self.reviewing) + u64::from(self.learning)
    }
}

/// Per-user flags on a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInteraction {
    pub liked: bool,
    pub disliked: bool,
    pub viewed: bool,
    pub starred: bool,
}

impl UserInteraction {
    /// State of a row created on the user's first contact with a collection.
    /// Any first contact counts as a view.
    pub fn first_touch() -> Self {
        Self {
            viewed: true,
            ..Self::default()
        }
    }
}

/// Signed unit changes to [`CollectionCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDelta {
    pub likes: i32,
    pub dislikes: i32,
    pub views: i32,
}

impl CounterDelta {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for CounterDelta {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            likes: self.likes + rhs.likes,
            dislikes: self.dislikes + rhs.dislikes,
            views: self.views + rhs.views,
        }
    }
}

/// Global like/dislike/view counters of a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCounters {
    pub likes: u32,
    pub dislikes: u32,
    pub views: u32,
}

impl CollectionCounters {
    /// Apply a delta, clamping every counter at zero.
    pub fn apply(self, delta: CounterDelta) -> Self {
        Self {
            likes: step(self.likes, delta.likes),
            dislikes: step(self.dislikes, delta.dislikes),
            views: step(self.views, delta.views),
        }
    }
}

fn step(value: u32, delta: i32) -> u32 {
    if delta >= 0 {
        value.saturating_add(delta.unsigned_abs())
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn level_rejects_out_of_range() {
        assert_eq!(Level::new(4), Err(PolicyError::InvalidLevel(4)));
        assert_eq!(Level::new(-1), Err(PolicyError::InvalidLevel(-1)));
        assert_eq!(Level::try_from(3u8), Ok(Level::TOP));
    }

    #[test]
    fn status_follows_level() {
        assert_eq!(CardStatus::for_level(Level::ZERO), CardStatus::Learning);
        assert_eq!(CardStatus::for_level(Level::ONE), CardStatus::Reviewing);
        assert_eq!(CardStatus::for_level(Level::TWO), CardStatus::Reviewing);
        assert_eq!(CardStatus::for_level(Level::TOP), CardStatus::Mastered);
    }

    #[test]
    fn card_progress_detects_mismatch() {
        let err = CardProgress::new(CardStatus::Mastered, Level::ONE).unwrap_err();
        assert_eq!(
            err,
            PolicyError::StatusMismatch {
                status: "mastered".to_string(),
                level: 1
            }
        );
    }

    #[test]
    fn card_progress_accepts_none_at_level_zero_only() {
        assert!(CardProgress::new(CardStatus::None, Level::ZERO).is_ok());
        assert!(CardProgress::new(CardStatus::None, Level::TWO).is_err());
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            CardStatus::None,
            CardStatus::Learning,
            CardStatus::Reviewing,
            CardStatus::Mastered,
        ] {
            assert_eq!(status.as_str().parse::<CardStatus>(), Ok(status));
        }
        assert!("graduated".parse::<CardStatus>().is_err());
    }

    #[test]
    fn progress_clamps_at_zero() {
        let progress = CollectionProgress {
            mastered: 0,
            reviewing: 1,
            learning: 0,
        };
        let next = progress.apply(ProgressDelta {
            mastered: -1,
            reviewing: -1,
            learning: 1,
        });
        assert_eq!(
            next,
            CollectionProgress {
                mastered: 0,
                reviewing: 0,
                learning: 1
            }
        );
    }

    #[test]
    fn counters_clamp_at_zero() {
        let next = CollectionCounters::default().apply(CounterDelta {
            likes: -1,
            dislikes: 1,
            views: 0,
        });
        assert_eq!(next.likes, 0);
        assert_eq!(next.dislikes, 1);
    }
}
