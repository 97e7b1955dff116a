//! The learning ladder.
//!
//! A card climbs one rung per "know" and drops one rung per "don't know".
//! Every step names the collection counter changes that keep the per-collection
//! cache in line with the card statuses.
//!
//! | signal    | from    | to | status    | collection delta                |
//! |-----------|---------|----|-----------|---------------------------------|
//! | know      | no row  | 3  | mastered  | mastered +1                     |
//! | know      | 2       | 3  | mastered  | mastered +1, reviewing -1       |
//! | know      | 1       | 2  | reviewing | none                            |
//! | know      | 0       | 1  | reviewing | learning -1, reviewing +1       |
//! | know      | 3       | -  | -         | no transition                   |
//! | dont know | no row  | 0  | learning  | learning +1                     |
//! | dont know | 3       | 2  | reviewing | mastered -1, reviewing +1       |
//! | dont know | 2       | 1  | reviewing | none                            |
//! | dont know | 1       | 0  | learning  | learning +1, reviewing -1       |
//! | dont know | 0       | -  | -         | no transition                   |
//!
//! The `1 -> 2` and `2 -> 1` steps carry no counter change. Both keep the card
//! in `reviewing`, so the cache stays exact.

use serde::{Deserialize, Serialize};

use crate::types::{CardProgress, Level, ProgressDelta};

/// What the user reported about a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Know,
    DontKnow,
}

/// One ladder step: the card's next progress and the counter changes it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: CardProgress,
    pub delta: ProgressDelta,
}

/// Step taken when the user has no progress row for the card yet.
pub fn first_contact(signal: Signal) -> Transition {
    match signal {
        Signal::Know => Transition {
            next: CardProgress::at(Level::TOP),
            delta: ProgressDelta {
                mastered: 1,
                ..ProgressDelta::default()
            },
        },
        Signal::DontKnow => Transition {
            next: CardProgress::at(Level::ZERO),
            delta: ProgressDelta {
                learning: 1,
                ..ProgressDelta::default()
            },
        },
    }
}

/// Step taken from an existing row, or `None` when the card is already at the
/// end of the ladder in the signalled direction.
pub fn advance(current: &CardProgress, signal: Signal) -> Option<Transition> {
    let (level, delta) = match (signal, current.level().value()) {
        (Signal::Know, 0) => (
            Level::ONE,
            ProgressDelta {
                learning: -1,
                reviewing: 1,
                ..ProgressDelta::default()
            },
        ),
        (Signal::Know, 1) => (Level::TWO, ProgressDelta::default()),
        (Signal::Know, 2) => (
            Level::TOP,
            ProgressDelta {
                mastered: 1,
                reviewing: -1,
                ..ProgressDelta::default()
            },
        ),
        (Signal::DontKnow, 3) => (
            Level::TWO,
            ProgressDelta {
                mastered: -1,
                reviewing: 1,
                ..ProgressDelta::default()
            },
        ),
        (Signal::DontKnow, 2) => (Level::ONE, ProgressDelta::default()),
        (Signal::DontKnow, 1) => (
            Level::ZERO,
            ProgressDelta {
                learning: 1,
                reviewing: -1,
                ..ProgressDelta::default()
            },
        ),
        _ => return None,
    };

    Some(Transition {
        next: CardProgress::at(level),
        delta,
    })
}
