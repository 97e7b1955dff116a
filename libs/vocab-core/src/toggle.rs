//! Like/dislike/view/star rules for a user's interaction with a collection.

use serde::{Deserialize, Serialize};

use crate::types::{CounterDelta, UserInteraction};

/// A user action on a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    Like,
    Dislike,
    View,
    Star,
}

/// Outcome of an interaction: the user's next flags and the global counter changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggle {
    pub next: UserInteraction,
    pub delta: CounterDelta,
}

/// Counter change implied by creating a user's interaction row.
pub fn first_touch_delta() -> CounterDelta {
    CounterDelta {
        views: 1,
        ..CounterDelta::default()
    }
}

/// Apply an interaction to the user's current flags.
///
/// Like and dislike are toggles that exclude each other: liking clears an
/// existing dislike first. View only ever sets the flag. Star flips and has no
/// global counter.
pub fn apply(current: UserInteraction, interaction: Interaction) -> Toggle {
    match interaction {
        Interaction::Like => {
            let (liked, disliked, delta) = react(current.liked, current.disliked);
            Toggle {
                next: UserInteraction {
                    liked,
                    disliked,
                    ..current
                },
                delta: CounterDelta {
                    likes: delta.0,
                    dislikes: delta.1,
                    views: 0,
                },
            }
        }
        Interaction::Dislike => {
            let (disliked, liked, delta) = react(current.disliked, current.liked);
            Toggle {
                next: UserInteraction {
                    liked,
                    disliked,
                    ..current
                },
                delta: CounterDelta {
                    likes: delta.1,
                    dislikes: delta.0,
                    views: 0,
                },
            }
        }
        Interaction::View if current.viewed => Toggle {
            next: current,
            delta: CounterDelta::default(),
        },
        Interaction::View => Toggle {
            next: UserInteraction {
                viewed: true,
                ..current
            },
            delta: CounterDelta {
                views: 1,
                ..CounterDelta::default()
            },
        },
        Interaction::Star => Toggle {
            next: UserInteraction {
                starred: !current.starred,
                ..current
            },
            delta: CounterDelta::default(),
        },
    }
}

/// Toggle `own` while clearing `opposite`; returns the new pair and the
/// `(own, opposite)` counter steps.
fn react(own: bool, opposite: bool) -> (bool, bool, (i32, i32)) {
    let opposite_step = if opposite { -1 } else { 0 };
    if own {
        (false, false, (-1, opposite_step))
    } else {
        (true, false, (1, opposite_step))
    }
}
