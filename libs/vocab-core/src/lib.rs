//! Core learning-progress library shared by the backend services.
//!
//! Provides:
//! - Shared record types (CardProgress, CollectionProgress, UserInteraction, ...)
//! - The learning ladder driven by "know" / "don't know" signals
//! - Like/dislike/view/star toggle rules with their counter deltas

pub mod error;
pub mod ladder;
pub mod toggle;
pub mod types;

pub use error::{PolicyError, Result};
pub use ladder::{Signal, Transition};
pub use toggle::{Interaction, Toggle};
pub use types::{
    CardProgress, CardStatus, CollectionCounters, CollectionProgress, CounterDelta, Level,
    ProgressDelta, UserInteraction,
};
