pub mod card_progress;
pub mod collection_progress;
pub mod social;

pub use card_progress::CardProgressEngine;
pub use collection_progress::CollectionProgressAggregator;
pub use social::SocialEngine;
