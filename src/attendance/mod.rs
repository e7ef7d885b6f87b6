pub mod clock;
pub mod error;
pub mod events;
pub mod extractor;
pub mod face;
pub mod pipeline;
pub mod policy;
pub mod stats;
pub mod store;
