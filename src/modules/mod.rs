pub mod analysis;
pub mod engine;
pub mod games;
pub mod jobs;
pub mod notifications;
