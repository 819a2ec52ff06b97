pub mod config;
pub mod engine;
pub mod gexbot_client;
pub mod logging;
pub mod models;
pub mod render;

// Re-exports for convenience
pub use engine::{derive_levels, scan_strikes, EngineConfig, ResistanceSign};
pub use gexbot_client::GexBotClient;
pub use models::{DerivedLevels, GexSnapshot, Level, LevelKind, StrikeExposure};
