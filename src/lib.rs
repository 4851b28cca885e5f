//! fxlens - Technical-analysis core and live tick fan-out for forex pairs

pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

// Re-export commonly used types
pub use config::{Config, FeedKind, IndicatorConfig};
pub use error::{AppError, Result};
pub use services::{
    AdviceSynthesizer, AnalysisSession, IndicatorEngine, PredictionAggregator, TickHub,
    TickListener,
};
pub use types::*;
