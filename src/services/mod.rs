pub mod advice;
pub mod analysis;
pub mod indicators;
pub mod prediction;
pub mod tick_hub;

pub use advice::AdviceSynthesizer;
pub use analysis::AnalysisSession;
pub use indicators::IndicatorEngine;
pub use prediction::PredictionAggregator;
pub use tick_hub::{FixedDelay, ListenerId, ReconnectPolicy, TickHub, TickListener};
