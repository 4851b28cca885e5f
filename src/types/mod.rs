pub mod advice;
pub mod bar;
pub mod indicator;
pub mod prediction;
pub mod tick;
pub mod timeframe;

pub use advice::*;
pub use bar::*;
pub use indicator::*;
pub use prediction::*;
pub use tick::*;
pub use timeframe::*;
