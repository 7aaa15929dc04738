pub mod calculator;
pub mod engine;
pub mod limiter;
pub mod neighbors;

pub use calculator::{CalcError, GeoCalculator, HaversineCalculator};
pub use engine::{DetectionEngine, DetectionError};
pub use limiter::{ConnectionLimiter, LimiterError};
pub use neighbors::NeighborSelector;
