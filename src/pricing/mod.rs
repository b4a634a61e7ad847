pub mod cache;
pub mod calculator;

pub use cache::PriceCache;
pub use calculator::CostCalculator;
