mod decimal;
mod float64;
mod timestamp;

pub use decimal::Decimal;
pub use float64::{Float64, Float64Error};
pub use timestamp::Timestamp;
