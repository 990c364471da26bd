pub mod audit;
pub mod device;
pub mod metrics;
pub mod secrets;
pub mod tokens;
