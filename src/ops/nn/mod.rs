pub mod conv;
pub mod pool;

pub use conv::Convolution;
pub use pool::{AveragePool, MaxPool};
