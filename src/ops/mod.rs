pub mod registry;
pub mod tensor;
pub mod math;
pub mod nn;
pub mod activations;

pub mod prelude {
    pub use super::registry::{LayerOp, LayerOpRegistry, LayerWeights};
    pub use super::tensor::{Shape, Tensor};
}

pub use registry::{LayerOp, LayerOpRegistry, LayerWeights};
pub use tensor::{Shape, Tensor};
