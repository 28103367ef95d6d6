pub mod parser;
pub mod error;
pub mod model;
pub mod proto;
pub mod ops;
pub mod execution;
pub mod profile;
pub mod predictor;
pub mod capi;

// Re-export commonly used types
pub use model::{InputDef, LayerDef, LayerId, LayerKind, LayerParams, NetworkDef};
pub use error::{Error, Result};
pub use ops::tensor::{Shape, Tensor};
pub use ops::registry::{LayerOp, LayerOpRegistry, LayerWeights};
pub use execution::mode::{global_mode, set_global_mode, ExecutionMode};
pub use execution::network::Network;
pub use execution::observer::{LayerObserver, LayerView, ProfileRecorder, SharedProfile};
pub use parser::{NetworkLoader, WeightsLoader};
pub use profile::{Profile, ProfileEntry};
pub use predictor::Predictor;
pub use proto::{LayerWeightsProto, NetWeights, TensorBlob};
