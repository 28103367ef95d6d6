pub mod mode;
pub mod network;
pub mod observer;

pub use mode::{global_mode, set_global_mode, ExecutionMode};
pub use network::Network;
pub use observer::{LayerObserver, LayerView, ProfileRecorder, SharedProfile};
