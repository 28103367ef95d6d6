pub mod model_loader;
pub mod weights_loader;

// Re-export key types from the parser module
pub use model_loader::NetworkLoader;
pub use weights_loader::WeightsLoader;
