use std::sync::{Arc, Mutex};

use crate::ops::tensor::Shape;
use crate::profile::Profile;

/// Profiling slot shared between a predictor and its recorder.
///
/// `None` until a session is first started; recording hooks stay registered
/// but do nothing while the slot is empty.
pub type SharedProfile = Arc<Mutex<Option<Profile>>>;

/// Snapshot of a layer handed to observers when its execution starts.
#[derive(Debug, Clone)]
pub struct LayerView<'a> {
    /// Position of the layer in execution order.
    pub index: usize,
    pub name: &'a str,
    pub kind: &'a str,
    /// Shapes of the parameter tensors the layer owns, binding order.
    pub shapes: &'a [Shape],
}

/// Callback surface invoked around every layer execution.
pub trait LayerObserver: Send {
    fn on_layer_start(&mut self, layer: &LayerView<'_>);
    fn on_layer_end(&mut self, index: usize);
}

/// Observer that records layer timings into a shared profiling session.
#[derive(Debug, Clone)]
pub struct ProfileRecorder {
    profile: SharedProfile,
}

impl ProfileRecorder {
    pub fn new(profile: SharedProfile) -> Self {
        ProfileRecorder { profile }
    }
}

impl LayerObserver for ProfileRecorder {
    fn on_layer_start(&mut self, layer: &LayerView<'_>) {
        if let Ok(mut slot) = self.profile.lock() {
            if let Some(profile) = slot.as_mut() {
                profile.begin_layer(layer.index, layer.name, layer.kind, layer.shapes.to_vec());
            }
        }
    }

    fn on_layer_end(&mut self, index: usize) {
        if let Ok(mut slot) = self.profile.lock() {
            if let Some(profile) = slot.as_mut() {
                profile.end_layer(index);
            }
        }
    }
}
