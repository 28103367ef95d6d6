//! Forward-pass predictor over a loaded network.
//!
//! A predictor owns the network, its blob storage, and an optional
//! profiling session. Input buffers hold whole instances in NCHW order;
//! short buffers are zero-padded up to the configured batch.

use std::path::Path;
use std::sync::{Arc, Mutex};

use log::debug;

use crate::error::{Error, Result};
use crate::execution::mode;
use crate::execution::mode::ExecutionMode;
use crate::execution::network::Network;
use crate::execution::observer::{ProfileRecorder, SharedProfile};
use crate::model::NetworkDef;
use crate::parser::model_loader::NetworkLoader;
use crate::parser::weights_loader::WeightsLoader;
use crate::profile::Profile;
use crate::proto::NetWeights;

pub struct Predictor {
    network: Network,
    profile: SharedProfile,
    hooks_registered: bool,
    channels: usize,
    height: usize,
    width: usize,
    pred_len: usize,
    padded: Vec<f32>,
    has_run: bool,
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("network", &self.network.name())
            .field("batch", &self.network.batch())
            .field("channels", &self.channels)
            .field("height", &self.height)
            .field("width", &self.width)
            .field("pred_len", &self.pred_len)
            .finish()
    }
}

impl Predictor {
    /// Load a definition and weights pair from disk and build a predictor.
    pub fn from_files(definition: &Path, weights: &Path) -> Result<Self> {
        let def = NetworkLoader::load(definition)?;
        let container = WeightsLoader::load(weights)?;
        Self::new(def, &container)
    }

    /// Like [`Predictor::from_files`], but with the batch size overridden.
    pub fn from_files_with_batch(
        definition: &Path,
        weights: &Path,
        batch: usize,
    ) -> Result<Self> {
        let def = NetworkLoader::load(definition)?;
        let container = WeightsLoader::load(weights)?;
        Self::with_batch(def, &container, batch)
    }

    /// Build a predictor, overriding the definition's batch dimension.
    pub fn with_batch(mut def: NetworkDef, weights: &NetWeights, batch: usize) -> Result<Self> {
        if batch == 0 {
            return Err(Error::UnsupportedGeometry(
                "Batch size must be positive".to_string(),
            ));
        }
        def.input.shape[0] = batch;
        Self::new(def, weights)
    }

    /// Build a predictor from an in-memory definition and weights container.
    ///
    /// The execution mode in effect at construction time is captured for the
    /// predictor's whole lifetime.
    pub fn new(def: NetworkDef, weights: &NetWeights) -> Result<Self> {
        let [batch, channels, height, width] = def.input.shape;
        if channels != 1 && channels != 3 {
            return Err(Error::UnsupportedGeometry(format!(
                "Input channels must be 1 or 3, got {}",
                channels
            )));
        }

        let bound = WeightsLoader::bind(&def, weights)?;
        let network = Network::new(def, bound, mode::global_mode())?;
        let pred_len = network.output_shape().iter().skip(1).product();

        debug!(
            "predictor ready: batch {}, {}x{}x{}, pred_len {}",
            batch, channels, height, width, pred_len
        );

        Ok(Predictor {
            network,
            profile: Arc::new(Mutex::new(None)),
            hooks_registered: false,
            channels,
            height,
            width,
            pred_len,
            padded: Vec::new(),
            has_run: false,
        })
    }

    /// Run one forward pass.
    ///
    /// `input` must hold between one and `batch` whole instances of
    /// `instance_len` values each. Buffers shorter than a full batch are
    /// zero-padded. The returned view is the output blob of the full batch
    /// and stays valid until the next call that mutates the predictor.
    pub fn predict(&mut self, input: &[f32]) -> Result<&[f32]> {
        let instance = self.instance_len();
        if input.is_empty() || input.len() % instance != 0 {
            return Err(Error::ValidationError(format!(
                "Input must hold whole instances of {} values, got {}",
                instance,
                input.len()
            )));
        }

        let instances = input.len() / instance;
        let batch = self.network.batch();
        if instances > batch {
            return Err(Error::ValidationError(format!(
                "Input holds {} instances but the batch size is {}",
                instances, batch
            )));
        }

        if instances == batch {
            self.network.forward(input)?;
        } else {
            self.padded.clear();
            self.padded.resize(batch * instance, 0.0);
            self.padded[..input.len()].copy_from_slice(input);
            self.network.forward(&self.padded)?;
        }

        self.has_run = true;
        Ok(self.network.output())
    }

    /// View of the most recent predictions, `batch * pred_len` values.
    ///
    /// Returns `None` before the first successful `predict`.
    pub fn last_output(&self) -> Option<&[f32]> {
        if self.has_run {
            Some(self.network.output())
        } else {
            None
        }
    }

    /// Begin a profiling session, replacing any session already running.
    ///
    /// Recording hooks are attached to the network on the first call and
    /// stay attached for the predictor's lifetime.
    pub fn start_profiling(&mut self, name: &str, metadata: &str) {
        if !self.hooks_registered {
            self.network
                .add_observer(Box::new(ProfileRecorder::new(self.profile.clone())));
            self.hooks_registered = true;
        }
        if let Ok(mut slot) = self.profile.lock() {
            match slot.as_mut() {
                Some(profile) => profile.reset(name, metadata),
                None => *slot = Some(Profile::new(name, metadata)),
            }
        }
    }

    /// Stamp the end time of the running session, if any.
    pub fn end_profiling(&mut self) {
        if let Ok(mut slot) = self.profile.lock() {
            if let Some(profile) = slot.as_mut() {
                profile.finish();
            }
        }
    }

    /// Clear the recorded entries of the running session, if any.
    ///
    /// The session and its hooks stay in place; the next forward pass
    /// records a fresh set of entries.
    pub fn disable_profiling(&mut self) {
        if let Ok(mut slot) = self.profile.lock() {
            if let Some(profile) = slot.as_mut() {
                profile.clear_entries();
            }
        }
    }

    /// Serialized report of the running session.
    ///
    /// With no session installed this is the canonical empty report, so the
    /// result is always parseable JSON.
    pub fn read_profile(&self) -> Result<String> {
        match self.profile.lock() {
            Ok(slot) => match slot.as_ref() {
                Some(profile) => profile.to_json(),
                None => Ok(Profile::empty_report()),
            },
            Err(_) => Ok(Profile::empty_report()),
        }
    }

    pub fn is_profiling(&self) -> bool {
        self.profile
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Values per instance in the input blob.
    pub fn instance_len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn batch(&self) -> usize {
        self.network.batch()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Values per instance in the output blob.
    pub fn pred_len(&self) -> usize {
        self.pred_len
    }

    pub fn mode(&self) -> ExecutionMode {
        self.network.mode()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }
}
