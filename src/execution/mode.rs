use std::sync::OnceLock;

use log::{debug, warn};

/// Compute device selection, fixed once for the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Cpu,
    Gpu,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Cpu => "cpu",
            ExecutionMode::Gpu => "gpu",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static GLOBAL_MODE: OnceLock<ExecutionMode> = OnceLock::new();

/// Pin the process-wide execution mode.
///
/// The first caller wins; later calls keep the original value. Returns the
/// mode actually in effect.
pub fn set_global_mode(mode: ExecutionMode) -> ExecutionMode {
    let chosen = *GLOBAL_MODE.get_or_init(|| {
        debug!("execution mode set to {}", mode);
        mode
    });
    if chosen != mode {
        warn!(
            "execution mode already pinned to {}, ignoring request for {}",
            chosen, mode
        );
    }
    chosen
}

/// The mode in effect, defaulting to CPU when never set.
pub fn global_mode() -> ExecutionMode {
    GLOBAL_MODE.get().copied().unwrap_or_default()
}

/// Staging buffer standing in for device-resident input memory.
///
/// GPU runs bind the input blob through this arena instead of reading the
/// caller's buffer directly, keeping the binding path uniform with a real
/// device transfer.
#[derive(Debug)]
pub struct DeviceBinding {
    ordinal: usize,
    staging: Vec<f32>,
}

impl DeviceBinding {
    pub fn new(ordinal: usize) -> Self {
        debug!("binding device arena on ordinal {}", ordinal);
        DeviceBinding {
            ordinal,
            staging: Vec::new(),
        }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Copy `data` into the arena and hand back the staged view.
    pub fn stage(&mut self, data: &[f32]) -> &[f32] {
        self.staging.clear();
        self.staging.extend_from_slice(data);
        &self.staging
    }
}
