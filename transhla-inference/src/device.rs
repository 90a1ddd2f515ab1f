use candle_core::{
    utils::{cuda_is_available, metal_is_available},
    Device,
};
use tracing::info;

use crate::errors::InferenceError;

/// Picks where the classifiers run.
///
/// Accelerators are only considered when the crate was built with the
/// matching `cuda` or `metal` feature; `device_id` selects among them. The
/// CPU is the fallback and ignores `device_id`.
pub fn device(device_id: usize) -> Result<Device, InferenceError> {
    let device = match (cuda_is_available(), metal_is_available()) {
        (true, _) => Device::new_cuda(device_id)?,
        (false, true) => Device::new_metal(device_id)?,
        (false, false) => Device::Cpu,
    };
    info!(
        target = "transhla-inference",
        event = "device_selected",
        device_id,
        location = ?device.location(),
        "Selected inference device"
    );
    Ok(device)
}
