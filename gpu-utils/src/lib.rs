pub mod device_loss_recoverable;
pub mod wgpu_utils;
