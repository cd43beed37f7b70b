/// Implemented by GPU-backed objects that must rebuild or drop their state
/// once the device they were created with has been lost.
///
/// `device` and `queue` are the replacement pair; implementors that cannot
/// rebuild without outside input (e.g. a buffer owned by another subsystem)
/// are expected to fall back to an empty, valid state.
pub trait DeviceLossRecoverable {
    fn recover(&self, device: &wgpu::Device, queue: &wgpu::Queue);
}

impl<T> DeviceLossRecoverable for std::sync::Arc<T>
where
    T: DeviceLossRecoverable + ?Sized,
{
    fn recover(&self, device: &wgpu::Device, queue: &wgpu::Queue) {
        (**self).recover(device, queue);
    }
}
