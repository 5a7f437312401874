// Synchronization primitives
//
// Two binary semaphores reused across all frames: acquire signals
// image_available, submit waits on it and signals render_finished, present
// waits on render_finished. With a single pair there can never be more than
// one frame in flight; the strictly sequential loop in presenter.rs is what
// keeps each semaphore at one outstanding wait/signal.

use crate::backend::VulkanDevice;
use crate::error::RendererError;
use ash::vk;
use std::sync::Arc;

pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    device: Arc<VulkanDevice>,
}

impl FrameSync {
    pub fn new(device: Arc<VulkanDevice>) -> Result<Self, RendererError> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();

        let image_available =
            unsafe { device.device.create_semaphore(&semaphore_info, None) }
                .map_err(RendererError::SyncCreationFailed)?;

        let render_finished = match unsafe {
            device.device.create_semaphore(&semaphore_info, None)
        } {
            Ok(semaphore) => semaphore,
            Err(e) => {
                unsafe { device.device.destroy_semaphore(image_available, None) };
                return Err(RendererError::SyncCreationFailed(e));
            }
        };

        Ok(Self {
            image_available,
            render_finished,
            device,
        })
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe {
            self.device
                .device
                .destroy_semaphore(self.image_available, None);
            self.device
                .device
                .destroy_semaphore(self.render_finished, None);
        }
    }
}
