// Present Loop
//
// Drives the strictly sequential frame protocol:
//
//   acquire (signal image_available)
//     -> submit clear buffer (wait image_available, signal render_finished)
//       -> present (wait render_finished)
//
// Only one frame is ever in flight: the two semaphores in FrameSync are
// reused every frame, so a second outstanding acquire/submit pair would be
// unsafe. OUT_OF_DATE at acquire or present triggers a synchronous rebuild
// of the swapchain and frame resources before the next acquire; SUBOPTIMAL
// is tolerated. Any other driver failure is surfaced to the caller.

use crate::backend::{FrameResources, FrameSync, Swapchain, VulkanDevice};
use crate::error::RendererError;
use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::sync::Arc;

/// Per-tick frame production, consumed by the external event loop.
pub trait Drawable {
    /// Render one frame. Ok(false) means the frame was skipped (minimized
    /// window or a rebuild this tick).
    fn draw_frame(&mut self) -> Result<bool, RendererError>;
}

/// Size-change notifications from the windowing collaborator.
pub trait Resizable {
    fn on_surface_resized(&mut self, width: u32, height: u32) -> Result<(), RendererError>;
}

/// Owns the whole presentation stack.
///
/// Field order matters: Drop runs sync, then frame resources, then the
/// swapchain, and the device context (device, surface, instance) last.
pub struct Presenter {
    clear_color: [f32; 4],
    preferred_present_mode: Option<vk::PresentModeKHR>,
    window_extent: vk::Extent2D,
    is_minimized: bool,

    sync: FrameSync,
    frames: FrameResources,
    swapchain: Swapchain,
    device: Arc<VulkanDevice>,
}

impl Presenter {
    /// One-time setup: device context, semaphores, swapchain, pre-recorded
    /// frame resources. Any failure aborts the whole sequence; there is no
    /// partial-state retry.
    #[allow(clippy::too_many_arguments)]
    pub fn prepare(
        app_name: &str,
        clear_color: [f32; 4],
        preferred_present_mode: Option<vk::PresentModeKHR>,
        enable_validation: bool,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        width: u32,
        height: u32,
    ) -> Result<Self, RendererError> {
        let device = VulkanDevice::new(app_name, display_handle, window_handle, enable_validation)?;
        let sync = FrameSync::new(device.clone())?;

        let window_extent = vk::Extent2D { width, height };
        let swapchain = Swapchain::new(
            device.clone(),
            window_extent,
            preferred_present_mode,
            None,
        )?;
        let frames = FrameResources::new(device.clone(), &swapchain, clear_color)?;

        log::info!("Presentation pipeline ready");

        Ok(Self {
            clear_color,
            preferred_present_mode,
            window_extent,
            is_minimized: width == 0 || height == 0,
            sync,
            frames,
            swapchain,
            device,
        })
    }

    /// Replace the swapchain, chaining through the old one. The old
    /// swapchain is destroyed only after the new one exists; on failure the
    /// old one stays current.
    pub fn create_swapchain(&mut self) -> Result<(), RendererError> {
        let old_extent = self.swapchain.extent;
        let new = Swapchain::new(
            self.device.clone(),
            self.window_extent,
            self.preferred_present_mode,
            Some(&self.swapchain),
        )?;
        log::debug!(
            "Swapchain replaced: {}x{} -> {}x{} ({:?}, {:?}, {:?})",
            old_extent.width,
            old_extent.height,
            new.extent.width,
            new.extent.height,
            new.format,
            new.color_space,
            new.present_mode,
        );
        self.swapchain = new;
        Ok(())
    }

    /// Re-record frame resources against the current swapchain. Buffer count
    /// always matches the swapchain image count.
    pub fn create_frame_resources(&mut self) -> Result<(), RendererError> {
        self.frames = FrameResources::new(self.device.clone(), &self.swapchain, self.clear_color)?;
        Ok(())
    }

    /// Synchronous rebuild after OUT_OF_DATE or a resize. Blocks until the
    /// new swapchain and matching frame resources exist.
    fn rebuild(&mut self) -> Result<(), RendererError> {
        log::info!(
            "Rebuilding swapchain ({}x{})",
            self.window_extent.width,
            self.window_extent.height
        );
        // A wait failure (device loss) aborts the rebuild like any other
        // swapchain-recreation step
        self.device
            .wait_idle()
            .map_err(RendererError::SwapchainCreationFailed)?;
        self.create_swapchain()?;
        self.create_frame_resources()
    }

    /// Block until the device has finished all queued work.
    pub fn wait_idle(&self) -> VkResult<()> {
        self.device.wait_idle()
    }
}

impl Drawable for Presenter {
    fn draw_frame(&mut self) -> Result<bool, RendererError> {
        if self.is_minimized {
            return Ok(false);
        }

        let image_index = match classify_acquire(
            self.swapchain.acquire_next_image(self.sync.image_available),
        )? {
            AcquireOutcome::Ready(index) => index,
            AcquireOutcome::Rebuild => {
                self.rebuild()?;
                return Ok(false);
            }
        };

        let wait_semaphores = [self.sync.image_available];
        let wait_stages = [vk::PipelineStageFlags::TRANSFER];
        let command_buffers = [self.frames.command_buffers[image_index as usize]];
        let signal_semaphores = [self.sync.render_finished];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let submit_queue = select_submit_queue(
            self.device.graphics_queue_family,
            self.device.present_queue_family,
            self.device.graphics_queue,
            self.device.present_queue,
        );

        unsafe {
            self.device
                .device
                .queue_submit(submit_queue, &[submit_info.build()], vk::Fence::null())
        }
        .map_err(RendererError::AcquirePresentFailed)?;

        match classify_present(self.swapchain.present(
            self.device.present_queue,
            image_index,
            &[self.sync.render_finished],
        ))? {
            PresentOutcome::Presented => Ok(true),
            PresentOutcome::Rebuild => {
                self.rebuild()?;
                Ok(false)
            }
        }
    }
}

impl Resizable for Presenter {
    fn on_surface_resized(&mut self, width: u32, height: u32) -> Result<(), RendererError> {
        if width == 0 || height == 0 {
            // Minimized: keep the old swapchain, just stop drawing
            self.is_minimized = true;
            return Ok(());
        }

        self.is_minimized = false;
        self.window_extent = vk::Extent2D { width, height };
        self.rebuild()
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        // No resource may be destroyed while the queues still reference it
        let _ = self.device.wait_idle();
    }
}

#[derive(Debug, PartialEq, Eq)]
enum AcquireOutcome {
    Ready(u32),
    Rebuild,
}

#[derive(Debug, PartialEq, Eq)]
enum PresentOutcome {
    Presented,
    Rebuild,
}

/// Pick the queue for the clear submission. The graphics queue is the
/// normal target, but the command buffers come from a pool on the present
/// queue family: when the two families differ, submission must go to a
/// queue of the pool's family to be valid, so the present queue is used.
fn select_submit_queue(
    graphics_family: u32,
    present_family: u32,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
) -> vk::Queue {
    if graphics_family == present_family {
        graphics_queue
    } else {
        present_queue
    }
}

/// Map an acquire result onto the loop's state transitions: OUT_OF_DATE
/// means rebuild, SUBOPTIMAL is treated as success, anything else is fatal
/// for the frame.
fn classify_acquire(result: VkResult<(u32, bool)>) -> Result<AcquireOutcome, RendererError> {
    match result {
        Ok((index, _suboptimal)) => Ok(AcquireOutcome::Ready(index)),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::Rebuild),
        Err(e) => Err(RendererError::AcquirePresentFailed(e)),
    }
}

/// Same policy for the present result.
fn classify_present(result: VkResult<bool>) -> Result<PresentOutcome, RendererError> {
    match result {
        Ok(_suboptimal) => Ok(PresentOutcome::Presented),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Rebuild),
        Err(e) => Err(RendererError::AcquirePresentFailed(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    #[test]
    fn submission_targets_graphics_queue_for_a_shared_family() {
        let graphics = vk::Queue::from_raw(1);
        let present = vk::Queue::from_raw(2);
        assert_eq!(select_submit_queue(0, 0, graphics, present), graphics);
    }

    #[test]
    fn submission_follows_the_pool_family_when_queues_split() {
        let graphics = vk::Queue::from_raw(1);
        let present = vk::Queue::from_raw(2);
        // Buffers are allocated from the present-family pool, so a split
        // device must submit them on the present queue
        assert_eq!(select_submit_queue(0, 1, graphics, present), present);
    }

    #[test]
    fn acquire_success_proceeds_with_index() {
        assert_eq!(
            classify_acquire(Ok((2, false))).unwrap(),
            AcquireOutcome::Ready(2)
        );
    }

    #[test]
    fn acquire_suboptimal_is_tolerated() {
        assert_eq!(
            classify_acquire(Ok((0, true))).unwrap(),
            AcquireOutcome::Ready(0)
        );
    }

    #[test]
    fn acquire_out_of_date_requests_rebuild() {
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            AcquireOutcome::Rebuild
        );
    }

    #[test]
    fn acquire_other_errors_are_fatal_for_the_frame() {
        let err = classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)).unwrap_err();
        assert!(matches!(
            err,
            RendererError::AcquirePresentFailed(vk::Result::ERROR_DEVICE_LOST)
        ));
    }

    #[test]
    fn present_success_and_suboptimal_complete_the_frame() {
        assert_eq!(
            classify_present(Ok(false)).unwrap(),
            PresentOutcome::Presented
        );
        assert_eq!(
            classify_present(Ok(true)).unwrap(),
            PresentOutcome::Presented
        );
    }

    #[test]
    fn present_out_of_date_requests_rebuild() {
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            PresentOutcome::Rebuild
        );
    }

    #[test]
    fn present_surface_lost_is_fatal_for_the_frame() {
        let err = classify_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).unwrap_err();
        assert!(matches!(err, RendererError::AcquirePresentFailed(_)));
    }
}
