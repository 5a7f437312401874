// Frame Recorder - pre-recorded clear/present command buffers
//
// One command pool on the presentation-capable queue family, one primary
// command buffer per swapchain image. Each buffer transitions the image to
// TRANSFER_DST, clears it, and transitions it to PRESENT_SRC. Buffers are
// recorded with SIMULTANEOUS_USE so the same buffer can be resubmitted every
// frame without re-recording.
//
// Must be rebuilt whenever the swapchain is (the image count may change).

use crate::backend::{Swapchain, VulkanDevice};
use crate::error::RendererError;
use ash::vk;
use std::sync::Arc;

pub struct FrameResources {
    pub command_pool: vk::CommandPool,
    /// One pre-recorded command buffer per swapchain image
    pub command_buffers: Vec<vk::CommandBuffer>,
    device: Arc<VulkanDevice>,
}

impl FrameResources {
    pub fn new(
        device: Arc<VulkanDevice>,
        swapchain: &Swapchain,
        clear_color: [f32; 4],
    ) -> Result<Self, RendererError> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(device.present_queue_family);

        let command_pool = unsafe { device.device.create_command_pool(&pool_info, None) }
            .map_err(RendererError::RecordingFailed)?;

        // The pool is owned from here on, so any later failure frees it via Drop
        let mut frames = Self {
            command_pool,
            command_buffers: Vec::new(),
            device,
        };

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(frames.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(swapchain.images.len() as u32);

        frames.command_buffers =
            unsafe { frames.device.device.allocate_command_buffers(&alloc_info) }
                .map_err(RendererError::RecordingFailed)?;

        frames.record(swapchain, clear_color)?;

        log::info!(
            "Recorded {} clear command buffers",
            frames.command_buffers.len()
        );

        Ok(frames)
    }

    /// Record the barrier/clear/barrier sequence into every buffer.
    ///
    /// Each buffer is fully begun and ended within one loop iteration, so a
    /// failure never leaves an earlier buffer stuck in the "begun" state.
    fn record(&self, swapchain: &Swapchain, clear_color: [f32; 4]) -> Result<(), RendererError> {
        let device = &self.device.device;

        let clear_value = vk::ClearColorValue {
            float32: clear_color,
        };

        let subresource_range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };

        for (&cmd, &image) in self.command_buffers.iter().zip(swapchain.images.iter()) {
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::SIMULTANEOUS_USE);

            unsafe {
                device
                    .begin_command_buffer(cmd, &begin_info)
                    .map_err(RendererError::RecordingFailed)?;

                // UNDEFINED -> TRANSFER_DST: vkCmdClearColorImage needs the
                // image in a transfer-destination layout
                let barrier_to_clear = vk::ImageMemoryBarrier::builder()
                    .src_access_mask(vk::AccessFlags::MEMORY_READ)
                    .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image)
                    .subresource_range(subresource_range)
                    .build();

                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier_to_clear],
                );

                device.cmd_clear_color_image(
                    cmd,
                    image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &clear_value,
                    &[subresource_range],
                );

                // TRANSFER_DST -> PRESENT_SRC: presentation engine requirement
                let barrier_to_present = vk::ImageMemoryBarrier::builder()
                    .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                    .dst_access_mask(vk::AccessFlags::MEMORY_READ)
                    .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image)
                    .subresource_range(subresource_range)
                    .build();

                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier_to_present],
                );

                device
                    .end_command_buffer(cmd)
                    .map_err(RendererError::RecordingFailed)?;
            }
        }

        Ok(())
    }
}

impl Drop for FrameResources {
    fn drop(&mut self) {
        unsafe {
            // Destroying the pool frees its command buffers
            self.device
                .device
                .destroy_command_pool(self.command_pool, None);
        }
    }
}
