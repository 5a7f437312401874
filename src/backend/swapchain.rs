// Swapchain - the presentable image ring
//
// Queries surface capabilities/formats/present modes, applies the selection
// rules from probe.rs and creates the swapchain. Recreation chains through
// old_swapchain: the caller keeps the old Swapchain alive until the new one
// exists, then drops it.

use crate::backend::probe;
use crate::backend::VulkanDevice;
use crate::error::RendererError;
use ash::extensions::khr;
use ash::prelude::VkResult;
use ash::vk;
use std::sync::Arc;

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub loader: khr::Swapchain,
    pub images: Vec<vk::Image>,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    // Keeps the logical device alive for as long as the swapchain handle is
    _device: Arc<VulkanDevice>,
}

impl Swapchain {
    /// Create a swapchain for the device's surface.
    ///
    /// `requested_extent` is only honored when the surface reports the
    /// "match window size" sentinel; otherwise the surface dictates the size.
    /// `old` is passed as the chain predecessor so in-flight presentation can
    /// finish; the caller destroys it (by dropping) after this returns Ok.
    pub fn new(
        device: Arc<VulkanDevice>,
        requested_extent: vk::Extent2D,
        preferred_present_mode: Option<vk::PresentModeKHR>,
        old: Option<&Swapchain>,
    ) -> Result<Self, RendererError> {
        let caps = unsafe {
            device.surface_loader.get_physical_device_surface_capabilities(
                device.physical_device,
                device.surface,
            )
        }
        .map_err(RendererError::SwapchainCreationFailed)?;

        let formats = unsafe {
            device.surface_loader.get_physical_device_surface_formats(
                device.physical_device,
                device.surface,
            )
        }
        .map_err(RendererError::SwapchainCreationFailed)?;

        let present_modes = unsafe {
            device
                .surface_loader
                .get_physical_device_surface_present_modes(device.physical_device, device.surface)
        }
        .map_err(RendererError::SwapchainCreationFailed)?;

        let image_count = probe::select_image_count(&caps);
        let surface_format = probe::select_surface_format(&formats);
        let extent = probe::select_extent(&caps, requested_extent);
        let usage = probe::select_usage_flags(&caps)?;
        let transform = probe::select_transform(&caps);
        let present_mode = probe::select_present_mode(&present_modes, preferred_present_mode)?;

        log::info!(
            "Creating swapchain: {}x{}, {} images, {:?}/{:?}, present mode {:?}",
            extent.width,
            extent.height,
            image_count,
            surface_format.format,
            surface_format.color_space,
            present_mode,
        );

        let old_swapchain = old
            .map(|s| s.swapchain)
            .unwrap_or_else(vk::SwapchainKHR::null);

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(device.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(usage)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let loader = khr::Swapchain::new(&device.instance, &device.device);
        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(RendererError::SwapchainCreationFailed)?;

        let images = match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                return Err(RendererError::SwapchainCreationFailed(e));
            }
        };

        log::debug!("Swapchain holds {} images", images.len());

        Ok(Self {
            swapchain,
            loader,
            images,
            format: surface_format.format,
            color_space: surface_format.color_space,
            extent,
            present_mode,
            _device: device,
        })
    }

    /// Acquire the index of the next presentable image, signaling `semaphore`
    /// once the image is actually available. Raw driver result; the present
    /// loop decides how OUT_OF_DATE / SUBOPTIMAL are handled.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> VkResult<(u32, bool)> {
        unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        }
    }

    /// Queue the image for presentation, gated on `wait_semaphores`.
    /// Ok(true) means suboptimal.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> VkResult<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe { self.loader.queue_present(queue, &present_info) }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}
