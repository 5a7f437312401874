// Vulkan Device Context
//
// Responsibilities:
// - Library load + instance creation (with required surface extensions)
// - Presentation surface creation from raw window handles
// - Physical device selection (surface-aware)
// - Logical device + graphics/present queue creation
//
// Owns everything with instance lifetime. Drop waits for the device to go
// idle and then tears down in reverse dependency order: device, surface,
// debug messenger, instance.

use crate::backend::probe;
use crate::error::RendererError;
use ash::extensions::{ext, khr};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{CStr, CString};
use std::sync::Arc;

pub struct VulkanDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub surface: vk::SurfaceKHR,
    pub surface_loader: khr::Surface,
    pub instance: ash::Instance,
    _entry: Entry,

    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub graphics_queue_family: u32,
    pub present_queue_family: u32,

    // Debug utils (if validation enabled)
    debug_utils: Option<(ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanDevice {
    /// Bootstrap the full device context against a native window.
    ///
    /// Strict order: load library, create instance, create surface, select a
    /// physical device that can present to that surface, create the logical
    /// device, fetch queue handles. Every failure aborts the whole sequence.
    pub fn new(
        app_name: &str,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
        enable_validation: bool,
    ) -> Result<Arc<Self>, RendererError> {
        log::info!("Creating Vulkan device context: {}", app_name);

        let entry = unsafe { Entry::load() }.map_err(|e| match e {
            ash::LoadingError::MissingEntryPoint(missing) => {
                RendererError::EntryPointMissing(missing.to_string())
            }
            other => RendererError::LibraryLoadFailed(other.to_string()),
        })?;

        let instance = Self::create_instance(&entry, app_name, display_handle, enable_validation)?;

        let debug_utils = if enable_validation {
            Some(Self::setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        let surface_loader = khr::Surface::new(&entry, &instance);
        let surface = unsafe {
            ash_window::create_surface(&entry, &instance, display_handle, window_handle, None)
        }
        .map_err(RendererError::SurfaceCreationFailed)?;

        let (physical_device, graphics_queue_family, present_queue_family) =
            Self::pick_physical_device(&instance, &surface_loader, surface)?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        log::info!(
            "Selected GPU: {} (queue families: graphics={}, present={})",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy(),
            graphics_queue_family,
            present_queue_family,
        );

        let device = Self::create_logical_device(
            &instance,
            physical_device,
            graphics_queue_family,
            present_queue_family,
        )?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_queue_family, 0) };

        Ok(Arc::new(Self {
            device,
            physical_device,
            surface,
            surface_loader,
            instance,
            _entry: entry,
            graphics_queue,
            present_queue,
            graphics_queue_family,
            present_queue_family,
            debug_utils,
        }))
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        display_handle: RawDisplayHandle,
        enable_validation: bool,
    ) -> Result<ash::Instance, RendererError> {
        let app_name_cstr =
            CString::new(app_name).unwrap_or_else(|_| CString::new("vk-clear").unwrap());
        let engine_name = CString::new("No Engine").unwrap();

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_0);

        // Surface extensions for the running platform, validated against what
        // the loader actually reports before attempting instance creation
        let surface_extensions = ash_window::enumerate_required_extensions(display_handle)
            .map_err(RendererError::SurfaceCreationFailed)?;

        let available = entry
            .enumerate_instance_extension_properties(None)
            .map_err(|_| {
                RendererError::EntryPointMissing(
                    "vkEnumerateInstanceExtensionProperties".to_string(),
                )
            })?;

        for &required in surface_extensions {
            let name = unsafe { CStr::from_ptr(required) };
            let found = available
                .iter()
                .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == name);
            if !found {
                return Err(RendererError::ExtensionUnavailable(
                    name.to_string_lossy().into_owned(),
                ));
            }
        }

        let mut extensions = surface_extensions.to_vec();
        if enable_validation {
            extensions.push(ext::DebugUtils::name().as_ptr());
        }

        let layer_names = if enable_validation {
            vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        unsafe { entry.create_instance(&create_info, None) }
            .map_err(RendererError::InstanceCreationFailed)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ext::DebugUtils, vk::DebugUtilsMessengerEXT), RendererError> {
        let debug_utils = ext::DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .map_err(RendererError::InstanceCreationFailed)?;

        Ok((debug_utils, messenger))
    }

    /// Select the first physical device that can drive the presentation
    /// pipeline: large enough 2D images, the swapchain extension, and queue
    /// families covering graphics and presentation to the target surface.
    fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &khr::Surface,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, u32, u32), RendererError> {
        let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
            log::error!("Physical device enumeration failed: {}", e);
            RendererError::NoSuitableDevice
        })?;

        for device in devices {
            if let Some((graphics, present)) =
                Self::check_physical_device(instance, surface_loader, surface, device)
            {
                return Ok((device, graphics, present));
            }
        }

        Err(RendererError::NoSuitableDevice)
    }

    fn check_physical_device(
        instance: &ash::Instance,
        surface_loader: &khr::Surface,
        surface: vk::SurfaceKHR,
        device: vk::PhysicalDevice,
    ) -> Option<(u32, u32)> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy();

        if properties.limits.max_image_dimension2_d < probe::MIN_IMAGE_DIMENSION_2D {
            log::debug!("Skipping {}: insufficient image dimension support", name);
            return None;
        }

        let extensions = unsafe { instance.enumerate_device_extension_properties(device) }.ok()?;
        let has_swapchain = extensions.iter().any(|ext| {
            (unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }) == khr::Swapchain::name()
        });
        if !has_swapchain {
            log::debug!("Skipping {}: no swapchain extension", name);
            return None;
        }

        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        if families.is_empty() {
            log::debug!("Skipping {}: no queue families", name);
            return None;
        }

        let present_support: Vec<bool> = (0..families.len())
            .map(|i| {
                unsafe {
                    surface_loader.get_physical_device_surface_support(device, i as u32, surface)
                }
                .unwrap_or(false)
            })
            .collect();

        let selected = probe::select_queue_families(&families, &present_support);
        if selected.is_none() {
            log::debug!("Skipping {}: no graphics/present queue families", name);
        }
        selected
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: u32,
        present_queue_family: u32,
    ) -> Result<ash::Device, RendererError> {
        let queue_priorities = [1.0];

        // One queue-create-info per distinct family
        let mut queue_create_infos = vec![vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(graphics_queue_family)
            .queue_priorities(&queue_priorities)
            .build()];
        if present_queue_family != graphics_queue_family {
            queue_create_infos.push(
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(present_queue_family)
                    .queue_priorities(&queue_priorities)
                    .build(),
            );
        }

        let extensions = [khr::Swapchain::name().as_ptr()];

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions);

        unsafe { instance.create_device(physical_device, &create_info, None) }
            .map_err(RendererError::DeviceCreationFailed)
    }

    /// Wait for all queued work to complete (required before teardown and
    /// swapchain rebuilds). The raw driver result is returned so callers on
    /// the live path can react to device loss.
    pub fn wait_idle(&self) -> VkResult<()> {
        unsafe { self.device.device_wait_idle() }
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device context");

        // Teardown proceeds regardless; there is nothing left to do about a
        // lost device here
        let _ = self.wait_idle();

        unsafe {
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);

            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
