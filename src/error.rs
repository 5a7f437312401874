// Error taxonomy for the presentation bootstrap
//
// Setup failures are fatal and bubble up to main; inside the frame loop only
// OUT_OF_DATE is recovered (swapchain rebuild), everything else is returned
// to the caller.

use ash::vk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RendererError {
    #[error("could not load the Vulkan library: {0}")]
    LibraryLoadFailed(String),

    #[error("missing Vulkan entry point: {0}")]
    EntryPointMissing(String),

    #[error("required instance extension {0:?} is not available")]
    ExtensionUnavailable(String),

    #[error("Vulkan instance creation failed: {0}")]
    InstanceCreationFailed(vk::Result),

    #[error("no physical device meets the renderer requirements")]
    NoSuitableDevice,

    #[error("logical device creation failed: {0}")]
    DeviceCreationFailed(vk::Result),

    #[error("presentation surface creation failed: {0}")]
    SurfaceCreationFailed(vk::Result),

    #[error("swapchain creation failed: {0}")]
    SwapchainCreationFailed(vk::Result),

    #[error("swapchain images do not support transfer-destination usage")]
    UnsupportedUsage,

    #[error("surface reports no usable present mode")]
    NoPresentMode,

    #[error("synchronization primitive creation failed: {0}")]
    SyncCreationFailed(vk::Result),

    #[error("command buffer recording failed: {0}")]
    RecordingFailed(vk::Result),

    #[error("frame acquire/submit/present failed: {0}")]
    AcquirePresentFailed(vk::Result),
}
