// Backend module - Vulkan abstraction layer
//
// Thin wrappers around ash: each driver-owned handle lives in a struct whose
// Drop releases it, so teardown ordering falls out of ownership instead of
// manual destroy calls.

pub mod commands;
pub mod device;
pub mod probe;
pub mod swapchain;
pub mod sync;

pub use commands::FrameResources;
pub use device::VulkanDevice;
pub use swapchain::Swapchain;
pub use sync::FrameSync;
