// Capability probing - pure selection logic over queried surface/device data
//
// Everything in this module is a pure function of the values reported by the
// driver; the actual queries live in device.rs and swapchain.rs. Keeping the
// decisions separate from the FFI calls makes them unit-testable.

use crate::error::RendererError;
use ash::vk;

/// Extent requested when the surface leaves the size up to the application
/// (current_extent reports the u32::MAX sentinel).
pub const DEFAULT_EXTENT: vk::Extent2D = vk::Extent2D {
    width: 800,
    height: 600,
};

/// Fallback format when the surface reports no preference.
pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::R8G8B8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Minimum 2D image dimension a physical device must support.
pub const MIN_IMAGE_DIMENSION_2D: u32 = 4096;

/// Number of swapchain images to request: one more than the surface minimum
/// (so acquire doesn't stall), capped at the maximum when one is reported.
/// A reported maximum of zero means "unbounded".
pub fn select_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut image_count = caps.min_image_count + 1;
    if caps.max_image_count > 0 && image_count > caps.max_image_count {
        image_count = caps.max_image_count;
    }
    image_count
}

/// Choose the swapchain surface format.
///
/// A single UNDEFINED entry means the surface has no preference, so we take
/// the fixed RGBA8 default. Otherwise prefer an exact RGBA8 match, falling
/// back to the first reported format.
pub fn select_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    if formats.len() == 1 && formats[0].format == vk::Format::UNDEFINED {
        return DEFAULT_SURFACE_FORMAT;
    }

    formats
        .iter()
        .find(|f| f.format == vk::Format::R8G8B8A8_UNORM)
        .or_else(|| formats.first())
        .copied()
        .unwrap_or(DEFAULT_SURFACE_FORMAT)
}

/// Choose the swapchain extent.
///
/// When current_extent carries the "match window size" sentinel the surface
/// lets us pick, clamped per axis to the reported min/max. Otherwise the
/// surface dictates the extent and we use it verbatim.
pub fn select_extent(
    caps: &vk::SurfaceCapabilitiesKHR,
    requested: vk::Extent2D,
) -> vk::Extent2D {
    if caps.current_extent.width == u32::MAX {
        vk::Extent2D {
            width: requested.width.clamp(
                caps.min_image_extent.width,
                caps.max_image_extent.width,
            ),
            height: requested.height.clamp(
                caps.min_image_extent.height,
                caps.max_image_extent.height,
            ),
        }
    } else {
        caps.current_extent
    }
}

/// Image usage for a clear-and-present pipeline: the clear goes through
/// vkCmdClearColorImage, which needs TRANSFER_DST support on the swapchain.
pub fn select_usage_flags(
    caps: &vk::SurfaceCapabilitiesKHR,
) -> Result<vk::ImageUsageFlags, RendererError> {
    if caps
        .supported_usage_flags
        .contains(vk::ImageUsageFlags::TRANSFER_DST)
    {
        return Ok(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::COLOR_ATTACHMENT);
    }

    log::error!(
        "TRANSFER_DST not supported by the swapchain; supported usage flags: {:?}",
        caps.supported_usage_flags
    );
    Err(RendererError::UnsupportedUsage)
}

/// Prefer the identity transform when available, otherwise keep whatever
/// transform the surface is currently using.
pub fn select_transform(caps: &vk::SurfaceCapabilitiesKHR) -> vk::SurfaceTransformFlagsKHR {
    if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    }
}

/// Choose the present mode: the configured preference first if the surface
/// supports it, then MAILBOX (low-latency triple buffering), then FIFO.
///
/// FIFO is mandated by the Vulkan spec, so the error arm should be
/// unreachable on a conformant driver; it still must not crash on a
/// non-conformant one.
pub fn select_present_mode(
    modes: &[vk::PresentModeKHR],
    preferred: Option<vk::PresentModeKHR>,
) -> Result<vk::PresentModeKHR, RendererError> {
    if let Some(mode) = preferred {
        if modes.contains(&mode) {
            return Ok(mode);
        }
        log::warn!(
            "Configured present mode {:?} not supported by the surface, falling back",
            mode
        );
    }

    modes
        .iter()
        .copied()
        .find(|&mode| mode == vk::PresentModeKHR::MAILBOX)
        .or_else(|| {
            modes
                .iter()
                .copied()
                .find(|&mode| mode == vk::PresentModeKHR::FIFO)
        })
        .ok_or(RendererError::NoPresentMode)
}

/// Select the graphics and presentation queue family indices.
///
/// `present_support[i]` reports whether family `i` can present to the target
/// surface. A single family serving both roles is preferred; otherwise the
/// first graphics-capable and first present-capable families are taken, even
/// if distinct.
pub fn select_queue_families(
    families: &[vk::QueueFamilyProperties],
    present_support: &[bool],
) -> Option<(u32, u32)> {
    let mut graphics_family = None;

    for (i, family) in families.iter().enumerate() {
        if family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            if graphics_family.is_none() {
                graphics_family = Some(i as u32);
            }
            // A family that does both graphics and presentation wins outright
            if present_support.get(i).copied().unwrap_or(false) {
                return Some((i as u32, i as u32));
            }
        }
    }

    let present_family = present_support
        .iter()
        .position(|&supported| supported)
        .map(|i| i as u32)?;

    graphics_family.map(|graphics| (graphics, present_family))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps_with_counts(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        }
    }

    #[test]
    fn image_count_unbounded_adds_one() {
        let caps = caps_with_counts(3, 0);
        assert_eq!(select_image_count(&caps), 4);
    }

    #[test]
    fn image_count_within_bounds() {
        let caps = caps_with_counts(2, 4);
        assert_eq!(select_image_count(&caps), 3);
    }

    #[test]
    fn image_count_clamped_to_maximum() {
        let caps = caps_with_counts(3, 3);
        assert_eq!(select_image_count(&caps), 3);
    }

    #[test]
    fn format_undefined_means_no_preference() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::UNDEFINED,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let chosen = select_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn format_prefers_exact_rgba8_match() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(
            select_surface_format(&formats).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn format_falls_back_to_first_reported() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::R5G6B5_UNORM_PACK16,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        assert_eq!(
            select_surface_format(&formats).format,
            vk::Format::B8G8R8A8_SRGB
        );
    }

    #[test]
    fn format_selection_is_idempotent() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let first = select_surface_format(&formats);
        let second = select_surface_format(&formats);
        assert_eq!(first.format, second.format);
        assert_eq!(first.color_space, second.color_space);
    }

    #[test]
    fn extent_sentinel_clamps_requested_size() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            ..Default::default()
        };
        let extent = select_extent(&caps, DEFAULT_EXTENT);
        assert_eq!(extent.width, 640);
        assert_eq!(extent.height, 480);
    }

    #[test]
    fn extent_uses_surface_size_when_reported() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 1280,
                height: 720,
            },
            ..Default::default()
        };
        let extent = select_extent(&caps, DEFAULT_EXTENT);
        assert_eq!(extent.width, 1280);
        assert_eq!(extent.height, 720);
    }

    #[test]
    fn usage_requires_transfer_dst() {
        let caps = vk::SurfaceCapabilitiesKHR {
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::TRANSFER_DST,
            ..Default::default()
        };
        let usage = select_usage_flags(&caps).unwrap();
        assert!(usage.contains(vk::ImageUsageFlags::TRANSFER_DST));
    }

    #[test]
    fn usage_missing_transfer_dst_is_an_error() {
        let caps = vk::SurfaceCapabilitiesKHR {
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            ..Default::default()
        };
        assert!(matches!(
            select_usage_flags(&caps),
            Err(RendererError::UnsupportedUsage)
        ));
    }

    #[test]
    fn transform_prefers_identity() {
        let caps = vk::SurfaceCapabilitiesKHR {
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY
                | vk::SurfaceTransformFlagsKHR::ROTATE_90,
            current_transform: vk::SurfaceTransformFlagsKHR::ROTATE_90,
            ..Default::default()
        };
        assert_eq!(
            select_transform(&caps),
            vk::SurfaceTransformFlagsKHR::IDENTITY
        );
    }

    #[test]
    fn transform_falls_back_to_current() {
        let caps = vk::SurfaceCapabilitiesKHR {
            supported_transforms: vk::SurfaceTransformFlagsKHR::ROTATE_90,
            current_transform: vk::SurfaceTransformFlagsKHR::ROTATE_90,
            ..Default::default()
        };
        assert_eq!(
            select_transform(&caps),
            vk::SurfaceTransformFlagsKHR::ROTATE_90
        );
    }

    #[test]
    fn present_mode_prefers_mailbox_over_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            select_present_mode(&modes, None).unwrap(),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn present_mode_fifo_when_only_fifo() {
        let modes = [vk::PresentModeKHR::FIFO];
        assert_eq!(
            select_present_mode(&modes, None).unwrap(),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn present_mode_neither_is_an_error() {
        let modes = [vk::PresentModeKHR::IMMEDIATE];
        assert!(matches!(
            select_present_mode(&modes, None),
            Err(RendererError::NoPresentMode)
        ));
    }

    #[test]
    fn present_mode_configured_preference_wins_when_supported() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(
            select_present_mode(&modes, Some(vk::PresentModeKHR::IMMEDIATE)).unwrap(),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn present_mode_unsupported_preference_falls_back() {
        let modes = [vk::PresentModeKHR::FIFO];
        assert_eq!(
            select_present_mode(&modes, Some(vk::PresentModeKHR::MAILBOX)).unwrap(),
            vk::PresentModeKHR::FIFO
        );
    }

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn queue_selection_prefers_combined_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1),
        ];
        // Family 0 can't present, family 1 can: the combined family wins even
        // though a graphics-only family appears first
        let selected = select_queue_families(&families, &[false, true]);
        assert_eq!(selected, Some((1, 1)));
    }

    #[test]
    fn queue_selection_splits_families_when_needed() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::TRANSFER, 1),
        ];
        let selected = select_queue_families(&families, &[false, true]);
        assert_eq!(selected, Some((0, 1)));
    }

    #[test]
    fn queue_selection_fails_without_present_support() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        assert_eq!(select_queue_families(&families, &[false]), None);
    }

    #[test]
    fn queue_selection_fails_without_graphics() {
        let families = [family(vk::QueueFlags::TRANSFER, 1)];
        assert_eq!(select_queue_families(&families, &[true]), None);
    }

    #[test]
    fn queue_selection_ignores_empty_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 0),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        let selected = select_queue_families(&families, &[true, true]);
        assert_eq!(selected, Some((1, 1)));
    }
}
