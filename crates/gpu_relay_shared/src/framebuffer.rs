//! Framebuffer descriptors handed to a buffer swap.

use serde::{Deserialize, Serialize};

/// Pixel format of a presented framebuffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum PixelFormat {
    /// 8 bits per channel, ABGR order.
    #[default]
    Abgr8 = 1,
    /// 16-bit packed RGB.
    Rgb565 = 4,
    /// 8 bits per channel, BGRA order.
    Bgra8 = 5,
}

impl PixelFormat {
    /// Bytes per pixel.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Abgr8 | Self::Bgra8 => 4,
            Self::Rgb565 => 2,
        }
    }
}

/// Presentation transform applied by the compositor.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransformFlags(pub u32);

impl TransformFlags {
    /// No transform.
    pub const NONE: Self = Self(0);
    /// Mirror horizontally.
    pub const FLIP_H: Self = Self(0x01);
    /// Mirror vertically.
    pub const FLIP_V: Self = Self(0x02);
    /// Rotate by 90 degrees.
    pub const ROTATE_90: Self = Self(0x04);
}

impl std::ops::BitOr for TransformFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Describes the guest framebuffer to present on a buffer swap.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramebufferConfig {
    /// Guest address of the framebuffer memory.
    pub address: u64,
    /// Byte offset of the first pixel.
    pub offset: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row pitch in pixels.
    pub stride: u32,
    /// Pixel format.
    pub pixel_format: PixelFormat,
    /// Presentation transform.
    pub transform_flags: TransformFlags,
}

impl FramebufferConfig {
    /// Creates a descriptor with no offset, stride equal to width and no transform.
    #[must_use]
    pub fn new(address: u64, width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            address,
            offset: 0,
            width,
            height,
            stride: width,
            pixel_format,
            transform_flags: TransformFlags::NONE,
        }
    }

    /// Sets the presentation transform.
    #[must_use]
    pub fn with_transform(mut self, flags: TransformFlags) -> Self {
        self.transform_flags = flags;
        self
    }

    /// Size of the framebuffer memory in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        u64::from(self.stride) * u64::from(self.height) * u64::from(self.pixel_format.bytes_per_pixel())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framebuffer_size() {
        let fb = FramebufferConfig::new(0x8000_0000, 1280, 720, PixelFormat::Abgr8);
        assert_eq!(fb.size_bytes(), 1280 * 720 * 4);

        let fb = FramebufferConfig::new(0, 320, 240, PixelFormat::Rgb565);
        assert_eq!(fb.size_bytes(), 320 * 240 * 2);
    }

    #[test]
    fn test_transform_flags() {
        let flags = TransformFlags::FLIP_V | TransformFlags::ROTATE_90;
        assert_eq!(flags, TransformFlags(0x06));
        assert_ne!(flags, TransformFlags::FLIP_H);
    }

    #[test]
    fn test_framebuffer_from_toml() {
        let fb: FramebufferConfig = toml::from_str(
            r#"
            address = 2147483648
            offset = 0
            width = 1280
            height = 720
            stride = 1280
            pixel_format = "bgra8"
            transform_flags = 2
            "#,
        )
        .unwrap();
        assert_eq!(fb.pixel_format, PixelFormat::Bgra8);
        assert_eq!(fb.transform_flags, TransformFlags::FLIP_V);
    }
}
