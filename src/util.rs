use embedded_graphics::pixelcolor::Rgb888;
use image::Rgba;
use std::fmt::Display;

/// 24-bit Red-Green-Blue color. Displays in HTML format (#rrggbb), which is
/// also how the palette constants are written.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub const WHITE: Self = Self::from_hex(0xffffff);
    /// Dark navy behind everything
    pub const BACKGROUND: Self = Self::from_hex(0x1a1a2e);
    pub const HEADER: Self = Self::from_hex(0x888888);
    pub const FOOTER: Self = Self::from_hex(0x666666);
    pub const TEMPERATURE: Self = Self::from_hex(0xff6b6b);
    pub const WIND: Self = Self::from_hex(0x4ecdc4);
    pub const HUMIDITY: Self = Self::from_hex(0x45b7d1);
    pub const FORECAST: Self = Self::from_hex(0xffd93d);

    /// Build a color from a packed `0xRRGGBB` value. Anything above the low
    /// 24 bits is thrown away.
    pub const fn from_hex(value: u32) -> Self {
        // Casting will truncate the 24 most significant bits
        Self {
            red: (value >> 16) as u8,
            green: (value >> 8) as u8,
            blue: value as u8,
        }
    }

    /// Opaque RGBA pixel, for writing straight into an image buffer
    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.red, self.green, self.blue, u8::MAX])
    }
}

impl From<u32> for Color {
    fn from(value: u32) -> Self {
        Self::from_hex(value)
    }
}

impl From<Color> for u32 {
    fn from(color: Color) -> Self {
        ((color.red as u32) << 16)
            | ((color.green as u32) << 8)
            | color.blue as u32
    }
}

impl From<Color> for Rgb888 {
    fn from(color: Color) -> Self {
        Rgb888::new(color.red, color.green, color.blue)
    }
}

impl From<Rgb888> for Color {
    fn from(color: Rgb888) -> Self {
        use embedded_graphics::pixelcolor::RgbColor;
        Self {
            red: color.r(),
            green: color.g(),
            blue: color.b(),
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:0>2x}{:0>2x}{:0>2x}", self.red, self.green, self.blue)
    }
}
