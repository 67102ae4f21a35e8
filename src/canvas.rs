use crate::{
    layout::{Anchor, DrawInstruction, FontRole, Geometry},
    util::Color,
};
use anyhow::Context;
use embedded_graphics::{
    geometry::{OriginDimensions, Point, Size},
    mono_font::{iso_8859_1::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb888,
    text::{Alignment, Baseline, Text, TextStyleBuilder},
    Drawable, Pixel,
};
use image::{imageops, DynamicImage, ImageFormat, RgbaImage};
use log::{debug, trace, warn};
use std::{convert::Infallible, path::Path};
use u8g2_fonts::{
    fonts,
    types::{FontColor, HorizontalAlignment, VerticalPosition},
    FontRenderer,
};

/// A surface that draw instructions are applied to, strictly in order. Later
/// instructions paint over earlier ones.
pub trait Canvas {
    fn apply(&mut self, instruction: &DrawInstruction);

    fn apply_all<'a>(
        &mut self,
        instructions: impl IntoIterator<Item = &'a DrawInstruction>,
    ) {
        for instruction in instructions {
            self.apply(instruction);
        }
    }

    /// Write the finished image out
    fn flush(&self, path: &Path) -> anyhow::Result<()>;
}

/// In-memory RGBA canvas, written out as PNG
pub struct ImageCanvas {
    image: RgbaImage,
}

impl ImageCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn for_geometry(geometry: &Geometry) -> Self {
        Self::new(geometry.width, geometry.height)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    fn fill(&mut self, color: Color) {
        let pixel = color.to_rgba();
        for p in self.image.pixels_mut() {
            *p = pixel;
        }
    }

    fn draw_text(
        &mut self,
        text: &str,
        position: Point,
        role: FontRole,
        color: Color,
        anchor: Anchor,
    ) {
        let font = font(role);
        let alignment = match anchor {
            Anchor::Left => HorizontalAlignment::Left,
            Anchor::Center => HorizontalAlignment::Center,
        };

        // Check every glyph exists before touching any pixels, so a failed
        // render doesn't leave half a word behind under the fallback
        if let Err(err) = font.get_rendered_dimensions_aligned(
            text,
            position,
            VerticalPosition::Top,
            alignment,
        ) {
            warn!(
                "{role:?} font can't render {text:?} ({err:?}), \
                using fallback font"
            );
            self.draw_fallback_text(text, position, color, anchor);
            return;
        }

        if let Err(err) = font.render_aligned(
            text,
            position,
            VerticalPosition::Top,
            alignment,
            FontColor::Transparent(Rgb888::from(color)),
            self,
        ) {
            warn!("Error rendering {text:?}: {err:?}");
        }
    }

    /// Built-in fixed-width Latin-1 font, for text the real fonts can't do
    fn draw_fallback_text(
        &mut self,
        text: &str,
        position: Point,
        color: Color,
        anchor: Anchor,
    ) {
        let style = MonoTextStyle::new(&FONT_10X20, Rgb888::from(color));
        let text_style = TextStyleBuilder::new()
            .baseline(Baseline::Top)
            .alignment(match anchor {
                Anchor::Left => Alignment::Left,
                Anchor::Center => Alignment::Center,
            })
            .build();
        // Drawing into memory can't fail
        Text::with_text_style(text, position, style, text_style)
            .draw(self)
            .ok();
    }
}

impl Canvas for ImageCanvas {
    fn apply(&mut self, instruction: &DrawInstruction) {
        trace!("Applying {instruction:?}");
        match instruction {
            DrawInstruction::FillBackground(color) => self.fill(*color),
            DrawInstruction::DrawText {
                position,
                text,
                font,
                color,
                anchor,
            } => self.draw_text(text, *position, *font, *color, *anchor),
            DrawInstruction::DrawIcon { position, icon } => imageops::overlay(
                &mut self.image,
                &icon.pixels,
                position.x.into(),
                position.y.into(),
            ),
        }
    }

    fn flush(&self, path: &Path) -> anyhow::Result<()> {
        // Nothing is translucent in the final image
        let rgb = DynamicImage::ImageRgba8(self.image.clone()).into_rgb8();
        rgb.save_with_format(path, ImageFormat::Png)
            .with_context(|| {
                format!("Error writing report image to {}", path.display())
            })?;
        debug!(
            "Wrote {}x{} image to {}",
            rgb.width(),
            rgb.height(),
            path.display()
        );
        Ok(())
    }
}

impl OriginDimensions for ImageCanvas {
    fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }
}

impl embedded_graphics::draw_target::DrawTarget for ImageCanvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            // Text can hang off the edge; clip it
            let (Ok(x), Ok(y)) =
                (u32::try_from(point.x), u32::try_from(point.y))
            else {
                continue;
            };
            if x < self.image.width() && y < self.image.height() {
                self.image.put_pixel(x, y, Color::from(color).to_rgba());
            }
        }
        Ok(())
    }
}

/// Bitmap font for each text role. All of these cover Latin-1, so Swedish
/// names and the degree sign work.
fn font(role: FontRole) -> FontRenderer {
    match role {
        FontRole::Title => FontRenderer::new::<fonts::u8g2_font_fub30_tf>(),
        FontRole::Location => FontRenderer::new::<fonts::u8g2_font_fub25_tf>(),
        FontRole::Data => FontRenderer::new::<fonts::u8g2_font_fur17_tf>(),
        FontRole::Small => FontRenderer::new::<fonts::u8g2_font_fur11_tf>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::Icon;
    use image::Rgba;
    use std::sync::Arc;

    fn text(
        text: &str,
        (x, y): (i32, i32),
        color: Color,
        anchor: Anchor,
    ) -> DrawInstruction {
        DrawInstruction::DrawText {
            position: Point::new(x, y),
            text: text.into(),
            font: FontRole::Data,
            color,
            anchor,
        }
    }

    /// Does any pixel inside the box have this color?
    fn has_color(
        canvas: &ImageCanvas,
        (x0, y0): (u32, u32),
        (x1, y1): (u32, u32),
        color: Color,
    ) -> bool {
        (x0..x1).any(|x| {
            (y0..y1).any(|y| *canvas.image().get_pixel(x, y) == color.to_rgba())
        })
    }

    fn icon(size: u32, pixel: [u8; 4]) -> Arc<Icon> {
        Arc::new(Icon {
            name: "test".into(),
            size,
            pixels: RgbaImage::from_pixel(size, size, Rgba(pixel)),
        })
    }

    #[test]
    fn test_fill() {
        let mut canvas = ImageCanvas::new(20, 10);
        canvas.apply(&DrawInstruction::FillBackground(Color::BACKGROUND));
        assert!(canvas
            .image()
            .pixels()
            .all(|pixel| *pixel == Color::BACKGROUND.to_rgba()));
    }

    #[test]
    fn test_text() {
        let mut canvas = ImageCanvas::new(200, 60);
        canvas.apply_all(&[
            DrawInstruction::FillBackground(Color::BACKGROUND),
            text("Mölndal 5.0°C", (10, 10), Color::TEMPERATURE, Anchor::Left),
        ]);
        assert!(has_color(&canvas, (10, 10), (200, 60), Color::TEMPERATURE));
        // Nothing above or left of the anchor
        assert!(!has_color(&canvas, (0, 0), (200, 8), Color::TEMPERATURE));
        assert!(!has_color(&canvas, (0, 0), (8, 60), Color::TEMPERATURE));
    }

    #[test]
    fn test_text_centered() {
        let mut canvas = ImageCanvas::new(200, 60);
        canvas.apply(&text("ab", (100, 10), Color::WHITE, Anchor::Center));
        // Centered text straddles the anchor
        assert!(has_color(&canvas, (80, 10), (100, 60), Color::WHITE));
        assert!(has_color(&canvas, (100, 10), (120, 60), Color::WHITE));
    }

    #[test]
    fn test_text_fallback() {
        let mut canvas = ImageCanvas::new(200, 60);
        // No u8g2 Latin-1 glyph for this
        canvas.apply(&text("Łódź", (10, 10), Color::WIND, Anchor::Left));
        assert!(has_color(&canvas, (10, 10), (200, 60), Color::WIND));
    }

    #[test]
    fn test_text_clipped() {
        let mut canvas = ImageCanvas::new(20, 20);
        canvas.apply_all(&[
            DrawInstruction::FillBackground(Color::BACKGROUND),
            text("clipped", (-10, 2), Color::WHITE, Anchor::Left),
            text("gone", (500, 500), Color::WHITE, Anchor::Left),
        ]);
        // The part of the text that overlaps the canvas is drawn
        assert!(has_color(&canvas, (0, 0), (20, 20), Color::WHITE));
        // Every pixel is either background or text, and the canvas didn't
        // grow to fit the text
        assert_eq!(canvas.image().dimensions(), (20, 20));
        assert!(canvas.image().pixels().all(|pixel| {
            *pixel == Color::BACKGROUND.to_rgba()
                || *pixel == Color::WHITE.to_rgba()
        }));
    }

    #[test]
    fn test_icon() {
        let mut canvas = ImageCanvas::new(20, 20);
        canvas.apply_all(&[
            DrawInstruction::FillBackground(Color::BACKGROUND),
            DrawInstruction::DrawIcon {
                position: Point::new(5, 5),
                icon: icon(4, [255, 0, 0, 255]),
            },
            // Fully transparent icon leaves the background alone
            DrawInstruction::DrawIcon {
                position: Point::new(12, 12),
                icon: icon(4, [0, 255, 0, 0]),
            },
        ]);
        let image = canvas.image();
        assert_eq!(image.get_pixel(6, 6).0, [255, 0, 0, 255]);
        assert_eq!(*image.get_pixel(4, 4), Color::BACKGROUND.to_rgba());
        assert_eq!(*image.get_pixel(13, 13), Color::BACKGROUND.to_rgba());
    }

    #[test]
    fn test_order() {
        let mut canvas = ImageCanvas::new(100, 40);
        canvas.apply_all(&[
            text("hidden", (0, 0), Color::WHITE, Anchor::Left),
            DrawInstruction::FillBackground(Color::BACKGROUND),
        ]);
        assert!(!has_color(&canvas, (0, 0), (100, 40), Color::WHITE));
    }

    #[test]
    fn test_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.png");
        let geometry = Geometry::new(120, false, 2);
        let mut canvas = ImageCanvas::for_geometry(&geometry);
        canvas.apply(&DrawInstruction::FillBackground(Color::BACKGROUND));
        canvas.flush(&path).unwrap();

        let written = image::open(&path).unwrap().into_rgb8();
        assert_eq!(written.dimensions(), (120, 100 + 2 * 90 + 40 + 20));
        assert_eq!(written.get_pixel(0, 0).0, [0x1a, 0x1a, 0x2e]);
    }

    #[test]
    fn test_flush_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.png");
        let canvas = ImageCanvas::new(10, 10);
        assert!(canvas.flush(&path).is_err());
    }
}
