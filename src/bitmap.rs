//! Texture rasterisation
//!
//! Renders SVG scenes into transparent RGBA pixmaps and encodes them as PNG
//! in memory, ready to be handed to the host as a texture.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to parse SVG: {0}")]
    Svg(#[from] usvg::Error),
    #[error("Failed to create {width}x{height} pixmap")]
    Pixmap { width: u32, height: u32 },
    #[error("Failed to encode PNG: {0}")]
    Encode(String),
}

/// PNG-encoded RGBA bitmap handed to the host for display.
#[derive(Clone, PartialEq)]
pub struct Texture {
    width: u32,
    height: u32,
    png: Vec<u8>,
}

impl Texture {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Encoded PNG bytes
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    /// Decode into raw RGBA pixels for hosts that upload textures themselves.
    pub fn to_rgba(&self) -> Result<image::RgbaImage, image::ImageError> {
        Ok(image::load_from_memory_with_format(&self.png, image::ImageFormat::Png)?.to_rgba8())
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("png_bytes", &self.png.len())
            .finish()
    }
}

/// SVG rasteriser with its font database loaded once.
pub struct Rasterizer {
    options: usvg::Options<'static>,
}

impl Rasterizer {
    /// Rasteriser using the system fonts.
    pub fn new() -> Self {
        let mut options = usvg::Options::default();

        options.fontdb_mut().load_system_fonts();

        // Set generic font families as fallbacks
        options.fontdb_mut().set_sans_serif_family("DejaVu Sans");
        options.fontdb_mut().set_serif_family("DejaVu Serif");
        options.fontdb_mut().set_monospace_family("DejaVu Sans Mono");

        tracing::debug!("Loaded {} fonts from system", options.fontdb_mut().len());

        Self { options }
    }

    /// Rasteriser without any fonts; text elements are skipped.
    pub fn without_fonts() -> Self {
        Self {
            options: usvg::Options::default(),
        }
    }

    /// Render `svg` scaled to `width` x `height` on a transparent background.
    pub fn render(&self, svg: &str, width: u32, height: u32) -> Result<Texture, RenderError> {
        let tree = usvg::Tree::from_data(svg.as_bytes(), &self.options)?;

        // Pixmaps start fully transparent
        let mut pixmap =
            tiny_skia::Pixmap::new(width, height).ok_or(RenderError::Pixmap { width, height })?;

        let svg_size = tree.size();
        let transform = tiny_skia::Transform::from_scale(
            width as f32 / svg_size.width(),
            height as f32 / svg_size.height(),
        );

        resvg::render(&tree, transform, &mut pixmap.as_mut());

        let png = pixmap
            .encode_png()
            .map_err(|e| RenderError::Encode(e.to_string()))?;

        Ok(Texture { width, height, png })
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Self::new()
    }
}
