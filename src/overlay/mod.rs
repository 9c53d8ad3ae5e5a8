mod layout;
pub mod render;
mod wrap;

use serde::{Deserialize, Serialize};

pub use layout::{FONT_SIZE_MAX, FONT_SIZE_MIN, LineBreaks, layout, layout_region, layout_with};
pub use render::{OverlayStyle, render_svg, render_svg_bytes};
pub use wrap::{insert_line_breaks, is_plain_latin, wrap_chars, wrap_words};

/// Text block rectangle in the pixel space of the page it was detected on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub bbox: BoundingBox,
    pub original_text: String,
    pub translated_text: Option<String>,
    pub font_size_hint: Option<f64>,
    pub is_vertical: bool,
    pub line_count_hint: Option<usize>,
}

impl TextRegion {
    pub fn new(bbox: BoundingBox, original_text: impl Into<String>) -> Self {
        Self {
            bbox,
            original_text: original_text.into(),
            translated_text: None,
            font_size_hint: None,
            is_vertical: false,
            line_count_hint: None,
        }
    }

    /// Translation when one was supplied, the detected text otherwise.
    pub fn display_text(&self) -> &str {
        self.translated_text
            .as_deref()
            .filter(|text| !text.is_empty())
            .unwrap_or(&self.original_text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One placed overlay, in the coordinate space of the image's positioning
/// container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub font_size_px: f64,
    pub display_text: String,
    pub tooltip_text: String,
}
