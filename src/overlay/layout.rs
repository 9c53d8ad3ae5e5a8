use tracing::trace;

use super::wrap::insert_line_breaks;
use super::{BoundingBox, OverlayBox, Point, Size, TextRegion};

pub const FONT_SIZE_MIN: f64 = 11.0;
pub const FONT_SIZE_MAX: f64 = 30.0;

const BOX_PADDING_RATIO: f64 = 0.1;
const FALLBACK_FONT_RATIO: f64 = 0.13;
const VERTICAL_INSET: f64 = 10.0;

/// How display text is broken into lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineBreaks {
    /// Wrap to the box for vertical text or a multi-line hint.
    #[default]
    Fit,
    /// Leave the text as given; used for machine-translated labels that are
    /// allowed to grow wider than their box.
    Keep,
}

/// Places every region on the rendered image, preserving input order.
///
/// `source` is the pixel space the region boxes are expressed in, `display`
/// the on-screen size of the image element and `offset` its position inside
/// the positioning container.
pub fn layout(regions: &[TextRegion], source: Size, display: Size, offset: Point) -> Vec<OverlayBox> {
    layout_with(regions, source, display, offset, LineBreaks::Fit)
}

/// [`layout`] with an explicit line-breaking mode.
pub fn layout_with(
    regions: &[TextRegion],
    source: Size,
    display: Size,
    offset: Point,
    line_breaks: LineBreaks,
) -> Vec<OverlayBox> {
    let (scale_x, scale_y) = scale_factors(source, display);
    trace!(
        "layout {} regions at scale {:.3}x{:.3}",
        regions.len(),
        scale_x,
        scale_y
    );
    regions
        .iter()
        .map(|region| place(region, scale_x, scale_y, offset, line_breaks))
        .collect()
}

/// Single-region variant of [`layout`].
pub fn layout_region(region: &TextRegion, source: Size, display: Size, offset: Point) -> OverlayBox {
    let (scale_x, scale_y) = scale_factors(source, display);
    place(region, scale_x, scale_y, offset, LineBreaks::Fit)
}

fn scale_factors(source: Size, display: Size) -> (f64, f64) {
    // a missing source size falls back to the displayed size
    let source_w = if source.width > 0.0 { source.width } else { display.width };
    let source_h = if source.height > 0.0 { source.height } else { display.height };
    (ratio(display.width, source_w), ratio(display.height, source_h))
}

fn ratio(display: f64, source: f64) -> f64 {
    if source > 0.0 { display / source } else { 1.0 }
}

fn place(
    region: &TextRegion,
    scale_x: f64,
    scale_y: f64,
    offset: Point,
    line_breaks: LineBreaks,
) -> OverlayBox {
    let screen = screen_box(&region.bbox, scale_x, scale_y, offset);
    let width = screen.width();
    let height = screen.height();
    let font_size_px = font_size(region.font_size_hint, scale_x.min(scale_y), height);
    let display_text = match line_breaks {
        LineBreaks::Fit => wrap_display_text(region, width, font_size_px),
        LineBreaks::Keep => region.display_text().to_string(),
    };

    OverlayBox {
        left: screen.xmin,
        top: screen.ymin,
        width,
        height,
        font_size_px,
        display_text,
        tooltip_text: region.original_text.clone(),
    }
}

/// Scale, then pad by a tenth of the scaled size on each side, then offset.
/// Out-of-range and degenerate boxes pass through unclamped.
fn screen_box(bbox: &BoundingBox, scale_x: f64, scale_y: f64, offset: Point) -> BoundingBox {
    let mut xmin = bbox.xmin * scale_x;
    let mut ymin = bbox.ymin * scale_y;
    let mut xmax = bbox.xmax * scale_x;
    let mut ymax = bbox.ymax * scale_y;

    let pad_x = (xmax - xmin) * BOX_PADDING_RATIO;
    let pad_y = (ymax - ymin) * BOX_PADDING_RATIO;
    xmin -= pad_x;
    xmax += pad_x;
    ymin -= pad_y;
    ymax += pad_y;

    BoundingBox {
        xmin: xmin + offset.x,
        ymin: ymin + offset.y,
        xmax: xmax + offset.x,
        ymax: ymax + offset.y,
    }
}

fn font_size(hint: Option<f64>, scale: f64, box_height: f64) -> f64 {
    // zero means absent; a negative hint still scales and then clamps
    let size = match hint.filter(|value| *value != 0.0 && !value.is_nan()) {
        Some(hint) => hint * scale,
        None => box_height * FALLBACK_FONT_RATIO,
    };
    if size.is_nan() {
        return FONT_SIZE_MIN;
    }
    size.clamp(FONT_SIZE_MIN, FONT_SIZE_MAX)
}

fn wrap_display_text(region: &TextRegion, box_width: f64, font_size_px: f64) -> String {
    let text = region.display_text();
    if text.contains('\n') {
        return text.to_string();
    }
    let chars_per_line = if region.is_vertical {
        let fit = ((box_width - VERTICAL_INSET) / font_size_px).floor();
        Some(fit.max(1.0) as usize)
    } else {
        match region.line_count_hint {
            Some(lines) if lines > 1 => {
                let len = text.chars().count();
                Some(len.div_ceil(lines).max(1))
            }
            _ => None,
        }
    };
    match chars_per_line {
        Some(chars_per_line) => insert_line_breaks(text, chars_per_line),
        None => text.to_string(),
    }
}
