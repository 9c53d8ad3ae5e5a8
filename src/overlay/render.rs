use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::OverlayBox;

const LABEL_PADDING_X: f64 = 4.0;
const LABEL_PADDING_Y: f64 = 2.0;
const LABEL_RADIUS: f64 = 3.0;
const WIDE_LABEL_FACTOR: f64 = 3.0;

#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub text_color: String,
    pub fill_color: String,
    pub fill_opacity: f32,
    pub font_family: String,
    pub line_height: f32,
    /// Let labels grow to three times the longer box side instead of the box
    /// width.
    pub wide_labels: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            text_color: "#000000".to_string(),
            fill_color: "#ffffff".to_string(),
            fill_opacity: 0.92,
            font_family: "sans-serif".to_string(),
            line_height: 1.4,
            wide_labels: false,
        }
    }
}

/// Draws the page with one centred label per overlay box on top of it.
///
/// Each label is sized to its wrapped text and never wider than its box, the
/// way an inline block with a max width sits inside a flex-centred container.
pub fn render_svg(
    image_bytes: &[u8],
    image_mime: &str,
    width: u32,
    height: u32,
    boxes: &[OverlayBox],
    style: &OverlayStyle,
) -> String {
    let encoded = BASE64.encode(image_bytes);
    let data_uri = format!("data:{};base64,{}", image_mime, encoded);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    for overlay in boxes {
        svg.push_str(&render_label(overlay, style));
    }

    svg.push_str("</svg>");
    svg
}

fn render_label(overlay: &OverlayBox, style: &OverlayStyle) -> String {
    let lines: Vec<&str> = overlay.display_text.split('\n').collect();
    let font_size = overlay.font_size_px;
    let line_height = font_size * style.line_height as f64;

    let text_w = lines
        .iter()
        .map(|line| estimate_text_width_units(line) * font_size)
        .fold(0.0, f64::max);
    let max_w = if style.wide_labels {
        overlay.width.max(overlay.height) * WIDE_LABEL_FACTOR
    } else {
        overlay.width
    }
    .max(0.0);
    let label_w = (text_w + LABEL_PADDING_X * 2.0).min(max_w);
    let label_h = lines.len() as f64 * line_height + LABEL_PADDING_Y * 2.0;

    let center_x = overlay.left + overlay.width * 0.5;
    let center_y = overlay.top + overlay.height * 0.5;
    let label_x = center_x - label_w * 0.5;
    let label_y = center_y - label_h * 0.5;

    let mut out = String::new();
    out.push_str("<g>");
    out.push_str(&format!(
        "<title>Original: {}</title>",
        escape_xml(&overlay.tooltip_text)
    ));
    out.push_str(&format!(
        r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" rx="{r}" fill="{fill}" fill-opacity="{opacity}"/>"#,
        x = label_x,
        y = label_y,
        w = label_w,
        h = label_h,
        r = LABEL_RADIUS,
        fill = escape_xml(&style.fill_color),
        opacity = style.fill_opacity
    ));
    // baseline of the first line sits one font size below the label's inner top
    let first_baseline = label_y + LABEL_PADDING_Y + (line_height - font_size) * 0.5 + font_size;
    out.push_str(&format!(
        r#"<text x="{x}" y="{y}" font-size="{size}" font-weight="bold" fill="{color}" font-family="{family}" text-anchor="middle">"#,
        x = center_x,
        y = first_baseline,
        size = font_size,
        color = escape_xml(&style.text_color),
        family = escape_xml(&style.font_family)
    ));
    for (idx, line) in lines.iter().enumerate() {
        let dy = if idx == 0 { 0.0 } else { line_height };
        out.push_str(&format!(
            r#"<tspan x="{x}" dy="{dy}">{text}</tspan>"#,
            x = center_x,
            dy = dy,
            text = escape_xml(line)
        ));
    }
    out.push_str("</text></g>");
    out
}

pub fn render_svg_bytes(svg: &str, output_mime: &str, font_data: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let format = image_format_from_mime(output_mime)
        .ok_or_else(|| anyhow!("unsupported output image mime '{}'", output_mime))?;
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    let page = image::DynamicImage::ImageRgba8(image);
    let page = if format == image::ImageFormat::Jpeg {
        image::DynamicImage::ImageRgb8(page.to_rgb8())
    } else {
        page
    };
    page.write_to(&mut cursor, format)
        .with_context(|| "failed to encode image from SVG")?;
    Ok(bytes)
}

fn image_format_from_mime(mime: &str) -> Option<image::ImageFormat> {
    match mime {
        "image/png" => Some(image::ImageFormat::Png),
        "image/jpeg" | "image/jpg" => Some(image::ImageFormat::Jpeg),
        "image/webp" => Some(image::ImageFormat::WebP),
        "image/bmp" => Some(image::ImageFormat::Bmp),
        _ => None,
    }
}

fn estimate_char_units(ch: char) -> f64 {
    if ch.is_whitespace() {
        0.3
    } else if ch.is_ascii_alphanumeric() {
        0.62
    } else if ch.is_ascii() {
        0.4
    } else if matches!(
        ch as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0x31F0..=0x31FF | 0xFF00..=0xFFEF
    ) {
        1.0
    } else {
        0.9
    }
}

fn estimate_text_width_units(text: &str) -> f64 {
    text.chars().map(estimate_char_units).sum()
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(text: &str) -> OverlayBox {
        OverlayBox {
            left: 10.0,
            top: 20.0,
            width: 100.0,
            height: 40.0,
            font_size_px: 12.0,
            display_text: text.to_string(),
            tooltip_text: "<原文>".to_string(),
        }
    }

    #[test]
    fn svg_has_one_label_per_box() {
        let boxes = vec![overlay("Hi\nthere"), overlay("yo")];
        let svg = render_svg(b"png", "image/png", 200, 100, &boxes, &OverlayStyle::default());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<rect").count(), 2);
        assert_eq!(svg.matches("<tspan").count(), 3);
        assert!(svg.contains("<title>Original: &lt;原文&gt;</title>"));
        assert!(svg.contains("data:image/png;base64,cG5n"));
    }

    #[test]
    fn label_never_exceeds_box_width() {
        let label = render_label(&overlay(&"W".repeat(80)), &OverlayStyle::default());
        assert!(label.contains(r#"width="100""#));
        assert!(label.contains(r#"x="10""#));
    }

    #[test]
    fn wide_labels_may_outgrow_the_box() {
        let style = OverlayStyle {
            wide_labels: true,
            ..OverlayStyle::default()
        };
        // about 157 wide: past the box, under the cap
        let label = render_label(&overlay(&"W".repeat(20)), &style);
        assert!(!label.contains(r#"width="100""#));
        assert!(!label.contains(r#"width="300""#));

        let capped = render_label(&overlay(&"W".repeat(200)), &style);
        assert!(capped.contains(r#"width="300""#));
    }

    #[test]
    fn rasterises_to_png() {
        let page = image::RgbaImage::from_pixel(8, 6, image::Rgba([200, 10, 10, 255]));
        let mut png = Vec::new();
        page.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("encode page");
        let svg = render_svg(&png, "image/png", 8, 6, &[], &OverlayStyle::default());
        let bytes = render_svg_bytes(&svg, "image/png", None).expect("png");
        let decoded = image::load_from_memory(&bytes).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }
}
