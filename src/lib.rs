use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub mod client;
pub mod descramble;
pub mod detection;
pub mod episode;
pub mod logging;
pub mod overlay;
pub mod pipeline;
pub mod session;
pub mod settings;
mod test_util;

pub use client::{DetectionClient, TranslationClient};
pub use descramble::{DescrambleError, DescrambleGrid, descramble, descramble_bytes, scramble};
pub use overlay::{BoundingBox, LineBreaks, OverlayBox, Point, Size, TextRegion, layout, layout_with};
pub use session::{ElementGeometry, RegionsReady, RenderTarget, ViewerSession};

const PNG_MIME: &str = "image/png";

#[derive(Debug, Clone)]
pub enum Command {
    Descramble {
        input: PathBuf,
        output: PathBuf,
        width: u32,
        height: u32,
        divisions: Option<u32>,
    },
    Layout {
        regions: PathBuf,
        source: Size,
        display: Size,
        offset: Point,
    },
    Process {
        episode: PathBuf,
        out_dir: PathBuf,
        limit: Option<usize>,
        server: Option<String>,
        english: bool,
    },
    Health {
        server: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub settings_path: Option<String>,
    pub command: Command,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let mut settings = settings::load_settings(settings_path)?;

    match config.command {
        Command::Descramble {
            input,
            output,
            width,
            height,
            divisions,
        } => run_descramble(&input, &output, width, height, divisions.unwrap_or(settings.divisions)),
        Command::Layout {
            regions,
            source,
            display,
            offset,
        } => run_layout(&regions, source, display, offset),
        Command::Process {
            episode,
            out_dir,
            limit,
            server,
            english,
        } => {
            if english {
                settings.overlay_english = true;
            }
            run_process(&settings, &episode, &out_dir, limit, server).await
        }
        Command::Health { server } => {
            let client = build_client(&settings, server)?;
            let banner = client.health().await?;
            Ok(format!("{}: {}", client.base_url(), banner.trim()))
        }
    }
}

fn run_descramble(
    input: &Path,
    output: &Path,
    width: u32,
    height: u32,
    divisions: u32,
) -> Result<String> {
    let bytes =
        fs::read(input).with_context(|| format!("failed to read image: {}", input.display()))?;
    let grid = DescrambleGrid::new(width, height, divisions)?;
    let png = descramble_bytes(&bytes, width, height, divisions)?;
    fs::write(output, png)
        .with_context(|| format!("failed to write image: {}", output.display()))?;
    Ok(format!(
        "wrote {} ({}x{}, {} tiles of {}x{})",
        output.display(),
        width,
        height,
        grid.tile_count(),
        grid.tile_width,
        grid.tile_height
    ))
}

fn run_layout(regions_path: &Path, source: Size, display: Size, offset: Point) -> Result<String> {
    let body = fs::read_to_string(regions_path)
        .with_context(|| format!("failed to read regions: {}", regions_path.display()))?;
    let response = detection::parse_detection_response(&body)?;
    let boxes = overlay::layout(&response.regions(), source, display, offset);
    serde_json::to_string_pretty(&boxes).with_context(|| "failed to serialize overlay boxes")
}

async fn run_process(
    settings: &settings::Settings,
    episode_path: &Path,
    out_dir: &Path,
    limit: Option<usize>,
    server: Option<String>,
) -> Result<String> {
    let content = fs::read_to_string(episode_path)
        .with_context(|| format!("failed to read episode: {}", episode_path.display()))?;
    let pages = episode::load_pages(&content)?;
    if pages.is_empty() {
        return Err(anyhow!("no main pages found in {}", episode_path.display()));
    }
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output directory: {}", out_dir.display()))?;

    let client = build_client(settings, server)?;
    let options = pipeline::PipelineOptions {
        divisions: settings.divisions,
        page_delay: settings.page_delay(),
        limit: limit.unwrap_or(settings.page_limit),
    };
    let mut session = ViewerSession::new(pages.len());
    let translator = if settings.overlay_english {
        session.set_line_breaks(LineBreaks::Keep);
        Some(TranslationClient::new(
            settings.translate_url.clone(),
            settings.translate_source_lang.clone(),
            settings.translate_target_lang.clone(),
            settings.server_timeout(),
        )?)
    } else {
        None
    };
    let translator = translator
        .as_ref()
        .map(|translation| translation as &dyn pipeline::TranslationBackend);
    let outcomes =
        pipeline::process_pages(&client, translator, &pages, &options, &mut session).await;

    let style = settings.overlay_style();
    let font_data = load_font_data(settings.overlay_font_path.as_deref())?;
    let mut lines = Vec::new();
    let mut failed = 0usize;
    for outcome in &outcomes {
        let page = &outcome.page;
        let Some(png) = outcome.png.as_ref() else {
            failed += 1;
            lines.push(format!(
                "page {}: {}",
                page.label(),
                outcome.error.as_deref().unwrap_or("failed")
            ));
            continue;
        };
        let stem = page.file_stem();
        write_file(&out_dir.join(format!("{}.png", stem)), png)?;
        let json = serde_json::to_vec_pretty(&outcome.regions)?;
        write_file(&out_dir.join(format!("{}.json", stem)), &json)?;

        let natural = |number: usize| {
            (number == page.number).then(|| ElementGeometry {
                display: Size::new(page.width as f64, page.height as f64),
                offset: Point::default(),
            })
        };
        let boxes = session.render_page(page.number, &natural).unwrap_or_default();
        let svg = overlay::render_svg(png, PNG_MIME, page.width, page.height, &boxes, &style);
        let annotated = overlay::render_svg_bytes(&svg, PNG_MIME, font_data.as_deref())?;
        let overlay_path = out_dir.join(format!("{}.overlay.png", stem));
        write_file(&overlay_path, &annotated)?;
        info!("page {}: wrote {}", page.label(), overlay_path.display());
        lines.push(format!(
            "page {}: {} regions -> {}",
            page.label(),
            outcome.regions.len(),
            overlay_path.display()
        ));
    }
    lines.push(format!(
        "processed {} pages ({} failed)",
        outcomes.len(),
        failed
    ));
    Ok(lines.join("\n"))
}

fn build_client(settings: &settings::Settings, server: Option<String>) -> Result<DetectionClient> {
    let url = server
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| settings.server_url.clone());
    DetectionClient::new(url, settings.server_timeout())
}

fn load_font_data(path: Option<&str>) -> Result<Option<Vec<u8>>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let data = fs::read(path).with_context(|| format!("failed to read font: {}", path))?;
    Ok(Some(data))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

/// Parses `800x1200` into a size.
pub fn parse_size(value: &str) -> Result<Size> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("expected WIDTHxHEIGHT, got '{}'", value))?;
    let width: f64 = w.trim().parse().with_context(|| format!("invalid width '{}'", w))?;
    let height: f64 = h.trim().parse().with_context(|| format!("invalid height '{}'", h))?;
    if width <= 0.0 || height <= 0.0 {
        return Err(anyhow!("size must be positive, got '{}'", value));
    }
    Ok(Size::new(width, height))
}

/// Parses `10,20` into a point.
pub fn parse_point(value: &str) -> Result<Point> {
    let (x, y) = value
        .trim()
        .split_once(',')
        .ok_or_else(|| anyhow!("expected X,Y, got '{}'", value))?;
    let x: f64 = x.trim().parse().with_context(|| format!("invalid x '{}'", x))?;
    let y: f64 = y.trim().parse().with_context(|| format!("invalid y '{}'", y))?;
    Ok(Point::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    #[test]
    fn size_and_point_parsing() {
        assert_eq!(parse_size("800x1200").expect("size"), Size::new(800.0, 1200.0));
        assert_eq!(parse_size(" 12.5 X 3 ").expect("size"), Size::new(12.5, 3.0));
        assert!(parse_size("800").is_err());
        assert!(parse_size("0x10").is_err());
        assert_eq!(parse_point("10,-2").expect("point"), Point::new(10.0, -2.0));
        assert!(parse_point("10;2").is_err());
    }

    #[test]
    fn descramble_command_writes_png() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("scrambled.png");
        let output = dir.path().join("page.png");
        let page = RgbaImage::from_fn(64, 64, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let scrambled = scramble(&DynamicImage::ImageRgba8(page.clone()), 64, 64, 4).expect("scramble");
        fs::write(&input, descramble::encode_png(&scrambled).expect("png")).expect("write input");

        let message = run_descramble(&input, &output, 64, 64, 4).expect("descramble");
        assert!(message.contains("16 tiles of 16x16"));
        let restored = image::open(&output).expect("open output").to_rgba8();
        assert_eq!(restored, page);
    }

    #[test]
    fn layout_command_prints_camel_case_boxes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.json");
        fs::write(
            &path,
            r#"{"results": [{"text": "a", "position": [100, 100, 300, 150], "font_size": 20}]}"#,
        )
        .expect("write regions");
        let json = run_layout(
            &path,
            Size::new(1000.0, 1000.0),
            Size::new(500.0, 500.0),
            Point::new(10.0, 20.0),
        )
        .expect("layout");
        let boxes: Vec<OverlayBox> = serde_json::from_str(&json).expect("boxes");
        assert_eq!(boxes.len(), 1);
        assert!(json.contains("\"fontSizePx\": 11.0"));
        assert!(json.contains("\"tooltipText\": \"a\""));
    }
}
