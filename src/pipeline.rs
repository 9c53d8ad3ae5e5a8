use anyhow::{Context, Result};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::client::{DetectionClient, TranslationClient};
use crate::descramble::{DEFAULT_DIVISIONS, descramble_bytes};
use crate::detection::DetectionResponse;
use crate::episode::PageSource;
use crate::overlay::{Size, TextRegion};
use crate::session::RegionsReady;

pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(500);

pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Where page bytes come from and where descrambled pages are sent.
pub trait DetectionBackend {
    fn fetch_page<'a>(&'a self, src: &'a str) -> BackendFuture<'a, Vec<u8>>;
    fn detect<'a>(&'a self, png: Vec<u8>, filename: &'a str)
    -> BackendFuture<'a, DetectionResponse>;
}

impl DetectionBackend for DetectionClient {
    fn fetch_page<'a>(&'a self, src: &'a str) -> BackendFuture<'a, Vec<u8>> {
        Box::pin(DetectionClient::fetch_page(self, src))
    }

    fn detect<'a>(
        &'a self,
        png: Vec<u8>,
        filename: &'a str,
    ) -> BackendFuture<'a, DetectionResponse> {
        Box::pin(self.process(png, filename))
    }
}

/// Machine translation for regions the detection server left untranslated.
pub trait TranslationBackend {
    fn translate<'a>(&'a self, text: &'a str) -> BackendFuture<'a, String>;
}

impl TranslationBackend for TranslationClient {
    fn translate<'a>(&'a self, text: &'a str) -> BackendFuture<'a, String> {
        Box::pin(TranslationClient::translate(self, text))
    }
}

/// Fills `translated_text` for every region that has none.
///
/// A failed or empty translation leaves the region showing its original
/// text. Returns how many regions were translated.
pub async fn translate_regions(
    translator: &dyn TranslationBackend,
    regions: &mut [TextRegion],
) -> usize {
    let mut translated = 0;
    for region in regions.iter_mut() {
        let has_translation = region
            .translated_text
            .as_deref()
            .is_some_and(|text| !text.is_empty());
        if has_translation || region.original_text.trim().is_empty() {
            continue;
        }
        let result = translator.translate(&region.original_text).await;
        match result {
            Ok(text) if !text.trim().is_empty() => {
                region.translated_text = Some(text);
                translated += 1;
            }
            Ok(_) => debug!("empty translation for '{}'", region.original_text),
            Err(err) => warn!("translation failed, keeping original text: {:#}", err),
        }
    }
    translated
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub divisions: u32,
    pub page_delay: Duration,
    /// Number of pages to process; 0 means all.
    pub limit: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            divisions: DEFAULT_DIVISIONS,
            page_delay: DEFAULT_PAGE_DELAY,
            limit: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub page: PageSource,
    /// Descrambled page, PNG encoded.
    pub png: Option<Vec<u8>>,
    pub regions: Vec<TextRegion>,
    pub error: Option<String>,
}

impl PageOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub fn effective_limit(limit: usize, available: usize) -> usize {
    if limit == 0 {
        available
    } else {
        limit.min(available)
    }
}

/// Fetches, descrambles and submits pages one at a time.
///
/// With a `translator`, regions without a server translation are machine
/// translated before they reach `sink`. A failing page is logged and
/// recorded; the remaining pages still run.
pub async fn process_pages<B, R>(
    backend: &B,
    translator: Option<&dyn TranslationBackend>,
    pages: &[PageSource],
    options: &PipelineOptions,
    sink: &mut R,
) -> Vec<PageOutcome>
where
    B: DetectionBackend + ?Sized,
    R: RegionsReady + ?Sized,
{
    let count = effective_limit(options.limit, pages.len());
    info!(
        "processing {} of {} pages (divisions={})",
        count,
        pages.len(),
        options.divisions
    );
    let mut outcomes = Vec::with_capacity(count);
    for (idx, page) in pages.iter().take(count).enumerate() {
        info!("page {}: processing", page.label());
        let outcome = match process_page(backend, page, options.divisions).await {
            Ok((png, response)) => {
                let mut regions = response.regions();
                if regions.is_empty() {
                    warn!("page {}: no text found", page.label());
                } else {
                    info!("page {}: {} text regions", page.label(), regions.len());
                }
                if let Some(translator) = translator {
                    let translated = translate_regions(translator, &mut regions).await;
                    info!("page {}: translated {} regions", page.label(), translated);
                }
                sink.on_regions_ready(
                    page.number,
                    Size::new(page.width as f64, page.height as f64),
                    regions.clone(),
                );
                PageOutcome {
                    page: page.clone(),
                    png: Some(png),
                    regions,
                    error: None,
                }
            }
            Err(err) => {
                warn!("page {}: {:#}", page.label(), err);
                PageOutcome {
                    page: page.clone(),
                    png: None,
                    regions: Vec::new(),
                    error: Some(format!("{:#}", err)),
                }
            }
        };
        outcomes.push(outcome);
        if idx + 1 < count && !options.page_delay.is_zero() {
            sleep(options.page_delay).await;
        }
    }
    info!("finished processing {} pages", outcomes.len());
    outcomes
}

async fn process_page<B>(
    backend: &B,
    page: &PageSource,
    divisions: u32,
) -> Result<(Vec<u8>, DetectionResponse)>
where
    B: DetectionBackend + ?Sized,
{
    let scrambled = backend.fetch_page(&page.src).await?;
    let png = descramble_bytes(&scrambled, page.width, page.height, divisions)
        .with_context(|| format!("failed to descramble page {}", page.label()))?;
    let filename = format!("{}.png", page.file_stem());
    info!("page {}: sending to detection server", page.label());
    let response = backend.detect(png.clone(), &filename).await?;
    Ok((png, response))
}
