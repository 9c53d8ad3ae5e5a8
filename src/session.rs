use std::collections::HashMap;
use tracing::debug;

use crate::overlay::{self, LineBreaks, OverlayBox, Point, Size, TextRegion};

pub const ZOOM_STEP: f64 = 0.25;
pub const ZOOM_MIN: f64 = 0.5;
pub const ZOOM_MAX: f64 = 3.0;

const LARGE_CANVAS_MIN: f64 = 200.0;

/// On-screen placement of a rendered page element at zoom 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementGeometry {
    pub display: Size,
    pub offset: Point,
}

/// Locates the element a page is drawn into.
pub trait RenderTarget {
    fn find_render_target(&self, page_number: usize) -> Option<ElementGeometry>;
}

impl<F> RenderTarget for F
where
    F: Fn(usize) -> Option<ElementGeometry>,
{
    fn find_render_target(&self, page_number: usize) -> Option<ElementGeometry> {
        self(page_number)
    }
}

/// Receives detection results as each page finishes.
pub trait RegionsReady {
    fn on_regions_ready(&mut self, page_number: usize, source: Size, regions: Vec<TextRegion>);
}

/// A drawable element known to the host page.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementCandidate {
    pub id: String,
    /// Backing pixel size of the element, not its on-screen size.
    pub intrinsic: Size,
    pub geometry: ElementGeometry,
}

/// Finds a page's element among the viewer's canvases by the id patterns the
/// viewer is known to use, then by partial id match, then by position among
/// the large canvases.
#[derive(Debug, Clone, Default)]
pub struct CanvasScan {
    elements: Vec<ElementCandidate>,
}

impl CanvasScan {
    pub fn new(elements: Vec<ElementCandidate>) -> Self {
        Self { elements }
    }
}

pub fn candidate_element_ids(page_number: usize) -> Vec<String> {
    let index = page_number.saturating_sub(1);
    vec![
        format!("page{}_0", index),
        format!("page{}", index),
        format!("page{:03}_0", page_number),
        format!("page{:03}", page_number),
        format!("canvas-{}", index),
    ]
}

impl RenderTarget for CanvasScan {
    fn find_render_target(&self, page_number: usize) -> Option<ElementGeometry> {
        if page_number == 0 {
            return None;
        }
        for id in candidate_element_ids(page_number) {
            if let Some(element) = self.elements.iter().find(|element| element.id == id) {
                debug!("render target for page {} found by id {}", page_number, id);
                return Some(element.geometry);
            }
        }
        let index = page_number - 1;
        let partial = [format!("page{}", index), format!("page{:03}", page_number)];
        for needle in &partial {
            if let Some(element) = self.elements.iter().find(|element| element.id.contains(needle)) {
                debug!("render target for page {} matched {}", page_number, element.id);
                return Some(element.geometry);
            }
        }
        self.elements
            .iter()
            .filter(|element| {
                element.intrinsic.width > LARGE_CANVAS_MIN && element.intrinsic.height > LARGE_CANVAS_MIN
            })
            .nth(index)
            .map(|element| {
                debug!("render target for page {} taken by position", page_number);
                element.geometry
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub source: Size,
    pub regions: Vec<TextRegion>,
}

/// Viewer state: which page is shown, at what zoom, and the detection results
/// gathered so far keyed by 1-based page number.
#[derive(Debug, Clone)]
pub struct ViewerSession {
    current: usize,
    total_pages: usize,
    zoom: f64,
    line_breaks: LineBreaks,
    results: HashMap<usize, PageResult>,
}

impl ViewerSession {
    pub fn new(total_pages: usize) -> Self {
        Self {
            current: 0,
            total_pages,
            zoom: 1.0,
            line_breaks: LineBreaks::Fit,
            results: HashMap::new(),
        }
    }

    /// 0-based index of the shown page.
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_page_number(&self) -> usize {
        self.current + 1
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn line_breaks(&self) -> LineBreaks {
        self.line_breaks
    }

    pub fn set_line_breaks(&mut self, line_breaks: LineBreaks) {
        self.line_breaks = line_breaks;
    }

    pub fn next_page(&mut self) -> bool {
        if self.current + 1 < self.total_pages {
            self.current += 1;
            return true;
        }
        false
    }

    pub fn prev_page(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            return true;
        }
        false
    }

    pub fn go_to(&mut self, index: usize) -> bool {
        if index < self.total_pages {
            self.current = index;
            return true;
        }
        false
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.zoom = (self.zoom + ZOOM_STEP).min(ZOOM_MAX);
        self.zoom
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.zoom = (self.zoom - ZOOM_STEP).max(ZOOM_MIN);
        self.zoom
    }

    pub fn reset_zoom(&mut self) {
        self.zoom = 1.0;
    }

    pub fn result(&self, page_number: usize) -> Option<&PageResult> {
        self.results.get(&page_number)
    }

    pub fn cached_pages(&self) -> usize {
        self.results.len()
    }

    /// Lays out the cached regions of `page_number` onto its element.
    ///
    /// Returns `None` when the page has no results yet or no element could be
    /// found. Zoom scales the element's size and offset about the container's
    /// origin.
    pub fn render_page(
        &self,
        page_number: usize,
        target: &dyn RenderTarget,
    ) -> Option<Vec<OverlayBox>> {
        let result = self.results.get(&page_number)?;
        let geometry = target.find_render_target(page_number)?;
        let display = Size::new(
            geometry.display.width * self.zoom,
            geometry.display.height * self.zoom,
        );
        let offset = Point::new(geometry.offset.x * self.zoom, geometry.offset.y * self.zoom);
        Some(overlay::layout_with(
            &result.regions,
            result.source,
            display,
            offset,
            self.line_breaks,
        ))
    }

    pub fn render_current(&self, target: &dyn RenderTarget) -> Option<Vec<OverlayBox>> {
        self.render_page(self.current_page_number(), target)
    }
}

impl RegionsReady for ViewerSession {
    fn on_regions_ready(&mut self, page_number: usize, source: Size, regions: Vec<TextRegion>) {
        if page_number > self.total_pages {
            self.total_pages = page_number;
        }
        self.results.insert(page_number, PageResult { source, regions });
    }
}
