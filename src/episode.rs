use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

const MAIN_PAGE_TYPE: &str = "main";
const EPISODE_ELEMENT_SELECTOR: &str = "#episode-json";
const EPISODE_ATTRIBUTE: &str = "data-value";

/// A readable page of an episode, numbered from 1 in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSource {
    pub number: usize,
    pub src: String,
    pub width: u32,
    pub height: u32,
}

impl PageSource {
    /// Zero-padded page label, e.g. `007`.
    pub fn label(&self) -> String {
        format!("{:03}", self.number)
    }

    pub fn file_stem(&self) -> String {
        format!("page-{}", self.label())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeData {
    readable_product: ReadableProduct,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadableProduct {
    page_structure: PageStructure,
}

#[derive(Debug, Deserialize)]
struct PageStructure {
    #[serde(default)]
    pages: Vec<RawPage>,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    #[serde(rename = "type")]
    kind: Option<String>,
    src: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Reads the main pages out of the viewer's episode JSON.
pub fn parse_episode_json(json: &str) -> Result<Vec<PageSource>> {
    let data: EpisodeData =
        serde_json::from_str(json).with_context(|| "failed to parse episode json")?;
    let mut pages = Vec::new();
    for raw in data.readable_product.page_structure.pages {
        if raw.kind.as_deref() != Some(MAIN_PAGE_TYPE) {
            continue;
        }
        let number = pages.len() + 1;
        let src = raw
            .src
            .filter(|src| !src.trim().is_empty())
            .ok_or_else(|| anyhow!("main page {} has no src", number))?;
        let width = raw
            .width
            .filter(|value| *value > 0)
            .ok_or_else(|| anyhow!("main page {} has no width", number))?;
        let height = raw
            .height
            .filter(|value| *value > 0)
            .ok_or_else(|| anyhow!("main page {} has no height", number))?;
        pages.push(PageSource {
            number,
            src,
            width,
            height,
        });
    }
    Ok(pages)
}

/// Pulls the episode JSON out of a saved viewer page.
pub fn extract_episode_json(html: &str) -> Result<String> {
    use kuchiki::traits::*;

    let document = kuchiki::parse_html().one(html);
    let element = document
        .select_first(EPISODE_ELEMENT_SELECTOR)
        .map_err(|_| anyhow!("episode data element not found"))?;
    let attrs = element.attributes.borrow();
    attrs
        .get(EPISODE_ATTRIBUTE)
        .map(|value| value.to_string())
        .ok_or_else(|| anyhow!("episode data element has no {}", EPISODE_ATTRIBUTE))
}

/// Accepts either raw episode JSON or an HTML page embedding it.
pub fn load_pages(content: &str) -> Result<Vec<PageSource>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('{') {
        return parse_episode_json(trimmed);
    }
    let json = extract_episode_json(content)?;
    parse_episode_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPISODE: &str = r#"{
        "readableProduct": {
            "pageStructure": {
                "pages": [
                    {"type": "other"},
                    {"type": "main", "src": "https://cdn.example/1.jpg", "width": 760, "height": 1200},
                    {"type": "backMatter", "src": "https://cdn.example/x.jpg", "width": 1, "height": 1},
                    {"type": "main", "src": "https://cdn.example/2.jpg", "width": 760, "height": 1080}
                ]
            }
        }
    }"#;

    #[test]
    fn only_main_pages_are_kept() {
        let pages = parse_episode_json(EPISODE).expect("pages");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].src, "https://cdn.example/1.jpg");
        assert_eq!(pages[1].height, 1080);
        assert_eq!(pages[1].label(), "002");
        assert_eq!(pages[1].file_stem(), "page-002");
    }

    #[test]
    fn main_page_without_size_is_an_error() {
        let json = r#"{"readableProduct": {"pageStructure": {"pages": [
            {"type": "main", "src": "a.jpg", "width": 0, "height": 10}
        ]}}}"#;
        let err = parse_episode_json(json).unwrap_err();
        assert!(err.to_string().contains("no width"));
    }

    #[test]
    fn json_is_read_from_viewer_html() {
        let escaped = EPISODE.replace('"', "&quot;");
        let html = format!(
            r#"<html><body><script id="episode-json" type="text/json" data-value="{}"></script></body></html>"#,
            escaped
        );
        let pages = load_pages(&html).expect("pages");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].width, 760);
    }

    #[test]
    fn missing_element_is_reported() {
        let err = extract_episode_json("<html><body></body></html>").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
