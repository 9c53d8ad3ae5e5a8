use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{DEFAULT_SERVER_URL, DEFAULT_TRANSLATE_URL};
use crate::descramble::DEFAULT_DIVISIONS;
use crate::overlay::OverlayStyle;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const HOME_DIR_NAME: &str = ".manga-overlay-rust";

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    pub server_timeout_secs: u64,
    pub divisions: u32,
    pub page_delay_ms: u64,
    pub page_limit: usize,
    pub overlay_text_color: String,
    pub overlay_fill_color: String,
    pub overlay_fill_opacity: f32,
    pub overlay_font_family: String,
    pub overlay_font_path: Option<String>,
    pub overlay_line_height: f32,
    pub overlay_english: bool,
    pub overlay_english_font_family: String,
    pub translate_url: String,
    pub translate_source_lang: String,
    pub translate_target_lang: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            server_timeout_secs: 120,
            divisions: DEFAULT_DIVISIONS,
            page_delay_ms: 500,
            page_limit: 0,
            overlay_text_color: "#000000".to_string(),
            overlay_fill_color: "#ffffff".to_string(),
            overlay_fill_opacity: 0.92,
            overlay_font_family: "sans-serif".to_string(),
            overlay_font_path: None,
            overlay_line_height: 1.4,
            overlay_english: false,
            overlay_english_font_family: "OpenDyslexic, Comic Sans MS, sans-serif".to_string(),
            translate_url: DEFAULT_TRANSLATE_URL.to_string(),
            translate_source_lang: "ja".to_string(),
            translate_target_lang: "en".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server: Option<ServerSettings>,
    pipeline: Option<PipelineSettings>,
    overlay: Option<OverlaySettings>,
    translate: Option<TranslateSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelineSettings {
    divisions: Option<u32>,
    page_delay_ms: Option<u64>,
    page_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySettings {
    text_color: Option<String>,
    fill_color: Option<String>,
    fill_opacity: Option<f32>,
    font_family: Option<String>,
    font_path: Option<String>,
    line_height: Option<f32>,
    english: Option<bool>,
    english_font_family: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslateSettings {
    url: Option<String>,
    source_lang: Option<String>,
    target_lang: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    settings.merge(parse_settings(DEFAULT_SETTINGS_TOML, Path::new("<built-in>"))?);
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge(parse_settings(&content, &path)?);
        }
    }

    Ok(settings)
}

fn parse_settings(content: &str, path: &Path) -> Result<SettingsFile> {
    toml::from_str(content).with_context(|| format!("failed to parse settings: {}", path.display()))
}

impl Settings {
    pub fn server_timeout(&self) -> Duration {
        Duration::from_secs(self.server_timeout_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        let font_family = if self.overlay_english {
            self.overlay_english_font_family.clone()
        } else {
            self.overlay_font_family.clone()
        };
        OverlayStyle {
            text_color: self.overlay_text_color.clone(),
            fill_color: self.overlay_fill_color.clone(),
            fill_opacity: self.overlay_fill_opacity,
            font_family,
            line_height: self.overlay_line_height,
            wide_labels: self.overlay_english,
        }
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(server) = incoming.server {
            if let Some(url) = server.url {
                if !url.trim().is_empty() {
                    self.server_url = url;
                }
            }
            if let Some(timeout) = server.timeout_secs {
                if timeout > 0 {
                    self.server_timeout_secs = timeout;
                }
            }
        }
        if let Some(pipeline) = incoming.pipeline {
            if let Some(divisions) = pipeline.divisions {
                if divisions > 0 {
                    self.divisions = divisions;
                }
            }
            if let Some(delay) = pipeline.page_delay_ms {
                self.page_delay_ms = delay;
            }
            if let Some(limit) = pipeline.page_limit {
                self.page_limit = limit;
            }
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(color) = overlay.text_color {
                if !color.trim().is_empty() {
                    self.overlay_text_color = color;
                }
            }
            if let Some(color) = overlay.fill_color {
                if !color.trim().is_empty() {
                    self.overlay_fill_color = color;
                }
            }
            if let Some(opacity) = overlay.fill_opacity {
                if (0.0..=1.0).contains(&opacity) {
                    self.overlay_fill_opacity = opacity;
                }
            }
            if let Some(family) = overlay.font_family {
                if !family.trim().is_empty() {
                    self.overlay_font_family = family;
                }
            }
            if let Some(path) = overlay.font_path {
                if !path.trim().is_empty() {
                    self.overlay_font_path = Some(path);
                }
            }
            if let Some(line_height) = overlay.line_height {
                if line_height > 0.0 {
                    self.overlay_line_height = line_height;
                }
            }
            if let Some(english) = overlay.english {
                self.overlay_english = english;
            }
            if let Some(family) = overlay.english_font_family {
                if !family.trim().is_empty() {
                    self.overlay_english_font_family = family;
                }
            }
        }
        if let Some(translate) = incoming.translate {
            if let Some(url) = translate.url {
                if !url.trim().is_empty() {
                    self.translate_url = url;
                }
            }
            if let Some(lang) = translate.source_lang {
                if !lang.trim().is_empty() {
                    self.translate_source_lang = lang;
                }
            }
            if let Some(lang) = translate.target_lang {
                if !lang.trim().is_empty() {
                    self.translate_target_lang = lang;
                }
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(HOME_DIR_NAME))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;
    use tempfile::tempdir;

    #[test]
    fn built_in_defaults_load() {
        with_temp_home(|home| {
            let settings = load_settings(None).expect("settings");
            assert_eq!(settings.divisions, 4);
            assert_eq!(settings.page_delay(), Duration::from_millis(500));
            assert_eq!(settings.server_url, DEFAULT_SERVER_URL);
            assert!(!settings.overlay_english);
            assert!(!settings.overlay_style().wide_labels);
            assert_eq!(settings.translate_url, DEFAULT_TRANSLATE_URL);
            assert!(home.join(HOME_DIR_NAME).join("settings.toml").exists());
        });
    }

    #[test]
    fn extra_file_overrides_and_ignores_blank_values() {
        with_temp_home(|_| {
            let dir = tempdir().expect("tempdir");
            let path = dir.path().join("extra.toml");
            fs::write(
                &path,
                r#"
[server]
url = "http://10.0.0.2:5001"

[pipeline]
divisions = 0
page_limit = 3

[overlay]
text_color = "  "
fill_opacity = 0.5
"#,
            )
            .expect("write extra");

            let settings = load_settings(Some(&path)).expect("settings");
            assert_eq!(settings.server_url, "http://10.0.0.2:5001");
            assert_eq!(settings.divisions, 4);
            assert_eq!(settings.page_limit, 3);
            assert_eq!(settings.overlay_text_color, "#000000");
            assert_eq!(settings.overlay_style().fill_opacity, 0.5);
        });
    }

    #[test]
    fn english_mode_switches_label_style() {
        with_temp_home(|_| {
            let dir = tempdir().expect("tempdir");
            let path = dir.path().join("english.toml");
            fs::write(
                &path,
                r#"
[overlay]
english = true

[translate]
target_lang = "de"
source_lang = ""
"#,
            )
            .expect("write extra");

            let settings = load_settings(Some(&path)).expect("settings");
            let style = settings.overlay_style();
            assert!(style.wide_labels);
            assert_eq!(style.font_family, settings.overlay_english_font_family);
            assert_eq!(settings.translate_target_lang, "de");
            assert_eq!(settings.translate_source_lang, "ja");
        });
    }

    #[test]
    fn missing_extra_file_is_an_error() {
        with_temp_home(|home| {
            let err = load_settings(Some(&home.join("nope.toml"))).unwrap_err();
            assert!(err.to_string().contains("settings file not found"));
        });
    }
}
