use std::str::FromStr;
use std::time::Duration;

use crate::geometry::Emu;

/// Tunables for one conversion job.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Family written to every replaced run (latin and complex script).
    pub target_font: String,
    pub font_scale_percent: i64,
    /// Spacing enforced between a chart and a colliding shape, and between groups.
    pub min_spacing: Emu,
    /// Non-chart shapes this close to a chart stay where they are.
    pub label_proximity: Emu,
    /// Inset applied to all four sides of a replaced text frame.
    pub text_margin: Emu,
    pub max_workers: usize,
    pub translation_timeout: Duration,
    pub source_lang: String,
    pub target_lang: String,
    /// BCP-47 tag written as `a:rPr@lang` on replaced runs.
    pub target_lang_tag: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_font: "Arial".into(),
            font_scale_percent: 90,
            min_spacing: 182_880,
            label_proximity: 685_800,
            text_margin: 27_432,
            max_workers: 5,
            translation_timeout: Duration::from_secs(60),
            source_lang: "English".into(),
            target_lang: "Arabic".into(),
            target_lang_tag: "ar-SA".into(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring {key}={raw:?}: not a valid value");
            None
        }
    }
}

impl Config {
    /// Defaults overlaid with `PPTX_RTL_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_parse::<String>("PPTX_RTL_FONT").filter(|v| !v.is_empty()) {
            cfg.target_font = v;
        }
        if let Some(v) = env_parse("PPTX_RTL_FONT_SCALE") {
            cfg.font_scale_percent = v;
        }
        if let Some(v) = env_parse("PPTX_RTL_MIN_SPACING") {
            cfg.min_spacing = v;
        }
        if let Some(v) = env_parse("PPTX_RTL_LABEL_PROXIMITY") {
            cfg.label_proximity = v;
        }
        if let Some(v) = env_parse::<usize>("PPTX_RTL_WORKERS").filter(|&v| v > 0) {
            cfg.max_workers = v;
        }
        if let Some(v) = env_parse("PPTX_RTL_TIMEOUT_SECS") {
            cfg.translation_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<String>("PPTX_RTL_SOURCE_LANG").filter(|v| !v.is_empty()) {
            cfg.source_lang = v;
        }
        if let Some(v) = env_parse::<String>("PPTX_RTL_TARGET_LANG").filter(|v| !v.is_empty()) {
            cfg.target_lang = v;
        }
        cfg
    }
}
