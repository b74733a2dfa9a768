use std::path::Path;

use serde::Serialize;

use crate::collision::UnresolvedCollision;
use crate::error::Error;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TranslationStatus {
    #[default]
    NotRequested,
    Complete,
    Partial {
        missing: Vec<String>,
    },
    Failed {
        reason: String,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SlideReport {
    /// 1-based, as shown in the editor.
    pub slide: usize,
    pub groups_created: usize,
    pub shapes_mirrored: usize,
    pub skipped_near_chart: usize,
    pub clamped: usize,
    pub collisions_fixed: usize,
    pub unresolved_collisions: Vec<UnresolvedCollision>,
    pub structural_skips: Vec<String>,
    pub paragraphs_aligned: usize,
    pub shapes_translated: usize,
    pub translation: TranslationStatus,
    /// Set when the slide was rolled back to its input state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_error: Option<String>,
}

/// Outcome of translating one slide layout's text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LayoutReport {
    pub part: String,
    pub texts_translated: usize,
    pub translation: TranslationStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub slides: Vec<SlideReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub layouts: Vec<LayoutReport>,
}

impl ConversionReport {
    pub fn unresolved_collisions(&self) -> usize {
        self.slides.iter().map(|s| s.unresolved_collisions.len()).sum()
    }

    pub fn write_json(&self, path: &Path) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
