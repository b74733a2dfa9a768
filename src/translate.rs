use std::collections::HashMap;
use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, TranslateError};
use crate::model::{PlaceholderRole, Replacement, ShapeKind};
use crate::pptx::{LayoutPart, Slide};
use crate::xml::NodeId;

pub const MISSING: &str = "[Translation missing]";
pub const FAILED: &str = "[ERROR: Translation failed]";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Title,
    Text,
    Bullets,
}

/// One translatable text frame. `id` is the shape's StableID.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub kind: ElementKind,
    pub content: Replacement,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchRequest {
    pub elements: Vec<Element>,
    pub source_lang: String,
    pub target_lang: String,
}

/// Element id → translated content. May hold fewer entries than were requested.
pub type BatchResponse = HashMap<String, Replacement>;

/// Anything that can translate a batch of elements in one call.
pub trait Translator: Send + Sync {
    fn translate_batch(
        &self,
        request: BatchRequest,
    ) -> impl Future<Output = Result<BatchResponse, TranslateError>> + Send;
}

/// Translatable elements of a slide, depth-first through groups.
pub fn extract_elements(slide: &Slide) -> Vec<Element> {
    let mut out = Vec::new();
    for node in slide.all_shapes() {
        if slide.kind(node) == Some(ShapeKind::Group) {
            continue;
        }
        let Ok(body) = slide.text_body(node) else {
            continue;
        };
        let paras = slide.paragraphs(body);
        let texts: Vec<String> = paras
            .iter()
            .map(|&p| slide.paragraph_text(p).trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if texts.is_empty() {
            continue;
        }

        let role = slide.placeholder_role(node);
        let nested = paras.iter().any(|&p| slide.paragraph_level(p) > 0);
        let kind = if role.is_some_and(PlaceholderRole::is_title) {
            ElementKind::Title
        } else if role == Some(PlaceholderRole::Body) || texts.len() > 1 || nested {
            ElementKind::Bullets
        } else {
            ElementKind::Text
        };
        let content = match kind {
            ElementKind::Bullets => Replacement::Paragraphs(texts),
            _ => Replacement::Text(texts.join(" ")),
        };
        out.push(Element {
            id: slide.stable_id(node).to_string(),
            kind,
            content,
        });
    }
    out
}

fn is_arabic(c: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&c)
}

/// Translatable `a:t` runs of a slide layout, each sent as its own text element keyed
/// `t<n>` by position among the layout's runs. Runs shorter than two characters or
/// already in Arabic script are left alone.
pub fn extract_layout_elements(layout: &LayoutPart) -> Vec<(NodeId, Element)> {
    let tree = layout.tree();
    layout
        .text_nodes()
        .into_iter()
        .enumerate()
        .filter_map(|(i, node)| {
            let text = tree.text(node);
            let text = text.trim();
            if text.chars().count() < 2 || text.chars().any(is_arabic) {
                return None;
            }
            Some((
                node,
                Element {
                    id: format!("t{i}"),
                    kind: ElementKind::Text,
                    content: Replacement::Text(text.to_string()),
                },
            ))
        })
        .collect()
}

fn requested_len(element: &Element) -> usize {
    match &element.content {
        Replacement::Paragraphs(items) => items.len(),
        Replacement::Text(_) => 1,
    }
}

fn fill(element: &Element, marker: &str) -> Replacement {
    match element.kind {
        ElementKind::Bullets => {
            Replacement::Paragraphs(vec![marker.to_string(); requested_len(element)])
        }
        _ => Replacement::Text(marker.to_string()),
    }
}

/// Result of folding a response into per-element replacements.
#[derive(Clone, Debug, PartialEq)]
pub struct Normalized {
    /// One entry per requested element, in request order.
    pub replacements: Vec<(String, Replacement)>,
    /// Ids absent from the response.
    pub missing: Vec<String>,
    pub failure: Option<String>,
}

/// Fold a batch outcome into exactly one replacement per element, never failing.
pub fn normalize(elements: &[Element], outcome: Result<BatchResponse, TranslateError>) -> Normalized {
    let mut response = match outcome {
        Ok(r) => r,
        Err(e) => {
            return Normalized {
                replacements: elements
                    .iter()
                    .map(|el| (el.id.clone(), fill(el, FAILED)))
                    .collect(),
                missing: Vec::new(),
                failure: Some(e.to_string()),
            };
        }
    };

    let mut missing = Vec::new();
    let replacements = elements
        .iter()
        .map(|el| {
            let content = match (response.remove(&el.id), el.kind) {
                (None, _) => {
                    missing.push(el.id.clone());
                    fill(el, MISSING)
                }
                (Some(Replacement::Paragraphs(mut items)), ElementKind::Bullets) => {
                    let want = requested_len(el);
                    if items.len() < want {
                        items.resize(want, MISSING.to_string());
                    }
                    Replacement::Paragraphs(items)
                }
                (Some(Replacement::Text(t)), ElementKind::Bullets) => Replacement::Paragraphs(vec![t]),
                (Some(Replacement::Paragraphs(items)), _) => Replacement::Text(items.join(" ")),
                (Some(text), _) => text,
            };
            (el.id.clone(), content)
        })
        .collect();

    Normalized {
        replacements,
        missing,
        failure: None,
    }
}

/// Deterministic translator backed by a JSON object of source → target strings.
///
/// An element is answered only when every one of its strings is in the glossary.
#[derive(Clone, Debug, Default)]
pub struct GlossaryTranslator {
    entries: HashMap<String, String>,
}

impl GlossaryTranslator {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        let entries: HashMap<String, String> = serde_json::from_str(&content)?;
        log::info!("Loaded glossary {} ({} entries)", path.display(), entries.len());
        Ok(Self { entries })
    }

    fn lookup(&self, text: &str) -> Option<String> {
        self.entries.get(text.trim()).cloned()
    }
}

impl Translator for GlossaryTranslator {
    async fn translate_batch(&self, request: BatchRequest) -> Result<BatchResponse, TranslateError> {
        let mut out = BatchResponse::new();
        for el in request.elements {
            let translated = match &el.content {
                Replacement::Text(t) => self.lookup(t).map(Replacement::Text),
                Replacement::Paragraphs(items) => items
                    .iter()
                    .map(|t| self.lookup(t))
                    .collect::<Option<Vec<_>>>()
                    .map(Replacement::Paragraphs),
            };
            if let Some(t) = translated {
                out.insert(el.id, t);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn el(id: &str, kind: ElementKind, content: Replacement) -> Element {
        Element {
            id: id.into(),
            kind,
            content,
        }
    }

    #[test]
    fn missing_ids_become_placeholders() {
        let elements = vec![
            el("1_a", ElementKind::Title, Replacement::Text("Hi".into())),
            el(
                "2_b",
                ElementKind::Bullets,
                Replacement::Paragraphs(vec!["x".into(), "y".into()]),
            ),
        ];
        let n = normalize(&elements, Ok(BatchResponse::new()));
        assert_eq!(n.missing, vec!["1_a".to_string(), "2_b".to_string()]);
        assert_eq!(n.replacements[0].1, Replacement::Text(MISSING.into()));
        assert_eq!(
            n.replacements[1].1,
            Replacement::Paragraphs(vec![MISSING.into(), MISSING.into()])
        );
    }

    #[test]
    fn shape_mismatches_are_coerced() {
        let elements = vec![
            el("1_a", ElementKind::Text, Replacement::Text("Hi".into())),
            el(
                "2_b",
                ElementKind::Bullets,
                Replacement::Paragraphs(vec!["x".into(), "y".into(), "z".into()]),
            ),
            el("3_c", ElementKind::Bullets, Replacement::Paragraphs(vec!["w".into()])),
        ];
        let mut response = BatchResponse::new();
        response.insert("1_a".into(), Replacement::Paragraphs(vec!["a".into(), "b".into()]));
        response.insert("2_b".into(), Replacement::Paragraphs(vec!["X".into()]));
        response.insert("3_c".into(), Replacement::Text("W".into()));
        let n = normalize(&elements, Ok(response));
        assert!(n.missing.is_empty());
        assert_eq!(n.replacements[0].1, Replacement::Text("a b".into()));
        assert_eq!(
            n.replacements[1].1,
            Replacement::Paragraphs(vec!["X".into(), MISSING.into(), MISSING.into()])
        );
        assert_eq!(n.replacements[2].1, Replacement::Paragraphs(vec!["W".into()]));
    }

    #[test]
    fn wholesale_failure_marks_everything() {
        let elements = vec![el("1_a", ElementKind::Text, Replacement::Text("Hi".into()))];
        let n = normalize(&elements, Err(TranslateError::Service("down".into())));
        assert_eq!(n.replacements[0].1, Replacement::Text(FAILED.into()));
        assert!(n.failure.unwrap().contains("down"));
    }

    #[test]
    fn response_json_accepts_strings_and_lists() {
        let r: BatchResponse = serde_json::from_str(r#"{"1_a": "مرحبا", "2_b": ["أ", "ب"]}"#).unwrap();
        assert_eq!(r["1_a"], Replacement::Text("مرحبا".into()));
        assert_eq!(r["2_b"], Replacement::Paragraphs(vec!["أ".into(), "ب".into()]));
    }
}
