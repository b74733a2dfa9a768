use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::geometry::{Emu, Rect};
use crate::xml::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    TextBox,
    Placeholder,
    Chart,
    Group,
    Table,
    AutoShape,
    Picture,
    Connector,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaceholderRole {
    Title,
    CenteredTitle,
    Subtitle,
    Body,
    Other,
}

impl PlaceholderRole {
    pub fn from_type_attr(val: Option<&str>) -> Self {
        // ST_PlaceholderType defaults to "body" when @type is absent
        match val.unwrap_or("body") {
            "title" => PlaceholderRole::Title,
            "ctrTitle" => PlaceholderRole::CenteredTitle,
            "subTitle" => PlaceholderRole::Subtitle,
            "body" => PlaceholderRole::Body,
            _ => PlaceholderRole::Other,
        }
    }

    pub fn is_title(self) -> bool {
        matches!(self, PlaceholderRole::Title | PlaceholderRole::CenteredTitle)
    }
}

/// Deterministic shape identity: `<cNvPr@id>_<cNvPr@name>`.
///
/// Shapes carrying neither get a process-local synthetic id (`~anon<n>`) that is only
/// meaningful within one pipeline run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StableId(String);

impl StableId {
    pub fn derive(numeric_id: Option<&str>, name: Option<&str>) -> Option<Self> {
        match (numeric_id, name) {
            (None, None) => None,
            (id, name) => Some(StableId(format!(
                "{}_{}",
                id.unwrap_or_default(),
                name.unwrap_or_default()
            ))),
        }
    }

    pub(crate) fn synthetic(n: u64) -> Self {
        StableId(format!("~anon{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Snapshot of one top-level shape, taken fresh at the start of each stage.
#[derive(Clone, Debug)]
pub struct ShapeInfo {
    pub node: NodeId,
    pub id: StableId,
    pub name: String,
    pub kind: ShapeKind,
    pub placeholder: Option<PlaceholderRole>,
    /// Absolute box; `None` when neither the shape nor its layout declares one.
    pub rect: Option<Rect>,
    /// 60000ths of a degree.
    pub rotation: i64,
    /// For groups: whether any descendant is a chart.
    pub contains_chart: bool,
}

impl ShapeInfo {
    pub fn is_chart(&self) -> bool {
        self.kind == ShapeKind::Chart
    }

    pub fn is_group(&self) -> bool {
        self.kind == ShapeKind::Group
    }

    pub fn is_title(&self) -> bool {
        self.placeholder.is_some_and(PlaceholderRole::is_title)
    }

    /// Shapes whose declared name mentions an arrow are treated as directional.
    pub fn is_directional(&self) -> bool {
        self.name.to_lowercase().contains("arrow")
    }

    /// Chart on its own or a group holding one.
    pub fn is_chart_body(&self) -> bool {
        self.is_chart() || (self.is_group() && self.contains_chart)
    }
}

/// Replacement content for one text frame. On the wire a plain string or a list of
/// strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Replacement {
    Text(String),
    Paragraphs(Vec<String>),
}

impl Replacement {
    pub fn into_paragraphs(self) -> Vec<String> {
        match self {
            Replacement::Text(t) => vec![t],
            Replacement::Paragraphs(p) => p,
        }
    }
}
