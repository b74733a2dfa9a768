use crate::geometry::{Emu, MAX_COORD, Rect};
use crate::xml::{NodeId, XmlTree};

use super::{DML_NS, PML_NS};

#[derive(Clone, Debug)]
struct PlaceholderGeom {
    ph_type: String,
    idx: Option<String>,
    rect: Option<Rect>,
}

/// Placeholder geometry inherited from the slide layout and master.
#[derive(Clone, Debug, Default)]
pub struct InheritedGeometry {
    layout: Vec<PlaceholderGeom>,
    master: Vec<PlaceholderGeom>,
}

/// Master placeholders only come in a handful of types; everything content-like
/// inherits from the master body.
fn master_type(ph_type: &str) -> &str {
    match ph_type {
        "ctrTitle" | "title" => "title",
        "dt" | "ftr" | "sldNum" | "hdr" => ph_type,
        _ => "body",
    }
}

/// Coordinate attribute within the ST_Coordinate range; anything else reads as absent.
pub(crate) fn read_coord(tree: &XmlTree, node: NodeId, name: &str) -> Option<Emu> {
    tree.attr_i64(node, name).filter(|v| (-MAX_COORD..=MAX_COORD).contains(v))
}

pub(crate) fn read_xfrm(tree: &XmlTree, xfrm: NodeId) -> Option<Rect> {
    let off = tree.child(xfrm, DML_NS, "off")?;
    let ext = tree.child(xfrm, DML_NS, "ext")?;
    let size = |name: &str| read_coord(tree, ext, name).filter(|v| *v >= 0);
    Some(Rect::new(
        read_coord(tree, off, "x")?,
        read_coord(tree, off, "y")?,
        size("cx")?,
        size("cy")?,
    ))
}

fn collect_placeholders(tree: &XmlTree) -> Vec<PlaceholderGeom> {
    let root = tree.root();
    let Some(sp_tree) = tree.path(root, &[(PML_NS, "cSld"), (PML_NS, "spTree")]) else {
        return Vec::new();
    };
    tree.descendants(sp_tree)
        .into_iter()
        .filter(|&n| tree.is(n, PML_NS, "sp"))
        .filter_map(|sp| {
            let ph = tree.path(sp, &[(PML_NS, "nvSpPr"), (PML_NS, "nvPr"), (PML_NS, "ph")])?;
            let rect = tree
                .path(sp, &[(PML_NS, "spPr"), (DML_NS, "xfrm")])
                .and_then(|x| read_xfrm(tree, x));
            Some(PlaceholderGeom {
                ph_type: tree.attr(ph, "type").unwrap_or("body").to_string(),
                idx: tree.attr(ph, "idx").map(String::from),
                rect,
            })
        })
        .collect()
}

impl InheritedGeometry {
    pub(crate) fn from_parts(layout: Option<&XmlTree>, master: Option<&XmlTree>) -> Self {
        Self {
            layout: layout.map(collect_placeholders).unwrap_or_default(),
            master: master.map(collect_placeholders).unwrap_or_default(),
        }
    }

    /// Box of the layout placeholder matching `idx` (or `ph_type` when there is no idx
    /// match), else of the master placeholder of the same kind.
    pub fn lookup(&self, ph_type: &str, idx: Option<&str>) -> Option<Rect> {
        let layout_match = idx
            .and_then(|i| self.layout.iter().find(|p| p.idx.as_deref() == Some(i)))
            .or_else(|| self.layout.iter().find(|p| p.ph_type == ph_type));
        if let Some(rect) = layout_match.and_then(|p| p.rect) {
            return Some(rect);
        }
        let wanted = master_type(layout_match.map_or(ph_type, |p| p.ph_type.as_str()));
        self.master
            .iter()
            .find(|p| master_type(&p.ph_type) == wanted)
            .and_then(|p| p.rect)
    }
}

/// A parsed `ppt/slideLayouts/*.xml` part. Only rewritten on save once its text changed.
#[derive(Clone, Debug)]
pub struct LayoutPart {
    pub part_name: String,
    tree: XmlTree,
    modified: bool,
}

impl LayoutPart {
    pub(crate) fn new(part_name: String, tree: XmlTree) -> Self {
        Self {
            part_name,
            tree,
            modified: false,
        }
    }

    pub fn tree(&self) -> &XmlTree {
        &self.tree
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Every `a:t` element of the part, in document order.
    pub fn text_nodes(&self) -> Vec<NodeId> {
        self.tree
            .descendants(self.tree.root())
            .into_iter()
            .filter(|&n| self.tree.is(n, DML_NS, "t"))
            .collect()
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.tree.set_text(node, text);
        self.modified = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: &str = r#"<p:sldLayout xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><p:cSld><p:spTree>
        <p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr><a:xfrm><a:off x="100" y="200"/><a:ext cx="300" cy="400"/></a:xfrm></p:spPr></p:sp>
        <p:sp><p:nvSpPr><p:cNvPr id="3" name="Content 2"/><p:cNvSpPr/><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr><p:spPr/></p:sp>
    </p:spTree></p:cSld></p:sldLayout>"#;

    const MASTER: &str = r#"<p:sldMaster xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><p:cSld><p:spTree>
        <p:sp><p:nvSpPr><p:cNvPr id="2" name="Body"/><p:cNvSpPr/><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:spPr><a:xfrm><a:off x="10" y="20"/><a:ext cx="30" cy="40"/></a:xfrm></p:spPr></p:sp>
    </p:spTree></p:cSld></p:sldMaster>"#;

    #[test]
    fn layout_then_master_fallback() {
        let layout = XmlTree::parse(LAYOUT).unwrap();
        let master = XmlTree::parse(MASTER).unwrap();
        let geom = InheritedGeometry::from_parts(Some(&layout), Some(&master));
        assert_eq!(geom.lookup("title", None), Some(Rect::new(100, 200, 300, 400)));
        // layout body placeholder has no xfrm of its own
        assert_eq!(geom.lookup("body", Some("1")), Some(Rect::new(10, 20, 30, 40)));
        assert_eq!(geom.lookup("dt", None), None);
    }

    #[test]
    fn out_of_range_coordinates_read_as_missing() {
        let xfrm = |x: &str, cx: &str| {
            XmlTree::parse(&format!(
                r#"<a:xfrm xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><a:off x="{x}" y="0"/><a:ext cx="{cx}" cy="10"/></a:xfrm>"#
            ))
            .unwrap()
        };
        let ok = xfrm("-5", "20");
        assert_eq!(read_xfrm(&ok, ok.root()), Some(Rect::new(-5, 0, 20, 10)));
        let huge = xfrm("-9223372036854775808", "20");
        assert_eq!(read_xfrm(&huge, huge.root()), None);
        let negative = xfrm("0", "-20");
        assert_eq!(read_xfrm(&negative, negative.root()), None);
    }
}
