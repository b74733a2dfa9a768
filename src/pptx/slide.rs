use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, SlideError};
use crate::geometry::{Emu, MAX_COORD, Rect};
use crate::model::{PlaceholderRole, ShapeInfo, ShapeKind, StableId};
use crate::xml::{NodeId, XmlTree};

use super::layout::{read_coord, read_xfrm};
use super::{CHART_URI, CHARTEX_URI, DML_NS, InheritedGeometry, PML_NS, TABLE_URI};

static SYNTHETIC_IDS: AtomicU64 = AtomicU64::new(0);

const SHAPE_ELEMENTS: &[&str] = &["sp", "grpSp", "graphicFrame", "pic", "cxnSp"];

/// Non-visual property container of each shape element.
fn nv_container(local: &str) -> Option<&'static str> {
    match local {
        "sp" => Some("nvSpPr"),
        "grpSp" => Some("nvGrpSpPr"),
        "graphicFrame" => Some("nvGraphicFramePr"),
        "pic" => Some("nvPicPr"),
        "cxnSp" => Some("nvCxnSpPr"),
        _ => None,
    }
}

/// Group frame: the group's own box and the child coordinate space mapped onto it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupFrame {
    pub rect: Rect,
    pub child_offset: (Emu, Emu),
    pub child_extent: (Emu, Emu),
}

impl GroupFrame {
    fn scale(v: Emu, num: Emu, den: Emu) -> Emu {
        if den == 0 || num == den {
            return v;
        }
        let scaled = (v as i128) * (num as i128) / (den as i128);
        scaled.clamp(-(MAX_COORD as i128), MAX_COORD as i128) as Emu
    }

    /// Child-space box → parent-space box.
    pub fn to_parent(&self, r: Rect) -> Rect {
        let (cox, coy) = self.child_offset;
        let (cex, cey) = self.child_extent;
        Rect::new(
            self.rect.left + Self::scale(r.left - cox, self.rect.width, cex),
            self.rect.top + Self::scale(r.top - coy, self.rect.height, cey),
            Self::scale(r.width, self.rect.width, cex),
            Self::scale(r.height, self.rect.height, cey),
        )
    }

    /// Parent-space box → child-space box.
    pub fn to_child(&self, r: Rect) -> Rect {
        let (cox, coy) = self.child_offset;
        let (cex, cey) = self.child_extent;
        Rect::new(
            cox + Self::scale(r.left - self.rect.left, cex, self.rect.width),
            coy + Self::scale(r.top - self.rect.top, cey, self.rect.height),
            Self::scale(r.width, cex, self.rect.width),
            Self::scale(r.height, cey, self.rect.height),
        )
    }
}

/// Schema-aware view over one slide part. Boxes read and written through it are absolute
/// slide coordinates unless a method says otherwise.
#[derive(Clone)]
pub struct Slide {
    pub index: usize,
    pub part_name: String,
    tree: XmlTree,
    sp_tree: NodeId,
    inherited: InheritedGeometry,
    synthetic: HashMap<NodeId, StableId>,
}

impl Slide {
    pub fn new(
        index: usize,
        part_name: String,
        tree: XmlTree,
        inherited: InheritedGeometry,
    ) -> Result<Self, Error> {
        let sp_tree = tree
            .path(tree.root(), &[(PML_NS, "cSld"), (PML_NS, "spTree")])
            .ok_or_else(|| Error::InvalidPptx(format!("{part_name}: missing p:cSld/p:spTree")))?;
        let mut slide = Slide {
            index,
            part_name,
            tree,
            sp_tree,
            inherited,
            synthetic: HashMap::new(),
        };
        for node in slide.all_shapes() {
            let (id, name) = slide.declared_id(node);
            if id.is_none() && name.is_none() {
                let n = SYNTHETIC_IDS.fetch_add(1, Ordering::Relaxed);
                slide.synthetic.insert(node, StableId::synthetic(n));
            }
        }
        Ok(slide)
    }

    pub fn tree(&self) -> &XmlTree {
        &self.tree
    }

    pub(crate) fn tree_mut(&mut self) -> &mut XmlTree {
        &mut self.tree
    }

    fn is_shape_element(&self, node: NodeId) -> bool {
        self.tree
            .name(node)
            .is_some_and(|n| n.ns.as_deref() == Some(PML_NS) && SHAPE_ELEMENTS.contains(&n.local.as_str()))
    }

    /// Shapes directly under `p:spTree`, in z-order.
    pub fn top_level_shapes(&self) -> Vec<NodeId> {
        self.shape_children(self.sp_tree)
    }

    pub fn shape_children(&self, container: NodeId) -> Vec<NodeId> {
        self.tree
            .elements(container)
            .filter(|&n| self.is_shape_element(n))
            .collect()
    }

    /// Every shape on the slide, depth-first through groups.
    pub fn all_shapes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.top_level_shapes();
        stack.reverse();
        while let Some(node) = stack.pop() {
            out.push(node);
            if self.tree.is(node, PML_NS, "grpSp") {
                let mut kids = self.shape_children(node);
                kids.reverse();
                stack.extend(kids);
            }
        }
        out
    }

    pub fn is_top_level(&self, node: NodeId) -> bool {
        self.tree.parent(node) == Some(self.sp_tree)
    }

    fn c_nv_pr(&self, node: NodeId) -> Option<NodeId> {
        let nv = nv_container(self.tree.local_name(node)?)?;
        self.tree.path(node, &[(PML_NS, nv), (PML_NS, "cNvPr")])
    }

    fn nv_pr(&self, node: NodeId) -> Option<NodeId> {
        let nv = nv_container(self.tree.local_name(node)?)?;
        self.tree.path(node, &[(PML_NS, nv), (PML_NS, "nvPr")])
    }

    fn declared_id(&self, node: NodeId) -> (Option<&str>, Option<&str>) {
        match self.c_nv_pr(node) {
            Some(c) => (self.tree.attr(c, "id"), self.tree.attr(c, "name")),
            None => (None, None),
        }
    }

    pub fn name(&self, node: NodeId) -> &str {
        self.declared_id(node).1.unwrap_or_default()
    }

    pub fn stable_id(&self, node: NodeId) -> StableId {
        if let Some(id) = self.synthetic.get(&node) {
            return id.clone();
        }
        let (id, name) = self.declared_id(node);
        StableId::derive(id, name).unwrap_or_else(|| StableId::synthetic(u64::MAX))
    }

    /// Resolve a StableID to its shape anywhere on the slide.
    pub fn find(&self, id: &StableId) -> Option<NodeId> {
        self.all_shapes()
            .into_iter()
            .find(|&n| &self.stable_id(n) == id)
    }

    fn graphic_data_uri(&self, node: NodeId) -> Option<&str> {
        let data = self
            .tree
            .path(node, &[(DML_NS, "graphic"), (DML_NS, "graphicData")])?;
        self.tree.attr(data, "uri")
    }

    pub fn kind(&self, node: NodeId) -> Option<ShapeKind> {
        let local = self.tree.local_name(node)?;
        Some(match local {
            "grpSp" => ShapeKind::Group,
            "pic" => ShapeKind::Picture,
            "cxnSp" => ShapeKind::Connector,
            "graphicFrame" => match self.graphic_data_uri(node) {
                Some(CHART_URI) | Some(CHARTEX_URI) => ShapeKind::Chart,
                Some(TABLE_URI) => ShapeKind::Table,
                _ => ShapeKind::AutoShape,
            },
            "sp" => {
                if self.placeholder_elem(node).is_some() {
                    ShapeKind::Placeholder
                } else if self
                    .tree
                    .path(node, &[(PML_NS, "nvSpPr"), (PML_NS, "cNvSpPr")])
                    .and_then(|c| self.tree.attr(c, "txBox"))
                    .is_some_and(|v| v == "1" || v == "true")
                {
                    ShapeKind::TextBox
                } else {
                    ShapeKind::AutoShape
                }
            }
            _ => return None,
        })
    }

    fn placeholder_elem(&self, node: NodeId) -> Option<NodeId> {
        let nv_pr = self.nv_pr(node)?;
        self.tree.child(nv_pr, PML_NS, "ph")
    }

    pub fn placeholder_role(&self, node: NodeId) -> Option<PlaceholderRole> {
        let ph = self.placeholder_elem(node)?;
        Some(PlaceholderRole::from_type_attr(self.tree.attr(ph, "type")))
    }

    pub fn contains_chart(&self, node: NodeId) -> bool {
        self.tree
            .descendants(node)
            .into_iter()
            .any(|n| self.is_shape_element(n) && self.kind(n) == Some(ShapeKind::Chart))
    }

    pub fn info(&self, node: NodeId) -> Option<ShapeInfo> {
        let kind = self.kind(node)?;
        Some(ShapeInfo {
            node,
            id: self.stable_id(node),
            name: self.name(node).to_string(),
            kind,
            placeholder: self.placeholder_role(node),
            rect: self.absolute_rect(node),
            rotation: self.rotation(node),
            contains_chart: kind == ShapeKind::Group && self.contains_chart(node),
        })
    }

    /// Snapshot of every top-level shape, in z-order.
    pub fn shapes(&self) -> Vec<ShapeInfo> {
        self.top_level_shapes()
            .into_iter()
            .filter_map(|n| self.info(n))
            .collect()
    }

    // --- geometry ---

    /// The `xfrm` element holding this shape's box, if present.
    fn xfrm(&self, node: NodeId) -> Option<NodeId> {
        match self.tree.local_name(node)? {
            "graphicFrame" => self.tree.child(node, PML_NS, "xfrm"),
            "grpSp" => self
                .tree
                .path(node, &[(PML_NS, "grpSpPr"), (DML_NS, "xfrm")]),
            _ => self.tree.path(node, &[(PML_NS, "spPr"), (DML_NS, "xfrm")]),
        }
    }

    /// Box in the coordinate space of the parent container.
    pub fn local_rect(&self, node: NodeId) -> Option<Rect> {
        if let Some(rect) = self.xfrm(node).and_then(|x| read_xfrm(&self.tree, x)) {
            return Some(rect);
        }
        let ph = self.placeholder_elem(node)?;
        let ph_type = self.tree.attr(ph, "type").unwrap_or("body");
        self.inherited.lookup(ph_type, self.tree.attr(ph, "idx"))
    }

    pub fn group_frame(&self, group: NodeId) -> Option<GroupFrame> {
        let xfrm = self.xfrm(group)?;
        let rect = read_xfrm(&self.tree, xfrm)?;
        let ch_off = self.tree.child(xfrm, DML_NS, "chOff");
        let ch_ext = self.tree.child(xfrm, DML_NS, "chExt");
        Some(GroupFrame {
            rect,
            child_offset: ch_off
                .and_then(|o| Some((read_coord(&self.tree, o, "x")?, read_coord(&self.tree, o, "y")?)))
                .unwrap_or((rect.left, rect.top)),
            child_extent: ch_ext
                .and_then(|e| Some((read_coord(&self.tree, e, "cx")?, read_coord(&self.tree, e, "cy")?)))
                .unwrap_or((rect.width, rect.height)),
        })
    }

    /// Enclosing group frames from the innermost outwards.
    fn ancestor_frames(&self, node: NodeId) -> Option<Vec<GroupFrame>> {
        let mut frames = Vec::new();
        let mut cur = self.tree.parent(node);
        while let Some(p) = cur {
            if p == self.sp_tree {
                break;
            }
            if self.tree.is(p, PML_NS, "grpSp") {
                frames.push(self.group_frame(p)?);
            }
            cur = self.tree.parent(p);
        }
        Some(frames)
    }

    /// Box in absolute slide coordinates.
    pub fn absolute_rect(&self, node: NodeId) -> Option<Rect> {
        let local = self.local_rect(node)?;
        let frames = self.ancestor_frames(node)?;
        Some(frames.iter().fold(local, |r, f| f.to_parent(r)))
    }

    /// Write a box given in the parent container's coordinate space. A shape without an
    /// explicit `xfrm` gets one.
    pub fn set_local_rect(&mut self, node: NodeId, rect: Rect) -> Result<(), SlideError> {
        let xfrm = match self.xfrm(node) {
            Some(x) => x,
            None => self.create_xfrm(node)?,
        };
        let off = self.tree.ensure_child(xfrm, DML_NS, "off");
        self.tree.set_attr(off, "x", rect.left.to_string());
        self.tree.set_attr(off, "y", rect.top.to_string());
        let ext = self.tree.ensure_child(xfrm, DML_NS, "ext");
        self.tree.set_attr(ext, "cx", rect.width.to_string());
        self.tree.set_attr(ext, "cy", rect.height.to_string());
        // a:off must precede a:ext
        if self.tree.index_in_parent(ext) < self.tree.index_in_parent(off) {
            self.tree.insert_before(ext, off);
        }
        Ok(())
    }

    /// Write a box given in absolute slide coordinates.
    pub fn set_absolute_rect(&mut self, node: NodeId, rect: Rect) -> Result<(), SlideError> {
        let frames = self
            .ancestor_frames(node)
            .ok_or_else(|| SlideError::Schema("enclosing group has no frame".into()))?;
        let local = frames.iter().rev().fold(rect, |r, f| f.to_child(r));
        self.set_local_rect(node, local)
    }

    fn create_xfrm(&mut self, node: NodeId) -> Result<NodeId, SlideError> {
        let local = self.tree.local_name(node).unwrap_or_default().to_string();
        match local.as_str() {
            "sp" | "pic" | "cxnSp" => {
                let sp_pr = self.tree.child(node, PML_NS, "spPr").ok_or_else(|| {
                    SlideError::Schema(format!("{}: p:{local} without p:spPr", self.name(node)))
                })?;
                let xfrm = self.tree.create_element(DML_NS, "xfrm");
                // a:xfrm is the first child of spPr
                self.tree.insert_child(sp_pr, 0, xfrm);
                Ok(xfrm)
            }
            _ => Err(SlideError::Schema(format!(
                "{}: p:{local} without xfrm",
                self.name(node)
            ))),
        }
    }

    /// Rotation in 60000ths of a degree.
    pub fn rotation(&self, node: NodeId) -> i64 {
        self.xfrm(node)
            .and_then(|x| self.tree.attr_i64(x, "rot"))
            .unwrap_or(0)
    }

    pub fn set_rotation(&mut self, node: NodeId, rot: i64) -> Result<(), SlideError> {
        let xfrm = self
            .xfrm(node)
            .ok_or_else(|| SlideError::Schema(format!("{}: no xfrm for rotation", self.name(node))))?;
        if rot == 0 {
            self.tree.remove_attr(xfrm, "rot");
        } else {
            self.tree.set_attr(xfrm, "rot", rot.to_string());
        }
        Ok(())
    }

    // --- structure ---

    /// Largest `cNvPr@id` on the slide, including the spTree's own.
    pub fn max_shape_id(&self) -> u32 {
        self.tree
            .descendants(self.tree.root())
            .into_iter()
            .filter(|&n| self.tree.is(n, PML_NS, "cNvPr"))
            .filter_map(|n| self.tree.attr(n, "id")?.parse::<u32>().ok())
            .max()
            .unwrap_or(1)
    }

    /// Append an empty group with the given absolute box and a 1:1 child frame at (0,0).
    /// The group goes after the last shape, before a trailing `p:extLst`.
    pub fn create_group(&mut self, rect: Rect) -> NodeId {
        let id = self.max_shape_id() + 1;
        let t = &mut self.tree;
        let grp = t.create_element(PML_NS, "grpSp");

        let nv = t.append_element(grp, PML_NS, "nvGrpSpPr");
        let c_nv_pr = t.append_element(nv, PML_NS, "cNvPr");
        t.set_attr(c_nv_pr, "id", id.to_string());
        t.set_attr(c_nv_pr, "name", format!("Chart Group {id}"));
        t.append_element(nv, PML_NS, "cNvGrpSpPr");
        t.append_element(nv, PML_NS, "nvPr");

        let sp_pr = t.append_element(grp, PML_NS, "grpSpPr");
        let xfrm = t.append_element(sp_pr, DML_NS, "xfrm");
        for (local, a, av, b, bv) in [
            ("off", "x", rect.left, "y", rect.top),
            ("ext", "cx", rect.width, "cy", rect.height),
            ("chOff", "x", 0, "y", 0),
            ("chExt", "cx", rect.width, "cy", rect.height),
        ] {
            let e = t.append_element(xfrm, DML_NS, local);
            t.set_attr(e, a, av.to_string());
            t.set_attr(e, b, bv.to_string());
        }

        match t.child(self.sp_tree, PML_NS, "extLst") {
            Some(ext_lst) => t.insert_before(ext_lst, grp),
            None => t.append_child(self.sp_tree, grp),
        }
        grp
    }

    /// Move a shape under `group`, after its existing children.
    pub fn reparent(&mut self, node: NodeId, group: NodeId) {
        self.tree.append_child(group, node);
    }

    // --- text ---

    /// `p:txBody` of a shape, or a structural error for variants without a text frame.
    pub fn text_body(&self, node: NodeId) -> Result<NodeId, SlideError> {
        self.tree
            .child(node, PML_NS, "txBody")
            .ok_or_else(|| {
                SlideError::Structural(format!(
                    "{} ({:?}) has no text frame",
                    self.stable_id(node),
                    self.kind(node)
                ))
            })
    }

    pub fn paragraphs(&self, body: NodeId) -> Vec<NodeId> {
        self.tree.children_named(body, DML_NS, "p").collect()
    }

    pub fn paragraph_text(&self, para: NodeId) -> String {
        self.tree
            .elements(para)
            .filter(|&c| self.tree.is(c, DML_NS, "r") || self.tree.is(c, DML_NS, "fld"))
            .filter_map(|r| self.tree.child(r, DML_NS, "t"))
            .map(|t| self.tree.text(t))
            .collect()
    }

    pub fn runs(&self, para: NodeId) -> Vec<NodeId> {
        self.tree.children_named(para, DML_NS, "r").collect()
    }

    /// Outline level of a paragraph (`a:pPr@lvl`), 0 when absent.
    pub fn paragraph_level(&self, para: NodeId) -> u8 {
        self.tree
            .child(para, DML_NS, "pPr")
            .and_then(|p| self.tree.attr(p, "lvl"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_frame_maps_both_ways() {
        let frame = GroupFrame {
            rect: Rect::new(1000, 2000, 400, 200),
            child_offset: (0, 0),
            child_extent: (800, 400),
        };
        let child = Rect::new(100, 100, 200, 100);
        let abs = frame.to_parent(child);
        assert_eq!(abs, Rect::new(1050, 2050, 100, 50));
        assert_eq!(frame.to_child(abs), child);
    }
}
