use std::io::{self, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QName {
    pub ns: Option<String>,
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    fn qualified(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local),
            None => self.local.clone(),
        }
    }

    fn matches(&self, ns: Option<&str>, local: &str) -> bool {
        self.local == local && self.ns.as_deref() == ns
    }
}

#[derive(Clone, Debug)]
pub struct Attr {
    pub name: QName,
    pub value: String,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Element {
        name: QName,
        attrs: Vec<Attr>,
        /// Namespace declarations written on this element: (prefix, uri).
        ns_decls: Vec<(Option<String>, String)>,
    },
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Owned, mutable XML tree: a roxmltree parse copied into an index arena. Detached nodes
/// stay in the arena until the tree is dropped. Untouched nodes serialize with their
/// order, prefixes and namespace declarations intact.
#[derive(Clone, Debug)]
pub struct XmlTree {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl XmlTree {
    pub fn parse(text: &str) -> Result<Self, roxmltree::Error> {
        let doc = roxmltree::Document::parse(text)?;
        let mut tree = XmlTree {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        let root = tree.import(doc.root_element(), None);
        tree.root = root;
        Ok(tree)
    }

    fn import(&mut self, node: roxmltree::Node, parent: Option<NodeId>) -> NodeId {
        let kind = if node.is_element() {
            let tag = node.tag_name();
            let name = QName {
                ns: tag.namespace().map(String::from),
                prefix: tag
                    .namespace()
                    .and_then(|uri| node.lookup_prefix(uri))
                    .map(String::from),
                local: tag.name().to_string(),
            };
            let attrs = node
                .attributes()
                .map(|a| Attr {
                    name: QName {
                        ns: a.namespace().map(String::from),
                        prefix: a.namespace().and_then(|uri| {
                            if uri == XML_NS {
                                Some("xml".to_string())
                            } else {
                                node.lookup_prefix(uri).map(String::from)
                            }
                        }),
                        local: a.name().to_string(),
                    },
                    value: a.value().to_string(),
                })
                .collect();
            let inherited: Vec<(Option<&str>, &str)> = node
                .parent_element()
                .map(|p| p.namespaces().map(|n| (n.name(), n.uri())).collect())
                .unwrap_or_default();
            let ns_decls = node
                .namespaces()
                .filter(|n| n.name() != Some("xml"))
                .filter(|n| !inherited.contains(&(n.name(), n.uri())))
                .map(|n| (n.name().map(String::from), n.uri().to_string()))
                .collect();
            NodeKind::Element {
                name,
                attrs,
                ns_decls,
            }
        } else if node.is_comment() {
            NodeKind::Comment(node.text().unwrap_or_default().to_string())
        } else {
            NodeKind::Text(node.text().unwrap_or_default().to_string())
        };

        let id = self.push(kind, parent);
        for child in node.children() {
            if child.is_element() || child.is_text() || child.is_comment() {
                let child_id = self.import(child, Some(id));
                self.nodes[id.0].children.push(child_id);
            }
        }
        id
    }

    fn push(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent,
            children: Vec::new(),
        });
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn name(&self, id: NodeId) -> Option<&QName> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.name(id).map(|n| n.local.as_str())
    }

    pub fn is(&self, id: NodeId, ns: &str, local: &str) -> bool {
        self.name(id).is_some_and(|n| n.matches(Some(ns), local))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| matches!(self.nodes[c.0].kind, NodeKind::Element { .. }))
    }

    pub fn child(&self, id: NodeId, ns: &str, local: &str) -> Option<NodeId> {
        self.elements(id).find(|&c| self.is(c, ns, local))
    }

    pub fn children_named<'a>(
        &'a self,
        id: NodeId,
        ns: &'a str,
        local: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.elements(id).filter(move |&c| self.is(c, ns, local))
    }

    /// Follow a path of (namespace, local name) steps through first matching children.
    pub fn path(&self, id: NodeId, steps: &[(&str, &str)]) -> Option<NodeId> {
        steps
            .iter()
            .try_fold(id, |node, (ns, local)| self.child(node, ns, local))
    }

    /// Pre-order element descendants, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.elements(id).collect();
        stack.reverse();
        while let Some(node) = stack.pop() {
            out.push(node);
            let before = stack.len();
            stack.extend(self.elements(node));
            stack[before..].reverse();
        }
        out
    }

    pub fn attr(&self, id: NodeId, local: &str) -> Option<&str> {
        self.attr_ns(id, None, local)
    }

    pub fn attr_ns(&self, id: NodeId, ns: Option<&str>, local: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name.matches(ns, local))
                .map(|a| a.value.as_str()),
            _ => None,
        }
    }

    pub fn attr_i64(&self, id: NodeId, local: &str) -> Option<i64> {
        self.attr(id, local).and_then(|v| v.trim().parse().ok())
    }

    /// Set an unqualified attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, id: NodeId, local: &str, value: impl Into<String>) {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            let value = value.into();
            match attrs.iter_mut().find(|a| a.name.matches(None, local)) {
                Some(a) => a.value = value,
                None => attrs.push(Attr {
                    name: QName {
                        ns: None,
                        prefix: None,
                        local: local.to_string(),
                    },
                    value,
                }),
            }
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, local: &str) -> bool {
        if let NodeKind::Element { attrs, .. } = &mut self.nodes[id.0].kind {
            let before = attrs.len();
            attrs.retain(|a| !a.name.matches(None, local));
            return attrs.len() != before;
        }
        false
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Element { .. } => {
                for &c in &self.nodes[id.0].children {
                    self.collect_text(c, out);
                }
            }
            NodeKind::Comment(_) => {}
        }
    }

    /// Replace all children of `id` with one text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        self.clear_children(id);
        let t = self.push(NodeKind::Text(text.to_string()), Some(id));
        self.nodes[id.0].children.push(t);
    }

    /// Prefix bound to `ns` anywhere on the root element or its descendants.
    fn prefix_for(&self, ns: &str) -> Option<Option<String>> {
        self.nodes.iter().find_map(|n| match &n.kind {
            NodeKind::Element { ns_decls, .. } => ns_decls
                .iter()
                .find(|(_, uri)| uri == ns)
                .map(|(p, _)| p.clone()),
            _ => None,
        })
    }

    /// Create a detached element in namespace `ns`, reusing the prefix the part already
    /// binds to it. An unbound namespace is declared as default on the new element.
    pub fn create_element(&mut self, ns: &str, local: &str) -> NodeId {
        let (prefix, ns_decls) = match self.prefix_for(ns) {
            Some(prefix) => (prefix, Vec::new()),
            None => (None, vec![(None, ns.to_string())]),
        };
        self.push(
            NodeKind::Element {
                name: QName {
                    ns: Some(ns.to_string()),
                    prefix,
                    local: local.to_string(),
                },
                attrs: Vec::new(),
                ns_decls,
            },
            None,
        )
    }

    /// Create a detached element and append it under `parent`.
    pub fn append_element(&mut self, parent: NodeId, ns: &str, local: &str) -> NodeId {
        let id = self.create_element(ns, local);
        self.append_child(parent, id);
        id
    }

    /// First child named (ns, local), created and appended if absent.
    pub fn ensure_child(&mut self, parent: NodeId, ns: &str, local: &str) -> NodeId {
        match self.child(parent, ns, local) {
            Some(c) => c,
            None => self.append_element(parent, ns, local),
        }
    }

    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `child` at `index` among all children (text and comments included).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
    }

    pub fn insert_before(&mut self, sibling: NodeId, child: NodeId) {
        let Some(parent) = self.parent(sibling) else {
            return;
        };
        self.detach(child);
        let index = self.index_in_parent(sibling).unwrap_or(0);
        self.insert_child(parent, index, child);
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.nodes[id.0].parent?;
        self.nodes[parent.0].children.iter().position(|&c| c == id)
    }

    pub fn clear_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for c in children {
            self.nodes[c.0].parent = None;
        }
    }

    /// Detached copy of the subtree rooted at `id`.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let kind = self.nodes[id.0].kind.clone();
        let copy = self.push(kind, None);
        let children = self.nodes[id.0].children.clone();
        for c in children {
            let cc = self.deep_clone(c);
            self.nodes[cc.0].parent = Some(copy);
            self.nodes[copy.0].children.push(cc);
        }
        copy
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out)?;
        Ok(out)
    }

    pub fn write_to<W: Write>(&self, out: W) -> io::Result<()> {
        let mut writer = Writer::new(out);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
            .map_err(io_err)?;
        writer.get_mut().write_all(b"\r\n")?;
        self.write_node(&mut writer, self.root)
    }

    fn write_node<W: Write>(&self, writer: &mut Writer<W>, id: NodeId) -> io::Result<()> {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Text(t) => writer
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(io_err),
            NodeKind::Comment(c) => writer
                .write_event(Event::Comment(BytesText::from_escaped(c.as_str())))
                .map_err(io_err),
            NodeKind::Element {
                name,
                attrs,
                ns_decls,
            } => {
                let qname = name.qualified();
                let mut start = BytesStart::new(qname.as_str());
                for (prefix, uri) in ns_decls {
                    let key = match prefix {
                        Some(p) => format!("xmlns:{p}"),
                        None => "xmlns".to_string(),
                    };
                    start.push_attribute((key.as_str(), uri.as_str()));
                }
                for attr in attrs {
                    start.push_attribute((attr.name.qualified().as_str(), attr.value.as_str()));
                }
                if node.children.is_empty() {
                    return writer.write_event(Event::Empty(start)).map_err(io_err);
                }
                writer.write_event(Event::Start(start)).map_err(io_err)?;
                for &c in &node.children {
                    self.write_node(writer, c)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(qname.as_str())))
                    .map_err(io_err)
            }
        }
    }
}

fn io_err<E: std::fmt::Display>(e: E) -> io::Error {
    io::Error::other(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
    const P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

    fn sample() -> XmlTree {
        XmlTree::parse(
            r#"<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main"><p:cSld><p:spTree><p:sp><a:t xml:space="preserve">A &amp; B</a:t></p:sp><!-- note --></p:spTree></p:cSld></p:sld>"#,
        )
        .unwrap()
    }

    #[test]
    fn round_trip_keeps_prefixes_and_escapes() {
        let tree = sample();
        let out = String::from_utf8(tree.to_bytes().unwrap()).unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        assert!(out.contains(r#"<p:sld xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:a="#));
        assert!(out.contains(r#"<a:t xml:space="preserve">A &amp; B</a:t>"#));
        assert!(out.contains("<!-- note -->"));
        let reparsed = XmlTree::parse(&out).unwrap();
        assert_eq!(reparsed.text(reparsed.root()), "A & B");
    }

    #[test]
    fn new_elements_reuse_declared_prefix() {
        let mut tree = sample();
        let sp_tree = tree
            .path(tree.root(), &[(P, "cSld"), (P, "spTree")])
            .unwrap();
        let off = tree.append_element(sp_tree, A, "off");
        tree.set_attr(off, "x", "10");
        let out = String::from_utf8(tree.to_bytes().unwrap()).unwrap();
        assert!(out.contains(r#"<a:off x="10"/>"#));
    }

    #[test]
    fn detach_and_reparent() {
        let mut tree = sample();
        let sp_tree = tree
            .path(tree.root(), &[(P, "cSld"), (P, "spTree")])
            .unwrap();
        let sp = tree.child(sp_tree, P, "sp").unwrap();
        let grp = tree.create_element(P, "grpSp");
        tree.append_child(sp_tree, grp);
        tree.append_child(grp, sp);
        assert_eq!(tree.parent(sp), Some(grp));
        assert!(tree.child(sp_tree, P, "sp").is_none());
        assert_eq!(tree.descendants(sp_tree).len(), 3);
    }

    #[test]
    fn deep_clone_is_independent() {
        let mut tree = sample();
        let sp = tree.descendants(tree.root())[2];
        let copy = tree.deep_clone(sp);
        let t = tree.elements(copy).next().unwrap();
        tree.set_text(t, "changed");
        assert_eq!(tree.text(sp), "A & B");
        assert_eq!(tree.text(copy), "changed");
        assert_eq!(tree.parent(copy), None);
    }
}
