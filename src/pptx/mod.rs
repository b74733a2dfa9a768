mod layout;
pub mod slide;

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;

use crate::error::Error;
use crate::geometry::Emu;
use crate::xml::XmlTree;

pub use layout::{InheritedGeometry, LayoutPart};
pub use slide::Slide;

pub(crate) const PML_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
pub(crate) const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(crate) const REL_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

pub(crate) const CHART_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/chart";
pub(crate) const CHARTEX_URI: &str = "http://schemas.microsoft.com/office/drawing/2014/chartex";
pub(crate) const TABLE_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/table";

const REL_TYPE_SLIDE: &str = "/slide";
const REL_TYPE_LAYOUT: &str = "/slideLayout";
const REL_TYPE_MASTER: &str = "/slideMaster";

const LAYOUT_DIR: &str = "ppt/slideLayouts/";

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

/// A loaded presentation: slide width, parsed slide parts in presentation order, parsed
/// slide layouts, and the original package bytes so untouched parts can be copied through
/// on save.
pub struct Document {
    pub width: Emu,
    pub slides: Vec<Slide>,
    pub layouts: Vec<LayoutPart>,
    package: Vec<u8>,
}

struct Relationship {
    rel_type: String,
    target: String,
}

fn read_zip_text(zip: &mut Archive, name: &str) -> Option<String> {
    let mut content = String::new();
    zip.by_name(name).ok()?.read_to_string(&mut content).ok()?;
    Some(content)
}

fn parse_rels_xml(xml_content: &str) -> HashMap<String, Relationship> {
    let mut rels = HashMap::new();
    let Ok(xml) = roxmltree::Document::parse(xml_content) else {
        return rels;
    };
    for node in xml.root_element().children() {
        if node.tag_name().name() == "Relationship"
            && let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target"))
        {
            rels.insert(
                id.to_string(),
                Relationship {
                    rel_type: node.attribute("Type").unwrap_or_default().to_string(),
                    target: target.to_string(),
                },
            );
        }
    }
    rels
}

/// Load relationships for a part like "ppt/slides/slide1.xml" → "ppt/slides/_rels/slide1.xml.rels"
fn parse_part_relationships(zip: &mut Archive, part_path: &str) -> HashMap<String, Relationship> {
    let (dir, file) = match part_path.rsplit_once('/') {
        Some((d, f)) => (d, f),
        None => ("", part_path),
    };
    let rels_path = if dir.is_empty() {
        format!("_rels/{}.rels", file)
    } else {
        format!("{}/_rels/{}.rels", dir, file)
    };
    let Some(xml_content) = read_zip_text(zip, &rels_path) else {
        return HashMap::new();
    };
    parse_rels_xml(&xml_content)
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(abs) = target.strip_prefix('/') {
        return abs.to_string();
    }
    let mut parts: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for seg in target.split('/') {
        match seg {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

fn related_part(zip: &mut Archive, source_part: &str, type_suffix: &str) -> Option<String> {
    parse_part_relationships(zip, source_part)
        .into_values()
        .find(|r| r.rel_type.ends_with(type_suffix))
        .map(|r| resolve_target(source_part, &r.target))
}

fn parse_part(zip: &mut Archive, name: &str) -> Option<XmlTree> {
    let xml_content = read_zip_text(zip, name)?;
    match XmlTree::parse(&xml_content) {
        Ok(tree) => Some(tree),
        Err(e) => {
            log::warn!("Ignoring malformed part {name}: {e}");
            None
        }
    }
}

/// Every `ppt/slideLayouts/*.xml` part, in numeric order. Malformed layouts are skipped.
fn load_layouts(zip: &mut Archive) -> Vec<LayoutPart> {
    let mut names: Vec<String> = zip
        .file_names()
        .filter(|n| {
            n.strip_prefix(LAYOUT_DIR)
                .is_some_and(|f| f.ends_with(".xml") && !f.contains('/'))
        })
        .map(String::from)
        .collect();
    // slideLayout2.xml before slideLayout10.xml
    names.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    names
        .into_iter()
        .filter_map(|name| {
            let tree = parse_part(zip, &name)?;
            Some(LayoutPart::new(name, tree))
        })
        .collect()
}

pub fn load(path: &Path) -> Result<Document, Error> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => Error::Io(
            std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())),
        ),
        _ => Error::Io(e),
    })?;
    load_bytes(bytes)
}

pub fn load_bytes(package: Vec<u8>) -> Result<Document, Error> {
    let (width, height, slides, layouts) = {
        let mut zip = zip::ZipArchive::new(Cursor::new(package.as_slice()))
            .map_err(|_| Error::InvalidPptx("file is not a ZIP archive".into()))?;

        let pres_path = "ppt/presentation.xml";
        let pres_xml = read_zip_text(&mut zip, pres_path).ok_or_else(|| {
            Error::InvalidPptx("missing ppt/presentation.xml (is this a PPTX file?)".into())
        })?;
        let pres = roxmltree::Document::parse(&pres_xml)?;
        let root = pres.root_element();

        let sld_sz = root
            .children()
            .find(|n| n.tag_name().name() == "sldSz" && n.tag_name().namespace() == Some(PML_NS))
            .ok_or_else(|| Error::InvalidPptx("missing p:sldSz".into()))?;
        let dim = |attr: &str| -> Result<Emu, Error> {
            sld_sz
                .attribute(attr)
                .and_then(|v| v.parse::<Emu>().ok())
                .filter(|v| *v > 0)
                .ok_or_else(|| Error::InvalidPptx(format!("invalid p:sldSz@{attr}")))
        };
        let (width, height) = (dim("cx")?, dim("cy")?);

        let rels = parse_part_relationships(&mut zip, pres_path);
        let slide_ids: Vec<String> = root
            .children()
            .find(|n| n.tag_name().name() == "sldIdLst")
            .into_iter()
            .flat_map(|lst| lst.children())
            .filter(|n| n.tag_name().name() == "sldId")
            .filter_map(|n| n.attribute((REL_NS, "id")).map(String::from))
            .collect();

        let layouts = load_layouts(&mut zip);
        let mut inherited_cache: HashMap<String, InheritedGeometry> = HashMap::new();
        let mut slides = Vec::with_capacity(slide_ids.len());
        for r_id in slide_ids {
            let Some(rel) = rels.get(&r_id) else {
                return Err(Error::InvalidPptx(format!("slide relationship {r_id} not found")));
            };
            if !rel.rel_type.ends_with(REL_TYPE_SLIDE) {
                continue;
            }
            let part_name = resolve_target(pres_path, &rel.target);
            let xml_content = read_zip_text(&mut zip, &part_name)
                .ok_or_else(|| Error::InvalidPptx(format!("missing slide part {part_name}")))?;
            let tree = XmlTree::parse(&xml_content)?;

            let inherited = match related_part(&mut zip, &part_name, REL_TYPE_LAYOUT) {
                Some(layout_part) => inherited_cache
                    .entry(layout_part.clone())
                    .or_insert_with(|| {
                        let layout = layouts.iter().find(|l| l.part_name == layout_part);
                        load_inherited(&mut zip, layout, &layout_part)
                    })
                    .clone(),
                None => InheritedGeometry::default(),
            };

            let index = slides.len();
            slides.push(Slide::new(index, part_name, tree, inherited)?);
        }
        (width, height, slides, layouts)
    };

    log::info!(
        "Loaded presentation: {} slide(s), {} layout(s), {}x{} EMU",
        slides.len(),
        layouts.len(),
        width,
        height
    );

    Ok(Document {
        width,
        slides,
        layouts,
        package,
    })
}

fn load_inherited(zip: &mut Archive, layout: Option<&LayoutPart>, layout_part: &str) -> InheritedGeometry {
    let master = related_part(zip, layout_part, REL_TYPE_MASTER).and_then(|m| parse_part(zip, &m));
    InheritedGeometry::from_parts(layout.map(LayoutPart::tree), master.as_ref())
}

impl Document {
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Write the package: slide parts and translated layouts are re-serialized, every other
    /// entry is copied raw.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes).map_err(Error::Io)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut rewritten: HashMap<&str, Vec<u8>> = HashMap::new();
        for slide in &self.slides {
            rewritten.insert(slide.part_name.as_str(), slide.tree().to_bytes()?);
        }
        for layout in self.layouts.iter().filter(|l| l.is_modified()) {
            rewritten.insert(layout.part_name.as_str(), layout.tree().to_bytes()?);
        }

        let mut zip = zip::ZipArchive::new(Cursor::new(self.package.as_slice()))?;
        let mut out = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for i in 0..zip.len() {
            let entry = zip.by_index_raw(i)?;
            let name = entry.name().to_string();
            match rewritten.get(name.as_str()) {
                Some(data) => {
                    drop(entry);
                    out.start_file(name.as_str(), options)?;
                    out.write_all(data)?;
                }
                None => out.raw_copy_file(entry)?,
            }
        }
        Ok(out.finish()?.into_inner())
    }
}
