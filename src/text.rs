use crate::config::Config;
use crate::error::SlideError;
use crate::model::Replacement;
use crate::pptx::slide::Slide;
use crate::pptx::DML_NS;
use crate::xml::{NodeId, XmlTree};

/// Light grays that turn unreadable with Arabic glyphs; promoted to black.
const LIGHT_GRAYS: &[[u8; 3]] = &[
    [0xCC, 0xCC, 0xCC],
    [0xCC, 0xCE, 0xCE],
    [0xC0, 0xC0, 0xC0],
    [0xCA, 0xCA, 0xCA],
    [0xD3, 0xD3, 0xD3],
    [0xBE, 0xBE, 0xBE],
];

/// Children of `a:rPr` that must follow `a:latin`, in schema order.
const AFTER_LATIN: &[&str] = &["ea", "cs", "sym", "hlinkClick", "hlinkMouseOver", "rtl", "extLst"];
const AFTER_CS: &[&str] = &["sym", "hlinkClick", "hlinkMouseOver", "rtl", "extLst"];
const AFTER_AUTOFIT: &[&str] = &["scene3d", "sp3d", "flatTx", "extLst"];

fn parse_hex_color(val: &str) -> Option<[u8; 3]> {
    if val.len() != 6 || !val.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let rgb = u32::from_str_radix(val, 16).ok()?;
    let [_, r, g, b] = rgb.to_be_bytes();
    Some([r, g, b])
}

/// Paragraph and first-run properties of one source paragraph, as detached copies.
#[derive(Clone, Copy, Default)]
struct Snapshot {
    ppr: Option<NodeId>,
    rpr: Option<NodeId>,
}

/// Insert `child` under `parent` before the first existing element whose local name is in
/// `followers`, else append it.
fn insert_ordered(tree: &mut XmlTree, parent: NodeId, child: NodeId, followers: &[&str]) {
    let next = tree
        .elements(parent)
        .find(|&c| tree.local_name(c).is_some_and(|l| followers.contains(&l)));
    match next {
        Some(n) => tree.insert_before(n, child),
        None => tree.append_child(parent, child),
    }
}

fn set_typeface(tree: &mut XmlTree, rpr: NodeId, local: &str, font: &str, followers: &[&str]) {
    let el = match tree.child(rpr, DML_NS, local) {
        Some(e) => e,
        None => {
            let e = tree.create_element(DML_NS, local);
            insert_ordered(tree, rpr, e, followers);
            e
        }
    };
    tree.set_attr(el, "typeface", font);
}

/// Apply the target-script run rules to a (cloned) `a:rPr`.
fn restyle_run(tree: &mut XmlTree, rpr: NodeId, cfg: &Config) {
    match tree.attr_i64(rpr, "sz").map(|sz| sz.checked_mul(cfg.font_scale_percent)) {
        Some(Some(scaled)) => tree.set_attr(rpr, "sz", (scaled / 100).to_string()),
        Some(None) => log::warn!("Run size {:?} out of range, left as is", tree.attr(rpr, "sz")),
        None => {}
    }
    tree.set_attr(rpr, "lang", cfg.target_lang_tag.as_str());
    set_typeface(tree, rpr, "latin", &cfg.target_font, AFTER_LATIN);
    set_typeface(tree, rpr, "cs", &cfg.target_font, AFTER_CS);
    if let Some(rtl) = tree.child(rpr, DML_NS, "rtl") {
        tree.detach(rtl);
    }
    if let Some(clr) = tree.path(rpr, &[(DML_NS, "solidFill"), (DML_NS, "srgbClr")])
        && tree
            .attr(clr, "val")
            .and_then(parse_hex_color)
            .is_some_and(|c| LIGHT_GRAYS.contains(&c))
    {
        tree.set_attr(clr, "val", "000000");
    }
}

/// Word wrap, shrink-on-overflow and small uniform insets.
fn configure_body(tree: &mut XmlTree, body: NodeId, cfg: &Config) {
    let body_pr = match tree.child(body, DML_NS, "bodyPr") {
        Some(b) => b,
        None => {
            let b = tree.create_element(DML_NS, "bodyPr");
            tree.insert_child(body, 0, b);
            b
        }
    };
    tree.set_attr(body_pr, "wrap", "square");
    let margin = cfg.text_margin.to_string();
    for inset in ["lIns", "tIns", "rIns", "bIns"] {
        tree.set_attr(body_pr, inset, margin.as_str());
    }
    let autofits: Vec<NodeId> = tree
        .elements(body_pr)
        .filter(|&c| {
            tree.local_name(c)
                .is_some_and(|l| matches!(l, "noAutofit" | "normAutofit" | "spAutoFit"))
        })
        .collect();
    for a in autofits {
        tree.detach(a);
    }
    let fit = tree.create_element(DML_NS, "normAutofit");
    insert_ordered(tree, body_pr, fit, AFTER_AUTOFIT);
}

/// Replace the text of `node` with `replacement`, one paragraph per string.
///
/// Each new paragraph takes the properties of the source paragraph at the same index
/// (counting non-empty paragraphs only); extra paragraphs get bare properties. The result
/// is right aligned, never carries an `rtl` marker, and uses the configured font.
pub fn replace_text(
    slide: &mut Slide,
    node: NodeId,
    replacement: Replacement,
    cfg: &Config,
) -> Result<usize, SlideError> {
    let body = slide.text_body(node)?;
    let sources: Vec<NodeId> = slide
        .paragraphs(body)
        .into_iter()
        .filter(|&p| !slide.paragraph_text(p).trim().is_empty())
        .collect();
    let first_runs: Vec<Option<NodeId>> = sources
        .iter()
        .map(|&p| {
            let run = slide.runs(p).into_iter().next()?;
            slide.tree().child(run, DML_NS, "rPr")
        })
        .collect();

    let tree = slide.tree_mut();
    let snapshots: Vec<Snapshot> = sources
        .iter()
        .zip(&first_runs)
        .map(|(&p, rpr)| Snapshot {
            ppr: tree.child(p, DML_NS, "pPr").map(|n| tree.deep_clone(n)),
            rpr: rpr.map(|n| tree.deep_clone(n)),
        })
        .collect();

    let old: Vec<NodeId> = tree.children_named(body, DML_NS, "p").collect();
    for p in old {
        tree.detach(p);
    }
    configure_body(tree, body, cfg);

    let lines = replacement.into_paragraphs();
    for (i, line) in lines.iter().enumerate() {
        let snap = snapshots.get(i).copied().unwrap_or_default();
        let para = tree.append_element(body, DML_NS, "p");

        let ppr = snap
            .ppr
            .unwrap_or_else(|| tree.create_element(DML_NS, "pPr"));
        tree.remove_attr(ppr, "rtl");
        tree.set_attr(ppr, "algn", "r");
        tree.append_child(para, ppr);

        let run = tree.append_element(para, DML_NS, "r");
        let rpr = snap
            .rpr
            .unwrap_or_else(|| tree.create_element(DML_NS, "rPr"));
        restyle_run(tree, rpr, cfg);
        tree.append_child(run, rpr);
        let t = tree.append_element(run, DML_NS, "t");
        tree.set_text(t, line);
    }
    if lines.is_empty() {
        // txBody requires at least one paragraph
        tree.append_element(body, DML_NS, "p");
    }
    Ok(lines.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_parse_only_when_well_formed() {
        assert_eq!(parse_hex_color("C0C0C0"), Some([0xC0, 0xC0, 0xC0]));
        assert_eq!(parse_hex_color("00ff7f"), Some([0x00, 0xFF, 0x7F]));
        // six bytes, but not six hex digits
        assert_eq!(parse_hex_color("aé123"), None);
        assert_eq!(parse_hex_color("+12345"), None);
        assert_eq!(parse_hex_color("C0C0C"), None);
    }
}
