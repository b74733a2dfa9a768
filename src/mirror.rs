use crate::config::Config;
use crate::error::SlideError;
use crate::geometry::{Emu, Rect, clamp_left, distance, mirror, mirror_rotation};
use crate::pptx::slide::Slide;
use crate::pptx::{DML_NS, PML_NS};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MirrorOutcome {
    pub mirrored: usize,
    pub skipped_near_chart: usize,
    pub clamped: usize,
    /// Shapes the pass could not place (no resolvable geometry).
    pub structural_skips: Vec<String>,
}

/// Mirror every top-level shape across the vertical center line of a slide `slide_width`
/// wide. Standalone charts never move, neither do shapes within `label_proximity` of one.
/// Groups move as rigid bodies.
pub fn mirror_slide(
    slide: &mut Slide,
    slide_width: Emu,
    cfg: &Config,
) -> Result<MirrorOutcome, SlideError> {
    let shapes = slide.shapes();
    let chart_regions: Vec<Rect> = shapes
        .iter()
        .filter(|s| s.is_chart())
        .filter_map(|s| s.rect)
        .collect();

    let mut outcome = MirrorOutcome::default();
    for shape in &shapes {
        if shape.is_chart() {
            continue;
        }
        let Some(rect) = shape.rect else {
            log::warn!("Slide {}: {} has no geometry, not mirrored", slide.index + 1, shape.id);
            outcome.structural_skips.push(format!("{}: no geometry", shape.id));
            continue;
        };
        if !shape.is_group()
            && chart_regions
                .iter()
                .any(|c| distance(&rect, c) <= cfg.label_proximity)
        {
            log::debug!("{} stays next to its chart", shape.id);
            outcome.skipped_near_chart += 1;
            continue;
        }

        let raw = slide_width.saturating_sub(rect.right());
        if clamp_left(raw, rect.width, slide_width).1 {
            log::warn!(
                "Slide {}: {} clamped onto the slide (mirrored left {raw})",
                slide.index + 1,
                shape.id
            );
            outcome.clamped += 1;
        }
        let new_left = mirror(rect.left, rect.width, slide_width);
        // width and height are written back explicitly with the new offset
        slide.set_absolute_rect(shape.node, rect.with_left(new_left))?;
        if shape.is_directional() {
            slide.set_rotation(shape.node, mirror_rotation(shape.rotation))?;
        }
        log::debug!("{}: left {} -> {}", shape.id, rect.left, new_left);
        outcome.mirrored += 1;
    }
    Ok(outcome)
}

/// Right-align every paragraph on the slide (groups included) and clear its `rtl`
/// marker. Returns the number of paragraphs touched.
pub fn align_paragraphs_rtl(slide: &mut Slide) -> usize {
    let bodies: Vec<_> = slide
        .all_shapes()
        .into_iter()
        .filter_map(|n| slide.tree().child(n, PML_NS, "txBody"))
        .collect();

    let tree = slide.tree_mut();
    let mut count = 0;
    for body in bodies {
        let paras: Vec<_> = tree.children_named(body, DML_NS, "p").collect();
        for para in paras {
            let ppr = match tree.child(para, DML_NS, "pPr") {
                Some(p) => p,
                None => {
                    let p = tree.create_element(DML_NS, "pPr");
                    tree.insert_child(para, 0, p);
                    p
                }
            };
            tree.set_attr(ppr, "algn", "r");
            tree.remove_attr(ppr, "rtl");
            count += 1;
        }
    }
    count
}
