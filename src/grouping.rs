use std::collections::HashSet;

use crate::association::AssociationMap;
use crate::error::SlideError;
use crate::geometry::Rect;
use crate::model::{ShapeKind, StableId};
use crate::pptx::Slide;

/// Charts that already live inside a group. Seeding the grouped set with them makes a
/// second run over the same slide a no-op.
fn charts_in_groups(slide: &Slide) -> HashSet<StableId> {
    slide
        .all_shapes()
        .into_iter()
        .filter(|&n| !slide.is_top_level(n) && slide.kind(n) == Some(ShapeKind::Chart))
        .map(|n| slide.stable_id(n))
        .collect()
}

/// Wrap each chart and the shapes it owns into one group so they mirror as a unit.
/// Returns the number of groups created.
pub fn synthesize_groups(slide: &mut Slide, map: &AssociationMap) -> Result<usize, SlideError> {
    let mut grouped = charts_in_groups(slide);
    let mut created = 0;

    for chart in map.charts() {
        if grouped.contains(chart) {
            continue;
        }
        let members = map.members_of(chart);
        if members.is_empty() {
            continue;
        }

        // Absolute boxes are captured before anything moves.
        let mut boxes = Vec::with_capacity(members.len() + 1);
        for id in std::iter::once(chart).chain(members.iter()) {
            let node = slide
                .find(id)
                .ok_or_else(|| SlideError::Schema(format!("shape {id} vanished before grouping")))?;
            let rect = slide
                .absolute_rect(node)
                .ok_or_else(|| SlideError::Schema(format!("shape {id} has no geometry")))?;
            boxes.push((node, rect));
        }
        if boxes.len() < 2 {
            continue;
        }
        // members join the group in slide order
        let order = slide.top_level_shapes();
        boxes.sort_by_key(|(node, _)| order.iter().position(|n| n == node));

        let Some(bbox) = Rect::union_all(boxes.iter().map(|(_, r)| *r)) else {
            continue;
        };
        let group = slide.create_group(bbox);
        for (node, rect) in &boxes {
            slide.reparent(*node, group);
            slide.set_local_rect(*node, rect.translate(-bbox.left, -bbox.top))?;
        }

        log::info!(
            "Slide {}: grouped chart {} with {} shape(s) into {}",
            slide.index + 1,
            chart,
            members.len(),
            slide.stable_id(group)
        );
        grouped.insert(chart.clone());
        created += 1;
    }
    Ok(created)
}
