use serde::Serialize;

use crate::error::SlideError;
use crate::geometry::{Emu, Rect, h_gap, overlap, v_overlap};
use crate::model::ShapeInfo;
use crate::pptx::Slide;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnresolvedCollision {
    pub first: String,
    pub second: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollisionOutcome {
    pub fixed: usize,
    pub unresolved: Vec<UnresolvedCollision>,
}

struct Item {
    info: ShapeInfo,
    rect: Rect,
}

fn introduces_overlap(items: &[Item], moving: usize, candidate: Rect) -> bool {
    let current = items[moving].rect;
    items
        .iter()
        .enumerate()
        .filter(|(k, _)| *k != moving)
        .any(|(_, other)| overlap(&candidate, &other.rect) && !overlap(&current, &other.rect))
}

fn unresolved(a: &ShapeInfo, b: &ShapeInfo, reason: &str) -> UnresolvedCollision {
    log::warn!("Unresolved collision between {} and {}: {reason}", a.id, b.id);
    UnresolvedCollision {
        first: a.name.clone(),
        second: b.name.clone(),
        reason: reason.to_string(),
    }
}

/// Run both repair passes on the slide's top-level shapes. A move is only applied when
/// the moved shape stays clear of everything it was clear of before.
pub fn resolve_collisions(
    slide: &mut Slide,
    slide_width: Emu,
    min_spacing: Emu,
) -> Result<CollisionOutcome, SlideError> {
    let mut items: Vec<Item> = slide
        .shapes()
        .into_iter()
        .filter_map(|info| Some(Item { rect: info.rect?, info }))
        .collect();
    let mut outcome = CollisionOutcome::default();
    chart_vs_shape(slide, &mut items, slide_width, min_spacing, &mut outcome)?;
    group_vs_group(slide, &mut items, slide_width, min_spacing, &mut outcome)?;
    Ok(outcome)
}

fn move_item(slide: &mut Slide, items: &mut [Item], i: usize, rect: Rect) -> Result<(), SlideError> {
    log::debug!("{}: shifted left {} -> {}", items[i].info.id, items[i].rect.left, rect.left);
    slide.set_absolute_rect(items[i].info.node, rect)?;
    items[i].rect = rect;
    Ok(())
}

fn chart_vs_shape(
    slide: &mut Slide,
    items: &mut [Item],
    slide_width: Emu,
    min_spacing: Emu,
    outcome: &mut CollisionOutcome,
) -> Result<(), SlideError> {
    for c in 0..items.len() {
        if !items[c].info.is_chart_body() {
            continue;
        }
        for o in 0..items.len() {
            if o == c || items[o].info.is_chart_body() {
                continue;
            }
            let (chart, other) = (items[c].rect, items[o].rect);
            if !overlap(&chart, &other) {
                continue;
            }

            let left_option = other.left - chart.width - min_spacing;
            let right_option = other.right() + min_spacing;
            let shift = |l: Emu| (l - chart.left).abs();
            let mut candidates = Vec::with_capacity(3);
            if left_option >= 0 && shift(left_option) <= shift(right_option) {
                candidates.extend([left_option, right_option]);
            } else if left_option >= 0 {
                candidates.extend([right_option, left_option]);
            } else {
                candidates.push(right_option);
            }
            candidates.push(slide_width - chart.width);

            let chosen = candidates
                .into_iter()
                .map(|l| chart.with_left(l))
                .find(|r| !introduces_overlap(items, c, *r));
            match chosen {
                Some(r) => {
                    move_item(slide, items, c, r)?;
                    if overlap(&r, &other) {
                        outcome.unresolved.push(unresolved(
                            &items[c].info,
                            &items[o].info,
                            "flush-right fallback still overlaps",
                        ));
                    } else {
                        outcome.fixed += 1;
                    }
                }
                None => outcome.unresolved.push(unresolved(
                    &items[c].info,
                    &items[o].info,
                    "every shift would overlap another shape",
                )),
            }
        }
    }
    Ok(())
}

fn group_vs_group(
    slide: &mut Slide,
    items: &mut [Item],
    slide_width: Emu,
    min_spacing: Emu,
    outcome: &mut CollisionOutcome,
) -> Result<(), SlideError> {
    let mut groups: Vec<usize> = (0..items.len()).filter(|&i| items[i].info.is_group()).collect();
    if groups.len() < 2 {
        return Ok(());
    }
    groups.sort_by_key(|&i| items[i].rect.left);

    for pair in groups.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let (ra, rb) = (items[a].rect, items[b].rect);
        let gap = h_gap(&ra, &rb);
        if gap >= min_spacing || !v_overlap(&ra, &rb) {
            continue;
        }
        let shortfall = min_spacing - gap;

        let right = rb.translate(shortfall, 0);
        if right.right() <= slide_width && !introduces_overlap(items, b, right) {
            move_item(slide, items, b, right)?;
            outcome.fixed += 1;
            continue;
        }
        let left = ra.translate(-shortfall, 0);
        if left.left >= 0 && !introduces_overlap(items, a, left) {
            move_item(slide, items, a, left)?;
            outcome.fixed += 1;
            continue;
        }
        outcome.unresolved.push(unresolved(
            &items[a].info,
            &items[b].info,
            "no room to separate groups",
        ));
    }
    Ok(())
}
