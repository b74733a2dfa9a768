use crate::geometry::{Emu, distance};
use crate::model::{ShapeInfo, StableId};

/// Chart ownership of a slide's top-level shapes. A shape is owned by a chart only when
/// its box touches or overlaps the chart's box.
#[derive(Clone, Debug, Default)]
pub struct AssociationMap {
    charts: Vec<StableId>,
    /// (shape, owning chart) in slide order.
    entries: Vec<(StableId, StableId)>,
}

impl AssociationMap {
    /// Charts seen on the slide, in z-order.
    pub fn charts(&self) -> &[StableId] {
        &self.charts
    }

    /// Shapes owned by `chart`, in slide order.
    pub fn members_of(&self, chart: &StableId) -> Vec<StableId> {
        self.entries
            .iter()
            .filter(|(_, owner)| owner == chart)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn candidate(shape: &ShapeInfo) -> bool {
    !shape.is_chart() && !shape.is_group() && !shape.is_title() && shape.rect.is_some()
}

/// Build the association map for a snapshot of a slide's top-level shapes.
pub fn resolve(shapes: &[ShapeInfo]) -> AssociationMap {
    let charts: Vec<&ShapeInfo> = shapes
        .iter()
        .filter(|s| s.is_chart() && s.rect.is_some())
        .collect();
    let mut map = AssociationMap {
        charts: charts.iter().map(|c| c.id.clone()).collect(),
        entries: Vec::new(),
    };
    if charts.is_empty() {
        return map;
    }

    for shape in shapes.iter().filter(|s| candidate(s)) {
        let Some(rect) = shape.rect else { continue };
        // strict `<` keeps the first chart on ties
        let mut best: Option<(usize, Emu)> = None;
        for (i, chart) in charts.iter().enumerate() {
            let Some(chart_rect) = chart.rect else { continue };
            let d = distance(&rect, &chart_rect);
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        if let Some((i, 0)) = best {
            log::debug!("{} associated with chart {}", shape.id, charts[i].id);
            map.entries.push((shape.id.clone(), charts[i].id.clone()));
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::model::{PlaceholderRole, ShapeKind};

    fn shape(id: &str, kind: ShapeKind, rect: Rect) -> ShapeInfo {
        ShapeInfo {
            node: crate::xml::XmlTree::parse("<r/>").unwrap().root(),
            id: StableId::derive(Some(id), Some("s")).unwrap(),
            name: format!("Shape {id}"),
            kind,
            placeholder: None,
            rect: Some(rect),
            rotation: 0,
            contains_chart: false,
        }
    }

    #[test]
    fn only_touching_shapes_are_owned() {
        let shapes = vec![
            shape("1", ShapeKind::Chart, Rect::new(0, 0, 100, 100)),
            shape("2", ShapeKind::TextBox, Rect::new(50, 50, 100, 100)),
            shape("3", ShapeKind::TextBox, Rect::new(100, 0, 10, 10)),
            shape("4", ShapeKind::TextBox, Rect::new(101, 0, 10, 10)),
        ];
        let map = resolve(&shapes);
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.members_of(&shapes[0].id),
            vec![shapes[1].id.clone(), shapes[2].id.clone()]
        );
    }

    #[test]
    fn titles_and_groups_are_never_owned() {
        let mut title = shape("2", ShapeKind::Placeholder, Rect::new(0, 0, 50, 50));
        title.placeholder = Some(PlaceholderRole::Title);
        let shapes = vec![
            shape("1", ShapeKind::Chart, Rect::new(0, 0, 100, 100)),
            title,
            shape("3", ShapeKind::Group, Rect::new(0, 0, 50, 50)),
        ];
        assert!(resolve(&shapes).is_empty());
    }

    #[test]
    fn first_chart_wins_ties() {
        let shapes = vec![
            shape("1", ShapeKind::Chart, Rect::new(0, 0, 100, 100)),
            shape("2", ShapeKind::Chart, Rect::new(100, 0, 100, 100)),
            shape("3", ShapeKind::TextBox, Rect::new(90, 0, 20, 20)),
        ];
        let map = resolve(&shapes);
        assert_eq!(map.members_of(&shapes[0].id), vec![shapes[2].id.clone()]);
        assert_eq!(map.members_of(&shapes[1].id), Vec::<StableId>::new());
    }
}
