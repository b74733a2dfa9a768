/// English Metric Units, 914400 per inch.
pub type Emu = i64;

pub const EMU_PER_INCH: Emu = 914_400;

/// Largest magnitude ST_Coordinate allows.
pub const MAX_COORD: Emu = 27_273_042_316_900;

/// OOXML stores rotation in 60000ths of a degree.
pub const DEGREE: i64 = 60_000;
const FULL_TURN: i64 = 360 * DEGREE;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub left: Emu,
    pub top: Emu,
    pub width: Emu,
    pub height: Emu,
}

impl Rect {
    pub fn new(left: Emu, top: Emu, width: Emu, height: Emu) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> Emu {
        self.left.saturating_add(self.width)
    }

    pub fn bottom(&self) -> Emu {
        self.top.saturating_add(self.height)
    }

    pub fn with_left(self, left: Emu) -> Self {
        Self { left, ..self }
    }

    pub fn translate(self, dx: Emu, dy: Emu) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            ..self
        }
    }

    /// Smallest rectangle containing every input box. `None` for an empty input.
    pub fn union_all<I: IntoIterator<Item = Rect>>(rects: I) -> Option<Rect> {
        let mut iter = rects.into_iter();
        let first = iter.next()?;
        let (mut l, mut t, mut r, mut b) = (first.left, first.top, first.right(), first.bottom());
        for rect in iter {
            l = l.min(rect.left);
            t = t.min(rect.top);
            r = r.max(rect.right());
            b = b.max(rect.bottom());
        }
        Some(Rect::new(l, t, r - l, b - t))
    }
}

/// Horizontal mirror across the vertical center line of an axis of width `axis_width`.
/// Width is never altered; the result is clamped onto the axis.
pub fn mirror(left: Emu, width: Emu, axis_width: Emu) -> Emu {
    clamp_left(axis_width.saturating_sub(left.saturating_add(width)), width, axis_width).0
}

/// Clamp `left` into `[0, axis_width - width]`. Returns the clamped value and whether
/// clamping changed it. A box wider than the axis is pinned to 0.
pub fn clamp_left(left: Emu, width: Emu, axis_width: Emu) -> (Emu, bool) {
    let clamped = left.min(axis_width.saturating_sub(width)).max(0);
    (clamped, clamped != left)
}

/// Strict interval overlap on both axes. Touching edges do not overlap.
pub fn overlap(a: &Rect, b: &Rect) -> bool {
    h_overlap(a, b) && v_overlap(a, b)
}

pub fn h_overlap(a: &Rect, b: &Rect) -> bool {
    a.left < b.right() && a.right() > b.left
}

pub fn v_overlap(a: &Rect, b: &Rect) -> bool {
    a.top < b.bottom() && a.bottom() > b.top
}

/// Euclidean distance between nearest edges; 0 when the boxes overlap or touch.
pub fn distance(a: &Rect, b: &Rect) -> Emu {
    if overlap(a, b) {
        return 0;
    }
    let dx = b.left.saturating_sub(a.right()).max(a.left.saturating_sub(b.right())).max(0);
    let dy = b.top.saturating_sub(a.bottom()).max(a.top.saturating_sub(b.bottom())).max(0);
    match (dx, dy) {
        (0, dy) => dy,
        (dx, 0) => dx,
        (dx, dy) => {
            let sq = (dx as i128) * (dx as i128) + (dy as i128) * (dy as i128);
            sq.isqrt().min(Emu::MAX as i128) as Emu
        }
    }
}

/// Rotation mirror for directional shapes: `(180° - angle) mod 360°`, in 60000ths of a degree.
pub fn mirror_rotation(angle: i64) -> i64 {
    (180 * DEGREE - angle).rem_euclid(FULL_TURN)
}

/// Horizontal gap from `left` to `right` (negative when they overlap horizontally).
pub fn h_gap(left: &Rect, right: &Rect) -> Emu {
    right.left.saturating_sub(left.right())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const W: Emu = 9_144_000;

    #[test]
    fn mirror_moves_box_to_opposite_side() {
        assert_eq!(mirror(1_000_000, 3_000_000, W), 5_144_000);
        assert_eq!(mirror(0, W, W), 0);
    }

    #[test]
    fn mirror_clamps_out_of_range_input() {
        // right edge past the slide: raw result would be negative
        assert_eq!(mirror(8_000_000, 2_000_000, W), 0);
        // negative left: raw result would push past the right edge
        assert_eq!(mirror(-500_000, 1_000_000, W), W - 1_000_000);
        assert_eq!(clamp_left(-1, 10, 100), (0, true));
        assert_eq!(clamp_left(5, 10, 100), (5, false));
        assert_eq!(clamp_left(20, 200, 100), (0, true));
    }

    #[test]
    fn edge_touch_is_not_overlap() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(100, 0, 100, 100);
        assert!(!overlap(&a, &b));
        assert_eq!(distance(&a, &b), 0);
        let c = Rect::new(99, 99, 10, 10);
        assert!(overlap(&a, &c));
    }

    #[test]
    fn distance_combines_gaps() {
        let a = Rect::new(0, 0, 100, 100);
        assert_eq!(distance(&a, &Rect::new(130, 0, 10, 10)), 30);
        assert_eq!(distance(&a, &Rect::new(0, 150, 10, 10)), 50);
        assert_eq!(distance(&a, &Rect::new(130, 140, 10, 10)), 50);
        assert_eq!(distance(&Rect::new(130, 140, 10, 10), &a), 50);
    }

    #[test]
    fn extreme_boxes_saturate() {
        let r = Rect::new(Emu::MAX - 10, Emu::MIN, 100, 100);
        assert_eq!(r.right(), Emu::MAX);
        assert_eq!(mirror(r.left, r.width, W), 0);
        assert_eq!(distance(&r, &Rect::new(Emu::MIN, 0, 10, 10)), Emu::MAX);
    }

    #[test]
    fn rotation_mirror() {
        assert_eq!(mirror_rotation(0), 180 * DEGREE);
        assert_eq!(mirror_rotation(45 * DEGREE), 135 * DEGREE);
        assert_eq!(mirror_rotation(270 * DEGREE), 270 * DEGREE);
        assert_eq!(mirror_rotation(180 * DEGREE), 0);
    }

    #[test]
    fn union_covers_all() {
        let u = Rect::union_all([Rect::new(10, 20, 30, 40), Rect::new(0, 50, 5, 5)]).unwrap();
        assert_eq!(u, Rect::new(0, 20, 40, 40));
        assert_eq!(Rect::union_all(std::iter::empty()), None);
    }

    proptest! {
        #[test]
        fn mirror_is_involution(width in 0i64..=W, frac in 0.0f64..=1.0) {
            let left = ((W - width) as f64 * frac) as Emu;
            let once = mirror(left, width, W);
            prop_assert_eq!(mirror(once, width, W), left);
        }

        #[test]
        fn mirror_stays_on_axis(left in -W..2 * W, width in 0i64..=W) {
            let m = mirror(left, width, W);
            prop_assert!(m >= 0);
            prop_assert!(m + width <= W);
        }

        #[test]
        fn distance_is_symmetric(
            a in (0i64..W, 0i64..W, 0i64..W, 0i64..W),
            b in (0i64..W, 0i64..W, 0i64..W, 0i64..W),
        ) {
            let ra = Rect::new(a.0, a.1, a.2, a.3);
            let rb = Rect::new(b.0, b.1, b.2, b.3);
            prop_assert_eq!(distance(&ra, &rb), distance(&rb, &ra));
            prop_assert_eq!(distance(&ra, &rb) == 0, overlap(&ra, &rb) || touching(&ra, &rb));
        }
    }

    fn touching(a: &Rect, b: &Rect) -> bool {
        a.left <= b.right() && a.right() >= b.left && a.top <= b.bottom() && a.bottom() >= b.top
    }
}
