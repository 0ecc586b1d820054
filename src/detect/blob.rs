use serde::Serialize;

/// Axis-aligned bounding box of a foreground region, in source pixels.
///
/// The box spans `[top(), bottom()] x [left(), right()]` inclusive, with
/// `center = top + height / 2` (integer division) on each axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Blob {
    pub center_row: i32,
    pub center_col: i32,
    pub width: i32,
    pub height: i32,
}

impl Blob {
    /// Build a blob from inclusive bounds.
    pub fn from_bounds(top: i32, left: i32, bottom: i32, right: i32) -> Self {
        let width = right - left + 1;
        let height = bottom - top + 1;
        Self {
            center_row: top + height / 2,
            center_col: left + width / 2,
            width,
            height,
        }
    }

    pub fn top(&self) -> i32 {
        self.center_row - self.height / 2
    }

    pub fn left(&self) -> i32 {
        self.center_col - self.width / 2
    }

    pub fn bottom(&self) -> i32 {
        self.top() + self.height - 1
    }

    pub fn right(&self) -> i32 {
        self.left() + self.width - 1
    }

    pub fn contains_point(&self, row: i32, col: i32) -> bool {
        (self.top()..=self.bottom()).contains(&row) && (self.left()..=self.right()).contains(&col)
    }

    /// Two-way containment: either center lies inside the other box.
    pub fn overlaps(&self, other: &Blob) -> bool {
        self.contains_point(other.center_row, other.center_col)
            || other.contains_point(self.center_row, self.center_col)
    }

    /// Smallest box enclosing both.
    pub fn union(&self, other: &Blob) -> Blob {
        Blob::from_bounds(
            self.top().min(other.top()),
            self.left().min(other.left()),
            self.bottom().max(other.bottom()),
            self.right().max(other.right()),
        )
    }

    /// Same center, one pixel smaller on each axis.
    pub fn shrunk(&self) -> Blob {
        Blob {
            width: (self.width - 1).max(0),
            height: (self.height - 1).max(0),
            ..*self
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Both sides within `[min, max]`.
    pub fn fits(&self, min: i32, max: i32) -> bool {
        (min..=max).contains(&self.width) && (min..=max).contains(&self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_round_trip_through_center_form() {
        let even = Blob::from_bounds(20, 20, 29, 29);
        assert_eq!((even.center_row, even.center_col), (25, 25));
        assert_eq!((even.top(), even.left(), even.bottom(), even.right()), (20, 20, 29, 29));

        let odd = Blob::from_bounds(3, 7, 11, 9);
        assert_eq!((odd.width, odd.height), (3, 9));
        assert_eq!((odd.top(), odd.left(), odd.bottom(), odd.right()), (3, 7, 11, 9));
    }

    #[test]
    fn overlap_is_two_way_center_containment() {
        let big = Blob::from_bounds(0, 0, 19, 19);
        let small_inside = Blob::from_bounds(2, 2, 5, 5);
        let far = Blob::from_bounds(40, 40, 49, 49);
        let corner = Blob::from_bounds(8, 8, 17, 17);
        let corner_shifted = Blob::from_bounds(12, 12, 21, 21);

        assert!(big.overlaps(&small_inside));
        assert!(small_inside.overlaps(&big));
        assert!(!big.overlaps(&far));
        // Boxes intersect, but neither center is inside the other.
        assert!(!corner.overlaps(&Blob::from_bounds(17, 17, 26, 26)));
        assert!(corner.overlaps(&corner_shifted));
    }

    #[test]
    fn union_and_shrink() {
        let a = Blob::from_bounds(0, 0, 9, 9);
        let b = Blob::from_bounds(5, 5, 14, 14);
        let u = a.union(&b);
        assert_eq!((u.top(), u.left(), u.bottom(), u.right()), (0, 0, 14, 14));

        let s = a.shrunk();
        assert_eq!((s.width, s.height), (9, 9));
        assert_eq!((s.center_row, s.center_col), (a.center_row, a.center_col));
        assert!(Blob::from_bounds(0, 0, 0, 0).shrunk().is_empty());
    }
}
