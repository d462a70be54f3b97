//! Permutation generator for module wiring.
//!
//! `generate` walks the physical slots `0..width*height` in transmission order
//! and computes, for every slot, which logical (row-major) module feeds it.

use crate::mapping::params::{MapOrientation, MapType, MappingParams};

/// Physical slot → logical index.
///
/// `permutation[i]` is the logical index whose frame occupies physical slot `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation(Vec<usize>);

impl Permutation {
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &src)| i == src)
    }

    /// Whether every index in `0..len` appears exactly once.
    pub fn is_bijection(&self) -> bool {
        let mut seen = vec![false; self.0.len()];
        for &src in &self.0 {
            match seen.get_mut(src) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        true
    }

    /// The permutation that undoes this one.
    pub fn inverse(&self) -> Permutation {
        let mut inv = vec![0; self.0.len()];
        for (slot, &src) in self.0.iter().enumerate() {
            inv[src] = slot;
        }
        Permutation(inv)
    }

    /// Reorders `items` so that `out[i] = items[self[i]]`.
    ///
    /// Reads from `items` only, so source and destination never alias.
    /// Returns `None` if the lengths differ.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Option<Vec<T>> {
        if items.len() != self.0.len() {
            return None;
        }
        Some(self.0.iter().map(|&src| items[src].clone()).collect())
    }
}

impl From<Permutation> for Vec<usize> {
    fn from(p: Permutation) -> Self {
        p.0
    }
}

/// Builds the physical → logical permutation for a `width × height` grid.
///
/// Slot `i` is split into a line index and a position along that line
/// (lines are rows for horizontal wiring, columns for vertical). Serpentine
/// wiring reverses the position on odd lines. The start corner then decides
/// which end of each axis is index 0, and the flip mirrors the resulting
/// coordinate before it is linearised row-major.
pub fn generate(params: &MappingParams, width: u32, height: u32) -> Permutation {
    let w = width as usize;
    let h = height as usize;
    let len = w * h;
    if len == 0 {
        return Permutation(Vec::new());
    }

    let line_len = match params.map_orientation {
        MapOrientation::Horizontal => w,
        MapOrientation::Vertical => h,
    };

    let mut out = Vec::with_capacity(len);
    for slot in 0..len {
        let line = slot / line_len;
        let mut pos = slot % line_len;
        if params.map_type == MapType::Serpentine && line % 2 == 1 {
            pos = line_len - 1 - pos;
        }

        // (column, row) counted from the start corner
        let (col, row) = match params.map_orientation {
            MapOrientation::Horizontal => (pos, line),
            MapOrientation::Vertical => (line, pos),
        };

        let mut x = if params.map_start.from_right() {
            w - 1 - col
        } else {
            col
        };
        let mut y = if params.map_start.from_bottom() {
            h - 1 - row
        } else {
            row
        };

        if params.map_flip.mirrors_x() {
            x = w - 1 - x;
        }
        if params.map_flip.mirrors_y() {
            y = h - 1 - y;
        }

        out.push(y * w + x);
    }

    Permutation(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::params::{MapFlip, MapStart};

    fn params(t: MapType, o: MapOrientation, s: MapStart, f: MapFlip) -> MappingParams {
        MappingParams::new(t, o, s, f)
    }

    #[test]
    fn test_identity_params_give_identity_permutation() {
        let p = generate(&MappingParams::IDENTITY, 5, 3);
        assert!(p.is_identity());
        assert_eq!(p.len(), 15);
    }

    #[test]
    fn test_flip_horizontal_two_by_two() {
        let p = generate(
            &params(
                MapType::Line,
                MapOrientation::Horizontal,
                MapStart::TopLeft,
                MapFlip::Horizontal,
            ),
            2,
            2,
        );
        assert_eq!(p.as_slice(), &[1, 0, 3, 2]);
    }

    #[test]
    fn test_serpentine_rows() {
        // 3x2, rows snake: 0 1 2 / 5 4 3
        let p = generate(
            &params(
                MapType::Serpentine,
                MapOrientation::Horizontal,
                MapStart::TopLeft,
                MapFlip::None,
            ),
            3,
            2,
        );
        assert_eq!(p.as_slice(), &[0, 1, 2, 5, 4, 3]);
    }

    #[test]
    fn test_vertical_line_columns() {
        // 3x2 grid, column-major from the top-left corner
        let p = generate(
            &params(
                MapType::Line,
                MapOrientation::Vertical,
                MapStart::TopLeft,
                MapFlip::None,
            ),
            3,
            2,
        );
        assert_eq!(p.as_slice(), &[0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_vertical_serpentine_from_bottom_right() {
        // 2x3 grid (w=2, h=3), logical:
        //   0 1
        //   2 3
        //   4 5
        // Starts bottom-right going up, then snakes down the left column.
        let p = generate(
            &params(
                MapType::Serpentine,
                MapOrientation::Vertical,
                MapStart::BottomRight,
                MapFlip::None,
            ),
            2,
            3,
        );
        assert_eq!(p.as_slice(), &[5, 3, 1, 0, 2, 4]);
    }

    #[test]
    fn test_start_bottom_left_line() {
        let p = generate(
            &params(
                MapType::Line,
                MapOrientation::Horizontal,
                MapStart::BottomLeft,
                MapFlip::None,
            ),
            2,
            2,
        );
        assert_eq!(p.as_slice(), &[2, 3, 0, 1]);
    }

    #[test]
    fn test_flip_both_reverses_row_major() {
        let p = generate(
            &params(
                MapType::Line,
                MapOrientation::Horizontal,
                MapStart::TopLeft,
                MapFlip::Both,
            ),
            3,
            2,
        );
        assert_eq!(p.as_slice(), &[5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_empty_grid() {
        assert!(generate(&MappingParams::IDENTITY, 0, 4).is_empty());
        assert!(generate(&MappingParams::IDENTITY, 4, 0).is_empty());
    }

    #[test]
    fn test_single_module_is_fixed_point() {
        for p in MappingParams::all() {
            assert_eq!(generate(&p, 1, 1).as_slice(), &[0]);
        }
    }

    #[test]
    fn test_inverse_and_apply() {
        let p = generate(
            &params(
                MapType::Serpentine,
                MapOrientation::Vertical,
                MapStart::TopRight,
                MapFlip::Vertical,
            ),
            4,
            3,
        );
        let items: Vec<u32> = (0..12).collect();
        let mapped = p.apply(&items).unwrap();
        let restored = p.inverse().apply(&mapped).unwrap();
        assert_eq!(restored, items);
        assert!(p.apply(&items[..5]).is_none());
    }

    #[test]
    fn test_is_bijection_rejects_duplicates() {
        assert!(!Permutation(vec![0, 0, 1]).is_bijection());
        assert!(!Permutation(vec![0, 3, 1]).is_bijection());
        assert!(Permutation(vec![2, 0, 1]).is_bijection());
    }

    // Property-based tests using proptest
    use proptest::prelude::*;

    fn any_params() -> impl Strategy<Value = MappingParams> {
        prop::sample::select(MappingParams::all().collect::<Vec<_>>())
    }

    proptest! {
        #[test]
        fn test_generate_is_bijection(
            params in any_params(),
            width in 1u32..24,
            height in 1u32..24,
        ) {
            let p = generate(&params, width, height);
            prop_assert_eq!(p.len(), (width * height) as usize);
            prop_assert!(p.is_bijection(), "{} at {}x{} is not a bijection", params, width, height);
        }

        #[test]
        fn test_generate_is_deterministic(
            params in any_params(),
            width in 1u32..16,
            height in 1u32..16,
        ) {
            prop_assert_eq!(generate(&params, width, height), generate(&params, width, height));
        }

        #[test]
        fn test_inverse_round_trip(
            params in any_params(),
            width in 1u32..16,
            height in 1u32..16,
        ) {
            let p = generate(&params, width, height);
            let items: Vec<usize> = (0..p.len()).map(|i| i * 7 + 1).collect();
            let mapped = p.apply(&items).unwrap();
            let restored = p.inverse().apply(&mapped).unwrap();
            prop_assert_eq!(restored, items);
        }
    }
}
