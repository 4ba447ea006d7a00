//! Geometry information

use itertools::iproduct;

use crate::{
    constants::NDIMS,
    error::{Error, Result},
};

/// Index of a grid cell.
pub type Coord = [i32; NDIMS];

/// An axis aligned box of grid cells.
///
/// The box is half-open: it contains all cells `c` with `lu <= c < ro`
/// componentwise.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct GridBox {
    lu: Coord,
    ro: Coord,
}

impl GridBox {
    /// Create a new box from its lower corner `lu` and its exclusive upper corner `ro`.
    pub fn new(lu: Coord, ro: Coord) -> Result<Self> {
        if (0..NDIMS).any(|axis| lu[axis] > ro[axis]) {
            return Err(Error::InvalidArgument(format!(
                "box corners {:?} and {:?} are not ordered",
                lu, ro
            )));
        }
        Ok(Self { lu, ro })
    }

    /// Box `[0, extent)`.
    pub fn from_extent(extent: Coord) -> Result<Self> {
        Self::new([0; NDIMS], extent)
    }

    /// Lower corner.
    pub fn lu(&self) -> Coord {
        self.lu
    }

    /// Exclusive upper corner.
    pub fn ro(&self) -> Coord {
        self.ro
    }

    /// Number of cells along each axis.
    pub fn extent(&self) -> Coord {
        [
            self.ro[0] - self.lu[0],
            self.ro[1] - self.lu[1],
            self.ro[2] - self.lu[2],
        ]
    }

    /// Number of cells in the box.
    pub fn volume(&self) -> usize {
        self.extent().iter().map(|&e| e as usize).product()
    }

    /// Number of cells, or `None` if it does not fit into `usize`.
    pub fn checked_volume(&self) -> Option<usize> {
        cell_count(self.extent())
    }

    /// Return true if the box contains no cells.
    pub fn is_empty(&self) -> bool {
        self.volume() == 0
    }

    /// Check if a cell lies inside the box.
    pub fn contains(&self, coord: Coord) -> bool {
        (0..NDIMS).all(|axis| self.lu[axis] <= coord[axis] && coord[axis] < self.ro[axis])
    }

    /// The axes ordered by decreasing extent. Equal extents keep axis order.
    pub fn axes_by_extent(&self) -> [usize; NDIMS] {
        let extent = self.extent();
        let mut axes = [0, 1, 2];
        axes.sort_by(|&a, &b| extent[b].cmp(&extent[a]));
        axes
    }

    /// The axis with the largest extent, the lowest one on ties.
    pub fn longest_axis(&self) -> usize {
        self.axes_by_extent()[0]
    }

    /// Cut the box at `coord` along `axis`.
    ///
    /// The left box is `[lu, coord)` along `axis`, the right box is `[coord, ro)`.
    /// `coord` must lie strictly inside the box along `axis`.
    pub fn split(&self, axis: usize, coord: i32) -> Result<(GridBox, GridBox)> {
        if axis >= NDIMS {
            return Err(Error::IndexOutOfRange {
                index: axis,
                len: NDIMS,
            });
        }
        if coord <= self.lu[axis] || coord >= self.ro[axis] {
            return Err(Error::InvalidArgument(format!(
                "split coordinate {} not inside [{}, {}) along axis {}",
                coord, self.lu[axis], self.ro[axis], axis
            )));
        }

        let mut left_ro = self.ro;
        left_ro[axis] = coord;
        let mut right_lu = self.lu;
        right_lu[axis] = coord;

        Ok((
            GridBox {
                lu: self.lu,
                ro: left_ro,
            },
            GridBox {
                lu: right_lu,
                ro: self.ro,
            },
        ))
    }

    /// Coordinate of a cell relative to the lower corner.
    pub fn to_local(&self, coord: Coord) -> Coord {
        [
            coord[0] - self.lu[0],
            coord[1] - self.lu[1],
            coord[2] - self.lu[2],
        ]
    }

    /// Iterate over all cells of the box in row-major order.
    ///
    /// The position of a cell in this iteration is its local linear index.
    pub fn cells(&self) -> impl Iterator<Item = Coord> {
        let [x0, y0, z0] = self.lu;
        let [x1, y1, z1] = self.ro;
        iproduct!(x0..x1, y0..y1, z0..z1).map(|(x, y, z)| [x, y, z])
    }
}

impl std::fmt::Display for GridBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [x0, y0, z0] = self.lu;
        let [x1, y1, z1] = self.ro;

        write!(f, "[{}, {}) x [{}, {}) x [{}, {})", x0, x1, y0, y1, z0, z1)
    }
}

fn cell_count(extent: Coord) -> Option<usize> {
    extent
        .iter()
        .try_fold(1usize, |count, &e| count.checked_mul(e.max(0) as usize))
}

/// Row-major linear index of `coord` in a box `[0, extent)`.
///
/// The index is `(x * extent_y + y) * extent_z + z`. Coordinates outside
/// the box and boxes with more cells than `usize` can count are rejected.
pub fn linearize(coord: Coord, extent: Coord) -> Result<usize> {
    if (0..NDIMS).any(|axis| coord[axis] < 0 || coord[axis] >= extent[axis]) {
        return Err(Error::InvalidArgument(format!(
            "cell {:?} outside of extent {:?}",
            coord, extent
        )));
    }
    if cell_count(extent).is_none() {
        return Err(Error::InvalidArgument(format!(
            "extent {:?} has more cells than can be indexed",
            extent
        )));
    }

    let [x, y, z] = coord.map(|c| c as usize);
    let [_, ey, ez] = extent.map(|e| e as usize);

    Ok((x * ey + y) * ez + z)
}

/// Inverse of [linearize].
///
/// Maps the position of a value in a local array of a box with the given
/// extent back to the cell it belongs to.
pub fn delinearize(index: usize, extent: Coord) -> Result<Coord> {
    let volume = cell_count(extent).unwrap_or(usize::MAX);
    if index >= volume {
        return Err(Error::IndexOutOfRange { index, len: volume });
    }

    let [_, ey, ez] = extent.map(|e| e as usize);

    let z = index % ez;
    let y = (index / ez) % ey;
    let x = index / (ez * ey);

    Ok([x as i32, y as i32, z as i32])
}

#[cfg(test)]
mod test {
    use proptest::prelude::{prop_assert_eq, proptest};

    use crate::error::Error;

    use super::{delinearize, linearize, GridBox};

    #[test]
    fn test_linearize_bijection() {
        let extent = [3, 4, 5];
        let bounds = GridBox::from_extent(extent).unwrap();

        let mut seen = vec![false; bounds.volume()];
        for (expected, cell) in bounds.cells().enumerate() {
            let index = linearize(cell, extent).unwrap();
            assert_eq!(index, expected);
            assert!(!seen[index]);
            seen[index] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_linearize_outside() {
        assert!(matches!(
            linearize([0, 4, 0], [3, 4, 5]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            linearize([-1, 0, 0], [3, 4, 5]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            delinearize(60, [3, 4, 5]),
            Err(Error::IndexOutOfRange { index: 60, len: 60 })
        ));
    }

    #[test]
    fn test_huge_extent() {
        let extent = [i32::MAX, i32::MAX, i32::MAX];
        let bounds = GridBox::from_extent(extent).unwrap();
        assert_eq!(bounds.checked_volume(), None);
        assert_eq!(GridBox::from_extent([3, 4, 5]).unwrap().checked_volume(), Some(60));

        assert!(linearize([1, 1, 1], extent).is_err());
        assert_eq!(delinearize(7, extent).unwrap(), [0, 0, 7]);
    }

    #[test]
    fn test_split() {
        let bounds = GridBox::new([1, 2, 3], [5, 6, 7]).unwrap();
        let (left, right) = bounds.split(1, 4).unwrap();

        assert_eq!(left, GridBox::new([1, 2, 3], [5, 4, 7]).unwrap());
        assert_eq!(right, GridBox::new([1, 4, 3], [5, 6, 7]).unwrap());
        assert_eq!(left.volume() + right.volume(), bounds.volume());

        // Cuts on the boundary would produce empty boxes.
        assert!(bounds.split(1, 2).is_err());
        assert!(bounds.split(1, 6).is_err());
    }

    #[test]
    fn test_axes_by_extent() {
        let bounds = GridBox::from_extent([4, 8, 8]).unwrap();
        assert_eq!(bounds.axes_by_extent(), [1, 2, 0]);
        assert_eq!(bounds.longest_axis(), 1);
        assert!(GridBox::new([2, 0, 0], [1, 1, 1]).is_err());
    }

    proptest! {
        #[test]
        fn test_delinearize_inverts_linearize(
            ex in 1i32..10, ey in 1i32..10, ez in 1i32..10, seed in 0usize..1000
        ) {
            let extent = [ex, ey, ez];
            let index = seed % (ex * ey * ez) as usize;
            let coord = delinearize(index, extent).unwrap();
            prop_assert_eq!(linearize(coord, extent).unwrap(), index);
        }
    }
}
