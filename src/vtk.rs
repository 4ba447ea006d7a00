//! Export of partitions for visualization.

use std::path::Path;

use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataArray, DataSet, ElementType, IOBuffer,
    UnstructuredGridPiece, Version, VertexNumbers, Vtk,
};

use crate::{error::Result, parttree::PartTreeStorage};

// Corner offsets of a VTK hexahedron in VTK vertex order.
const HEXAHEDRON_CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

/// Build an unstructured grid with one hexahedron per leaf.
///
/// Grid cell `c` spans the unit cube `[c, c + 1]`. Each hexahedron
/// carries the owning rank as cell data named `rank`.
pub fn to_vtk(tree: &PartTreeStorage) -> Vtk {
    let nleaves = tree.leaves().count();

    let mut points = Vec::<f64>::with_capacity(3 * 8 * nleaves);
    let mut vertices = Vec::<u32>::with_capacity(9 * nleaves);
    let mut ranks = Vec::<i32>::with_capacity(nleaves);

    for (leaf_index, leaf) in tree.leaves().enumerate() {
        let corners = [leaf.lu(), leaf.ro()];

        vertices.push(8);
        for (corner_index, corner) in HEXAHEDRON_CORNERS.iter().enumerate() {
            for (axis, &side) in corner.iter().enumerate() {
                points.push(corners[side][axis] as f64);
            }
            vertices.push((8 * leaf_index + corner_index) as u32);
        }

        ranks.push(leaf.rank());
    }

    Vtk {
        version: Version::new((4, 2)),
        title: String::from("kd partition"),
        byte_order: ByteOrder::BigEndian,
        file_path: None,
        data: DataSet::inline(UnstructuredGridPiece {
            points: IOBuffer::F64(points),
            cells: Cells {
                cell_verts: VertexNumbers::Legacy {
                    num_cells: nleaves as u32,
                    vertices,
                },
                types: vec![CellType::Hexahedron; nleaves],
            },
            data: Attributes {
                point: Vec::new(),
                cell: vec![Attribute::DataArray(DataArray {
                    name: String::from("rank"),
                    elem: ElementType::Scalars {
                        num_comp: 1,
                        lookup_table: None,
                    },
                    data: IOBuffer::I32(ranks),
                })],
            },
        }),
    }
}

/// Write the leaf boxes of a tree as legacy ASCII VTK file.
pub fn export_to_vtk<P: AsRef<Path>>(tree: &PartTreeStorage, path: P) -> Result<()> {
    to_vtk(tree).export_ascii(path)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use vtkio::model::{DataSet, IOBuffer, Piece, VertexNumbers};

    use crate::repart::initial_part_par;

    use super::to_vtk;

    #[test]
    fn test_one_hexahedron_per_leaf() {
        let tree = initial_part_par(6, [6, 4, 2]).unwrap();
        let vtk = to_vtk(&tree);

        let DataSet::UnstructuredGrid { pieces, .. } = vtk.data else {
            panic!("expected an unstructured grid");
        };
        let Piece::Inline(piece) = &pieces[0] else {
            panic!("expected inline piece data");
        };

        assert_eq!(piece.cells.types.len(), 6);
        match &piece.cells.cell_verts {
            VertexNumbers::Legacy {
                num_cells,
                vertices,
            } => {
                assert_eq!(*num_cells, 6);
                assert_eq!(vertices.len(), 6 * 9);
            }
            VertexNumbers::XML { .. } => panic!("expected legacy connectivity"),
        }

        let IOBuffer::F64(points) = &piece.points else {
            panic!("expected f64 points");
        };
        assert_eq!(points.len(), 6 * 8 * 3);

        // The first leaf starts at the origin.
        assert_eq!(&points[..3], &[0.0, 0.0, 0.0]);
    }
}
