use super::mesh::{Cell, Face, Mesh, Node};

/// Boundary ids assigned by the tensor-product generators.
pub const X_MIN: u32 = 0;
pub const X_MAX: u32 = 1;
pub const Y_MIN: u32 = 2;
pub const Y_MAX: u32 = 3;
pub const Z_MIN: u32 = 4;
pub const Z_MAX: u32 = 5;

/// Build a hexahedral mesh from the cell edges along each axis.
///
/// Cells are numbered x-fastest. Interior faces point from the lower-id cell
/// to the higher-id cell; boundary faces point outward and carry the side id
/// (`X_MIN`..`Z_MAX`). Every cell gets material 0.
pub fn create_tensor_mesh(xs: &[f64], ys: &[f64], zs: &[f64]) -> Mesh {
    let (nx, ny, nz) = (
        xs.len().saturating_sub(1),
        ys.len().saturating_sub(1),
        zs.len().saturating_sub(1),
    );
    let cell_id = |i: usize, j: usize, k: usize| i + nx * (j + ny * k);

    let mut cells = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let (dx, dy, dz) = (xs[i + 1] - xs[i], ys[j + 1] - ys[j], zs[k + 1] - zs[k]);
                cells.push(Cell {
                    id: cell_id(i, j, k),
                    volume: dx * dy * dz,
                    centroid: [
                        0.5 * (xs[i] + xs[i + 1]),
                        0.5 * (ys[j] + ys[j + 1]),
                        0.5 * (zs[k] + zs[k + 1]),
                    ],
                    face_ids: Vec::with_capacity(6),
                    material_id: 0,
                });
            }
        }
    }

    let mut faces = Vec::new();
    let mut push_face = |cells: &mut Vec<Cell>, face: Face| {
        let idx = faces.len();
        let (a, b) = face.neighbor_cell_ids;
        cells[a].face_ids.push(idx);
        if let Some(b) = b {
            cells[b].face_ids.push(idx);
        }
        faces.push(face);
    };

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let c = cell_id(i, j, k);
                let centroid = cells[c].centroid;
                let (dx, dy, dz) = (xs[i + 1] - xs[i], ys[j + 1] - ys[j], zs[k + 1] - zs[k]);

                // x faces
                if i == 0 {
                    push_face(
                        &mut cells,
                        boundary_face(c, dy * dz, [-1.0, 0.0, 0.0], [xs[0], centroid[1], centroid[2]], X_MIN),
                    );
                }
                let x_hi = [xs[i + 1], centroid[1], centroid[2]];
                if i + 1 < nx {
                    push_face(&mut cells, interior_face(c, cell_id(i + 1, j, k), dy * dz, [1.0, 0.0, 0.0], x_hi));
                } else {
                    push_face(&mut cells, boundary_face(c, dy * dz, [1.0, 0.0, 0.0], x_hi, X_MAX));
                }

                // y faces
                if j == 0 {
                    push_face(
                        &mut cells,
                        boundary_face(c, dx * dz, [0.0, -1.0, 0.0], [centroid[0], ys[0], centroid[2]], Y_MIN),
                    );
                }
                let y_hi = [centroid[0], ys[j + 1], centroid[2]];
                if j + 1 < ny {
                    push_face(&mut cells, interior_face(c, cell_id(i, j + 1, k), dx * dz, [0.0, 1.0, 0.0], y_hi));
                } else {
                    push_face(&mut cells, boundary_face(c, dx * dz, [0.0, 1.0, 0.0], y_hi, Y_MAX));
                }

                // z faces
                if k == 0 {
                    push_face(
                        &mut cells,
                        boundary_face(c, dx * dy, [0.0, 0.0, -1.0], [centroid[0], centroid[1], zs[0]], Z_MIN),
                    );
                }
                let z_hi = [centroid[0], centroid[1], zs[k + 1]];
                if k + 1 < nz {
                    push_face(&mut cells, interior_face(c, cell_id(i, j, k + 1), dx * dy, [0.0, 0.0, 1.0], z_hi));
                } else {
                    push_face(&mut cells, boundary_face(c, dx * dy, [0.0, 0.0, 1.0], z_hi, Z_MAX));
                }
            }
        }
    }

    let mut nodes = Vec::with_capacity(xs.len() * ys.len() * zs.len());
    for &z in zs {
        for &y in ys {
            for &x in xs {
                nodes.push(Node { position: [x, y, z] });
            }
        }
    }

    Mesh::new(cells, faces, nodes)
}

fn interior_face(left: usize, right: usize, area: f64, normal: [f64; 3], centroid: [f64; 3]) -> Face {
    Face {
        area,
        normal,
        neighbor_cell_ids: (left, Some(right)),
        centroid,
        boundary_id: None,
    }
}

fn boundary_face(cell: usize, area: f64, normal: [f64; 3], centroid: [f64; 3], id: u32) -> Face {
    Face {
        area,
        normal,
        neighbor_cell_ids: (cell, None),
        centroid,
        boundary_id: Some(id),
    }
}

/// A one-cell-thick slab along x with a square cross section of side `transverse`.
pub fn create_slab_mesh(x_edges: &[f64], transverse: f64) -> Mesh {
    create_tensor_mesh(x_edges, &[0.0, transverse], &[0.0, transverse])
}

/// Uniform box `[0, extent]` split into `divisions` cells per axis.
pub fn create_box_mesh(extent: [f64; 3], divisions: [usize; 3]) -> Mesh {
    let axis = |a: usize| uniform_edges(0.0, extent[a], divisions[a]);
    create_tensor_mesh(&axis(0), &axis(1), &axis(2))
}

/// `n + 1` equally spaced points on `[start, end]`.
pub fn uniform_edges(start: f64, end: f64, n: usize) -> Vec<f64> {
    let n = n.max(1);
    let h = (end - start) / n as f64;
    (0..=n).map(|i| start + i as f64 * h).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_mesh_counts_and_volume() {
        let mesh = create_box_mesh([2.0, 1.0, 1.0], [4, 2, 1]);
        assert_eq!(mesh.n_cells(), 8);
        let interior = mesh
            .faces
            .iter()
            .filter(|f| f.neighbor_cell_ids.1.is_some())
            .count();
        // 3 x-planes * 2 rows + 4 columns * 1 y-plane
        assert_eq!(interior, 10);
        let volume: f64 = mesh.cells.iter().map(|c| c.volume).sum();
        assert!((volume - 2.0).abs() < 1e-12);
        for cell in &mesh.cells {
            assert_eq!(cell.face_ids.len(), 6);
        }
    }

    #[test]
    fn boundary_faces_point_outward() {
        let mesh = create_box_mesh([1.0, 1.0, 1.0], [2, 2, 2]);
        for face in &mesh.faces {
            if let (k, None) = face.neighbor_cell_ids {
                let c = mesh.cells[k].centroid;
                let out: f64 = (0..3).map(|a| face.normal[a] * (face.centroid[a] - c[a])).sum();
                assert!(out > 0.0);
            }
        }
        let normals = mesh.boundary_normals();
        assert_eq!(normals.len(), 6);
        assert!((normals[&X_MAX].x - 1.0).abs() < 1e-12);
    }
}
