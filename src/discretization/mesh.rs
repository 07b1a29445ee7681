use std::collections::BTreeMap;

use glam::DVec3;

/// The complete computational grid.
pub struct Mesh {
    pub cells: Vec<Cell>,
    pub faces: Vec<Face>,
    pub nodes: Vec<Node>,
    owned: Vec<usize>,
    at_boundary: Vec<bool>,
}

/// A single control volume.
pub struct Cell {
    pub id: usize,
    pub volume: f64,
    pub centroid: [f64; 3],
    pub face_ids: Vec<usize>,
    pub material_id: usize,
}

/// An interface between two cells, or between a cell and the domain boundary.
pub struct Face {
    pub area: f64,
    /// Unit normal pointing from the first cell towards the second one, or
    /// outward for boundary faces.
    pub normal: [f64; 3],
    /// Tuple of (cell1_id, optional cell2_id). `None` indicates a boundary face.
    pub neighbor_cell_ids: (usize, Option<usize>),
    pub centroid: [f64; 3],
    /// Set for boundary faces only.
    pub boundary_id: Option<u32>,
}

pub struct Node {
    pub position: [f64; 3],
}

impl Mesh {
    /// Builds the mesh and its derived topology. Every cell is owned by the
    /// calling process until [`Mesh::set_owned_cells`] says otherwise.
    pub fn new(cells: Vec<Cell>, faces: Vec<Face>, nodes: Vec<Node>) -> Self {
        let mut at_boundary = vec![false; cells.len()];
        for face in &faces {
            if let (k, None) = face.neighbor_cell_ids {
                at_boundary[k] = true;
            }
        }
        let owned = (0..cells.len()).collect();
        Self {
            cells,
            faces,
            nodes,
            owned,
            at_boundary,
        }
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    /// Cells assembled by this process, in ascending id order.
    pub fn owned_cells(&self) -> &[usize] {
        &self.owned
    }

    pub fn set_owned_cells(&mut self, mut owned: Vec<usize>) {
        owned.sort_unstable();
        owned.dedup();
        owned.retain(|&c| c < self.cells.len());
        self.owned = owned;
    }

    pub fn is_at_boundary(&self, cell_id: usize) -> bool {
        self.at_boundary[cell_id]
    }

    /// The cell on the other side of `face_idx` as seen from `cell_id`.
    pub fn neighbor(&self, face_idx: usize, cell_id: usize) -> Option<usize> {
        match self.faces[face_idx].neighbor_cell_ids {
            (k, Some(l)) if k == cell_id => Some(l),
            (k, Some(l)) if l == cell_id => Some(k),
            _ => None,
        }
    }

    /// Unit normal of `face_idx` pointing out of `cell_id`.
    pub fn outward_normal(&self, face_idx: usize, cell_id: usize) -> DVec3 {
        let face = &self.faces[face_idx];
        let n = DVec3::from_array(face.normal);
        if face.neighbor_cell_ids.0 == cell_id {
            n
        } else {
            -n
        }
    }

    pub fn has_interior_faces(&self) -> bool {
        self.faces.iter().any(|f| f.neighbor_cell_ids.1.is_some())
    }

    /// Outward normal of the first face found on each boundary id.
    pub fn boundary_normals(&self) -> BTreeMap<u32, DVec3> {
        let mut normals = BTreeMap::new();
        for face in &self.faces {
            if let Some(id) = face.boundary_id {
                normals
                    .entry(id)
                    .or_insert_with(|| DVec3::from_array(face.normal));
            }
        }
        normals
    }

    /// Assigns material ids from cell centroids.
    pub fn assign_materials(&mut self, material_of: impl Fn([f64; 3]) -> usize) {
        for cell in &mut self.cells {
            cell.material_id = material_of(cell.centroid);
        }
    }

    pub fn centroid_distance(&self, a: usize, b: usize) -> f64 {
        let pa = DVec3::from_array(self.cells[a].centroid);
        let pb = DVec3::from_array(self.cells[b].centroid);
        pa.distance(pb)
    }

    /// Normal distance from a cell centroid to one of its faces.
    pub fn face_distance(&self, face_idx: usize, cell_id: usize) -> f64 {
        let face = &self.faces[face_idx];
        let d = DVec3::from_array(face.centroid) - DVec3::from_array(self.cells[cell_id].centroid);
        d.dot(DVec3::from_array(face.normal)).abs()
    }
}
