use ahash::AHashMap;

use crate::voxels::{coord::LocalPos, face::Face, voxel::Voxel};

/// One visible quad: a voxel cell and the direction its face points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceKey {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub face: Face,
}

impl FaceKey {
    pub fn new(pos: LocalPos, face: Face) -> Self {
        FaceKey {
            x: pos.x(),
            y: pos.y(),
            z: pos.z(),
            face,
        }
    }

    pub fn pos(&self) -> LocalPos {
        LocalPos::new(self.x, self.y, self.z)
    }

    /// Whether the face points out of the chunk, and so belongs to a side layer
    pub fn is_boundary(&self) -> bool {
        self.pos().offset(self.face).is_none()
    }

    pub fn scope(&self) -> GeometryScope {
        if self.is_boundary() {
            GeometryScope::Side(self.face)
        } else {
            GeometryScope::Interior
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryScope {
    Interior,
    Side(Face),
}

impl GeometryScope {
    /// -1 for interior batches, otherwise the face direction index
    pub fn direction_index(&self) -> i8 {
        match self {
            GeometryScope::Interior => -1,
            GeometryScope::Side(face) => face.index() as i8,
        }
    }
}

/// A batch of visible faces, each owned by the voxel that emits it
#[derive(Debug, Clone)]
pub struct ChunkGeometry {
    pub scope: GeometryScope,
    faces: AHashMap<FaceKey, Voxel>,
}

impl ChunkGeometry {
    pub fn new(scope: GeometryScope) -> Self {
        ChunkGeometry {
            scope,
            faces: AHashMap::new(),
        }
    }

    pub fn direction_index(&self) -> i8 {
        self.scope.direction_index()
    }

    pub fn insert(&mut self, key: FaceKey, owner: Voxel) {
        self.faces.insert(key, owner);
    }

    pub fn remove(&mut self, key: &FaceKey) -> Option<Voxel> {
        self.faces.remove(key)
    }

    pub fn get(&self, key: &FaceKey) -> Option<Voxel> {
        self.faces.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FaceKey, &Voxel)> {
        self.faces.iter()
    }

    pub fn sorted_keys(&self) -> Vec<FaceKey> {
        let mut keys: Vec<FaceKey> = self.faces.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

/// Everything visible of one loaded chunk: the interior batch plus one batch per
/// stitched side. A side stays `None` until its neighbor has loaded and been stitched.
#[derive(Debug, Clone, Default)]
pub struct ChunkSurface {
    interior: Option<ChunkGeometry>,
    sides: [Option<ChunkGeometry>; Face::COUNT],
}

impl ChunkSurface {
    /// Replaces the layer the batch is scoped to
    pub fn apply(&mut self, geometry: ChunkGeometry) {
        match geometry.scope {
            GeometryScope::Interior => self.interior = Some(geometry),
            GeometryScope::Side(face) => self.sides[face.index()] = Some(geometry),
        }
    }

    pub fn interior(&self) -> Option<&ChunkGeometry> {
        self.interior.as_ref()
    }

    pub fn side(&self, face: Face) -> Option<&ChunkGeometry> {
        self.sides[face.index()].as_ref()
    }

    pub fn has_interior(&self) -> bool {
        self.interior.is_some()
    }

    pub fn is_stitched(&self, face: Face) -> bool {
        self.sides[face.index()].is_some()
    }

    /// Forgets the side toward a neighbor that went away. Returns whether it was stitched.
    pub fn clear_side(&mut self, face: Face) -> bool {
        self.sides[face.index()].take().is_some()
    }

    /// Adds or removes a single face in whichever layer owns it.
    /// Faces on a side that has not been stitched yet are left for the stitching pass.
    pub fn set_face(&mut self, key: FaceKey, owner: Option<Voxel>) -> bool {
        let layer = match key.scope() {
            GeometryScope::Interior => self.interior.as_mut(),
            GeometryScope::Side(face) => self.sides[face.index()].as_mut(),
        };

        let Some(layer) = layer else {
            return false;
        };

        match owner {
            Some(voxel) => {
                if layer.get(&key) == Some(voxel) {
                    false
                } else {
                    layer.insert(key, voxel);
                    true
                }
            }
            None => layer.remove(&key).is_some(),
        }
    }

    pub fn faces(&self) -> impl Iterator<Item = (&FaceKey, &Voxel)> {
        self.interior
            .iter()
            .chain(self.sides.iter().flatten())
            .flat_map(|geometry| geometry.iter())
    }

    pub fn face_count(&self) -> usize {
        self.interior.iter().chain(self.sides.iter().flatten()).map(ChunkGeometry::len).sum()
    }
}
