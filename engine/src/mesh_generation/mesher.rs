use crate::{
    limits::{CHUNK_SIZE, CHUNK_VOLUME},
    mesh_generation::chunk_geometry::{ChunkGeometry, FaceKey, GeometryScope},
    voxels::{chunk_data::ChunkData, coord::LocalPos, face::Face, voxel::Voxel},
};

/// The face of `current` toward `neighbor` is visible, and owned by `current`,
/// iff `current` is not air, `neighbor` is transparent, and the two differ.
pub fn face_owner(current: Voxel, neighbor: Voxel) -> Option<Voxel> {
    (!current.is_air() && neighbor.is_transparent() && current != neighbor).then_some(current)
}

/// Faces between cells of the same chunk
#[profiling::function]
pub fn generate_interior_geometry(data: &ChunkData) -> ChunkGeometry {
    let mut geometry = ChunkGeometry::new(GeometryScope::Interior);

    // A uniform chunk never differs from its own neighbors
    if data.uniform_voxel().is_some() {
        return geometry;
    }

    let voxels = data.to_voxels();

    for index in 0..CHUNK_VOLUME {
        let voxel = voxels[index];
        if voxel.is_air() {
            continue;
        }

        let pos = LocalPos::from_index(index);
        for face in Face::all() {
            let Some(neighbor_pos) = pos.offset(face) else {
                continue;
            };

            if let Some(owner) = face_owner(voxel, voxels[neighbor_pos.to_index()]) {
                geometry.insert(FaceKey::new(pos, face), owner);
            }
        }
    }

    geometry
}

/// Cells of the chunk layer touching `face`, which lies on the plane 0 or N-1 of the face's axis
pub fn boundary_layer(face: Face) -> impl Iterator<Item = LocalPos> {
    let edge = match face {
        Face::PosX | Face::PosY | Face::PosZ => (CHUNK_SIZE - 1) as u8,
        Face::NegX | Face::NegY | Face::NegZ => 0,
    };
    let size = CHUNK_SIZE as u8;

    (0..size).flat_map(move |a| {
        (0..size).map(move |b| match face {
            Face::PosX | Face::NegX => LocalPos::new(edge, a, b),
            Face::PosY | Face::NegY => LocalPos::new(a, edge, b),
            Face::PosZ | Face::NegZ => LocalPos::new(a, b, edge),
        })
    })
}

/// Faces of `target` toward its neighbor across `face`. Only `target` voxels own faces here;
/// the neighbor's side of the seam is produced by running the pass the other way round.
#[profiling::function]
pub fn generate_boundary_geometry(
    target: &ChunkData,
    neighbor: &ChunkData,
    face: Face,
) -> ChunkGeometry {
    let mut geometry = ChunkGeometry::new(GeometryScope::Side(face));

    if target.uniform_voxel().is_some_and(|voxel| voxel.is_air()) {
        return geometry;
    }

    let target_voxels = target.to_voxels();
    let neighbor_voxels = neighbor.to_voxels();

    for pos in boundary_layer(face) {
        let voxel = target_voxels[pos.to_index()];
        let across = neighbor_voxels[pos.across_boundary(face).to_index()];

        if let Some(owner) = face_owner(voxel, across) {
            geometry.insert(FaceKey::new(pos, face), owner);
        }
    }

    geometry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::CHUNK_AREA;

    #[test]
    fn test_face_owner_rule() {
        assert_eq!(face_owner(Voxel::STONE, Voxel::AIR), Some(Voxel::STONE));
        assert_eq!(face_owner(Voxel::STONE, Voxel::WATER), Some(Voxel::STONE));
        assert_eq!(face_owner(Voxel::STONE, Voxel::DIRT), None);
        assert_eq!(face_owner(Voxel::AIR, Voxel::STONE), None);
        assert_eq!(face_owner(Voxel::WATER, Voxel::AIR), Some(Voxel::WATER));
        assert_eq!(face_owner(Voxel::AIR, Voxel::WATER), None);
        assert_eq!(face_owner(Voxel::WATER, Voxel::WATER), None);
    }

    #[test]
    fn test_uniform_chunk_has_no_interior_faces() {
        assert!(generate_interior_geometry(&ChunkData::filled(Voxel::STONE)).is_empty());
        assert!(generate_interior_geometry(&ChunkData::filled(Voxel::AIR)).is_empty());
    }

    #[test]
    fn test_single_voxel_has_six_faces() {
        let mut data = ChunkData::filled(Voxel::AIR);
        let pos = LocalPos::new(10, 11, 12);
        data.set(pos, Voxel::STONE);

        let geometry = generate_interior_geometry(&data);
        assert_eq!(geometry.len(), 6);
        for face in Face::all() {
            assert_eq!(geometry.get(&FaceKey::new(pos, face)), Some(Voxel::STONE));
        }
    }

    #[test]
    fn test_interior_faces_stop_at_chunk_edge() {
        let mut data = ChunkData::filled(Voxel::AIR);
        let corner = LocalPos::new(0, 0, 0);
        data.set(corner, Voxel::DIRT);

        let geometry = generate_interior_geometry(&data);
        assert_eq!(geometry.len(), 3);
        assert!(geometry.get(&FaceKey::new(corner, Face::NegX)).is_none());
        assert!(geometry.get(&FaceKey::new(corner, Face::PosX)).is_some());
    }

    #[test]
    fn test_boundary_pass_is_one_sided() {
        let stone = ChunkData::filled(Voxel::STONE);
        let air = ChunkData::filled(Voxel::AIR);

        let forward = generate_boundary_geometry(&stone, &air, Face::PosX);
        assert_eq!(forward.len(), CHUNK_AREA);
        assert_eq!(forward.direction_index(), 0);
        assert!(forward.iter().all(|(key, owner)| {
            key.x == 31 && key.face == Face::PosX && *owner == Voxel::STONE
        }));

        let backward = generate_boundary_geometry(&air, &stone, Face::NegX);
        assert!(backward.is_empty());
        assert_eq!(backward.direction_index(), 2);
    }

    #[test]
    fn test_boundary_pass_reads_wrapped_neighbor_cells() {
        let target = ChunkData::filled(Voxel::STONE);
        let mut neighbor = ChunkData::filled(Voxel::STONE);
        // Opening in the neighbor's top layer, seen from the target below it
        neighbor.set(LocalPos::new(3, 7, 0), Voxel::AIR);

        let geometry = generate_boundary_geometry(&target, &neighbor, Face::PosZ);
        assert_eq!(geometry.sorted_keys(), vec![FaceKey::new(LocalPos::new(3, 7, 31), Face::PosZ)]);
    }

    #[test]
    fn test_boundary_layers_cover_each_plane_once() {
        for face in Face::all() {
            let cells: Vec<LocalPos> = boundary_layer(face).collect();
            assert_eq!(cells.len(), CHUNK_AREA);
            assert!(cells.iter().all(|pos| pos.offset(face).is_none()));
        }
    }

    #[test]
    fn test_meshing_is_deterministic() {
        let mut data = ChunkData::filled(Voxel::AIR);
        for index in (0..CHUNK_VOLUME).step_by(7) {
            let voxel = if index % 2 == 0 { Voxel::STONE } else { Voxel::WATER };
            data.set(LocalPos::from_index(index), voxel);
        }

        let first = generate_interior_geometry(&data);
        let second = generate_interior_geometry(&data);
        assert!(!first.is_empty());
        assert_eq!(first.sorted_keys(), second.sorted_keys());

        let air = ChunkData::filled(Voxel::AIR);
        assert_eq!(
            generate_boundary_geometry(&data, &air, Face::NegY).sorted_keys(),
            generate_boundary_geometry(&data, &air, Face::NegY).sorted_keys()
        );
    }
}
