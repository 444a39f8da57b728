use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::{
    mesh_generation::chunk_geometry::FaceKey,
    voxels::{face::Face, voxel::Voxel},
};

const FACE_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FaceVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Render batch for one voxel type
#[derive(Debug, Clone)]
pub struct MeshSection {
    pub voxel: Voxel,
    pub vertices: Vec<FaceVertex>,
    pub indices: Vec<u32>,
}

impl MeshSection {
    fn new(voxel: Voxel) -> Self {
        MeshSection {
            voxel,
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    pub fn face_count(&self) -> usize {
        self.vertices.len() / 4
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// Expands visible faces into quads, grouped per voxel type in block type order.
/// Positions are in chunk-local units scaled by `voxel_size`.
#[profiling::function]
pub fn build_mesh_sections<'a>(
    faces: impl IntoIterator<Item = (&'a FaceKey, &'a Voxel)>,
    voxel_size: f32,
) -> Vec<MeshSection> {
    let mut faces: Vec<(FaceKey, Voxel)> = faces.into_iter().map(|(k, v)| (*k, *v)).collect();
    faces.sort_unstable_by_key(|(key, _)| *key);

    let mut sections: BTreeMap<u16, MeshSection> = BTreeMap::new();

    for (key, voxel) in faces {
        let section = sections
            .entry(voxel.block_type())
            .or_insert_with(|| MeshSection::new(voxel));

        let origin = Vec3::new(key.x as f32, key.y as f32, key.z as f32);
        let normal = key.face.normal().to_array();
        let start = section.vertices.len() as u32;

        for (corner, uv) in key.face.vertices().iter().zip(FACE_UVS) {
            let position = (origin + corner.as_vec3()) * voxel_size;
            section.vertices.push(FaceVertex {
                position: position.to_array(),
                normal,
                uv,
            });
        }
        section.indices.extend_from_slice(&Face::indices(start));
    }

    sections.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mesh_generation::{
            chunk_geometry::{ChunkGeometry, GeometryScope},
            mesher::generate_interior_geometry,
        },
        voxels::{chunk_data::ChunkData, coord::LocalPos},
    };

    #[test]
    fn test_sections_grouped_by_voxel() {
        let mut data = ChunkData::filled(Voxel::AIR);
        data.set(LocalPos::new(4, 4, 4), Voxel::STONE);
        data.set(LocalPos::new(8, 8, 8), Voxel::DIRT);
        let geometry = generate_interior_geometry(&data);

        let sections = build_mesh_sections(geometry.iter(), 1.0);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].voxel, Voxel::STONE);
        assert_eq!(sections[1].voxel, Voxel::DIRT);

        for section in &sections {
            assert_eq!(section.face_count(), 6);
            assert_eq!(section.vertices.len(), 24);
            assert_eq!(section.indices.len(), 36);
            assert!(section.indices.iter().all(|&i| (i as usize) < section.vertices.len()));
            assert_eq!(
                section.vertex_bytes().len(),
                24 * std::mem::size_of::<FaceVertex>()
            );
        }
    }

    #[test]
    fn test_quad_positions_are_scaled() {
        let mut geometry = ChunkGeometry::new(GeometryScope::Interior);
        geometry.insert(FaceKey::new(LocalPos::new(1, 2, 3), Face::PosY), Voxel::GRASS);

        let sections = build_mesh_sections(geometry.iter(), 2.0);
        let section = &sections[0];
        assert!(section.vertices.iter().all(|v| v.position[1] == 6.0));
        assert!(section.vertices.iter().all(|v| v.normal == [0.0, 1.0, 0.0]));
        assert_eq!(section.indices, vec![0, 1, 2, 0, 2, 3]);
    }
}
