pub mod chunk_geometry;
pub mod mesh_sections;
pub mod mesher;
