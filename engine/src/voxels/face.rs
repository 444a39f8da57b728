use glam::{IVec3, U8Vec3, Vec3};

/// Axis-aligned face direction. The discriminant is the direction index
/// used by chunk geometry and boundary stitching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Face {
    PosX = 0,
    PosY = 1,
    NegX = 2,
    NegY = 3,
    PosZ = 4,
    NegZ = 5,
}

impl Face {
    pub const COUNT: usize = 6;

    pub const fn all() -> [Face; 6] {
        [
            Face::PosX,
            Face::PosY,
            Face::NegX,
            Face::NegY,
            Face::PosZ,
            Face::NegZ,
        ]
    }

    pub fn from_index(index: usize) -> Option<Face> {
        Self::all().get(index).copied()
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn opposite(self) -> Face {
        match self {
            Face::PosX => Face::NegX,
            Face::PosY => Face::NegY,
            Face::NegX => Face::PosX,
            Face::NegY => Face::PosY,
            Face::PosZ => Face::NegZ,
            Face::NegZ => Face::PosZ,
        }
    }

    pub fn to_ivec3(self) -> IVec3 {
        match self {
            Face::PosX => IVec3::X,
            Face::PosY => IVec3::Y,
            Face::NegX => -IVec3::X,
            Face::NegY => -IVec3::Y,
            Face::PosZ => IVec3::Z,
            Face::NegZ => -IVec3::Z,
        }
    }

    pub fn normal(self) -> Vec3 {
        self.to_ivec3().as_vec3()
    }

    /// Unit cube corners of this face, counter-clockwise when seen from outside
    pub fn vertices(self) -> [U8Vec3; 4] {
        match self {
            Face::PosX => [
                U8Vec3::new(1, 0, 0),
                U8Vec3::new(1, 1, 0),
                U8Vec3::new(1, 1, 1),
                U8Vec3::new(1, 0, 1),
            ],
            Face::PosY => [
                U8Vec3::new(0, 1, 0),
                U8Vec3::new(0, 1, 1),
                U8Vec3::new(1, 1, 1),
                U8Vec3::new(1, 1, 0),
            ],
            Face::NegX => [
                U8Vec3::new(0, 0, 0),
                U8Vec3::new(0, 0, 1),
                U8Vec3::new(0, 1, 1),
                U8Vec3::new(0, 1, 0),
            ],
            Face::NegY => [
                U8Vec3::new(0, 0, 0),
                U8Vec3::new(1, 0, 0),
                U8Vec3::new(1, 0, 1),
                U8Vec3::new(0, 0, 1),
            ],
            Face::PosZ => [
                U8Vec3::new(0, 0, 1),
                U8Vec3::new(1, 0, 1),
                U8Vec3::new(1, 1, 1),
                U8Vec3::new(0, 1, 1),
            ],
            Face::NegZ => [
                U8Vec3::new(0, 0, 0),
                U8Vec3::new(0, 1, 0),
                U8Vec3::new(1, 1, 0),
                U8Vec3::new(1, 0, 0),
            ],
        }
    }

    pub fn indices(start_index: u32) -> [u32; 6] {
        [
            start_index,
            start_index + 1,
            start_index + 2,
            start_index,
            start_index + 2,
            start_index + 3,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposites() {
        for face in Face::all() {
            assert_eq!(face.opposite().opposite(), face);
            assert_eq!(face.to_ivec3() + face.opposite().to_ivec3(), IVec3::ZERO);
        }
        assert_eq!(Face::from_index(0).map(Face::opposite), Some(Face::NegX));
        assert_eq!(Face::from_index(1).map(Face::opposite), Some(Face::NegY));
        assert_eq!(Face::from_index(4).map(Face::opposite), Some(Face::NegZ));
        assert_eq!(Face::from_index(6), None);
    }

    #[test]
    fn test_vertex_winding_matches_normal() {
        for face in Face::all() {
            let [a, b, c, _] = face.vertices().map(|v| v.as_vec3());
            let winding_normal = (b - a).cross(c - a).normalize();
            assert_eq!(winding_normal, face.normal());
        }
    }
}
