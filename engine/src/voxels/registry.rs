use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::{error::RegistryError, voxels::voxel::Voxel};

pub const NULL_VOXEL_NAME: &str = "Null";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoxelTypeDefinition {
    pub name: String,
    pub transparent: bool,
    pub solid: bool,
}

impl VoxelTypeDefinition {
    pub fn new(name: impl Into<String>, transparent: bool, solid: bool) -> Self {
        VoxelTypeDefinition {
            name: name.into(),
            transparent,
            solid,
        }
    }
}

/// Interns voxel type names to compact block type ids.
/// Ids are handed out in registration order; the builtin types always occupy the first slots.
#[derive(Debug, Clone)]
pub struct VoxelRegistry {
    definitions: Vec<VoxelTypeDefinition>,
    by_name: AHashMap<String, Voxel>,
}

impl VoxelRegistry {
    pub fn new() -> Self {
        let mut registry = VoxelRegistry {
            definitions: Vec::new(),
            by_name: AHashMap::new(),
        };

        for (name, voxel) in [
            ("Air", Voxel::AIR),
            ("Stone", Voxel::STONE),
            ("Dirt", Voxel::DIRT),
            ("Grass", Voxel::GRASS),
            ("Water", Voxel::WATER),
        ] {
            debug_assert_eq!(voxel.block_type() as usize, registry.definitions.len());
            registry.definitions.push(VoxelTypeDefinition::new(
                name,
                voxel.is_transparent(),
                voxel.is_solid(),
            ));
            registry.by_name.insert(name.to_string(), voxel);
        }

        registry
    }

    pub fn with_definitions(definitions: &[VoxelTypeDefinition]) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.resolve(definition)?;
        }
        Ok(registry)
    }

    pub fn register(
        &mut self,
        name: &str,
        transparent: bool,
        solid: bool,
    ) -> Result<Voxel, RegistryError> {
        self.resolve(&VoxelTypeDefinition::new(name, transparent, solid))
    }

    /// Returns the voxel for a definition, registering it first if the name is new.
    /// A known name with different flags is a conflict.
    pub fn resolve(&mut self, definition: &VoxelTypeDefinition) -> Result<Voxel, RegistryError> {
        if definition.name == NULL_VOXEL_NAME {
            return Ok(Voxel::NULL);
        }

        if let Some(&voxel) = self.by_name.get(&definition.name) {
            if voxel.is_transparent() != definition.transparent
                || voxel.is_solid() != definition.solid
            {
                return Err(RegistryError::Conflict {
                    name: definition.name.clone(),
                });
            }
            return Ok(voxel);
        }

        let block_type = self.definitions.len();
        if block_type > Voxel::MAX_TYPE as usize {
            return Err(RegistryError::Full);
        }

        let voxel = Voxel::from_parts(block_type as u16, definition.transparent, definition.solid);
        self.definitions.push(definition.clone());
        self.by_name.insert(definition.name.clone(), voxel);
        Ok(voxel)
    }

    pub fn get(&self, name: &str) -> Option<Voxel> {
        if name == NULL_VOXEL_NAME {
            return Some(Voxel::NULL);
        }
        self.by_name.get(name).copied()
    }

    pub fn definition(&self, voxel: Voxel) -> Option<&VoxelTypeDefinition> {
        self.definitions.get(voxel.block_type() as usize)
    }

    pub fn name_of(&self, voxel: Voxel) -> Option<&str> {
        if voxel.is_null() {
            return Some(NULL_VOXEL_NAME);
        }
        self.definition(voxel).map(|definition| definition.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl Default for VoxelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = VoxelRegistry::new();
        assert_eq!(registry.get("Air"), Some(Voxel::AIR));
        assert_eq!(registry.get("Stone"), Some(Voxel::STONE));
        assert_eq!(registry.get("Water"), Some(Voxel::WATER));
        assert_eq!(registry.get("Null"), Some(Voxel::NULL));
        assert_eq!(registry.name_of(Voxel::GRASS), Some("Grass"));
        assert_eq!(registry.name_of(Voxel::NULL), Some("Null"));
    }

    #[test]
    fn test_register_interns_names() {
        let mut registry = VoxelRegistry::new();
        let glass = registry.register("Glass", true, true).unwrap();
        assert_eq!(glass.block_type() as usize, 5);
        assert!(glass.is_transparent());
        assert!(glass.is_solid());

        let again = registry.register("Glass", true, true).unwrap();
        assert_eq!(glass, again);
        assert_eq!(registry.len(), 6);

        assert!(matches!(
            registry.register("Glass", false, true),
            Err(RegistryError::Conflict { .. })
        ));
    }
}
