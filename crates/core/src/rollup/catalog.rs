use std::collections::BTreeMap;

use crate::domain::component::{Component, ComponentId};
use crate::domain::material::{Material, MaterialId};

/// Snapshot of the components and materials referenced by a set of items.
#[derive(Clone, Debug, Default)]
pub struct RollupCatalog {
    components: BTreeMap<ComponentId, Component>,
    materials: BTreeMap<MaterialId, Material>,
}

impl RollupCatalog {
    pub fn new(components: Vec<Component>, materials: Vec<Material>) -> Self {
        Self {
            components: components.into_iter().map(|c| (c.id, c)).collect(),
            materials: materials.into_iter().map(|m| (m.id, m)).collect(),
        }
    }

    pub fn find_component(&self, component_id: ComponentId) -> Option<&Component> {
        self.components.get(&component_id)
    }

    pub fn find_material(&self, material_id: MaterialId) -> Option<&Material> {
        self.materials.get(&material_id)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}
