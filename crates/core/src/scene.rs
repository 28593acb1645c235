//! Owned scene objects addressed by stable ids, with names as a secondary index.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// First id handed out by a fresh registry.
pub const FIRST_OBJECT_ID: u32 = 1;

/// Stable numeric object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ONE: Vec3 = Vec3::new(1.0, 1.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Axis-angle rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub axis: Vec3,
    /// Radians.
    pub angle: f32,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            axis: Vec3::new(0.0, 0.0, 1.0),
            angle: 0.0,
        }
    }
}

/// Editable transform state of a placed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub class: String,
    pub name: Option<String>,
    pub position: Vec3,
    pub scale: Vec3,
    pub rotation: Rotation,
}

impl SceneObject {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            name: None,
            position: Vec3::default(),
            scale: Vec3::ONE,
            rotation: Rotation::default(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into()).filter(|name: &String| !name.trim().is_empty());
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn scaled(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn rotated(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Owner of all scene objects.
///
/// Objects are addressed by [`ObjectId`]; names resolve through a separate,
/// case-insensitive table. A name given to a newer object moves to it and
/// the older object becomes unnamed.
#[derive(Debug, Clone)]
pub struct ObjectRegistry {
    next_id: u32,
    objects: BTreeMap<ObjectId, SceneObject>,
    names: HashMap<String, ObjectId>,
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self {
            next_id: FIRST_OBJECT_ID,
            objects: BTreeMap::new(),
            names: HashMap::new(),
        }
    }
}

impl ObjectRegistry {
    pub fn register(&mut self, object: SceneObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        if let Some(name) = &object.name {
            self.bind_name(name, id);
        }
        self.objects.insert(id, object);
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        let object = self.objects.remove(&id)?;
        if let Some(name) = &object.name {
            let key = name.to_ascii_lowercase();
            if self.names.get(&key) == Some(&id) {
                self.names.remove(&key);
            }
        }
        Some(object)
    }

    /// Give `id` a new name (or none). Returns false for unknown ids.
    pub fn rename(&mut self, id: ObjectId, name: Option<&str>) -> bool {
        let Some(object) = self.objects.get_mut(&id) else {
            return false;
        };
        if let Some(old) = object.name.take() {
            let key = old.to_ascii_lowercase();
            if self.names.get(&key) == Some(&id) {
                self.names.remove(&key);
            }
        }
        let name = name.map(str::trim).filter(|name| !name.is_empty());
        if let Some(name) = name {
            object.name = Some(name.to_string());
            self.bind_name(name, id);
        }
        true
    }

    // The previous owner of a moved name becomes unnamed.
    fn bind_name(&mut self, name: &str, id: ObjectId) {
        if let Some(previous) = self.names.insert(name.to_ascii_lowercase(), id) {
            if previous != id {
                debug!("name '{name}' moved from object {previous} to {id}");
                if let Some(object) = self.objects.get_mut(&previous) {
                    object.name = None;
                }
            }
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    /// Resolve user text as a numeric id first, then as a name.
    pub fn resolve(&self, text: &str) -> Option<ObjectId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Ok(raw) = text.parse::<u32>() {
            let id = ObjectId(raw);
            if self.objects.contains_key(&id) {
                return Some(id);
            }
        }
        self.names.get(&text.to_ascii_lowercase()).copied()
    }

    /// The object's name, or its id when unnamed.
    pub fn label(&self, id: ObjectId) -> Option<String> {
        let object = self.objects.get(&id)?;
        Some(match &object.name {
            Some(name) => name.clone(),
            None => id.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_ids_and_names() {
        let mut registry = ObjectRegistry::default();
        let tree = registry.register(SceneObject::new("TSStatic").named("OakTree"));
        let rock = registry.register(SceneObject::new("TSStatic"));

        assert_eq!(registry.resolve("oaktree"), Some(tree));
        assert_eq!(registry.resolve(&rock.to_string()), Some(rock));
        assert_eq!(registry.resolve(" 999 "), None);
        assert_eq!(registry.resolve(""), None);
        assert_eq!(registry.label(tree).as_deref(), Some("OakTree"));
        assert_eq!(registry.label(rock), Some(rock.to_string()));
    }

    #[test]
    fn names_move_and_are_released() {
        let mut registry = ObjectRegistry::default();
        let first = registry.register(SceneObject::new("TSStatic").named("Spawn"));
        let second = registry.register(SceneObject::new("TSStatic").named("Spawn"));
        assert_eq!(registry.resolve("Spawn"), Some(second));

        registry.remove(first);
        assert_eq!(registry.resolve("Spawn"), Some(second));

        assert!(registry.rename(second, Some("Exit")));
        assert_eq!(registry.resolve("Spawn"), None);
        assert_eq!(registry.resolve("Exit"), Some(second));

        assert!(registry.rename(second, None));
        assert_eq!(registry.resolve("Exit"), None);
        assert!(!registry.rename(first, Some("Ghost")));
    }

    #[test]
    fn moved_names_leave_no_stale_owner() {
        let mut registry = ObjectRegistry::default();
        let first = registry.register(SceneObject::new("TSStatic").named("Spawn"));
        let second = registry.register(SceneObject::new("TSStatic").named("spawn"));
        assert_eq!(registry.get(first).and_then(|o| o.name.clone()), None);
        assert_eq!(registry.label(first), Some(first.to_string()));

        registry.remove(second);
        assert_eq!(registry.resolve("Spawn"), None);

        let third = registry.register(SceneObject::new("Marker").named("Exit"));
        assert!(registry.rename(first, Some("Exit")));
        assert_eq!(registry.resolve("exit"), Some(first));
        assert_eq!(registry.get(third).and_then(|o| o.name.clone()), None);
    }

    #[test]
    fn blank_names_are_treated_as_unnamed() {
        let mut registry = ObjectRegistry::default();
        let id = registry.register(SceneObject::new("Marker").named("   "));
        assert_eq!(registry.get(id).and_then(|o| o.name.clone()), None);
    }
}
