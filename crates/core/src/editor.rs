//! World-editor "copy properties" utility.
//!
//! Copies chosen transform components from one object onto one or more
//! others. Failures abort only the current copy.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::scene::{ObjectId, ObjectRegistry, SceneObject, Vec3};

/// Prompt shown in both fields when nothing is selected.
pub const ENTER_OBJECT_PROMPT: &str = "Enter object name or ID";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EditorError {
    #[error("No objects selected! Nothing named or numbered '{0}' to copy from")]
    NoSource(String),

    #[error("No objects selected! Nothing to copy to")]
    NoTargets,

    #[error("No object named or numbered '{0}' to copy to")]
    UnresolvedTarget(String),
}

/// Per-axis copy switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AxisMask {
    pub x: bool,
    pub y: bool,
    pub z: bool,
}

impl AxisMask {
    pub const ALL: AxisMask = AxisMask {
        x: true,
        y: true,
        z: true,
    };

    fn apply(self, target: &mut Vec3, source: Vec3) {
        if self.x {
            target.x = source.x;
        }
        if self.y {
            target.y = source.y;
        }
        if self.z {
            target.z = source.z;
        }
    }
}

/// Which components a copy transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CopyFields {
    pub position: AxisMask,
    pub scale: AxisMask,
    pub rotation: bool,
}

impl CopyFields {
    pub fn everything() -> Self {
        Self {
            position: AxisMask::ALL,
            scale: AxisMask::ALL,
            rotation: true,
        }
    }
}

/// Apply the selected components of `source` onto `target`.
pub fn copy_to_object(source: &SceneObject, target: &mut SceneObject, fields: &CopyFields) {
    fields.position.apply(&mut target.position, source.position);
    fields.scale.apply(&mut target.scale, source.scale);
    if fields.rotation {
        target.rotation = source.rotation;
    }
}

/// State behind the copy-properties dialog.
#[derive(Debug, Clone, Default)]
pub struct CopyPropertiesTool {
    copy_from: String,
    copy_to: String,
    copy_to_multiple: bool,
    pub fields: CopyFields,
}

impl CopyPropertiesTool {
    pub fn new(fields: CopyFields) -> Self {
        Self {
            fields,
            ..Self::default()
        }
    }

    pub fn copy_from_text(&self) -> &str {
        &self.copy_from
    }

    pub fn copy_to_text(&self) -> &str {
        &self.copy_to
    }

    pub fn copies_to_multiple(&self) -> bool {
        self.copy_to_multiple
    }

    /// Type a source manually.
    pub fn set_copy_from(&mut self, text: impl Into<String>) {
        self.copy_from = text.into();
    }

    /// Type a single target manually.
    pub fn set_copy_to(&mut self, text: impl Into<String>) {
        self.copy_to = text.into();
        self.copy_to_multiple = false;
    }

    /// Fill both fields from the editor selection.
    ///
    /// The first selected object is the source. With exactly two selected the
    /// second is the target; otherwise every remaining object is a target.
    pub fn set_copy_objects(&mut self, selection: &[ObjectId], registry: &ObjectRegistry) {
        self.copy_to_multiple = false;

        let Some(&first) = selection.first() else {
            self.copy_from = ENTER_OBJECT_PROMPT.to_string();
            self.copy_to = ENTER_OBJECT_PROMPT.to_string();
            return;
        };

        self.copy_from = registry
            .label(first)
            .unwrap_or_else(|| first.to_string());

        if selection.len() == 2 {
            let second = selection[1];
            self.copy_to = registry
                .label(second)
                .unwrap_or_else(|| second.to_string());
        } else {
            self.copy_to = format!("{} Objects", selection.len() - 1);
            self.copy_to_multiple = true;
        }
    }

    /// Copy onto every target. Returns how many objects were updated.
    ///
    /// A non-empty selection refreshes the fields first; with nothing selected
    /// the manually typed names are used.
    pub fn copy_properties(
        &mut self,
        selection: &[ObjectId],
        registry: &mut ObjectRegistry,
    ) -> Result<usize, EditorError> {
        if !selection.is_empty() {
            self.set_copy_objects(selection, registry);
        }

        let source_id = registry
            .resolve(&self.copy_from)
            .ok_or_else(|| EditorError::NoSource(self.copy_from.clone()))?;
        if self.copy_to.trim().is_empty() {
            return Err(EditorError::NoTargets);
        }

        let targets: Vec<ObjectId> = if self.copy_to_multiple {
            selection.iter().skip(1).copied().collect()
        } else {
            let target = registry
                .resolve(&self.copy_to)
                .ok_or_else(|| EditorError::UnresolvedTarget(self.copy_to.clone()))?;
            vec![target]
        };
        if targets.is_empty() {
            return Err(EditorError::NoTargets);
        }

        let Some(source) = registry.get(source_id).cloned() else {
            return Err(EditorError::NoSource(self.copy_from.clone()));
        };

        let mut copied = 0;
        for target_id in targets {
            match registry.get_mut(target_id) {
                Some(target) => {
                    copy_to_object(&source, target, &self.fields);
                    copied += 1;
                }
                None => warn!("copy properties: object {target_id} no longer exists"),
            }
        }
        info!("copied properties from {source_id} onto {copied} object(s)");
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Rotation;

    fn scene() -> (ObjectRegistry, ObjectId, ObjectId, ObjectId) {
        let mut registry = ObjectRegistry::default();
        let source = registry.register(
            SceneObject::new("TSStatic")
                .named("Bookshelf")
                .at(Vec3::new(10.0, 20.0, 30.0))
                .scaled(Vec3::new(2.0, 3.0, 4.0))
                .rotated(Rotation {
                    axis: Vec3::new(0.0, 0.0, 1.0),
                    angle: 1.5,
                }),
        );
        let a = registry.register(SceneObject::new("TSStatic").named("Crate"));
        let b = registry.register(SceneObject::new("TSStatic"));
        (registry, source, a, b)
    }

    #[test]
    fn fills_fields_from_selection() {
        let (registry, source, a, b) = scene();
        let mut tool = CopyPropertiesTool::default();

        tool.set_copy_objects(&[], &registry);
        assert_eq!(tool.copy_from_text(), ENTER_OBJECT_PROMPT);
        assert_eq!(tool.copy_to_text(), ENTER_OBJECT_PROMPT);

        tool.set_copy_objects(&[source, a], &registry);
        assert_eq!(tool.copy_from_text(), "Bookshelf");
        assert_eq!(tool.copy_to_text(), "Crate");
        assert!(!tool.copies_to_multiple());

        tool.set_copy_objects(&[b, source, a], &registry);
        assert_eq!(tool.copy_from_text(), b.to_string());
        assert_eq!(tool.copy_to_text(), "2 Objects");
        assert!(tool.copies_to_multiple());
    }

    #[test]
    fn scale_is_copied_into_scale() -> Result<(), EditorError> {
        let (mut registry, source, a, _) = scene();
        let mut tool = CopyPropertiesTool::new(CopyFields {
            position: AxisMask {
                x: true,
                ..AxisMask::default()
            },
            scale: AxisMask {
                y: true,
                z: true,
                ..AxisMask::default()
            },
            rotation: false,
        });

        assert_eq!(tool.copy_properties(&[source, a], &mut registry)?, 1);
        let target = registry.get(a).expect("target");
        assert_eq!(target.position, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(target.scale, Vec3::new(1.0, 3.0, 4.0));
        assert_eq!(target.rotation, Rotation::default());
        Ok(())
    }

    #[test]
    fn copies_onto_every_remaining_selection() -> Result<(), EditorError> {
        let (mut registry, source, a, b) = scene();
        let mut tool = CopyPropertiesTool::new(CopyFields::everything());
        assert_eq!(tool.copy_properties(&[source, a, b], &mut registry)?, 2);

        let original = registry.get(source).cloned().expect("source");
        for id in [a, b] {
            let target = registry.get(id).expect("target");
            assert_eq!(target.position, original.position);
            assert_eq!(target.scale, original.scale);
            assert_eq!(target.rotation, original.rotation);
        }
        Ok(())
    }

    #[test]
    fn manual_entry_works_without_selection() -> Result<(), EditorError> {
        let (mut registry, source, _, b) = scene();
        let mut tool = CopyPropertiesTool::new(CopyFields::everything());
        tool.set_copy_from("bookshelf");
        tool.set_copy_to(b.to_string());
        assert_eq!(tool.copy_properties(&[], &mut registry)?, 1);
        assert_eq!(
            registry.get(b).map(|o| o.scale),
            registry.get(source).map(|o| o.scale)
        );
        Ok(())
    }

    #[test]
    fn unresolved_objects_abort_only_the_copy() {
        let (mut registry, source, a, _) = scene();
        let before = registry.get(a).cloned();
        let mut tool = CopyPropertiesTool::new(CopyFields::everything());

        assert_eq!(
            tool.copy_properties(&[], &mut registry),
            Err(EditorError::NoSource(String::new()))
        );

        tool.set_copy_from("Bookshelf");
        tool.set_copy_to("Nowhere");
        assert_eq!(
            tool.copy_properties(&[], &mut registry),
            Err(EditorError::UnresolvedTarget("Nowhere".to_string()))
        );

        assert_eq!(
            tool.copy_properties(&[source], &mut registry),
            Err(EditorError::NoTargets)
        );
        assert_eq!(registry.get(a).cloned(), before);
    }
}
