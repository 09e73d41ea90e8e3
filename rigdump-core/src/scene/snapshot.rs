//! Serde scene snapshot
//!
//! A JSON dump of the host scene, written by a thin host-side script and read
//! back here. It implements every adapter trait, which makes it both the CLI's
//! input format and the stub used by tests.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    AccessError, Annotated, ArmatureSource, BoneGroupSource, BoneSource, CollectionSource,
    ConstraintSource, DriverSource, DriverVariable, ObjectTransform, PoseBoneSource,
    PoseTransform, SceneAdapter, TransformLocks,
};
use crate::value::HostValue;

/// Error types for snapshot loading
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to read scene snapshot: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse scene snapshot: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// A value slot that may have failed to read on the host side.
///
/// Failed reads are recorded as `{"inaccessible": "<reason>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Slot {
    Inaccessible { inaccessible: String },
    Value(HostValue),
}

impl Slot {
    fn read(&self, name: &str) -> Result<HostValue, AccessError> {
        match self {
            Slot::Value(value) => Ok(value.clone()),
            Slot::Inaccessible { inaccessible } => Err(AccessError::Unreadable {
                name: name.to_string(),
                reason: inaccessible.clone(),
            }),
        }
    }
}

impl From<HostValue> for Slot {
    fn from(value: HostValue) -> Self {
        Slot::Value(value)
    }
}

/// Custom annotations of one entity, in host order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationBag(pub IndexMap<String, Slot>);

impl AnnotationBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Slot>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }
}

impl Annotated for AnnotationBag {
    fn annotation_keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    fn annotation(&self, key: &str) -> Result<HostValue, AccessError> {
        self.0
            .get(key)
            .ok_or_else(|| AccessError::Missing(key.to_string()))?
            .read(key)
    }
}

/// Root of a scene dump
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// Host application version
    #[serde(default)]
    pub source_version: String,

    /// Active armature object, if the host had one selected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,

    #[serde(default)]
    pub armatures: Vec<ArmatureSnapshot>,
}

impl SceneSnapshot {
    /// Load a snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Pick the requested armature, else the active one, else the first
    pub fn select(&self, name: Option<&str>) -> Option<&ArmatureSnapshot> {
        match name {
            Some(name) => self.armatures.iter().find(|a| a.object_name == name),
            None => self
                .active
                .as_deref()
                .and_then(|active| self.armatures.iter().find(|a| a.object_name == active))
                .or_else(|| self.armatures.first()),
        }
    }

    pub fn armature_names(&self) -> Vec<&str> {
        self.armatures.iter().map(|a| a.object_name.as_str()).collect()
    }
}

impl SceneAdapter for SceneSnapshot {
    fn source_version(&self) -> &str {
        &self.source_version
    }

    fn armature(&self, name: Option<&str>) -> Option<&dyn ArmatureSource> {
        self.select(name).map(|a| a as &dyn ArmatureSource)
    }
}

/// One armature object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArmatureSnapshot {
    pub object_name: String,

    /// Armature datablock name (defaults to the object name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_name: Option<String>,

    #[serde(flatten)]
    pub transform: ObjectTransform,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose_position: Option<String>,

    #[serde(default)]
    pub scene_collections: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<AnnotationBag>,

    #[serde(default)]
    pub bones: Vec<BoneSnapshot>,

    /// Pose bones; `None` when the object has no pose
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<Vec<PoseBoneSnapshot>>,

    #[serde(default)]
    pub drivers: Vec<DriverSnapshot>,

    #[serde(default)]
    pub bone_collections: Vec<CollectionSnapshot>,

    #[serde(default)]
    pub bone_groups: Vec<BoneGroupSnapshot>,
}

impl ArmatureSource for ArmatureSnapshot {
    fn object_name(&self) -> &str {
        &self.object_name
    }

    fn data_name(&self) -> &str {
        self.data_name.as_deref().unwrap_or(&self.object_name)
    }

    fn bones(&self) -> Vec<&dyn BoneSource> {
        self.bones.iter().map(|b| b as &dyn BoneSource).collect()
    }

    fn has_pose(&self) -> bool {
        self.pose.is_some()
    }

    fn pose_bone(&self, name: &str) -> Option<&dyn PoseBoneSource> {
        self.pose
            .as_ref()?
            .iter()
            .find(|p| p.name == name)
            .map(|p| p as &dyn PoseBoneSource)
    }

    fn drivers(&self) -> Vec<&dyn DriverSource> {
        self.drivers.iter().map(|d| d as &dyn DriverSource).collect()
    }

    fn bone_collections(&self) -> Vec<&dyn CollectionSource> {
        self.bone_collections
            .iter()
            .map(|c| c as &dyn CollectionSource)
            .collect()
    }

    fn bone_groups(&self) -> Vec<&dyn BoneGroupSource> {
        self.bone_groups
            .iter()
            .map(|g| g as &dyn BoneGroupSource)
            .collect()
    }

    fn object_transform(&self) -> ObjectTransform {
        self.transform.clone()
    }

    fn pose_position(&self) -> Option<&str> {
        self.pose_position.as_deref()
    }

    fn scene_collections(&self) -> Vec<String> {
        self.scene_collections.clone()
    }

    fn annotations(&self) -> Option<&dyn Annotated> {
        self.custom_properties.as_ref().map(|a| a as &dyn Annotated)
    }
}

/// Rest-pose bone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoneSnapshot {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default)]
    pub head: [f64; 3],

    #[serde(default)]
    pub tail: [f64; 3],

    #[serde(default)]
    pub roll: f64,

    /// Bone length; computed from head and tail when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,

    #[serde(default = "default_true")]
    pub use_deform: bool,

    #[serde(default)]
    pub use_connect: bool,

    #[serde(default)]
    pub layers: Vec<bool>,

    /// Row-major local rest matrix
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix_local: Option<[[f64; 4]; 4]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<AnnotationBag>,
}

fn default_true() -> bool {
    true
}

impl BoneSnapshot {
    pub fn new(name: &str, parent: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            parent: parent.map(str::to_string),
            tail: [0.0, 0.0, 1.0],
            use_deform: true,
            ..Default::default()
        }
    }
}

impl BoneSource for BoneSnapshot {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent_name(&self) -> Option<&str> {
        self.parent.as_deref().filter(|p| !p.is_empty())
    }

    fn head(&self) -> [f64; 3] {
        self.head
    }

    fn tail(&self) -> [f64; 3] {
        self.tail
    }

    fn roll(&self) -> f64 {
        self.roll
    }

    fn length(&self) -> f64 {
        self.length.unwrap_or_else(|| {
            self.head
                .iter()
                .zip(self.tail.iter())
                .map(|(h, t)| (t - h) * (t - h))
                .sum::<f64>()
                .sqrt()
        })
    }

    fn use_deform(&self) -> bool {
        self.use_deform
    }

    fn use_connect(&self) -> bool {
        self.use_connect
    }

    fn layers(&self) -> Vec<bool> {
        self.layers.clone()
    }

    fn rest_matrix(&self) -> Option<[[f64; 4]; 4]> {
        self.matrix_local
    }

    fn annotations(&self) -> Option<&dyn Annotated> {
        self.custom_properties.as_ref().map(|a| a as &dyn Annotated)
    }
}

/// Pose bone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseBoneSnapshot {
    pub name: String,

    #[serde(flatten)]
    pub transform: PoseTransform,

    #[serde(default)]
    pub locks: TransformLocks,

    #[serde(default)]
    pub constraints: Vec<ConstraintSnapshot>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bone_group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<AnnotationBag>,
}

impl PoseBoneSnapshot {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

impl PoseBoneSource for PoseBoneSnapshot {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self) -> PoseTransform {
        self.transform.clone()
    }

    fn locks(&self) -> TransformLocks {
        self.locks.clone()
    }

    fn constraints(&self) -> Vec<&dyn ConstraintSource> {
        self.constraints
            .iter()
            .map(|c| c as &dyn ConstraintSource)
            .collect()
    }

    fn bone_group(&self) -> Option<&str> {
        self.bone_group.as_deref()
    }

    fn annotations(&self) -> Option<&dyn Annotated> {
        self.custom_properties.as_ref().map(|a| a as &dyn Annotated)
    }
}

/// Constraint with its type-specific attributes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintSnapshot {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub influence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtarget: Option<String>,

    /// Every other visible attribute, in host order
    #[serde(default)]
    pub attributes: IndexMap<String, Slot>,
}

impl ConstraintSnapshot {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<Slot>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }
}

impl ConstraintSource for ConstraintSnapshot {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn influence(&self) -> Option<f64> {
        self.influence
    }

    fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    fn mute(&self) -> Option<bool> {
        self.mute
    }

    fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    fn subtarget(&self) -> Option<&str> {
        self.subtarget.as_deref()
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    fn attribute(&self, name: &str) -> Result<HostValue, AccessError> {
        self.attributes
            .get(name)
            .ok_or_else(|| AccessError::Missing(name.to_string()))?
            .read(name)
    }
}

/// Driver F-curve
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverSnapshot {
    pub data_path: String,

    #[serde(default)]
    pub array_index: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,

    #[serde(default)]
    pub variables: Vec<DriverVariable>,
}

impl DriverSnapshot {
    pub fn new(data_path: &str, expression: Option<&str>) -> Self {
        Self {
            data_path: data_path.to_string(),
            expression: expression.map(str::to_string),
            ..Default::default()
        }
    }
}

impl DriverSource for DriverSnapshot {
    fn data_path(&self) -> &str {
        &self.data_path
    }

    fn array_index(&self) -> i64 {
        self.array_index
    }

    fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    fn variables(&self) -> &[DriverVariable] {
        &self.variables
    }
}

/// Bone collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionSnapshot {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,

    #[serde(default)]
    pub bones: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_properties: Option<AnnotationBag>,
}

impl CollectionSource for CollectionSnapshot {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_visible(&self) -> Option<bool> {
        self.is_visible
    }

    fn bone_names(&self) -> Vec<String> {
        self.bones.clone()
    }

    fn annotations(&self) -> Option<&dyn Annotated> {
        self.custom_properties.as_ref().map(|a| a as &dyn Annotated)
    }
}

/// Legacy bone group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoneGroupSnapshot {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_set: Option<String>,
}

impl BoneGroupSource for BoneGroupSnapshot {
    fn name(&self) -> &str {
        &self.name
    }

    fn color_set(&self) -> Option<&str> {
        self.color_set.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "source_version": "3.6.5",
        "active": "Rig.B",
        "armatures": [
            { "object_name": "Rig.A" },
            {
                "object_name": "Rig.B",
                "bones": [
                    { "name": "Root", "head": [0, 0, 0], "tail": [0, 3, 4] },
                    { "name": "Spine", "parent": "Root", "use_deform": false }
                ],
                "pose": [
                    {
                        "name": "Root",
                        "rotation_mode": "XYZ",
                        "custom_properties": {
                            "ik_fk": { "type": "float", "data": 1.0 },
                            "broken": { "inaccessible": "RNA read failed" }
                        },
                        "constraints": [
                            {
                                "name": "Copy Rot",
                                "type": "COPY_ROTATION",
                                "target": "Rig.A",
                                "attributes": { "use_x": { "type": "bool", "data": true } }
                            }
                        ]
                    }
                ]
            }
        ]
    }"#;

    #[test]
    fn test_select_armature() {
        let scene = SceneSnapshot::from_json(SCENE).unwrap();
        assert_eq!(scene.select(None).unwrap().object_name, "Rig.B");
        assert_eq!(scene.select(Some("Rig.A")).unwrap().object_name, "Rig.A");
        assert!(scene.select(Some("Missing")).is_none());
        assert_eq!(scene.armature_names(), vec!["Rig.A", "Rig.B"]);
    }

    #[test]
    fn test_bone_defaults() {
        let scene = SceneSnapshot::from_json(SCENE).unwrap();
        let rig = scene.select(None).unwrap();
        let root = &rig.bones[0];
        assert!(root.use_deform());
        assert_eq!(root.length(), 5.0);
        assert_eq!(rig.bones[1].parent_name(), Some("Root"));
        assert!(!rig.bones[1].use_deform());
    }

    #[test]
    fn test_pose_and_slots() {
        let scene = SceneSnapshot::from_json(SCENE).unwrap();
        let rig = scene.select(None).unwrap();
        let pose = rig.pose_bone("Root").unwrap();
        assert_eq!(pose.transform().rotation_mode, "XYZ");
        assert_eq!(pose.transform().scale, [1.0, 1.0, 1.0]);

        let props = pose.annotations().unwrap();
        assert_eq!(props.annotation_keys(), vec!["ik_fk", "broken"]);
        assert_eq!(props.annotation("ik_fk"), Ok(HostValue::Float(1.0)));
        assert!(matches!(
            props.annotation("broken"),
            Err(AccessError::Unreadable { .. })
        ));

        let constraints = pose.constraints();
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[0].kind(), "COPY_ROTATION");
        assert_eq!(constraints[0].attribute("use_x"), Ok(HostValue::Bool(true)));
        assert!(rig.pose_bone("Spine").is_none());
    }
}
