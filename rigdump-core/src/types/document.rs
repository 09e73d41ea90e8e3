//! Export document
//!
//! Defines the JSON document handed to the retargeting pipeline. Field names
//! are part of the output format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::classify::BoneTags;
use crate::constraints::ConstraintRecord;
use crate::drivers::DriverRecord;
use crate::graph::HierarchyTree;
use crate::scene::TransformLocks;

/// Result of one export call: the armature document, or the error that
/// stopped extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportDocument {
    Armature(Box<ArmatureDocument>),
    Failed(ErrorDocument),
}

impl ExportDocument {
    pub fn is_error(&self) -> bool {
        matches!(self, ExportDocument::Failed(_))
    }

    pub fn armature(&self) -> Option<&ArmatureDocument> {
        match self {
            ExportDocument::Armature(doc) => Some(doc),
            ExportDocument::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorDocument> {
        match self {
            ExportDocument::Armature(_) => None,
            ExportDocument::Failed(err) => Some(err),
        }
    }
}

/// Emitted instead of partial data when extraction fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDocument {
    /// One-line error with its causes
    pub error: String,
    /// Full diagnostic chain
    pub traceback: String,
}

/// Everything extracted from one armature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmatureDocument {
    pub meta: DocumentMeta,

    pub armature: ArmatureInfo,

    pub hierarchical_structure: HierarchyTree,

    pub flat_bone_list: Vec<BoneRecord>,

    pub bone_collections: Vec<CollectionRecord>,

    /// Legacy grouping, kept alongside collections
    pub bone_groups: Vec<BoneGroupRecord>,

    /// Drivers not attached to any exported bone
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unassigned_drivers: Vec<DriverRecord>,

    pub analysis: Analysis,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ArmatureDocument {
    pub fn bone(&self, name: &str) -> Option<&BoneRecord> {
        self.flat_bone_list.iter().find(|b| b.name == name)
    }
}

/// Provenance of the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub exporter_version: String,
    pub source_version: String,
    /// Seconds since the Unix epoch at export time
    pub export_stamp: f64,
    pub armature_name: String,
    pub bone_count: usize,
}

/// Object-level data of the armature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmatureInfo {
    pub object_name: String,
    pub data_name: String,
    pub bone_count: usize,
    pub location: Vec<f64>,
    pub rotation_euler: Vec<f64>,
    pub scale: Vec<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose_position: Option<String>,

    pub scene_collections: Vec<String>,
    pub custom_properties: Map<String, JsonValue>,
}

/// One bone of the flat list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneRecord {
    pub name: String,
    /// Resolved parent; `None` for roots
    pub parent: Option<String>,
    pub children: Vec<String>,

    pub head: Vec<f64>,
    pub tail: Vec<f64>,
    pub length: f64,
    pub roll: f64,
    pub use_deform: bool,
    pub use_connect: bool,
    pub layers: Vec<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_transform: Option<RestTransform>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<PoseRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locks: Option<TransformLocks>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bone_group: Option<String>,

    pub constraints: Vec<ConstraintRecord>,
    pub drivers: Vec<DriverRecord>,

    /// Annotations on the rest bone
    pub custom_properties: Map<String, JsonValue>,
    /// Annotations on the pose bone
    pub pose_custom_properties: Map<String, JsonValue>,

    pub classification: BoneTags,
}

/// Local rest transform decomposed from the bone's rest matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestTransform {
    pub location: Vec<f64>,
    /// Quaternion, w first
    pub rotation: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Pose-space transform snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseRecord {
    pub location: Vec<f64>,
    pub rotation_mode: String,
    /// Rotation in the representation selected by `rotation_mode`
    pub rotation: Vec<f64>,
    pub rotation_euler: Vec<f64>,
    pub rotation_quaternion: Vec<f64>,
    pub rotation_axis_angle: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub name: String,
    pub is_visible: bool,
    pub bones: Vec<String>,
    pub custom_properties: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneGroupRecord {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_set: Option<String>,

    pub bones: Vec<String>,
}

/// Bone names per category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub deform_bones: Vec<String>,
    pub control_bones: Vec<String>,
    pub ik_bones: Vec<String>,
    pub fk_bones: Vec<String>,
    pub special_bones: Vec<String>,
    pub constrained_bones: Vec<String>,
}

impl Analysis {
    /// Roll up the flat bone list
    pub fn from_bones(bones: &[BoneRecord]) -> Self {
        let names = |predicate: fn(&BoneRecord) -> bool| -> Vec<String> {
            bones
                .iter()
                .filter(|b| predicate(b))
                .map(|b| b.name.clone())
                .collect()
        };

        Self {
            deform_bones: names(|b| b.use_deform),
            control_bones: names(|b| b.classification.is_control),
            ik_bones: names(|b| b.classification.is_ik),
            fk_bones: names(|b| b.classification.is_fk),
            special_bones: names(|b| b.classification.is_special),
            constrained_bones: names(|b| !b.constraints.is_empty()),
        }
    }
}

/// Counts for console reporting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub armature_name: String,
    pub bones: usize,
    pub bone_collections: usize,
    pub bone_groups: usize,
    pub drivers: usize,
    pub deform_bones: usize,
    pub control_bones: usize,
    pub ik_bones: usize,
    pub fk_bones: usize,
    pub special_bones: usize,
    pub constrained_bones: usize,
    pub warnings: usize,
}

impl From<&ArmatureDocument> for ExportSummary {
    fn from(doc: &ArmatureDocument) -> Self {
        Self {
            armature_name: doc.meta.armature_name.clone(),
            bones: doc.flat_bone_list.len(),
            bone_collections: doc.bone_collections.len(),
            bone_groups: doc.bone_groups.len(),
            drivers: doc
                .flat_bone_list
                .iter()
                .map(|b| b.drivers.len())
                .sum::<usize>()
                + doc.unassigned_drivers.len(),
            deform_bones: doc.analysis.deform_bones.len(),
            control_bones: doc.analysis.control_bones.len(),
            ik_bones: doc.analysis.ik_bones.len(),
            fk_bones: doc.analysis.fk_bones.len(),
            special_bones: doc.analysis.special_bones.len(),
            constrained_bones: doc.analysis.constrained_bones.len(),
            warnings: doc.warnings.len(),
        }
    }
}
