//! Read-only scene adapter
//!
//! The extraction engine never talks to a host application directly. It reads
//! armatures through the narrow traits below, which a host binding (or the
//! serde [`snapshot`] shipped with this crate) implements.
//!
//! Relations between bones are exposed by name only; the engine builds its own
//! index and checks referential integrity itself.

mod snapshot;

pub use snapshot::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::HostValue;

/// A single property, attribute or annotation could not be read
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AccessError {
    #[error("attribute not found: {0}")]
    Missing(String),

    #[error("unable to read {name}: {reason}")]
    Unreadable { name: String, reason: String },
}

/// Capability: the entity supports custom annotations (ID properties)
pub trait Annotated {
    /// Annotation keys in host order, including reserved internal keys
    fn annotation_keys(&self) -> Vec<String>;

    /// Read one annotation
    fn annotation(&self, key: &str) -> Result<HostValue, AccessError>;
}

/// Rest-pose bone
pub trait BoneSource {
    fn name(&self) -> &str;
    fn parent_name(&self) -> Option<&str>;
    /// Armature-space head position
    fn head(&self) -> [f64; 3];
    /// Armature-space tail position
    fn tail(&self) -> [f64; 3];
    fn roll(&self) -> f64;
    fn length(&self) -> f64;
    fn use_deform(&self) -> bool;
    fn use_connect(&self) -> bool;
    /// Layer membership bitset; empty when the host has no layers
    fn layers(&self) -> Vec<bool>;
    /// Row-major local rest matrix, when the host exposes it
    fn rest_matrix(&self) -> Option<[[f64; 4]; 4]>;
    fn annotations(&self) -> Option<&dyn Annotated>;
}

/// Runtime counterpart of a bone
pub trait PoseBoneSource {
    fn name(&self) -> &str;
    fn transform(&self) -> PoseTransform;
    fn locks(&self) -> TransformLocks;
    /// Constraints in stack order
    fn constraints(&self) -> Vec<&dyn ConstraintSource>;
    /// Legacy bone group membership
    fn bone_group(&self) -> Option<&str>;
    fn annotations(&self) -> Option<&dyn Annotated>;
}

/// One entry of a pose bone's constraint stack
pub trait ConstraintSource {
    fn name(&self) -> &str;
    /// Open type tag, e.g. `COPY_ROTATION`
    fn kind(&self) -> &str;
    fn influence(&self) -> Option<f64>;
    fn enabled(&self) -> Option<bool>;
    fn mute(&self) -> Option<bool>;
    /// Target entity name; `None` when unsupported or unset
    fn target(&self) -> Option<&str>;
    /// Target bone name; `None` when unsupported or unset
    fn subtarget(&self) -> Option<&str>;
    /// Every externally visible attribute name, captured fields included
    fn attribute_names(&self) -> Vec<String>;
    fn attribute(&self, name: &str) -> Result<HostValue, AccessError>;
}

/// An animation driver (F-curve with a driver expression)
pub trait DriverSource {
    /// RNA path of the driven property, e.g. `pose.bones["Hand.L"].location`
    fn data_path(&self) -> &str;
    fn array_index(&self) -> i64;
    fn expression(&self) -> Option<&str>;
    fn variables(&self) -> &[DriverVariable];
}

/// Bone collection (armature-level grouping)
pub trait CollectionSource {
    fn name(&self) -> &str;
    fn is_visible(&self) -> Option<bool>;
    fn bone_names(&self) -> Vec<String>;
    fn annotations(&self) -> Option<&dyn Annotated>;
}

/// Legacy pose bone group
pub trait BoneGroupSource {
    fn name(&self) -> &str;
    fn color_set(&self) -> Option<&str>;
}

/// An armature object together with its data and pose
pub trait ArmatureSource {
    fn object_name(&self) -> &str;
    fn data_name(&self) -> &str;
    /// Rest bones in host iteration order
    fn bones(&self) -> Vec<&dyn BoneSource>;
    /// Whether the object carries pose data at all
    fn has_pose(&self) -> bool;
    fn pose_bone(&self, name: &str) -> Option<&dyn PoseBoneSource>;
    fn drivers(&self) -> Vec<&dyn DriverSource>;
    fn bone_collections(&self) -> Vec<&dyn CollectionSource>;
    fn bone_groups(&self) -> Vec<&dyn BoneGroupSource>;
    fn object_transform(&self) -> ObjectTransform;
    fn pose_position(&self) -> Option<&str>;
    /// Scene collections the object is linked into
    fn scene_collections(&self) -> Vec<String>;
    fn annotations(&self) -> Option<&dyn Annotated>;
}

/// A scene that can hand out armatures
pub trait SceneAdapter {
    /// Host application version string
    fn source_version(&self) -> &str;
    /// Armature by object name, or the host's default choice when `None`
    fn armature(&self, name: Option<&str>) -> Option<&dyn ArmatureSource>;
}

/// Current pose-space transform of a bone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseTransform {
    #[serde(default)]
    pub location: [f64; 3],

    #[serde(default = "default_rotation_mode")]
    pub rotation_mode: String,

    #[serde(default)]
    pub rotation_euler: [f64; 3],

    #[serde(default = "identity_quaternion")]
    pub rotation_quaternion: [f64; 4],

    #[serde(default = "default_axis_angle")]
    pub rotation_axis_angle: [f64; 4],

    #[serde(default = "unit_scale")]
    pub scale: [f64; 3],
}

fn default_rotation_mode() -> String {
    "QUATERNION".to_string()
}

fn identity_quaternion() -> [f64; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

fn default_axis_angle() -> [f64; 4] {
    [0.0, 0.0, 1.0, 0.0]
}

fn unit_scale() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

impl Default for PoseTransform {
    fn default() -> Self {
        Self {
            location: [0.0; 3],
            rotation_mode: default_rotation_mode(),
            rotation_euler: [0.0; 3],
            rotation_quaternion: identity_quaternion(),
            rotation_axis_angle: default_axis_angle(),
            scale: unit_scale(),
        }
    }
}

/// Per-axis transform locks of a pose bone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformLocks {
    pub location: [bool; 3],
    pub rotation: [bool; 3],
    pub scale: [bool; 3],
    pub rotation_w: bool,
    pub rotations_4d: bool,
}

/// Object-level transform of the armature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectTransform {
    #[serde(default)]
    pub location: [f64; 3],

    #[serde(default)]
    pub rotation_euler: [f64; 3],

    #[serde(default = "unit_scale")]
    pub scale: [f64; 3],
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self {
            location: [0.0; 3],
            rotation_euler: [0.0; 3],
            scale: unit_scale(),
        }
    }
}

/// Driver variable as read from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverVariable {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub targets: Vec<DriverTarget>,
}

/// One target slot of a driver variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverTarget {
    #[serde(default)]
    pub data_path: String,

    /// Referenced datablock, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_type: Option<String>,
}
