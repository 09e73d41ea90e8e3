//! Armature serialization
//!
//! Ties the extractors together: builds the bone graph, attaches pose state,
//! constraints, drivers and custom properties to each bone, classifies it, and
//! rolls everything up into one [`ArmatureDocument`].
//!
//! The whole extraction runs behind a single failure boundary. Anything that
//! goes wrong, including a panicking host adapter, produces an
//! [`ErrorDocument`] rather than a partially filled document.

use std::panic::{self, AssertUnwindSafe};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{ensure, Context, Result};
use glam::DMat4;

use crate::classify::classify;
use crate::constraints::extract_constraints;
use crate::drivers::{extract_drivers, DriverMap};
use crate::graph::{BoneGraph, OrphanPolicy};
use crate::properties::extract_properties;
use crate::scene::{ArmatureSource, BoneSource, PoseBoneSource, PoseTransform};
use crate::types::{
    Analysis, ArmatureDocument, ArmatureInfo, BoneGroupRecord, BoneRecord, CollectionRecord,
    DocumentMeta, ErrorDocument, ExportConfig, ExportDocument, PoseRecord, RestTransform,
};
use crate::value::round6;

/// Warning recorded when the armature carries no pose data
pub const NO_POSE_WARNING: &str = "No pose bones found - object may not be in Pose mode";

/// Version and time recorded once per export call
#[derive(Debug, Clone, PartialEq)]
pub struct ExportStamp {
    pub source_version: String,
    /// Seconds since the Unix epoch
    pub export_stamp: f64,
}

impl ExportStamp {
    /// Stamp with the current wall-clock time
    pub fn now(source_version: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self {
            source_version: source_version.to_string(),
            export_stamp: millis as f64 / 1000.0,
        }
    }
}

/// Settings for [`ArmatureSerializer`]
#[derive(Debug, Clone, PartialEq)]
pub struct SerializeOptions {
    pub exporter_version: String,
    pub orphan_policy: OrphanPolicy,
    pub include_unassigned_drivers: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for SerializeOptions {
    fn from(config: &ExportConfig) -> Self {
        Self {
            exporter_version: config.exporter_version.clone(),
            orphan_policy: config.orphan_policy,
            include_unassigned_drivers: config.include_unassigned_drivers,
        }
    }
}

/// How a pose bone's `rotation_mode` selects its active rotation
enum RotationKind {
    Quaternion,
    AxisAngle,
    Euler,
}

impl RotationKind {
    fn of(mode: &str) -> Self {
        match mode {
            "QUATERNION" => RotationKind::Quaternion,
            "AXIS_ANGLE" => RotationKind::AxisAngle,
            _ => RotationKind::Euler,
        }
    }
}

/// Converts one armature into an export document
#[derive(Debug, Clone, Default)]
pub struct ArmatureSerializer {
    options: SerializeOptions,
}

impl ArmatureSerializer {
    pub fn new(options: SerializeOptions) -> Self {
        Self { options }
    }

    /// Serialize an armature. Never fails: errors become an error document.
    pub fn serialize(&self, armature: &dyn ArmatureSource, stamp: &ExportStamp) -> ExportDocument {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.try_serialize(armature, stamp)));

        match outcome {
            Ok(Ok(document)) => ExportDocument::Armature(Box::new(document)),
            Ok(Err(err)) => {
                tracing::error!("Extraction failed: {:#}", err);
                ExportDocument::Failed(ErrorDocument {
                    error: format!("{:#}", err),
                    traceback: format!("{:?}", err),
                })
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("Extraction panicked: {}", message);
                ExportDocument::Failed(ErrorDocument {
                    error: format!("extraction panicked: {}", message),
                    traceback: format!(
                        "panic while serializing armature '{}': {}",
                        armature.object_name(),
                        message
                    ),
                })
            }
        }
    }

    /// Serialize an armature, propagating the first fatal error
    pub fn try_serialize(
        &self,
        armature: &dyn ArmatureSource,
        stamp: &ExportStamp,
    ) -> Result<ArmatureDocument> {
        let object_name = armature.object_name().to_string();
        tracing::info!("Serializing armature {}", object_name);

        let bones = armature.bones();
        for (index, bone) in bones.iter().enumerate() {
            ensure!(!bone.name().is_empty(), "bone at index {} has an empty name", index);
        }

        let graph = BoneGraph::build(&bones, self.options.orphan_policy)
            .with_context(|| format!("invalid bone hierarchy in armature '{}'", object_name))?;

        let mut warnings: Vec<String> = graph
            .promoted_orphans()
            .iter()
            .map(|orphan| format!("{}; placed at top level", orphan))
            .collect();
        if !armature.has_pose() {
            tracing::warn!("{}", NO_POSE_WARNING);
            warnings.push(NO_POSE_WARNING.to_string());
        }

        let mut drivers = extract_drivers(&armature.drivers());

        let mut flat_bone_list = Vec::with_capacity(bones.len());
        for bone in &bones {
            let pose_bone = armature.pose_bone(bone.name());
            if pose_bone.is_none() && armature.has_pose() {
                warnings.push(format!("bone '{}' has no pose counterpart", bone.name()));
            }
            flat_bone_list.push(bone_record(*bone, pose_bone, &graph, &mut drivers));
        }

        let unassigned_drivers = drivers.into_unassigned();
        if !unassigned_drivers.is_empty() {
            tracing::debug!("{} driver(s) not attached to a bone", unassigned_drivers.len());
        }
        let unassigned_drivers = if self.options.include_unassigned_drivers {
            unassigned_drivers
        } else {
            Vec::new()
        };

        let bone_collections = armature
            .bone_collections()
            .into_iter()
            .map(|collection| CollectionRecord {
                name: collection.name().to_string(),
                is_visible: collection.is_visible().unwrap_or(true),
                bones: collection.bone_names(),
                custom_properties: extract_properties(collection.annotations()),
            })
            .collect();

        let bone_groups = armature
            .bone_groups()
            .into_iter()
            .map(|group| BoneGroupRecord {
                name: group.name().to_string(),
                color_set: group.color_set().map(str::to_string),
                bones: flat_bone_list
                    .iter()
                    .filter(|b: &&BoneRecord| b.bone_group.as_deref() == Some(group.name()))
                    .map(|b| b.name.clone())
                    .collect(),
            })
            .collect();

        let transform = armature.object_transform();
        let armature_info = ArmatureInfo {
            object_name: object_name.clone(),
            data_name: armature.data_name().to_string(),
            bone_count: flat_bone_list.len(),
            location: rounded(&transform.location),
            rotation_euler: rounded(&transform.rotation_euler),
            scale: rounded(&transform.scale),
            pose_position: armature.pose_position().map(str::to_string),
            scene_collections: armature.scene_collections(),
            custom_properties: extract_properties(armature.annotations()),
        };

        let meta = DocumentMeta {
            exporter_version: self.options.exporter_version.clone(),
            source_version: stamp.source_version.clone(),
            export_stamp: stamp.export_stamp,
            armature_name: object_name,
            bone_count: flat_bone_list.len(),
        };

        let analysis = Analysis::from_bones(&flat_bone_list);

        Ok(ArmatureDocument {
            meta,
            armature: armature_info,
            hierarchical_structure: graph.tree(),
            flat_bone_list,
            bone_collections,
            bone_groups,
            unassigned_drivers,
            analysis,
            warnings,
        })
    }
}

fn bone_record(
    bone: &dyn BoneSource,
    pose_bone: Option<&dyn PoseBoneSource>,
    graph: &BoneGraph,
    drivers: &mut DriverMap,
) -> BoneRecord {
    let name = bone.name();

    BoneRecord {
        name: name.to_string(),
        parent: graph.parent_of(name).map(str::to_string),
        children: graph.children_of(name).to_vec(),
        head: rounded(&bone.head()),
        tail: rounded(&bone.tail()),
        length: round6(bone.length()),
        roll: round6(bone.roll()),
        use_deform: bone.use_deform(),
        use_connect: bone.use_connect(),
        layers: bone.layers(),
        rest_transform: bone.rest_matrix().map(rest_transform),
        pose: pose_bone.map(|p| pose_record(&p.transform())),
        locks: pose_bone.map(|p| p.locks()),
        bone_group: pose_bone.and_then(|p| p.bone_group()).map(str::to_string),
        constraints: pose_bone.map(extract_constraints).unwrap_or_default(),
        drivers: drivers.take(name),
        custom_properties: extract_properties(bone.annotations()),
        pose_custom_properties: extract_properties(pose_bone.and_then(|p| p.annotations())),
        classification: classify(name),
    }
}

fn pose_record(transform: &PoseTransform) -> PoseRecord {
    let rotation = match RotationKind::of(&transform.rotation_mode) {
        RotationKind::Quaternion => rounded(&transform.rotation_quaternion),
        RotationKind::AxisAngle => rounded(&transform.rotation_axis_angle),
        RotationKind::Euler => rounded(&transform.rotation_euler),
    };

    PoseRecord {
        location: rounded(&transform.location),
        rotation_mode: transform.rotation_mode.clone(),
        rotation,
        rotation_euler: rounded(&transform.rotation_euler),
        rotation_quaternion: rounded(&transform.rotation_quaternion),
        rotation_axis_angle: rounded(&transform.rotation_axis_angle),
        scale: rounded(&transform.scale),
    }
}

/// Decompose a row-major rest matrix into location, rotation (w first) and scale
fn rest_transform(rows: [[f64; 4]; 4]) -> RestTransform {
    let matrix = DMat4::from_cols_array_2d(&rows).transpose();
    let (scale, rotation, translation) = matrix.to_scale_rotation_translation();

    RestTransform {
        location: rounded(&translation.to_array()),
        rotation: rounded(&[rotation.w, rotation.x, rotation.y, rotation.z]),
        scale: rounded(&scale.to_array()),
    }
}

fn rounded(values: &[f64]) -> Vec<f64> {
    values.iter().copied().map(round6).collect()
}
