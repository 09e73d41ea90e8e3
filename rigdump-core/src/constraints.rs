//! Constraint extraction
//!
//! Each constraint has a handful of fixed fields plus a type-specific property
//! bag whose shape depends on the constraint type. The bag is read
//! generically: every visible attribute that is neither captured already nor
//! private gets coerced. Attributes that fail to read are skipped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::scene::{ConstraintSource, PoseBoneSource};
use crate::value::{coerce, round6};

/// Attributes recorded as fixed fields or meaningless outside the host
const CAPTURED_ATTRIBUTES: &[&str] = &[
    "name",
    "type",
    "influence",
    "enabled",
    "mute",
    "target",
    "subtarget",
    "rna_type",
];

/// Constraint type tag.
///
/// The common host types are enumerated; anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    CopyLocation,
    CopyRotation,
    CopyScale,
    CopyTransforms,
    LimitDistance,
    LimitLocation,
    LimitRotation,
    LimitScale,
    MaintainVolume,
    Transform,
    ClampTo,
    DampedTrack,
    Ik,
    LockedTrack,
    SplineIk,
    StretchTo,
    TrackTo,
    Action,
    Armature,
    ChildOf,
    FloorConstraint,
    FollowPath,
    Pivot,
    Shrinkwrap,
    Other(String),
}

impl ConstraintKind {
    pub fn as_str(&self) -> &str {
        match self {
            ConstraintKind::CopyLocation => "COPY_LOCATION",
            ConstraintKind::CopyRotation => "COPY_ROTATION",
            ConstraintKind::CopyScale => "COPY_SCALE",
            ConstraintKind::CopyTransforms => "COPY_TRANSFORMS",
            ConstraintKind::LimitDistance => "LIMIT_DISTANCE",
            ConstraintKind::LimitLocation => "LIMIT_LOCATION",
            ConstraintKind::LimitRotation => "LIMIT_ROTATION",
            ConstraintKind::LimitScale => "LIMIT_SCALE",
            ConstraintKind::MaintainVolume => "MAINTAIN_VOLUME",
            ConstraintKind::Transform => "TRANSFORM",
            ConstraintKind::ClampTo => "CLAMP_TO",
            ConstraintKind::DampedTrack => "DAMPED_TRACK",
            ConstraintKind::Ik => "IK",
            ConstraintKind::LockedTrack => "LOCKED_TRACK",
            ConstraintKind::SplineIk => "SPLINE_IK",
            ConstraintKind::StretchTo => "STRETCH_TO",
            ConstraintKind::TrackTo => "TRACK_TO",
            ConstraintKind::Action => "ACTION",
            ConstraintKind::Armature => "ARMATURE",
            ConstraintKind::ChildOf => "CHILD_OF",
            ConstraintKind::FloorConstraint => "FLOOR",
            ConstraintKind::FollowPath => "FOLLOW_PATH",
            ConstraintKind::Pivot => "PIVOT",
            ConstraintKind::Shrinkwrap => "SHRINKWRAP",
            ConstraintKind::Other(tag) => tag,
        }
    }
}

impl From<&str> for ConstraintKind {
    fn from(s: &str) -> Self {
        match s {
            "COPY_LOCATION" => ConstraintKind::CopyLocation,
            "COPY_ROTATION" => ConstraintKind::CopyRotation,
            "COPY_SCALE" => ConstraintKind::CopyScale,
            "COPY_TRANSFORMS" => ConstraintKind::CopyTransforms,
            "LIMIT_DISTANCE" => ConstraintKind::LimitDistance,
            "LIMIT_LOCATION" => ConstraintKind::LimitLocation,
            "LIMIT_ROTATION" => ConstraintKind::LimitRotation,
            "LIMIT_SCALE" => ConstraintKind::LimitScale,
            "MAINTAIN_VOLUME" => ConstraintKind::MaintainVolume,
            "TRANSFORM" => ConstraintKind::Transform,
            "CLAMP_TO" => ConstraintKind::ClampTo,
            "DAMPED_TRACK" => ConstraintKind::DampedTrack,
            "IK" => ConstraintKind::Ik,
            "LOCKED_TRACK" => ConstraintKind::LockedTrack,
            "SPLINE_IK" => ConstraintKind::SplineIk,
            "STRETCH_TO" => ConstraintKind::StretchTo,
            "TRACK_TO" => ConstraintKind::TrackTo,
            "ACTION" => ConstraintKind::Action,
            "ARMATURE" => ConstraintKind::Armature,
            "CHILD_OF" => ConstraintKind::ChildOf,
            "FLOOR" => ConstraintKind::FloorConstraint,
            "FOLLOW_PATH" => ConstraintKind::FollowPath,
            "PIVOT" => ConstraintKind::Pivot,
            "SHRINKWRAP" => ConstraintKind::Shrinkwrap,
            other => ConstraintKind::Other(other.to_string()),
        }
    }
}

impl FromStr for ConstraintKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ConstraintKind::from(s))
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ConstraintKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ConstraintKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(ConstraintKind::from(tag.as_str()))
    }
}

/// Exported constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRecord {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ConstraintKind,

    pub influence: f64,

    pub enabled: bool,

    pub mute: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtarget: Option<String>,

    /// Type-specific attributes
    #[serde(default)]
    pub properties: Map<String, JsonValue>,
}

/// Extract a pose bone's constraint stack, preserving order
pub fn extract_constraints(pose_bone: &dyn PoseBoneSource) -> Vec<ConstraintRecord> {
    pose_bone
        .constraints()
        .into_iter()
        .map(extract_constraint)
        .collect()
}

/// Extract one constraint
pub fn extract_constraint(constraint: &dyn ConstraintSource) -> ConstraintRecord {
    let mute = constraint.mute().unwrap_or(false);
    let enabled = constraint.enabled().unwrap_or(!mute);

    // A subtarget only means something relative to a target
    let target = constraint
        .target()
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let subtarget = target
        .as_ref()
        .and(constraint.subtarget())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let mut properties = Map::new();
    for attribute in constraint.attribute_names() {
        if attribute.starts_with('_') || CAPTURED_ATTRIBUTES.contains(&attribute.as_str()) {
            continue;
        }
        match constraint.attribute(&attribute) {
            Ok(value) => {
                properties.insert(attribute, coerce(&value));
            }
            Err(err) => {
                tracing::debug!(
                    "skipping attribute {} of constraint {}: {}",
                    attribute,
                    constraint.name(),
                    err
                );
            }
        }
    }

    ConstraintRecord {
        name: constraint.name().to_string(),
        kind: ConstraintKind::from(constraint.kind()),
        influence: round6(constraint.influence().unwrap_or(1.0)),
        enabled,
        mute,
        target,
        subtarget,
        properties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ConstraintSnapshot, PoseBoneSnapshot, Slot};
    use crate::value::HostValue;
    use serde_json::json;

    fn ik_constraint() -> ConstraintSnapshot {
        let mut c = ConstraintSnapshot::new("IK", "IK")
            .with_attribute("chain_count", HostValue::Int(2))
            .with_attribute("pole_angle", HostValue::Float(-1.5707963267))
            .with_attribute("_private", HostValue::Int(1))
            .with_attribute(
                "rna_type",
                HostValue::Opaque {
                    type_name: "Struct".into(),
                    repr: None,
                },
            )
            .with_attribute("name", HostValue::String("IK".into()))
            .with_attribute(
                "pole_target",
                HostValue::IdRef {
                    name: "Rig".into(),
                    id_type: Some("OBJECT".into()),
                },
            );
        c.influence = Some(0.75);
        c.target = Some("Rig".to_string());
        c.subtarget = Some("hand_ik.L".to_string());
        c
    }

    #[test]
    fn test_fixed_fields_and_bag() {
        let record = extract_constraint(&ik_constraint());
        assert_eq!(record.name, "IK");
        assert_eq!(record.kind, ConstraintKind::Ik);
        assert_eq!(record.influence, 0.75);
        assert!(record.enabled);
        assert!(!record.mute);
        assert_eq!(record.target.as_deref(), Some("Rig"));
        assert_eq!(record.subtarget.as_deref(), Some("hand_ik.L"));

        let keys: Vec<&str> = record.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["chain_count", "pole_angle", "pole_target"]);
        assert_eq!(record.properties["pole_angle"], json!(-1.570796));
        assert_eq!(record.properties["pole_target"], json!("Rig"));
    }

    #[test]
    fn test_defaults_when_fields_missing() {
        let record = extract_constraint(&ConstraintSnapshot::new("Limit", "LIMIT_ROTATION"));
        assert_eq!(record.influence, 1.0);
        assert!(record.enabled);
        assert!(!record.mute);
        assert!(record.target.is_none());
        assert!(record.properties.is_empty());
    }

    #[test]
    fn test_subtarget_requires_target() {
        let mut c = ConstraintSnapshot::new("Track", "DAMPED_TRACK");
        c.target = Some(String::new());
        c.subtarget = Some("head".to_string());
        let record = extract_constraint(&c);
        assert!(record.target.is_none());
        assert!(record.subtarget.is_none());

        c.target = Some("Rig".to_string());
        c.subtarget = Some(String::new());
        let record = extract_constraint(&c);
        assert_eq!(record.target.as_deref(), Some("Rig"));
        assert!(record.subtarget.is_none());
    }

    #[test]
    fn test_unreadable_attribute_skipped() {
        let c = ConstraintSnapshot::new("Armature", "ARMATURE")
            .with_attribute(
                "targets",
                Slot::Inaccessible {
                    inaccessible: "collection read failed".into(),
                },
            )
            .with_attribute("use_deform_preserve_volume", HostValue::Bool(true));
        let record = extract_constraint(&c);
        assert_eq!(record.properties.len(), 1);
        assert_eq!(record.properties["use_deform_preserve_volume"], json!(true));
    }

    #[test]
    fn test_muted_constraint_disabled_by_default() {
        let mut c = ConstraintSnapshot::new("Copy", "COPY_ROTATION");
        c.mute = Some(true);
        let record = extract_constraint(&c);
        assert!(record.mute);
        assert!(!record.enabled);
    }

    #[test]
    fn test_stack_order_preserved() {
        let mut pose = PoseBoneSnapshot::new("forearm.L");
        pose.constraints = vec![
            ConstraintSnapshot::new("First", "COPY_LOCATION"),
            ConstraintSnapshot::new("Second", "CUSTOM_SOLVER"),
            ConstraintSnapshot::new("Third", "STRETCH_TO"),
        ];
        let records = extract_constraints(&pose);
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
        assert_eq!(records[1].kind, ConstraintKind::Other("CUSTOM_SOLVER".into()));
        assert_eq!(json!(records[1].kind), json!("CUSTOM_SOLVER"));
    }
}
