//! Driver extraction
//!
//! Drivers live on the armature object, not on bones. Each one is tied back to
//! the bone named in its data path (`pose.bones["<name>"]...`); drivers on
//! anything else end up in the unassigned list.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::scene::{DriverSource, DriverVariable};

const BONE_PATH_PREFIX: &str = "pose.bones[\"";

/// `id_type` recorded for targets whose datablock type is unknown
pub const UNKNOWN_ID_TYPE: &str = "Unknown";

/// Exported driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverRecord {
    pub data_path: String,
    pub array_index: i64,
    pub expression: String,
    pub variables: Vec<VariableRecord>,
}

/// Exported driver variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: String,

    pub targets: Vec<TargetRecord>,
}

/// Exported variable target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub data_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_type: Option<String>,
}

/// Drivers grouped by owning bone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverMap {
    /// Bone name to its drivers, in driver order
    pub by_bone: IndexMap<String, Vec<DriverRecord>>,
    /// Drivers whose data path names no bone
    pub unassigned: Vec<DriverRecord>,
}

impl DriverMap {
    /// Remove and return the drivers attached to `bone`
    pub fn take(&mut self, bone: &str) -> Vec<DriverRecord> {
        self.by_bone.shift_remove(bone).unwrap_or_default()
    }

    /// Move every remaining per-bone entry into the unassigned list
    pub fn into_unassigned(self) -> Vec<DriverRecord> {
        let mut unassigned = self.unassigned;
        unassigned.extend(self.by_bone.into_values().flatten());
        unassigned
    }

    pub fn len(&self) -> usize {
        self.by_bone.values().map(Vec::len).sum::<usize>() + self.unassigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bone name embedded in a `pose.bones["<name>"]` data path.
///
/// Handles the host's backslash escaping of quotes inside names. Returns
/// `None` when the path has no bone segment or the segment is unterminated.
pub fn owning_bone(data_path: &str) -> Option<String> {
    let start = data_path.find(BONE_PATH_PREFIX)? + BONE_PATH_PREFIX.len();
    let mut name = String::new();
    let mut chars = data_path[start..].chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => name.push(chars.next()?),
            '"' if chars.peek() == Some(&']') => {
                return (!name.is_empty()).then_some(name);
            }
            c => name.push(c),
        }
    }

    None
}

/// Convert a single driver
pub fn extract_driver(driver: &dyn DriverSource) -> DriverRecord {
    DriverRecord {
        data_path: driver.data_path().to_string(),
        array_index: driver.array_index(),
        expression: driver.expression().unwrap_or_default().to_string(),
        variables: driver.variables().iter().map(extract_variable).collect(),
    }
}

fn extract_variable(variable: &DriverVariable) -> VariableRecord {
    let targets = variable
        .targets
        .iter()
        .map(|target| {
            let id = target.id.clone().filter(|id| !id.is_empty());
            let id_type = id.as_ref().map(|_| {
                target
                    .id_type
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_ID_TYPE.to_string())
            });
            TargetRecord {
                data_path: target.data_path.clone(),
                id,
                id_type,
            }
        })
        .collect();

    VariableRecord {
        name: variable.name.clone(),
        kind: variable.kind.clone(),
        targets,
    }
}

/// Convert all drivers and group them by the bone their path references
pub fn extract_drivers(drivers: &[&dyn DriverSource]) -> DriverMap {
    let mut map = DriverMap::default();

    for driver in drivers {
        let record = extract_driver(*driver);
        match owning_bone(&record.data_path) {
            Some(bone) => map.by_bone.entry(bone).or_default().push(record),
            None => {
                tracing::debug!("driver {} has no owning bone", record.data_path);
                map.unassigned.push(record);
            }
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{DriverSnapshot, DriverTarget};

    #[test]
    fn test_owning_bone() {
        assert_eq!(
            owning_bone(r#"pose.bones["Hand.L"].location"#).as_deref(),
            Some("Hand.L")
        );
        assert_eq!(
            owning_bone(r#"pose.bones["Hand.L"]["ik_fk"]"#).as_deref(),
            Some("Hand.L")
        );
        assert_eq!(owning_bone("location"), None);
        assert_eq!(owning_bone(r#"pose.bones[""].scale"#), None);
        assert_eq!(owning_bone(r#"pose.bones["unterminated"#), None);
    }

    #[test]
    fn test_owning_bone_escaped_quotes() {
        assert_eq!(
            owning_bone(r#"pose.bones["say \"hi\""].scale"#).as_deref(),
            Some(r#"say "hi""#)
        );
    }

    #[test]
    fn test_extract_driver_fields() {
        let mut driver = DriverSnapshot::new(r#"pose.bones["Jaw"].rotation_euler"#, None);
        driver.array_index = 0;
        driver.variables = vec![DriverVariable {
            name: "var".into(),
            kind: "SINGLE_PROP".into(),
            targets: vec![
                DriverTarget {
                    data_path: r#"pose.bones["Jaw_ctrl"]["open"]"#.into(),
                    id: Some("Rig".into()),
                    id_type: None,
                },
                DriverTarget {
                    data_path: String::new(),
                    id: None,
                    id_type: Some("OBJECT".into()),
                },
            ],
        }];

        let record = extract_driver(&driver);
        assert_eq!(record.expression, "");
        let targets = &record.variables[0].targets;
        assert_eq!(targets[0].id.as_deref(), Some("Rig"));
        assert_eq!(targets[0].id_type.as_deref(), Some(UNKNOWN_ID_TYPE));
        assert!(targets[1].id.is_none());
        assert!(targets[1].id_type.is_none());
    }

    #[test]
    fn test_group_by_bone() {
        let drivers = [
            DriverSnapshot::new(r#"pose.bones["Hand.L"].location"#, Some("var * 2")),
            DriverSnapshot::new(r#"pose.bones["Hand.R"].location"#, Some("var")),
            DriverSnapshot::new(r#"pose.bones["Hand.L"].scale"#, Some("1 - var")),
            DriverSnapshot::new(r#"data.collections["FK"].is_visible"#, Some("var")),
        ];
        let sources: Vec<&dyn DriverSource> = drivers.iter().map(|d| d as &dyn DriverSource).collect();

        let mut map = extract_drivers(&sources);
        assert_eq!(map.len(), 4);
        assert_eq!(map.unassigned.len(), 1);

        let hand_l = map.take("Hand.L");
        assert_eq!(hand_l.len(), 2);
        assert_eq!(hand_l[1].expression, "1 - var");
        assert!(map.take("Hand.L").is_empty());
        assert!(map.take("Spine").is_empty());

        let leftover = map.into_unassigned();
        assert_eq!(leftover.len(), 2);
    }
}
