//! Synthetic rigs for benchmarking

use rigdump_core::scene::{
    ArmatureSnapshot, BoneSnapshot, ConstraintSnapshot, DriverSnapshot, PoseBoneSnapshot,
};
use rigdump_core::HostValue;

/// Build an armature with `chains` limbs hanging off one root, each `depth`
/// bones long. Every chain tip gets an IK constraint and a driver.
pub fn synthetic_rig(chains: usize, depth: usize) -> ArmatureSnapshot {
    let mut bones = vec![BoneSnapshot::new("root", None)];
    let mut pose = vec![PoseBoneSnapshot::new("root")];
    let mut drivers = Vec::new();

    for chain in 0..chains {
        let mut parent = "root".to_string();
        for link in 0..depth {
            let name = format!("chain{}_fk_{}", chain, link);
            let mut bone = BoneSnapshot::new(&name, Some(&parent));
            bone.head = [chain as f64, 0.0, link as f64];
            bone.tail = [chain as f64, 0.0, link as f64 + 1.0];
            bones.push(bone);

            let mut pose_bone = PoseBoneSnapshot::new(&name);
            if link + 1 == depth {
                pose_bone.constraints.push(
                    ConstraintSnapshot::new("IK", "IK")
                        .with_attribute("chain_count", HostValue::Int(depth as i64))
                        .with_attribute("use_tail", HostValue::Bool(true)),
                );
                drivers.push(DriverSnapshot::new(
                    &format!("pose.bones[\"{}\"].rotation_euler", name),
                    Some("var * 2"),
                ));
            }
            pose.push(pose_bone);
            parent = name;
        }
    }

    ArmatureSnapshot {
        object_name: "BenchRig".to_string(),
        bones,
        pose: Some(pose),
        drivers,
        ..Default::default()
    }
}
