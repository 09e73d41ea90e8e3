//! Name-based bone classification
//!
//! Rigs rarely tag bones semantically, so the exporter guesses from naming
//! conventions. Pure and context-free: only the name is consulted.

use serde::{Deserialize, Serialize};

const IK_KEYWORDS: &[&str] = &["ik"];
const FK_KEYWORDS: &[&str] = &["fk"];
const CONTROL_KEYWORDS: &[&str] = &["ctrl", "control", "master"];
const SPECIAL_KEYWORDS: &[&str] = &[
    "tweak", "cloth", "face", "sternum", "fold", "panel", "cyborg", "attach",
];

/// Heuristic tags for one bone. Tags are independent of each other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoneTags {
    pub is_ik: bool,
    pub is_fk: bool,
    pub is_control: bool,
    pub is_special: bool,
}

/// Classify a bone by case-insensitive keyword match on its name
pub fn classify(name: &str) -> BoneTags {
    let lower = name.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    BoneTags {
        is_ik: matches(IK_KEYWORDS),
        is_fk: matches(FK_KEYWORDS),
        is_control: matches(CONTROL_KEYWORDS),
        is_special: matches(SPECIAL_KEYWORDS),
    }
}
