//! Rigdump Core Library
//!
//! This crate provides the core functionality for Rigdump:
//! - Read-only scene adapter traits and a serde scene snapshot
//! - Host value coercion into rounded, JSON-safe values
//! - Custom property, constraint and driver extraction
//! - Name-based bone classification
//! - Bone graph construction (nested tree and flat list)
//! - Armature serialization into the export document
//! - Export configuration and document output

pub mod classify;
pub mod constraints;
pub mod drivers;
pub mod graph;
pub mod output;
pub mod path_utils;
pub mod properties;
pub mod scene;
pub mod serializer;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use classify::{classify, BoneTags};
pub use constraints::{extract_constraint, extract_constraints, ConstraintKind, ConstraintRecord};
pub use drivers::{extract_driver, extract_drivers, owning_bone, DriverMap, DriverRecord, TargetRecord, VariableRecord};
pub use graph::{BoneGraph, DanglingParent, GraphError, HierarchyTree, OrphanPolicy, TreeNode, MAX_DEPTH};
pub use output::{encode_document, write_document, ExportError};
pub use path_utils::{output_filename, resolve_output_dir, sanitize_filename};
pub use properties::extract_properties;
pub use scene::{
    AccessError, Annotated, ArmatureSource, BoneSource, ConstraintSource, DriverSource,
    PoseBoneSource, SceneAdapter, SceneSnapshot, SnapshotError,
};
pub use serializer::{ArmatureSerializer, ExportStamp, SerializeOptions};
pub use types::{
    Analysis, ArmatureDocument, BoneRecord, ConfigError, ErrorDocument, ExportConfig,
    ExportDocument, ExportSummary,
};
pub use value::{coerce, round6, HostValue};
