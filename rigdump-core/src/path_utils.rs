//! Output path utilities
//!
//! Armature names come straight from the host and may contain characters
//! that are not valid in file names (`:` and `|` are common in rigs imported
//! from other tools).

use std::path::{Path, PathBuf};

/// Placeholder replaced by the armature name in filename templates
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Sanitize filename for Windows compatibility
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Expand a filename template with a sanitized armature name
pub fn output_filename(template: &str, armature_name: &str) -> String {
    let name = sanitize_filename(armature_name);
    let name = if name.trim().is_empty() {
        "armature".to_string()
    } else {
        name
    };
    template.replace(NAME_PLACEHOLDER, &name)
}

/// Resolve the output directory.
///
/// Absolute paths are used as-is. Relative paths resolve against the
/// directory of the scene file, or the home directory when the scene did not
/// come from a file.
pub fn resolve_output_dir(output_dir: &Path, scene_file: Option<&Path>) -> PathBuf {
    if output_dir.is_absolute() {
        return output_dir.to_path_buf();
    }

    let base = match scene_file {
        Some(scene) => scene
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        None => dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
    };
    base.join(output_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("normal_name"), "normal_name");
        assert_eq!(sanitize_filename("mixamorig:Hips"), "mixamorig_Hips");
        assert_eq!(sanitize_filename("Rig|Armature"), "Rig_Armature");
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(output_filename("{name}_structure.json", "Rig.001"), "Rig.001_structure.json");
        assert_eq!(output_filename("{name}.json", "Armature:Main"), "Armature_Main.json");
        assert_eq!(output_filename("{name}.json", "  "), "armature.json");
        assert_eq!(output_filename("structure.json", "Rig"), "structure.json");
    }

    #[test]
    fn test_resolve_output_dir() {
        let scene = PathBuf::from("projects").join("hero").join("scene.json");
        let resolved = resolve_output_dir(Path::new("out"), Some(&scene));
        assert_eq!(resolved, PathBuf::from("projects").join("hero").join("out"));

        let bare = resolve_output_dir(Path::new("out"), Some(Path::new("scene.json")));
        assert_eq!(bare, PathBuf::from(".").join("out"));

        let absolute = std::env::temp_dir().join("rigs");
        assert_eq!(resolve_output_dir(&absolute, Some(&scene)), absolute);
    }
}
