//! Rigdump CLI
//!
//! Command-line interface for exporting armature structure from scene snapshots.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rigdump_core::types::CONFIG_FILE_NAME;
use rigdump_core::{
    classify, resolve_output_dir, write_document, ArmatureSerializer, ExportConfig,
    ExportDocument, ExportStamp, ExportSummary, OrphanPolicy, SceneSnapshot, SerializeOptions,
};

#[derive(Parser)]
#[command(name = "rigdump")]
#[command(about = "Armature structure exporter for 3D rigs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export an armature's structure document
    Export {
        /// Scene snapshot JSON file ("-" reads stdin)
        scene: PathBuf,

        /// Armature object to export (default: active, else first)
        #[arg(short, long)]
        armature: Option<String>,

        /// Output directory (default: from rigdump.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output file name, overriding the configured template
        #[arg(long)]
        filename: Option<String>,

        /// Config file (default: rigdump.json next to the scene)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Place bones with unknown parents at the top level instead of failing
        #[arg(long)]
        lenient: bool,

        /// Write compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Print the analysis of an armature without writing a file
    Analyze {
        /// Scene snapshot JSON file ("-" reads stdin)
        scene: PathBuf,

        /// Armature object to analyze (default: active, else first)
        #[arg(short, long)]
        armature: Option<String>,
    },

    /// Show the classification tags for bone names
    Classify {
        /// Bone names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Write a default rigdump.json
    Init {
        /// Directory to initialize (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rigdump=info".parse()?)
                .add_directive("rigdump_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            scene,
            armature,
            output,
            filename,
            config,
            lenient,
            compact,
        } => {
            cmd_export(scene, armature, output, filename, config, lenient, compact)?;
        }
        Commands::Analyze { scene, armature } => {
            cmd_analyze(scene, armature)?;
        }
        Commands::Classify { names } => {
            cmd_classify(&names)?;
        }
        Commands::Init { path } => {
            cmd_init(path)?;
        }
    }

    Ok(())
}

fn from_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Read a scene snapshot from a file or stdin
fn load_scene(path: &Path) -> Result<SceneSnapshot> {
    if from_stdin(path) {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read scene from stdin")?;
        return SceneSnapshot::from_json(&content).context("Failed to parse scene from stdin");
    }

    SceneSnapshot::load(path).with_context(|| format!("Failed to load scene {}", path.display()))
}

/// Explicit config file, else rigdump.json next to the scene, else defaults
fn load_config(explicit: Option<&Path>, scene: &Path) -> Result<ExportConfig> {
    if let Some(path) = explicit {
        return ExportConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let dir = if from_stdin(scene) {
        std::env::current_dir()?
    } else {
        scene
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    };
    ExportConfig::discover(&dir).context("Failed to load rigdump.json")
}

fn serialize_selected(
    scene: &SceneSnapshot,
    armature: Option<&str>,
    options: SerializeOptions,
) -> Result<(String, ExportDocument)> {
    let Some(selected) = scene.select(armature) else {
        match armature {
            Some(name) => bail!(
                "No armature named '{}' in scene (available: {})",
                name,
                scene.armature_names().join(", ")
            ),
            None => bail!("Scene contains no armature objects"),
        }
    };

    let stamp = ExportStamp::now(&scene.source_version);
    let document = ArmatureSerializer::new(options).serialize(selected, &stamp);
    Ok((selected.object_name.clone(), document))
}

/// Export one armature
fn cmd_export(
    scene_path: PathBuf,
    armature: Option<String>,
    output: Option<PathBuf>,
    filename: Option<String>,
    config_path: Option<PathBuf>,
    lenient: bool,
    compact: bool,
) -> Result<()> {
    let scene = load_scene(&scene_path)?;
    let mut config = load_config(config_path.as_deref(), &scene_path)?;
    if let Some(output) = output {
        config.output_dir = output;
    }
    if lenient {
        config.orphan_policy = OrphanPolicy::PromoteToRoot;
    }
    if compact {
        config.pretty = false;
    }

    let (name, document) =
        serialize_selected(&scene, armature.as_deref(), SerializeOptions::from(&config))?;

    let scene_file = (!from_stdin(&scene_path)).then_some(scene_path.as_path());
    let dir = resolve_output_dir(&config.output_dir, scene_file);
    let filename = filename.unwrap_or_else(|| config.filename_for(&name));
    let path = write_document(&document, &dir, &filename, config.pretty)?;

    match &document {
        ExportDocument::Armature(doc) => {
            let summary = ExportSummary::from(&**doc);
            println!("Bone structure saved to {}", path.display());
            println!("Total bones analyzed: {}", summary.bones);
            println!("Bone collections found: {}", summary.bone_collections);
            if summary.bone_groups > 0 {
                println!("Bone groups found: {}", summary.bone_groups);
            }
            println!("Drivers found: {}", summary.drivers);
            for warning in &doc.warnings {
                println!("Warning: {}", warning);
            }
            Ok(())
        }
        ExportDocument::Failed(err) => {
            println!("Error document saved to {}", path.display());
            bail!("Export of '{}' failed: {}", name, err.error)
        }
    }
}

/// Print analysis counts and bone lists
fn cmd_analyze(scene_path: PathBuf, armature: Option<String>) -> Result<()> {
    let scene = load_scene(&scene_path)?;
    let config = load_config(None, &scene_path)?;
    let (name, document) =
        serialize_selected(&scene, armature.as_deref(), SerializeOptions::from(&config))?;

    let doc = match &document {
        ExportDocument::Armature(doc) => doc,
        ExportDocument::Failed(err) => bail!("Analysis of '{}' failed: {}", name, err.error),
    };
    let summary = ExportSummary::from(&**doc);

    println!("Armature: {}", summary.armature_name);
    println!("  Bones:             {}", summary.bones);
    println!("  Deform bones:      {}", summary.deform_bones);
    println!("  Control bones:     {}", summary.control_bones);
    println!("  IK bones:          {}", summary.ik_bones);
    println!("  FK bones:          {}", summary.fk_bones);
    println!("  Special bones:     {}", summary.special_bones);
    println!("  Constrained bones: {}", summary.constrained_bones);
    println!("  Drivers:           {}", summary.drivers);
    println!("  Bone collections:  {}", summary.bone_collections);
    println!("\nRoots: {}", doc.hierarchical_structure.roots().join(", "));

    if !doc.warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &doc.warnings {
            println!("  {}", warning);
        }
    }

    Ok(())
}

/// Print classification tags as JSON, one object per name
fn cmd_classify(names: &[String]) -> Result<()> {
    for name in names {
        let tags = serde_json::to_string(&classify(name))?;
        println!("{}: {}", name, tags);
    }
    Ok(())
}

/// Write a default config file
fn cmd_init(path: Option<PathBuf>) -> Result<()> {
    let dir = match path {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    std::fs::create_dir_all(&dir).context("Failed to create directory")?;

    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }

    let config = ExportConfig::default();
    config
        .save(&config_path)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    tracing::info!("Initialized {}", config_path.display());
    println!("Created {}", config_path.display());
    println!("\nSettings:");
    println!("  outputDir         - Where documents are written ({})", config.output_dir.display());
    println!("  filenameTemplate  - Document name, {{name}} is the armature ({})", config.filename_template);
    println!("  orphanPolicy      - \"reject\" or \"promoteToRoot\" for unknown parents");
    println!("\nNext step:");
    println!("  rigdump export <scene.json>");

    Ok(())
}
