//! rigbake CLI
//!
//! Bakes a scene dump into a runtime `.anim` asset and inspects the result.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use rigbake_core::logging::{init_with_config, TracingConfig};
use rigbake_export::{ExportOptions, ExportPipeline, ExportSummary, SamplingMode};
use rigbake_parsers::{AnimAsset, AnimParser, Parser as ParserTrait, ValidationIssue};
use rigbake_scene::MemoryScene;

/// rigbake - bake rigged, skinned and animated assets into .anim files
#[derive(Parser)]
#[command(name = "rigbake")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for summaries
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Export skeleton, skinned mesh and clips from a scene dump
    Export(ExportArgs),

    /// Show the contents of an .anim file
    Inspect(InspectArgs),
}

#[derive(Args)]
struct ExportArgs {
    /// Scene dump (JSON)
    #[arg(short, long)]
    scene: PathBuf,

    /// Mesh object to skin
    #[arg(short, long)]
    mesh: Option<String>,

    /// Armature to build the skeleton from (default: first in scene)
    #[arg(short, long)]
    armature: Option<String>,

    /// Sample every armature; track names become armature/bone
    #[arg(long)]
    all_armatures: bool,

    /// Merge identical vertices after skinning
    #[arg(long)]
    dedup: bool,

    /// Also write the skinned mesh as OBJ
    #[arg(long)]
    obj: Option<PathBuf>,

    /// Export options (JSON); flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output .anim file
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args)]
struct InspectArgs {
    /// Path to the .anim file
    path: PathBuf,

    /// Check the asset against the engine loader's expectations
    #[arg(long)]
    validate: bool,

    /// List clips and tracks
    #[arg(short, long)]
    detailed: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_with_config(TracingConfig::from_verbosity(cli.verbose));

    match cli.command {
        Commands::Export(args) => cmd_export(args, cli.format),
        Commands::Inspect(args) => cmd_inspect(args, cli.format),
    }
}

fn export_options(args: &ExportArgs) -> Result<ExportOptions> {
    let mut options = match &args.config {
        Some(path) => ExportOptions::from_json_path(path).context("Failed to load export options")?,
        None => ExportOptions::default(),
    };

    if let Some(mesh) = &args.mesh {
        options.mesh = mesh.clone();
    }
    if let Some(armature) = &args.armature {
        options.armature = Some(armature.clone());
    }
    if args.all_armatures {
        options.sampling_mode = SamplingMode::AllArmatures;
    }
    if args.dedup {
        options.deduplicate = true;
    }
    if let Some(obj) = &args.obj {
        options.obj_path = Some(obj.clone());
    }

    options.validate().context("Invalid export options")?;
    Ok(options)
}

fn cmd_export(args: ExportArgs, format: OutputFormat) -> Result<()> {
    let options = export_options(&args)?;

    info!("Loading scene: {:?}", args.scene);
    let mut scene = MemoryScene::from_path(&args.scene).context("Failed to load scene dump")?;

    let summary = ExportPipeline::new(options)
        .export(&mut scene, &args.output)
        .with_context(|| format!("Export to {:?} failed", args.output))?;

    print_export_summary(&summary, format)
}

fn print_export_summary(summary: &ExportSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        OutputFormat::Text => {
            println!("Exported: {:?}", summary.output);
            println!("  Armature:   {}", summary.armature);
            println!("  Bones:      {}", summary.bones);
            println!("  Vertices:   {}", summary.vertices);
            println!("  Triangles:  {}", summary.triangles);
            println!("  Clips:      {}", summary.clips);
            println!("  Samples:    {}", summary.samples);
            println!("  Size:       {}", format_size(summary.bytes));
            if let Some(obj) = &summary.obj {
                println!("  OBJ:        {:?}", obj);
            }
        }
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs, format: OutputFormat) -> Result<()> {
    if !args.path.exists() {
        bail!("File not found: {:?}", args.path);
    }

    let asset = AnimParser::new()
        .parse_file(&args.path)
        .context("Failed to parse .anim file")?;
    let issues = if args.validate { asset.validate() } else { Vec::new() };

    match format {
        OutputFormat::Json => {
            let mut json = serde_json::json!({
                "path": args.path,
                "summary": asset.summary(),
            });
            if args.detailed {
                json["clips"] = clip_listing(&asset);
            }
            if args.validate {
                json["issues"] = serde_json::to_value(&issues)?;
            }
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => print_inspect_text(&args, &asset, &issues),
    }

    if !issues.is_empty() {
        bail!("{} validation issue(s) in {:?}", issues.len(), args.path);
    }
    Ok(())
}

fn clip_listing(asset: &AnimAsset) -> serde_json::Value {
    asset
        .clips
        .iter()
        .map(|clip| {
            serde_json::json!({
                "name": clip.name,
                "duration": clip.duration,
                "tracks": clip.tracks.iter().map(|t| serde_json::json!({
                    "name": t.name,
                    "samples": t.times.len(),
                })).collect::<Vec<_>>(),
            })
        })
        .collect()
}

fn print_inspect_text(args: &InspectArgs, asset: &AnimAsset, issues: &[ValidationIssue]) {
    let summary = asset.summary();
    println!("Anim asset: {:?}", args.path);
    println!("  Nodes:      {}", summary.nodes);
    println!("  Vertices:   {}", summary.vertices);
    println!("  Triangles:  {}", summary.triangles);
    println!("  Clips:      {}", summary.clips);
    println!("  Tracks:     {}", summary.tracks);
    println!("  Samples:    {}", summary.samples);

    if args.detailed {
        println!("\nSkeleton:");
        for (i, node) in asset.nodes.iter().enumerate() {
            println!("  {:>3}. {} (parent {})", i, node.name, node.parent);
        }
        println!("\nClips:");
        for clip in &asset.clips {
            let samples = clip.tracks.first().map_or(0, |t| t.times.len());
            println!(
                "  {:<24} {:>8.3}s  {} tracks x {} samples",
                clip.name,
                clip.duration,
                clip.tracks.len(),
                samples
            );
        }
    }

    if args.validate {
        if issues.is_empty() {
            println!("\nValidation: OK");
        } else {
            println!("\nValidation: {} issue(s)", issues.len());
            for issue in issues {
                println!("  - {}", issue);
            }
        }
    }
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
