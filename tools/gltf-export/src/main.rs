//! gltf-export - glTF 2.0 export tool
//!
//! Exports JSON scene descriptions to .glb/.gltf, and canonicalizes,
//! repacks or inspects existing artifacts.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glb_builder::{assemble_glb, parse_glb};
use serde_json::Value;
use std::path::{Path, PathBuf};

use gltf_export::write::{to_compact_json, to_pretty_json};
use gltf_export::{
    canonicalize, repack, run, ExportConfig, ExportContext, ExportSettings, HeadlessHost,
    OutputFormat, SceneFileGatherer,
};

#[derive(Parser)]
#[command(name = "gltf-export")]
#[command(about = "glTF 2.0 export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a JSON scene description
    Export {
        /// Input scene description (.json)
        scene: PathBuf,

        /// Output .glb/.gltf file (defaults to the scene path with the format's extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Path to export.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (overrides config)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Timeline frame of the headless host
        #[arg(long, default_value_t = 0)]
        frame: i32,

        /// Gather at the current frame instead of frame 0
        #[arg(long)]
        current_frame: bool,

        /// Run gltfpack over the result
        #[arg(long)]
        gltfpack: bool,

        /// Copyright notice written to the asset (overrides config)
        #[arg(long)]
        copyright: Option<String>,
    },

    /// Canonicalize an existing .gltf or .glb
    Canonicalize {
        /// Input .gltf/.glb file
        input: PathBuf,

        /// Output file (prints JSON to stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run gltfpack over an existing artifact
    Repack {
        /// Input .gltf/.glb file
        input: PathBuf,

        /// Path to export.toml ([repack] section)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the chunk layout and a summary of a .glb
    Inspect {
        /// Input .glb file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            scene,
            output,
            config,
            format,
            frame,
            current_frame,
            gltfpack,
            copyright,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(format) = format {
                config.output.format = format;
            }
            if copyright.is_some() {
                config.output.copyright = copyright;
            }
            config.export.current_frame |= current_frame;
            config.export.use_gltfpack |= gltfpack;

            let output =
                output.unwrap_or_else(|| scene.with_extension(config.output.format.extension()));
            tracing::info!("Exporting {:?} -> {:?}", scene, output);

            let mut settings = ExportSettings::new(config.into_options(output));
            let mut host = HeadlessHost::new(frame);
            let mut gatherer = SceneFileGatherer::new(&scene);

            let report = run(ExportContext::new(&mut host, &mut gatherer), &mut settings)?;
            if let Some(binary) = &report.artifacts.binary {
                tracing::info!("Binary buffer: {:?}", binary);
            }
            if let Some(repacked) = &report.repacked {
                tracing::info!("Repacked: {:?}", repacked);
            }
            tracing::info!("Done!");
        }

        Commands::Canonicalize { input, output } => {
            canonicalize_file(&input, output.as_deref())?;
        }

        Commands::Repack { input, config } => {
            let config = load_config(config.as_deref())?;
            let output = repack(&input, &config.repack)
                .with_context(|| format!("Failed to repack {}", input.display()))?;
            tracing::info!("Repacked {:?} -> {:?}", input, output);
        }

        Commands::Inspect { input } => {
            inspect(&input)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ExportConfig> {
    match path {
        Some(path) => ExportConfig::load(path),
        None => Ok(ExportConfig::default()),
    }
}

fn is_glb(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("glb"))
}

fn canonicalize_file(input: &Path, output: Option<&Path>) -> Result<()> {
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;

    if is_glb(input) {
        let chunks = parse_glb(&bytes)?;
        let document: Value =
            serde_json::from_slice(chunks.json).context("Failed to parse GLB JSON chunk")?;
        let json = to_compact_json(&canonicalize(&document))?;
        let glb = assemble_glb(&json, chunks.bin);

        let output = output.unwrap_or(input);
        std::fs::write(output, glb)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        tracing::info!("Canonicalized {:?} -> {:?}", input, output);
        return Ok(());
    }

    let document: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse {}", input.display()))?;
    let json = to_pretty_json(&canonicalize(&document))?;

    match output {
        Some(output) => {
            std::fs::write(output, json)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            tracing::info!("Canonicalized {:?} -> {:?}", input, output);
        }
        None => println!("{}", String::from_utf8_lossy(&json)),
    }
    Ok(())
}

fn inspect(input: &Path) -> Result<()> {
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let chunks = parse_glb(&bytes)?;
    let document: Value =
        serde_json::from_slice(chunks.json).context("Failed to parse GLB JSON chunk")?;

    tracing::info!("{:?}: {} bytes", input, bytes.len());
    tracing::info!("  JSON chunk: {} bytes", chunks.json.len());
    match chunks.bin {
        Some(bin) => tracing::info!("  BIN chunk: {} bytes", bin.len()),
        None => tracing::info!("  BIN chunk: none"),
    }

    if let Some(generator) = document["asset"]["generator"].as_str() {
        tracing::info!("  Generator: {}", generator);
    }
    for key in [
        "scenes",
        "nodes",
        "meshes",
        "materials",
        "skins",
        "animations",
        "accessors",
        "bufferViews",
        "buffers",
    ] {
        let count = document[key].as_array().map_or(0, Vec::len);
        if count > 0 {
            tracing::info!("  {}: {}", key, count);
        }
    }
    if let Some(used) = document["extensionsUsed"].as_array() {
        let names: Vec<_> = used.iter().filter_map(Value::as_str).collect();
        tracing::info!("  Extensions: {}", names.join(", "));
    }
    Ok(())
}
