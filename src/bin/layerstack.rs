use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "layerstack", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a scene record, run one render pass, and print resolved geometry as JSON.
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Input scene record JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Source size table JSON: `{"name": {"width": W, "height": H}}`.
    #[arg(long)]
    sources: PathBuf,

    /// Canvas size reported for the scene, as `WIDTHxHEIGHT`.
    #[arg(long, value_parser = parse_canvas, default_value = "1920x1080")]
    canvas: layerstack::Canvas,

    /// Log scene activity to stderr.
    #[arg(long)]
    verbose: bool,
}

#[derive(Deserialize, Debug)]
struct SourceSize {
    width: u32,
    height: u32,
}

#[derive(Serialize, Debug)]
struct Report {
    canvas: layerstack::Canvas,
    items: Vec<ItemReport>,
}

#[derive(Serialize, Debug)]
struct ItemReport {
    name: String,
    visible: bool,
    source_size: [u32; 2],
    size: [f64; 2],
    scale: [f64; 2],
    draw: [f64; 6],
    bounding_box: [f64; 6],
    quads: Vec<[f64; 4]>,
}

fn parse_canvas(s: &str) -> Result<layerstack::Canvas, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let height = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    Ok(layerstack::Canvas { width, height })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Inspect(args) => cmd_inspect(args),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn read_source_table(path: &Path) -> anyhow::Result<BTreeMap<String, SourceSize>> {
    let f = File::open(path).with_context(|| format!("open source table '{}'", path.display()))?;
    let table = serde_json::from_reader(BufReader::new(f))
        .with_context(|| "parse source table JSON")?;
    Ok(table)
}

fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    init_logging(args.verbose);

    let record = layerstack::SceneRecord::from_path(&args.in_path)?;
    let table = read_source_table(&args.sources)?;

    let catalog = layerstack::SourceCatalog::new();
    for (name, size) in table {
        catalog.insert(Arc::new(layerstack::PlaceholderSource::new(
            name,
            size.width,
            size.height,
        )));
    }

    let scene = layerstack::Scene::new(
        "inspect",
        layerstack::SceneOpts {
            canvas: args.canvas,
            ..layerstack::SceneOpts::default()
        },
    );
    let restored = scene.load(&record, &catalog);
    if restored < record.items.len() {
        tracing::warn!(
            skipped = record.items.len() - restored,
            total = record.items.len(),
            "items skipped (unknown or invalid source)"
        );
    }

    let mut ctx = layerstack::RecordingContext::new();
    scene.render(&mut ctx);
    let mut quads = ctx.take_quads().into_iter();

    let mut items = Vec::new();
    for item in scene.items() {
        let Some(source) = item.source() else {
            continue;
        };
        let resolved = item.resolved();
        // Placeholders draw one quad each, and only visible items draw.
        let drawn = if item.visible() {
            quads
                .next()
                .map(|q| {
                    let r = q.canvas_rect();
                    vec![[r.x0, r.y0, r.x1, r.y1]]
                })
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        items.push(ItemReport {
            name: source.name().to_string(),
            visible: item.visible(),
            source_size: [resolved.source_size.0, resolved.source_size.1],
            size: [resolved.size.width, resolved.size.height],
            scale: [resolved.scale.x, resolved.scale.y],
            draw: resolved.draw.as_coeffs(),
            bounding_box: resolved.bounding_box.as_coeffs(),
            quads: drawn,
        });
    }

    let report = Report {
        canvas: args.canvas,
        items,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
