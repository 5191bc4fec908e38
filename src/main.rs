//! intrinsic-layout - CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use intrinsic_layout::construct::{ConstructionContext, ConstructionRequest, CycleGuard};
use intrinsic_layout::runtime::memory::Heap;
use intrinsic_layout::samples::{self, Geometry, TriangleOffsets};
use intrinsic_layout::util::config::{self, EmbedConfig};
use intrinsic_layout::util::logger;
use intrinsic_layout::{NAME, VERSION};
use std::path::PathBuf;
use tracing::info;

/// Lay out, construct and inspect objects with intrinsically embedded fields
#[derive(Parser, Debug)]
#[command(name = "intrinsic-layout")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to $INTRINSIC_LAYOUT_CONFIG)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Store every embedded field out-of-line
    #[arg(long, global = true)]
    unoptimized: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the field layout of the sample types
    Layout {
        /// Only print this type
        #[arg(value_name = "TYPE")]
        ty: Option<String>,
    },

    /// Construct a triangle and shift it by dead reckoning
    Demo {
        /// Distance to shift by, on both axes
        #[arg(long, default_value_t = 10)]
        by: i32,
    },

    /// Show that self-embedding types are refused
    Cycle,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    if args.unoptimized {
        config.layout.optimize_layout = false;
    }
    if args.verbose {
        logger::init_debug();
        eprintln!("{} version: {}", NAME, VERSION);
        eprintln!("optimize_layout: {}", config.layout.optimize_layout);
        eprintln!("reset_policy: {:?}", config.guard.reset_policy);
        if let Some(level) = logger::installed_level() {
            eprintln!("log level: {}", level);
        }
    } else {
        logger::init_with_level(config.log.level);
    }

    match args.command {
        Commands::Layout { ty } => print_layouts(&config, ty.as_deref()),
        Commands::Demo { by } => demo(&config, by),
        Commands::Cycle => cycle(&config),
    }
}

fn print_layouts(
    config: &EmbedConfig,
    only: Option<&str>,
) -> Result<()> {
    let geometry = Geometry::new(&config.layout).context("Failed to lay out sample types")?;
    let types = geometry.types();
    let all = [
        geometry.point,
        geometry.line,
        geometry.triangle,
        geometry.polygon,
        geometry.sample_buffer,
    ];

    let selected: Vec<_> = match only {
        Some(name) => match types.type_id(name) {
            Some(ty) if all.contains(&ty) => vec![ty],
            _ => bail!("Unknown type: {}", name),
        },
        None => all.to_vec(),
    };
    for ty in selected {
        println!("{}", types.print_field_layout(ty)?);
    }
    Ok(())
}

fn demo(
    config: &EmbedConfig,
    by: i32,
) -> Result<()> {
    let geometry = Geometry::new(&config.layout).context("Failed to lay out sample types")?;
    let types = geometry.types();
    let mut heap = Heap::with_config(&config.heap);
    let guard = CycleGuard::with_policy(config.guard.reset_policy);

    let mut ctx = ConstructionContext::new(types, &mut heap, &guard);
    let triangle = geometry
        .triangle(&mut ctx, [(1, 1), (2, 2), (3, 3)])
        .context("Failed to construct triangle")?;

    let show = |heap: &Heap, label: &str| -> Result<()> {
        let mut coords = Vec::new();
        for path in ["l.p1.x", "l.p1.y", "l.p2.x", "l.p2.y", "p.x", "p.y"] {
            coords.push(types.read(heap, triangle, path)?.to_string());
        }
        println!(
            "{label}: Triangle(Line(Point({}, {}), Point({}, {})), Point({}, {}))",
            coords[0], coords[1], coords[2], coords[3], coords[4], coords[5]
        );
        Ok(())
    };
    show(&heap, "t1")?;

    match TriangleOffsets::new(&geometry) {
        Ok(offsets) => {
            println!(
                "dead-reckoned offsets: l.p1.x @{} l.p1.y @{} l.p2.x @{} l.p2.y @{} p.x @{} p.y @{}",
                offsets.p1_x, offsets.p1_y, offsets.p2_x, offsets.p2_y, offsets.p_x, offsets.p_y
            );
            offsets.shift(&mut heap, triangle, by, by)?;
        }
        Err(err) => {
            info!("no dead reckoning ({}), walking paths", err);
            samples::shift_by_path(types, &mut heap, triangle, by, by)?;
        }
    }
    show(&heap, &format!("shifted by ({by}, {by})"))?;
    println!(
        "heap: {} bytes in {} allocations",
        heap.used(),
        heap.total_allocations()
    );
    Ok(())
}

fn cycle(config: &EmbedConfig) -> Result<()> {
    let circular = samples::circular(&config.layout).context("Failed to lay out circular types")?;
    let types = circular.types();
    let mut heap = Heap::with_config(&config.heap);
    let guard = CycleGuard::with_policy(config.guard.reset_policy);
    let mut ctx = ConstructionContext::new(types, &mut heap, &guard);
    println!("cycle guard resets: {:?}", guard.policy());

    for ty in [circular.foobar, circular.foo] {
        match ctx.instantiate(ty, ConstructionRequest::Default) {
            Ok(_) => bail!("{} was constructed although it embeds itself", types.type_name(ty)),
            Err(err) if err.is_cycle() => println!("OK - {}: {}", types.type_name(ty), err),
            Err(err) => return Err(err).context("Unexpected construction failure"),
        }
    }
    if !guard.is_empty() {
        bail!("cycle guard not empty after construction: {:?}", guard.in_progress());
    }
    Ok(())
}
