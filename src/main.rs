//! Blueprint Material Calculator
//!
//! Resolves Space Engineers blueprints into the raw materials needed
//! to build them: game content is parsed once into a catalog database,
//! blueprints are reduced to per-grid component counts, and the counts
//! are expanded through production blueprints into material totals.

mod assembly;
mod counter;
mod db;
mod extract;
mod models;
mod resolver;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::models::{Catalog, Diagnostic, GridCounts};
use crate::resolver::{Expansion, Resolution};

#[derive(Parser)]
#[command(name = "bp-calculator")]
#[command(about = "Blueprint raw-material calculator for Space Engineers")]
struct Cli {
    /// Path to the SQLite database
    #[arg(short, long, default_value = "bp_data.db")]
    database: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse game and mod content into the catalog database
    Parse {
        /// Content directories, ordered: later definitions override earlier ones
        content_dirs: Vec<PathBuf>,

        /// Directories to skip while walking content
        #[arg(long)]
        blacklist: Vec<PathBuf>,
    },

    /// Count components per grid for one or more blueprint files/folders
    Count {
        /// Blueprint files or folders holding bp.sbc files
        blueprints: Vec<PathBuf>,

        /// Directories to skip while walking blueprint folders
        #[arg(long)]
        blacklist: Vec<PathBuf>,
    },

    /// Resolve stored component counts into raw-material totals
    Resolve {
        /// Follow production chains to true leaves instead of one level
        #[arg(long)]
        deep: bool,
    },

    /// Count and resolve in one pass
    Calc {
        /// Blueprint files or folders holding bp.sbc files
        blueprints: Vec<PathBuf>,

        /// Directories to skip while walking blueprint folders
        #[arg(long)]
        blacklist: Vec<PathBuf>,

        /// Follow production chains to true leaves instead of one level
        #[arg(long)]
        deep: bool,
    },

    /// List all components in the catalog
    ListComponents,

    /// Show one component and its bound blueprint
    Component {
        /// Component SubtypeId
        id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Parse {
            content_dirs,
            blacklist,
        } => {
            if content_dirs.is_empty() {
                bail!("no content directories given");
            }
            let (parsed, stats) = extract::extract_content(&content_dirs, &blacklist)?;
            let (components, blueprints, blocks) = parsed.into_parts();
            db::store_catalog(&conn, &components, &blueprints, &blocks)?;
            println!("\n{}", stats);
        }

        Commands::Count {
            blueprints,
            blacklist,
        } => {
            let catalog = load_catalog(&conn)?;
            run_count(&conn, &catalog, &blueprints, &blacklist)?;
        }

        Commands::Resolve { deep } => {
            let catalog = load_catalog(&conn)?;
            let counts = db::load_counts(&conn)?;
            if counts.is_empty() {
                println!("No component counts in database. Run 'count' first.");
                return Ok(());
            }
            run_resolve(&conn, &catalog, &counts, deep)?;
        }

        Commands::Calc {
            blueprints,
            blacklist,
            deep,
        } => {
            let catalog = load_catalog(&conn)?;
            let counts = run_count(&conn, &catalog, &blueprints, &blacklist)?;
            run_resolve(&conn, &catalog, &counts, deep)?;
        }

        Commands::ListComponents => {
            let catalog = load_catalog(&conn)?;
            let mut components: Vec<_> = catalog.components().collect();
            components.sort_by(|a, b| a.subtype_id.cmp(&b.subtype_id));
            println!("{:<30} {:<30} {:>10}", "SubtypeId", "DisplayName", "Yield");
            println!("{}", "-".repeat(72));
            for component in components {
                let yield_str = catalog
                    .blueprint_for(&component.subtype_id)
                    .and_then(|bp| bp.batch_yield.usable())
                    .map(|a| format!("{a:.1}"))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<30} {:<30} {:>10}",
                    component.subtype_id, component.display_name, yield_str
                );
            }
        }

        Commands::Component { id } => {
            let catalog = load_catalog(&conn)?;
            let Some(component) = catalog.component(&id) else {
                println!("Component '{}' not found", id);
                return Ok(());
            };
            println!("Component: {}", component.display_name);
            println!("  SubtypeId: {}", component.subtype_id);
            match catalog.blueprint_for(&id) {
                Some(blueprint) => {
                    println!("  Blueprint: {}", blueprint.subtype_id);
                    match blueprint.batch_yield.usable() {
                        Some(amount) => println!("  Yield: {amount} per batch"),
                        None => println!("  Yield: unusable"),
                    }
                    if !blueprint.prerequisites.is_empty() {
                        println!("  Inputs per batch:");
                        for input in &blueprint.prerequisites {
                            println!(
                                "    {} {} ({})",
                                input.amount, input.subtype_id, input.type_id
                            );
                        }
                    }
                }
                None => println!("  Blueprint: none bound"),
            }
        }
    }

    Ok(())
}

/// Load the catalog from the database, reporting binding collisions.
/// An empty catalog means 'parse' has not run yet, which is fatal.
fn load_catalog(conn: &Connection) -> Result<Catalog> {
    let (components, blueprints, blocks) = db::load_catalog(conn)?;
    let (catalog, diagnostics) = Catalog::new(components, blueprints, blocks);
    if catalog.is_empty() {
        bail!("catalog database is empty, run 'parse' over the game content first");
    }
    report(&diagnostics);
    Ok(catalog)
}

/// Count components for the given blueprints and store the artifact.
fn run_count(
    conn: &Connection,
    catalog: &Catalog,
    blueprints: &[PathBuf],
    blacklist: &[PathBuf],
) -> Result<Vec<GridCounts>> {
    if blueprints.is_empty() {
        bail!("no blueprint files or folders given");
    }
    let grids = assembly::load_grids(blueprints, blacklist)?;
    let (counts, diagnostics) = counter::count_components(&grids, catalog);
    db::store_counts(conn, &counts)?;

    for grid in &counts {
        let total: i64 = grid.components.iter().map(|(_, count)| *count).sum();
        println!(
            "{}: {} components across {} kinds",
            grid.name,
            total,
            grid.components.len()
        );
    }
    report(&diagnostics);
    Ok(counts)
}

/// Resolve stored counts into material totals, store and print them.
fn run_resolve(
    conn: &Connection,
    catalog: &Catalog,
    counts: &[GridCounts],
    deep: bool,
) -> Result<()> {
    let expansion = if deep {
        Expansion::Full
    } else {
        Expansion::OneLevel
    };
    let resolution = resolver::resolve_materials(counts, catalog, expansion);
    db::store_totals(conn, &resolution.per_grid, &resolution.grand_total)?;
    print_totals(&resolution);
    Ok(())
}

fn print_totals(resolution: &Resolution) {
    for (name, table) in &resolution.per_grid {
        println!("\n=== {} ===", name);
        for (subtype, material) in table {
            println!(
                "  {:<30} {:<12} {:>12.2}",
                subtype, material.type_id, material.amount
            );
        }
    }

    println!("\n=== Total ===");
    for (subtype, material) in &resolution.grand_total {
        println!(
            "  {:<30} {:<12} {:>12.2}",
            subtype, material.type_id, material.amount
        );
    }

    if resolution.diagnostics.is_empty() {
        println!("\nResolved cleanly.");
    } else {
        println!("\nResolved with {} notes:", resolution.diagnostics.len());
        report(&resolution.diagnostics);
    }
}

fn report(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("  {}", diagnostic);
    }
}
