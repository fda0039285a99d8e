//! Database schema and operations
//!
//! The parsed catalog, the per-grid component counts and the resolved
//! material totals all live in one SQLite file, replacing the XML
//! artifacts the original game tools shuffle between stages. Row order
//! (rowid) preserves ingestion order, which the catalog's tie-break
//! rules depend on.

use anyhow::Result;
use rusqlite::Connection;

use crate::models::{
    BlockDefinition, Blueprint, Component, GridCounts, Ingredient, MaterialTable, Yield,
};

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Manufactured intermediate items
        CREATE TABLE IF NOT EXISTS components (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subtype_id TEXT NOT NULL,
            display_name TEXT NOT NULL
        );

        -- Production blueprints and their prerequisite lines
        CREATE TABLE IF NOT EXISTS blueprints (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subtype_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            yield_kind TEXT NOT NULL,
            yield_amount REAL
        );

        CREATE TABLE IF NOT EXISTS blueprint_inputs (
            blueprint_id INTEGER NOT NULL,
            subtype_id TEXT NOT NULL,
            type_id TEXT NOT NULL,
            amount REAL NOT NULL
        );

        -- Placeable block definitions and their bills of materials
        CREATE TABLE IF NOT EXISTS block_definitions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subtype_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            cube_size TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS block_components (
            block_id INTEGER NOT NULL,
            subtype_id TEXT NOT NULL,
            count INTEGER NOT NULL
        );

        -- Hand-off artifact between counting and resolution
        CREATE TABLE IF NOT EXISTS component_counts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            grid_name TEXT NOT NULL,
            subtype_id TEXT NOT NULL,
            count INTEGER NOT NULL
        );

        -- Resolved raw-material totals, one section per grid plus 'Total'
        CREATE TABLE IF NOT EXISTS material_totals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            section TEXT NOT NULL,
            subtype_id TEXT NOT NULL,
            type_id TEXT NOT NULL,
            amount REAL NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_blueprint_inputs_blueprint ON blueprint_inputs(blueprint_id);
        CREATE INDEX IF NOT EXISTS idx_block_components_block ON block_components(block_id);
        "#,
    )?;
    Ok(())
}

fn encode_yield(batch_yield: Yield) -> (&'static str, Option<f64>) {
    match batch_yield {
        Yield::Single(a) => ("result", Some(a)),
        Yield::FirstOfResults(a) => ("results", Some(a)),
        Yield::Missing => ("missing", None),
    }
}

fn decode_yield(kind: &str, amount: Option<f64>) -> Yield {
    match (kind, amount) {
        ("result", Some(a)) => Yield::Single(a),
        ("results", Some(a)) => Yield::FirstOfResults(a),
        _ => Yield::Missing,
    }
}

/// Replace the stored catalog with a freshly parsed one.
pub fn store_catalog(
    conn: &Connection,
    components: &[Component],
    blueprints: &[Blueprint],
    blocks: &[BlockDefinition],
) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM blueprint_inputs;
        DELETE FROM blueprints;
        DELETE FROM components;
        DELETE FROM block_components;
        DELETE FROM block_definitions;
        "#,
    )?;

    for component in components {
        conn.execute(
            "INSERT INTO components (subtype_id, display_name) VALUES (?1, ?2)",
            (&component.subtype_id, &component.display_name),
        )?;
    }

    for blueprint in blueprints {
        let (kind, amount) = encode_yield(blueprint.batch_yield);
        conn.execute(
            "INSERT INTO blueprints (subtype_id, display_name, yield_kind, yield_amount)
             VALUES (?1, ?2, ?3, ?4)",
            (&blueprint.subtype_id, &blueprint.display_name, kind, amount),
        )?;
        let blueprint_id = conn.last_insert_rowid();
        for input in &blueprint.prerequisites {
            conn.execute(
                "INSERT INTO blueprint_inputs (blueprint_id, subtype_id, type_id, amount)
                 VALUES (?1, ?2, ?3, ?4)",
                (blueprint_id, &input.subtype_id, &input.type_id, input.amount),
            )?;
        }
    }

    for block in blocks {
        conn.execute(
            "INSERT INTO block_definitions (subtype_id, display_name, cube_size)
             VALUES (?1, ?2, ?3)",
            (&block.subtype_id, &block.display_name, &block.cube_size),
        )?;
        let block_id = conn.last_insert_rowid();
        for (subtype, count) in &block.components {
            conn.execute(
                "INSERT INTO block_components (block_id, subtype_id, count)
                 VALUES (?1, ?2, ?3)",
                (block_id, subtype, count),
            )?;
        }
    }

    Ok(())
}

/// Load the stored catalog collections in ingestion order.
pub fn load_catalog(
    conn: &Connection,
) -> Result<(Vec<Component>, Vec<Blueprint>, Vec<BlockDefinition>)> {
    let mut stmt = conn.prepare("SELECT subtype_id, display_name FROM components ORDER BY id")?;
    let components = stmt
        .query_map([], |row| {
            Ok(Component {
                subtype_id: row.get(0)?,
                display_name: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, subtype_id, display_name, yield_kind, yield_amount FROM blueprints ORDER BY id",
    )?;
    let headers = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<f64>>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut input_stmt = conn.prepare(
        "SELECT subtype_id, type_id, amount FROM blueprint_inputs
         WHERE blueprint_id = ?1 ORDER BY rowid",
    )?;
    let mut blueprints = Vec::with_capacity(headers.len());
    for (id, subtype_id, display_name, kind, amount) in headers {
        let prerequisites = input_stmt
            .query_map([id], |row| {
                Ok(Ingredient {
                    subtype_id: row.get(0)?,
                    type_id: row.get(1)?,
                    amount: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        blueprints.push(Blueprint {
            subtype_id,
            display_name,
            prerequisites,
            batch_yield: decode_yield(&kind, amount),
        });
    }

    let mut stmt = conn
        .prepare("SELECT id, subtype_id, display_name, cube_size FROM block_definitions ORDER BY id")?;
    let block_headers = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut component_stmt = conn.prepare(
        "SELECT subtype_id, count FROM block_components WHERE block_id = ?1 ORDER BY rowid",
    )?;
    let mut blocks = Vec::with_capacity(block_headers.len());
    for (id, subtype_id, display_name, cube_size) in block_headers {
        let bill = component_stmt
            .query_map([id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        blocks.push(BlockDefinition {
            subtype_id,
            display_name,
            cube_size,
            components: bill,
        });
    }

    Ok((components, blueprints, blocks))
}

/// Replace the stored component-count artifact.
pub fn store_counts(conn: &Connection, counts: &[GridCounts]) -> Result<()> {
    conn.execute("DELETE FROM component_counts", [])?;
    for grid in counts {
        for (subtype, count) in &grid.components {
            conn.execute(
                "INSERT INTO component_counts (grid_name, subtype_id, count)
                 VALUES (?1, ?2, ?3)",
                (&grid.name, subtype, count),
            )?;
        }
    }
    Ok(())
}

/// Load the component-count artifact back, grouped per grid in stored
/// order. Writing then loading reproduces the same table.
pub fn load_counts(conn: &Connection) -> Result<Vec<GridCounts>> {
    let mut stmt =
        conn.prepare("SELECT grid_name, subtype_id, count FROM component_counts ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut counts: Vec<GridCounts> = Vec::new();
    for (grid_name, subtype, count) in rows {
        match counts.iter_mut().find(|grid| grid.name == grid_name) {
            Some(grid) => grid.components.push((subtype, count)),
            None => counts.push(GridCounts {
                name: grid_name,
                components: vec![(subtype, count)],
            }),
        }
    }
    Ok(counts)
}

/// Replace the stored material totals: one section per grid plus the
/// aggregated 'Total' section.
pub fn store_totals(
    conn: &Connection,
    per_grid: &[(String, MaterialTable)],
    grand_total: &MaterialTable,
) -> Result<()> {
    conn.execute("DELETE FROM material_totals", [])?;
    let mut insert = |section: &str, table: &MaterialTable| -> Result<()> {
        for (subtype, material) in table {
            conn.execute(
                "INSERT INTO material_totals (section, subtype_id, type_id, amount)
                 VALUES (?1, ?2, ?3, ?4)",
                (section, subtype, &material.type_id, material.amount),
            )?;
        }
        Ok(())
    };
    for (name, table) in per_grid {
        insert(name, table)?;
    }
    insert("Total", grand_total)?;
    Ok(())
}
