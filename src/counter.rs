//! Component counting: reduce grids of placed blocks into flat
//! per-component totals via each block's bill of materials.

use std::collections::HashMap;

use crate::models::{Catalog, Diagnostic, Grid, GridCounts};

/// Sum the component bills of all blocks in the given grids.
///
/// Grids sharing a DisplayName (across blueprint files) accumulate into
/// one entry. Blocks with no catalog definition are reported and
/// skipped; a grid where nothing matched produces no entry at all.
pub fn count_components(grids: &[Grid], catalog: &Catalog) -> (Vec<GridCounts>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let mut order: Vec<String> = Vec::new();
    let mut by_grid: HashMap<String, GridAccumulator> = HashMap::new();

    for grid in grids {
        for block_subtype in &grid.blocks {
            let Some(definition) = catalog.block(block_subtype) else {
                diagnostics.push(Diagnostic::UnresolvedBlock(block_subtype.clone()));
                continue;
            };
            let acc = by_grid.entry(grid.name.clone()).or_insert_with(|| {
                order.push(grid.name.clone());
                GridAccumulator::default()
            });
            for (component_subtype, count) in &definition.components {
                acc.add(component_subtype, *count);
            }
        }
    }

    let counts = order
        .into_iter()
        .map(|name| {
            let acc = by_grid.remove(&name).unwrap_or_default();
            GridCounts {
                name,
                components: acc.into_pairs(),
            }
        })
        .collect();
    (counts, diagnostics)
}

/// First-seen-order accumulator for one grid's component counts.
#[derive(Default)]
struct GridAccumulator {
    order: Vec<String>,
    totals: HashMap<String, i64>,
}

impl GridAccumulator {
    fn add(&mut self, subtype: &str, count: i64) {
        match self.totals.get_mut(subtype) {
            Some(total) => *total += count,
            None => {
                self.order.push(subtype.to_string());
                self.totals.insert(subtype.to_string(), count);
            }
        }
    }

    fn into_pairs(mut self) -> Vec<(String, i64)> {
        self.order
            .into_iter()
            .map(|subtype| {
                let count = self.totals.remove(&subtype).unwrap_or(0);
                (subtype, count)
            })
            .collect()
    }
}
