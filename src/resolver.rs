//! Material resolution: expand per-grid component counts through the
//! blueprint graph into raw-material totals.
//!
//! The reference tool expands exactly one extra level: a prerequisite
//! that is itself a manufactured component is replaced by that
//! component's own prerequisites, and no further. Full expansion down
//! to true leaves is available as an opt-in behavioral change.

use crate::models::{Catalog, Diagnostic, GridCounts, MaterialAmount, MaterialTable};

/// How far to follow prerequisites that are themselves manufactured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    /// Reference behavior: one re-expansion pass, then stop.
    OneLevel,
    /// Follow production chains to true leaves, guarding against cycles.
    Full,
}

/// Output of a resolution run: one material table per grid in input
/// order, a grand total across all grids, and the collected misses.
#[derive(Debug)]
pub struct Resolution {
    pub per_grid: Vec<(String, MaterialTable)>,
    pub grand_total: MaterialTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve every grid's component counts into raw-material totals.
///
/// Lookup misses and unusable yields drop that entry's contribution and
/// are reported; the run always completes with whatever resolved.
pub fn resolve_materials(
    counts: &[GridCounts],
    catalog: &Catalog,
    expansion: Expansion,
) -> Resolution {
    let mut per_grid = Vec::with_capacity(counts.len());
    let mut grand_total = MaterialTable::new();
    let mut diagnostics = Vec::new();

    for grid in counts {
        let mut grid_total = MaterialTable::new();
        for (subtype, count) in &grid.components {
            resolve_entry(
                catalog,
                subtype,
                *count as f64,
                expansion,
                &mut grid_total,
                &mut grand_total,
                &mut diagnostics,
            );
        }
        per_grid.push((grid.name.clone(), grid_total));
    }

    Resolution {
        per_grid,
        grand_total,
        diagnostics,
    }
}

fn resolve_entry(
    catalog: &Catalog,
    subtype: &str,
    count: f64,
    expansion: Expansion,
    grid_total: &mut MaterialTable,
    grand_total: &mut MaterialTable,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(blueprint) = catalog.blueprint_for(subtype) else {
        diagnostics.push(Diagnostic::UnresolvedBlueprint(subtype.to_string()));
        return;
    };
    let Some(batch_yield) = blueprint.batch_yield.usable() else {
        diagnostics.push(Diagnostic::InvalidYield(blueprint.display_name.clone()));
        return;
    };
    let ratio = count / batch_yield;

    for ingredient in &blueprint.prerequisites {
        let contribution = ratio * ingredient.amount;
        match expansion {
            Expansion::OneLevel => {
                add(grid_total, &ingredient.subtype_id, &ingredient.type_id, contribution);
                add(grand_total, &ingredient.subtype_id, &ingredient.type_id, contribution);
                expand_once(
                    catalog,
                    &ingredient.subtype_id,
                    contribution,
                    grid_total,
                    grand_total,
                    diagnostics,
                );
            }
            Expansion::Full => {
                let mut stack = vec![subtype.to_string()];
                expand_to_leaves(
                    catalog,
                    &ingredient.subtype_id,
                    &ingredient.type_id,
                    contribution,
                    &mut stack,
                    grid_total,
                    grand_total,
                    diagnostics,
                );
            }
        }
    }
}

/// One-level re-expansion: if the prerequisite is itself a bound
/// component, accumulate its own prerequisites scaled by the already
/// computed contribution, then drop the intermediate entry from both
/// totals. A nested blueprint with an unusable yield leaves the
/// intermediate entry in place, matching the reference tool.
fn expand_once(
    catalog: &Catalog,
    subtype: &str,
    contribution: f64,
    grid_total: &mut MaterialTable,
    grand_total: &mut MaterialTable,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(nested) = catalog.blueprint_for(subtype) else {
        return;
    };
    let Some(batch_yield) = nested.batch_yield.usable() else {
        diagnostics.push(Diagnostic::InvalidYield(nested.display_name.clone()));
        return;
    };
    let ratio = contribution / batch_yield;

    for ingredient in &nested.prerequisites {
        let amount = ratio * ingredient.amount;
        add(grid_total, &ingredient.subtype_id, &ingredient.type_id, amount);
        add(grand_total, &ingredient.subtype_id, &ingredient.type_id, amount);
    }

    grid_total.remove(subtype);
    grand_total.remove(subtype);
    diagnostics.push(Diagnostic::SupersededIntermediate(subtype.to_string()));
}

/// Full expansion: intermediates never enter the totals. A subtype
/// already on the expansion stack marks a production cycle; it is
/// reported and kept as a raw material so the walk terminates.
fn expand_to_leaves(
    catalog: &Catalog,
    subtype: &str,
    type_id: &str,
    quantity: f64,
    stack: &mut Vec<String>,
    grid_total: &mut MaterialTable,
    grand_total: &mut MaterialTable,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if stack.iter().any(|seen| seen == subtype) {
        diagnostics.push(Diagnostic::ProductionCycle(subtype.to_string()));
        add(grid_total, subtype, type_id, quantity);
        add(grand_total, subtype, type_id, quantity);
        return;
    }
    let Some(blueprint) = catalog.blueprint_for(subtype) else {
        add(grid_total, subtype, type_id, quantity);
        add(grand_total, subtype, type_id, quantity);
        return;
    };
    let Some(batch_yield) = blueprint.batch_yield.usable() else {
        diagnostics.push(Diagnostic::InvalidYield(blueprint.display_name.clone()));
        add(grid_total, subtype, type_id, quantity);
        add(grand_total, subtype, type_id, quantity);
        return;
    };
    let ratio = quantity / batch_yield;

    stack.push(subtype.to_string());
    for ingredient in &blueprint.prerequisites {
        expand_to_leaves(
            catalog,
            &ingredient.subtype_id,
            &ingredient.type_id,
            ratio * ingredient.amount,
            stack,
            grid_total,
            grand_total,
            diagnostics,
        );
    }
    stack.pop();
}

fn add(table: &mut MaterialTable, subtype: &str, type_id: &str, amount: f64) {
    table
        .entry(subtype.to_string())
        .and_modify(|material| material.amount += amount)
        .or_insert_with(|| MaterialAmount {
            type_id: type_id.to_string(),
            amount,
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Blueprint, Component, Ingredient, Yield};

    const TOLERANCE: f64 = 1e-9;

    fn component(subtype: &str) -> Component {
        Component {
            subtype_id: subtype.to_string(),
            display_name: subtype.to_string(),
        }
    }

    fn blueprint(name: &str, batch_yield: Yield, inputs: &[(&str, &str, f64)]) -> Blueprint {
        Blueprint {
            subtype_id: name.to_string(),
            display_name: name.to_string(),
            prerequisites: inputs
                .iter()
                .map(|(subtype, type_id, amount)| Ingredient {
                    subtype_id: subtype.to_string(),
                    type_id: type_id.to_string(),
                    amount: *amount,
                })
                .collect(),
            batch_yield,
        }
    }

    fn counts(grid: &str, entries: &[(&str, i64)]) -> Vec<GridCounts> {
        vec![GridCounts {
            name: grid.to_string(),
            components: entries
                .iter()
                .map(|(subtype, count)| (subtype.to_string(), *count))
                .collect(),
        }]
    }

    fn amount_of(table: &MaterialTable, subtype: &str) -> f64 {
        table.get(subtype).map(|m| m.amount).unwrap_or(0.0)
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < TOLERANCE,
            "expected {expected}, got {actual}"
        );
    }

    /// SteelPlate: yield 10, needs 30 Iron ore per batch.
    fn steel_catalog() -> Catalog {
        let (catalog, diagnostics) = Catalog::new(
            vec![component("SteelPlate")],
            vec![blueprint(
                "SteelPlate",
                Yield::Single(10.0),
                &[("Iron", "Ore", 30.0)],
            )],
            Vec::new(),
        );
        assert!(diagnostics.is_empty());
        catalog
    }

    /// Same as above, but Iron is itself manufactured: IronIngot yields
    /// 5 from 2 IronOre.
    fn two_level_catalog() -> Catalog {
        let (catalog, diagnostics) = Catalog::new(
            vec![component("SteelPlate"), component("Iron")],
            vec![
                blueprint("SteelPlate", Yield::Single(10.0), &[("Iron", "Ore", 30.0)]),
                blueprint("Iron", Yield::FirstOfResults(5.0), &[("IronOre", "Ore", 2.0)]),
            ],
            Vec::new(),
        );
        assert!(diagnostics.is_empty());
        catalog
    }

    #[test]
    fn single_level_conservation() {
        let catalog = steel_catalog();
        let resolution =
            resolve_materials(&counts("TestShip", &[("SteelPlate", 50)]), &catalog, Expansion::OneLevel);

        // (50 / 10) * 30
        assert_close(amount_of(&resolution.per_grid[0].1, "Iron"), 150.0);
        assert_close(amount_of(&resolution.grand_total, "Iron"), 150.0);
        assert!(!resolution.per_grid[0].1.contains_key("SteelPlate"));
        assert_eq!(resolution.grand_total.get("Iron").unwrap().type_id, "Ore");
        assert!(resolution.diagnostics.is_empty());
    }

    #[test]
    fn two_level_expansion_supersedes_the_intermediate() {
        let catalog = two_level_catalog();
        let resolution =
            resolve_materials(&counts("TestShip", &[("SteelPlate", 50)]), &catalog, Expansion::OneLevel);

        // 150 Iron -> ratio 30 -> 60 IronOre, Iron removed
        let grid = &resolution.per_grid[0].1;
        assert_close(amount_of(grid, "IronOre"), 60.0);
        assert!(!grid.contains_key("Iron"));
        assert!(!grid.contains_key("SteelPlate"));
        assert_eq!(grid.len(), 1);
        assert!(!resolution.grand_total.contains_key("Iron"));
        assert!(
            resolution
                .diagnostics
                .contains(&Diagnostic::SupersededIntermediate("Iron".to_string()))
        );
    }

    #[test]
    fn no_bound_blueprint_leaks_into_totals() {
        let catalog = two_level_catalog();
        let resolution = resolve_materials(
            &counts("TestShip", &[("SteelPlate", 50), ("Iron", 10)]),
            &catalog,
            Expansion::OneLevel,
        );

        for subtype in resolution.grand_total.keys() {
            // Every surviving key sits outside the two-level window.
            assert!(
                catalog.blueprint_for(subtype).is_none(),
                "{subtype} still has a bound blueprint"
            );
        }
    }

    #[test]
    fn order_of_entries_does_not_change_totals() {
        let catalog = two_level_catalog();
        let forward = counts("Ship", &[("SteelPlate", 50), ("Iron", 10)]);
        let mut backward = forward.clone();
        backward[0].components.reverse();

        let a = resolve_materials(&forward, &catalog, Expansion::OneLevel);
        let b = resolve_materials(&backward, &catalog, Expansion::OneLevel);

        assert_eq!(a.grand_total.keys().collect::<Vec<_>>(), b.grand_total.keys().collect::<Vec<_>>());
        for (subtype, material) in &a.grand_total {
            assert_close(material.amount, amount_of(&b.grand_total, subtype));
        }
    }

    #[test]
    fn grand_total_is_the_sum_of_grids() {
        let catalog = steel_catalog();
        let table = vec![
            GridCounts {
                name: "Ship".to_string(),
                components: vec![("SteelPlate".to_string(), 50)],
            },
            GridCounts {
                name: "Station".to_string(),
                components: vec![("SteelPlate".to_string(), 30)],
            },
        ];
        let resolution = resolve_materials(&table, &catalog, Expansion::OneLevel);

        let per_grid_sum: f64 = resolution
            .per_grid
            .iter()
            .map(|(_, table)| amount_of(table, "Iron"))
            .sum();
        assert_close(amount_of(&resolution.grand_total, "Iron"), per_grid_sum);
        assert_close(per_grid_sum, 240.0);
    }

    #[test]
    fn unknown_component_is_reported_and_siblings_resolve() {
        let catalog = steel_catalog();
        let resolution = resolve_materials(
            &counts("Ship", &[("Unobtanium", 7), ("SteelPlate", 50)]),
            &catalog,
            Expansion::OneLevel,
        );

        assert_eq!(
            resolution.diagnostics,
            vec![Diagnostic::UnresolvedBlueprint("Unobtanium".to_string())]
        );
        assert_close(amount_of(&resolution.grand_total, "Iron"), 150.0);
        assert_eq!(resolution.grand_total.len(), 1);
    }

    #[test]
    fn zero_yield_drops_the_entry() {
        let (catalog, _) = Catalog::new(
            vec![component("Gizmo")],
            vec![blueprint("Gizmo", Yield::Single(0.0), &[("Iron", "Ore", 5.0)])],
            Vec::new(),
        );
        let resolution =
            resolve_materials(&counts("Ship", &[("Gizmo", 3)]), &catalog, Expansion::OneLevel);

        assert!(resolution.grand_total.is_empty());
        assert_eq!(
            resolution.diagnostics,
            vec![Diagnostic::InvalidYield("Gizmo".to_string())]
        );
    }

    #[test]
    fn nested_invalid_yield_keeps_the_intermediate() {
        let (catalog, _) = Catalog::new(
            vec![component("SteelPlate"), component("Iron")],
            vec![
                blueprint("SteelPlate", Yield::Single(10.0), &[("Iron", "Ore", 30.0)]),
                blueprint("Iron", Yield::Missing, &[("IronOre", "Ore", 2.0)]),
            ],
            Vec::new(),
        );
        let resolution =
            resolve_materials(&counts("Ship", &[("SteelPlate", 50)]), &catalog, Expansion::OneLevel);

        assert_close(amount_of(&resolution.grand_total, "Iron"), 150.0);
        assert!(!resolution.grand_total.contains_key("IronOre"));
        assert_eq!(
            resolution.diagnostics,
            vec![Diagnostic::InvalidYield("Iron".to_string())]
        );
    }

    #[test]
    fn full_expansion_reaches_true_leaves() {
        // Frame <- Plate <- Ingot <- Ore, three manufacturing levels.
        let (catalog, _) = Catalog::new(
            vec![component("Frame"), component("Plate"), component("Ingot")],
            vec![
                blueprint("Frame", Yield::Single(1.0), &[("Plate", "Component", 4.0)]),
                blueprint("Plate", Yield::Single(2.0), &[("Ingot", "Ingot", 6.0)]),
                blueprint("Ingot", Yield::Single(3.0), &[("Ore", "Ore", 9.0)]),
            ],
            Vec::new(),
        );
        let resolution =
            resolve_materials(&counts("Ship", &[("Frame", 2)]), &catalog, Expansion::Full);

        // 2 frames -> 8 plates -> 24 ingots -> 72 ore
        let grid = &resolution.per_grid[0].1;
        assert_eq!(grid.len(), 1);
        assert_close(amount_of(grid, "Ore"), 72.0);
        assert!(resolution.diagnostics.is_empty());

        // The legacy pass stops a level short on the same catalog.
        let legacy =
            resolve_materials(&counts("Ship", &[("Frame", 2)]), &catalog, Expansion::OneLevel);
        assert_close(amount_of(&legacy.grand_total, "Ingot"), 24.0);
        assert!(!legacy.grand_total.contains_key("Ore"));
    }

    #[test]
    fn full_expansion_terminates_on_cycles() {
        let (catalog, _) = Catalog::new(
            vec![component("Chicken"), component("Egg")],
            vec![
                blueprint("Chicken", Yield::Single(1.0), &[("Egg", "Component", 1.0)]),
                blueprint("Egg", Yield::Single(1.0), &[("Chicken", "Component", 1.0)]),
            ],
            Vec::new(),
        );
        let resolution =
            resolve_materials(&counts("Farm", &[("Chicken", 4)]), &catalog, Expansion::Full);

        assert!(
            resolution
                .diagnostics
                .contains(&Diagnostic::ProductionCycle("Chicken".to_string()))
        );
        assert_close(amount_of(&resolution.grand_total, "Chicken"), 4.0);
    }
}
