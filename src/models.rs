//! Data models for Space Engineers content definitions and totals

use std::collections::{BTreeMap, HashMap};

/// One prerequisite line of a blueprint: so much of an item per batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingredient {
    pub subtype_id: String,
    pub type_id: String,
    pub amount: f64,
}

/// Output amount of a blueprint batch, resolved once at ingestion time.
///
/// Game files carry either a single `<Result>` element or a `<Results>`
/// list; the reference behavior takes the first list entry. Files with
/// neither still define a blueprint, it just can't be scaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Yield {
    Single(f64),
    FirstOfResults(f64),
    Missing,
}

impl Yield {
    /// Batch output amount, if positive. Zero or negative yields can't
    /// scale a batch, so they are unusable just like a missing one.
    pub fn usable(&self) -> Option<f64> {
        match *self {
            Yield::Single(a) | Yield::FirstOfResults(a) if a > 0.0 => Some(a),
            _ => None,
        }
    }
}

/// A production recipe for one component.
#[derive(Debug, Clone)]
pub struct Blueprint {
    pub subtype_id: String,
    pub display_name: String,
    pub prerequisites: Vec<Ingredient>,
    pub batch_yield: Yield,
}

/// A manufactured intermediate item.
#[derive(Debug, Clone)]
pub struct Component {
    pub subtype_id: String,
    pub display_name: String,
}

/// A placeable block definition with its bill of materials.
#[derive(Debug, Clone)]
pub struct BlockDefinition {
    pub subtype_id: String,
    pub display_name: String,
    pub cube_size: String,
    /// (component SubtypeId, count consumed per placed block)
    pub components: Vec<(String, i64)>,
}

/// One grid of a user blueprint: a name plus block subtype references.
#[derive(Debug, Clone)]
pub struct Grid {
    pub name: String,
    pub blocks: Vec<String>,
}

/// Per-grid component counts, the hand-off between counting and
/// resolution. Kept as an ordered list so the persisted artifact
/// round-trips exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCounts {
    pub name: String,
    pub components: Vec<(String, i64)>,
}

/// Amount of one raw material, with the item type carried along from the
/// blueprint prerequisite that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialAmount {
    pub type_id: String,
    pub amount: f64,
}

/// SubtypeId -> material amount. BTreeMap so output order is stable.
pub type MaterialTable = BTreeMap<String, MaterialAmount>;

/// Non-fatal problems found while counting or resolving. Collected and
/// returned to the caller rather than printed from inside the core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Diagnostic {
    #[error("no block definition for '{0}'")]
    UnresolvedBlock(String),
    #[error("no matching blueprint for component '{0}'")]
    UnresolvedBlueprint(String),
    #[error("no usable result amount for blueprint '{0}'")]
    InvalidYield(String),
    #[error("{count} blueprints named '{display_name}', keeping the last")]
    DuplicateBinding { display_name: String, count: usize },
    #[error("replaced intermediate '{0}' with its own materials")]
    SupersededIntermediate(String),
    #[error("production cycle at '{0}', keeping it as a raw material")]
    ProductionCycle(String),
}

/// In-memory content catalog: built once per run, read-only afterwards.
///
/// Blueprints bind to components by DisplayName, so the name index is
/// built up front instead of re-scanning the blueprint list on every
/// lookup. Name collisions keep the last blueprint ingested.
#[derive(Debug)]
pub struct Catalog {
    components: HashMap<String, Component>,
    blueprints: Vec<Blueprint>,
    blueprint_by_name: HashMap<String, usize>,
    blocks: HashMap<String, BlockDefinition>,
}

impl Catalog {
    /// Build the catalog and its name index. Input order matters: the
    /// first component per SubtypeId wins, the last blueprint per
    /// DisplayName wins, the last block per SubtypeId wins.
    pub fn new(
        components: Vec<Component>,
        blueprints: Vec<Blueprint>,
        blocks: Vec<BlockDefinition>,
    ) -> (Self, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();

        let mut component_map = HashMap::new();
        for component in components {
            component_map
                .entry(component.subtype_id.clone())
                .or_insert(component);
        }

        let mut blueprint_by_name: HashMap<String, usize> = HashMap::new();
        let mut name_hits: HashMap<String, usize> = HashMap::new();
        for (idx, blueprint) in blueprints.iter().enumerate() {
            blueprint_by_name.insert(blueprint.display_name.clone(), idx);
            *name_hits.entry(blueprint.display_name.clone()).or_insert(0) += 1;
        }
        let mut collisions: Vec<_> = name_hits
            .into_iter()
            .filter(|&(_, count)| count > 1)
            .collect();
        collisions.sort();
        for (display_name, count) in collisions {
            diagnostics.push(Diagnostic::DuplicateBinding { display_name, count });
        }

        let mut block_map = HashMap::new();
        for block in blocks {
            block_map.insert(block.subtype_id.clone(), block);
        }

        let catalog = Catalog {
            components: component_map,
            blueprints,
            blueprint_by_name,
            blocks: block_map,
        };
        (catalog, diagnostics)
    }

    pub fn component(&self, subtype_id: &str) -> Option<&Component> {
        self.components.get(subtype_id)
    }

    pub fn block(&self, subtype_id: &str) -> Option<&BlockDefinition> {
        self.blocks.get(subtype_id)
    }

    /// The blueprint bound to a component SubtypeId, via the component's
    /// DisplayName. None if either link is missing.
    pub fn blueprint_for(&self, subtype_id: &str) -> Option<&Blueprint> {
        let component = self.components.get(subtype_id)?;
        let idx = self.blueprint_by_name.get(&component.display_name)?;
        Some(&self.blueprints[*idx])
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty() && self.blueprints.is_empty() && self.blocks.is_empty()
    }
}
