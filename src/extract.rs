//! Game content extraction for Space Engineers definitions
//!
//! Walks vanilla and mod content directories for `.sbc` definition
//! files and pulls out component, blueprint and cube-block entries.
//! Entries are deduplicated by identity key; a later file overrides an
//! earlier one in place, the way the game layers mods over vanilla.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use walkdir::WalkDir;

use crate::models::{BlockDefinition, Blueprint, Component, Ingredient, Yield};

/// Accumulated definitions across all parsed files, deduplicated by
/// identity: components and blueprints by (SubtypeId, DisplayName),
/// blocks by (SubtypeId, DisplayName, CubeSize). Re-definition replaces
/// the earlier entry but keeps its position.
#[derive(Debug, Default)]
pub struct ParsedContent {
    components: Vec<Component>,
    component_index: HashMap<(String, String), usize>,
    blueprints: Vec<Blueprint>,
    blueprint_index: HashMap<(String, String), usize>,
    blocks: Vec<BlockDefinition>,
    block_index: HashMap<(String, String, String), usize>,
}

impl ParsedContent {
    fn add_component(&mut self, component: Component) {
        let key = (component.subtype_id.clone(), component.display_name.clone());
        match self.component_index.get(&key) {
            Some(&idx) => self.components[idx] = component,
            None => {
                self.component_index.insert(key, self.components.len());
                self.components.push(component);
            }
        }
    }

    fn add_blueprint(&mut self, blueprint: Blueprint) {
        let key = (blueprint.subtype_id.clone(), blueprint.display_name.clone());
        match self.blueprint_index.get(&key) {
            Some(&idx) => self.blueprints[idx] = blueprint,
            None => {
                self.blueprint_index.insert(key, self.blueprints.len());
                self.blueprints.push(blueprint);
            }
        }
    }

    fn add_block(&mut self, block: BlockDefinition) {
        let key = (
            block.subtype_id.clone(),
            block.display_name.clone(),
            block.cube_size.clone(),
        );
        match self.block_index.get(&key) {
            Some(&idx) => self.blocks[idx] = block,
            None => {
                self.block_index.insert(key, self.blocks.len());
                self.blocks.push(block);
            }
        }
    }

    pub fn into_parts(self) -> (Vec<Component>, Vec<Blueprint>, Vec<BlockDefinition>) {
        (self.components, self.blueprints, self.blocks)
    }
}

/// True when the path sits under any blacklisted directory.
pub fn is_blacklisted(path: &Path, blacklist: &[PathBuf]) -> bool {
    blacklist.iter().any(|prefix| path.starts_with(prefix))
}

/// Find all `.sbc` definition files under the given content roots,
/// skipping blacklisted subtrees.
pub fn find_definition_files(content_dirs: &[PathBuf], blacklist: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for dir in content_dirs {
        for entry in WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if is_blacklisted(path, blacklist) {
                continue;
            }
            if path.extension().is_some_and(|ext| ext == "sbc") {
                files.push(path.to_path_buf());
            }
        }
    }
    files
}

/// Extract all definitions from the given content roots.
pub fn extract_content(
    content_dirs: &[PathBuf],
    blacklist: &[PathBuf],
) -> Result<(ParsedContent, ExtractStats)> {
    let mut parsed = ParsedContent::default();
    let mut stats = ExtractStats::default();

    let files = find_definition_files(content_dirs, blacklist);
    println!("Found {} definition files", files.len());

    for path in &files {
        match fs::read_to_string(path) {
            Ok(text) => {
                parse_definitions(&text, &mut parsed)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                stats.files += 1;
            }
            Err(e) => {
                eprintln!("  Error reading {}: {}", path.display(), e);
                stats.errors += 1;
            }
        }
    }

    stats.components = parsed.components.len();
    stats.blueprints = parsed.blueprints.len();
    stats.blocks = parsed.blocks.len();
    Ok((parsed, stats))
}

/// Parse one definition file's text into the accumulator.
pub fn parse_definitions(text: &str, parsed: &mut ParsedContent) -> Result<()> {
    // Components: <Component><Id>...<SubtypeId>X</SubtypeId></Id><DisplayName>Y</DisplayName>...
    // The literal `<Component>` tag never matches the attribute-style
    // `<Component Subtype=... />` lines inside block bills.
    let component_re = Regex::new(r"(?s)<Component>(.*?)</Component>")?;
    let subtype_re = Regex::new(r"<SubtypeId>([^<]*)</SubtypeId>")?;
    let display_re = Regex::new(r"<DisplayName>([^<]+)</DisplayName>")?;

    for cap in component_re.captures_iter(text) {
        let chunk = &cap[1];
        let subtype = subtype_re.captures(chunk).map(|c| c[1].to_string());
        let display = display_re.captures(chunk).map(|c| c[1].to_string());
        if let (Some(subtype_id), Some(display_name)) = (subtype, display) {
            parsed.add_component(Component {
                subtype_id,
                display_name,
            });
        }
    }

    // Blueprints: prerequisites and results are attribute-style items.
    let blueprint_re = Regex::new(r"(?s)<Blueprint>(.*?)</Blueprint>")?;
    let prerequisites_re = Regex::new(r"(?s)<Prerequisites>(.*?)</Prerequisites>")?;
    let results_re = Regex::new(r"(?s)<Results>(.*?)</Results>")?;
    let item_re = Regex::new(r"<Item\s+([^>]*?)/?>")?;
    let result_re = Regex::new(r"<Result\s+([^>]*?)/>")?;
    let amount_re = Regex::new(r#"Amount="([^"]*)""#)?;
    let type_re = Regex::new(r#"TypeId="([^"]*)""#)?;
    let item_subtype_re = Regex::new(r#"SubtypeId="([^"]*)""#)?;

    for cap in blueprint_re.captures_iter(text) {
        let chunk = &cap[1];
        let subtype = subtype_re.captures(chunk).map(|c| c[1].to_string());
        let display = display_re.captures(chunk).map(|c| c[1].to_string());
        let (Some(subtype_id), Some(display_name)) = (subtype, display) else {
            continue;
        };

        let mut prerequisites = Vec::new();
        if let Some(section) = prerequisites_re.captures(chunk) {
            for item in item_re.captures_iter(&section[1]) {
                let attrs = &item[1];
                let amount = amount_re
                    .captures(attrs)
                    .and_then(|c| c[1].parse::<f64>().ok());
                let type_id = type_re.captures(attrs).map(|c| c[1].to_string());
                let item_subtype = item_subtype_re.captures(attrs).map(|c| c[1].to_string());
                match (item_subtype, type_id, amount) {
                    (Some(item_subtype), Some(type_id), Some(amount)) => {
                        merge_ingredient(&mut prerequisites, item_subtype, type_id, amount);
                    }
                    _ => eprintln!(
                        "  Skipping malformed prerequisite in blueprint '{display_name}'"
                    ),
                }
            }
        }

        // Yield: a single <Result Amount=.../> wins, else the first
        // <Results> item, else the blueprint can't be scaled.
        let single = result_re
            .captures(chunk)
            .and_then(|c| amount_re.captures(&c[1]).and_then(|a| a[1].parse::<f64>().ok()));
        let batch_yield = match single {
            Some(amount) => Yield::Single(amount),
            None => {
                let first_of_results = results_re.captures(chunk).and_then(|section| {
                    item_re.captures(&section[1]).and_then(|item| {
                        amount_re
                            .captures(&item[1])
                            .and_then(|a| a[1].parse::<f64>().ok())
                    })
                });
                match first_of_results {
                    Some(amount) => Yield::FirstOfResults(amount),
                    None => Yield::Missing,
                }
            }
        };

        parsed.add_blueprint(Blueprint {
            subtype_id,
            display_name,
            prerequisites,
            batch_yield,
        });
    }

    // Cube blocks: <Definition> (possibly with an xsi:type attribute)
    // holding a <Components> bill of attribute-style entries.
    let definition_re = Regex::new(r"(?s)<Definition(?:\s[^>]*)?>(.*?)</Definition>")?;
    let cube_size_re = Regex::new(r"<CubeSize>(\w+)</CubeSize>")?;
    let bill_section_re = Regex::new(r"(?s)<Components>(.*?)</Components>")?;
    let bill_item_re = Regex::new(r"<Component\s+([^>]*?)/?>")?;
    let bill_subtype_re = Regex::new(r#"Subtype="([^"]*)""#)?;
    let bill_count_re = Regex::new(r#"Count="([^"]*)""#)?;

    for cap in definition_re.captures_iter(text) {
        let chunk = &cap[1];
        let subtype = subtype_re.captures(chunk).map(|c| c[1].to_string());
        let display = display_re.captures(chunk).map(|c| c[1].to_string());
        let size = cube_size_re.captures(chunk).map(|c| c[1].to_string());
        let (Some(subtype_id), Some(display_name), Some(cube_size)) = (subtype, display, size)
        else {
            continue;
        };

        let mut bill: Vec<(String, i64)> = Vec::new();
        if let Some(section) = bill_section_re.captures(chunk) {
            for item in bill_item_re.captures_iter(&section[1]) {
                let attrs = &item[1];
                let item_subtype = bill_subtype_re.captures(attrs).map(|c| c[1].to_string());
                let count = bill_count_re
                    .captures(attrs)
                    .and_then(|c| c[1].parse::<i64>().ok());
                match (item_subtype, count) {
                    (Some(item_subtype), Some(count)) => {
                        match bill.iter_mut().find(|(s, _)| *s == item_subtype) {
                            Some((_, total)) => *total += count,
                            None => bill.push((item_subtype, count)),
                        }
                    }
                    _ => eprintln!("  Skipping malformed bill entry in block '{display_name}'"),
                }
            }
        }

        parsed.add_block(BlockDefinition {
            subtype_id,
            display_name,
            cube_size,
            components: bill,
        });
    }

    Ok(())
}

/// Merge repeated prerequisite lines for the same SubtypeId, keeping
/// the first line's TypeId.
fn merge_ingredient(
    prerequisites: &mut Vec<Ingredient>,
    subtype_id: String,
    type_id: String,
    amount: f64,
) {
    match prerequisites
        .iter_mut()
        .find(|existing| existing.subtype_id == subtype_id)
    {
        Some(existing) => existing.amount += amount,
        None => prerequisites.push(Ingredient {
            subtype_id,
            type_id,
            amount,
        }),
    }
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub files: usize,
    pub components: usize,
    pub blueprints: usize,
    pub blocks: usize,
    pub errors: usize,
}

impl std::fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parsed {} files: {} components, {} blueprints, {} blocks. Errors: {}",
            self.files, self.components, self.blueprints, self.blocks, self.errors
        )
    }
}
