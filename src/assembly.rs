//! User blueprint ingestion
//!
//! Reads `bp.sbc` ship blueprint files and pulls out each grid's
//! display name plus the block subtype references placed on it. A
//! blueprint file can hold several grids (ship plus subgrids), and a
//! run can cover several blueprint folders.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use regex::Regex;
use walkdir::WalkDir;

use crate::extract::is_blacklisted;
use crate::models::Grid;

/// Collect `.sbc` blueprint files from each path, which may be a file
/// or a folder to walk, skipping blacklisted subtrees.
pub fn find_blueprint_files(paths: &[PathBuf], blacklist: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            if !is_blacklisted(path, blacklist) {
                files.push(path.clone());
            }
            continue;
        }
        for entry in WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let entry_path = entry.path();
            if is_blacklisted(entry_path, blacklist) {
                continue;
            }
            if entry_path.extension().is_some_and(|ext| ext == "sbc") {
                files.push(entry_path.to_path_buf());
            }
        }
    }
    files
}

/// Parse the grids out of one blueprint file's text.
///
/// Blocks without a subtype name (the empty `<SubtypeName />` form)
/// carry no bill of materials and are ignored, as the reference tool
/// does. A grid without a display name is skipped entirely.
pub fn parse_grids(text: &str) -> Result<Vec<Grid>> {
    let grid_re = Regex::new(r"(?s)<CubeGrid>(.*?)</CubeGrid>")?;
    let display_re = Regex::new(r"<DisplayName>([^<]+)</DisplayName>")?;
    let block_re = Regex::new(r"<SubtypeName>([^<]+)</SubtypeName>")?;

    let mut grids = Vec::new();
    for cap in grid_re.captures_iter(text) {
        let chunk = &cap[1];
        let Some(name) = display_re.captures(chunk).map(|c| c[1].to_string()) else {
            continue;
        };
        let blocks = block_re
            .captures_iter(chunk)
            .map(|c| c[1].to_string())
            .collect();
        grids.push(Grid { name, blocks });
    }
    Ok(grids)
}

/// Read and parse every blueprint file under the given paths,
/// returning the grids in file order.
pub fn load_grids(paths: &[PathBuf], blacklist: &[PathBuf]) -> Result<Vec<Grid>> {
    let files = find_blueprint_files(paths, blacklist);
    println!("Found {} blueprint files", files.len());

    let mut grids = Vec::new();
    for path in &files {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let parsed = parse_grids(&text)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        grids.extend(parsed);
    }
    Ok(grids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_grids_and_block_references() {
        let grids = parse_grids(
            r#"<Definitions>
                <ShipBlueprints>
                    <ShipBlueprint>
                        <DisplayName>Whole Blueprint</DisplayName>
                        <CubeGrids>
                            <CubeGrid>
                                <DisplayName>TestShip</DisplayName>
                                <CubeBlocks>
                                    <MyObjectBuilder_CubeBlock xsi:type="MyObjectBuilder_CubeBlock">
                                        <SubtypeName>LargeBlockArmorBlock</SubtypeName>
                                    </MyObjectBuilder_CubeBlock>
                                    <MyObjectBuilder_CubeBlock xsi:type="MyObjectBuilder_Cockpit">
                                        <SubtypeName>LargeBlockCockpit</SubtypeName>
                                    </MyObjectBuilder_CubeBlock>
                                </CubeBlocks>
                            </CubeGrid>
                            <CubeGrid>
                                <DisplayName>Subgrid</DisplayName>
                                <CubeBlocks>
                                    <MyObjectBuilder_CubeBlock xsi:type="MyObjectBuilder_CubeBlock">
                                        <SubtypeName>SmallBlockArmorBlock</SubtypeName>
                                    </MyObjectBuilder_CubeBlock>
                                </CubeBlocks>
                            </CubeGrid>
                        </CubeGrids>
                    </ShipBlueprint>
                </ShipBlueprints>
            </Definitions>"#,
        )
        .unwrap();

        assert_eq!(grids.len(), 2);
        assert_eq!(grids[0].name, "TestShip");
        assert_eq!(
            grids[0].blocks,
            vec!["LargeBlockArmorBlock".to_string(), "LargeBlockCockpit".to_string()]
        );
        assert_eq!(grids[1].name, "Subgrid");
        assert_eq!(grids[1].blocks, vec!["SmallBlockArmorBlock".to_string()]);
    }

    #[test]
    fn empty_subtype_names_are_ignored() {
        let grids = parse_grids(
            r#"<CubeGrid>
                <DisplayName>Ship</DisplayName>
                <CubeBlocks>
                    <MyObjectBuilder_CubeBlock>
                        <SubtypeName />
                    </MyObjectBuilder_CubeBlock>
                    <MyObjectBuilder_CubeBlock>
                        <SubtypeName>LargeBlockGyro</SubtypeName>
                    </MyObjectBuilder_CubeBlock>
                </CubeBlocks>
            </CubeGrid>"#,
        )
        .unwrap();

        assert_eq!(grids.len(), 1);
        assert_eq!(grids[0].blocks, vec!["LargeBlockGyro".to_string()]);
    }

    #[test]
    fn nameless_grid_is_skipped() {
        let grids = parse_grids(
            r#"<CubeGrid>
                <CubeBlocks>
                    <MyObjectBuilder_CubeBlock>
                        <SubtypeName>LargeBlockGyro</SubtypeName>
                    </MyObjectBuilder_CubeBlock>
                </CubeBlocks>
            </CubeGrid>"#,
        )
        .unwrap();
        assert!(grids.is_empty());
    }
}
