use anyhow::{Context, Result};
use std::io::Read;

/// Used when no species are given on the command line or in a file.
pub const DEFAULT_SPECIES: &[&str] = &["Gymnorhina tibicen", "Corvus orru"];

/// Parse a species list: one scientific name per line, `#` starts a comment.
pub fn parse_species_list(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a species list from `path`, or from stdin when `path` is `-`.
pub fn read_species_file(path: &str) -> Result<Vec<String>> {
    let text = if path == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read species list from stdin")?;
        text
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read species list {path}"))?
    };
    Ok(parse_species_list(&text))
}

/// Combine command-line names with an optional list file, falling back to
/// [`DEFAULT_SPECIES`] when both are empty.
pub fn collect_species(args: &[String], file: Option<&str>) -> Result<Vec<String>> {
    let mut species: Vec<String> = args
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if let Some(path) = file {
        species.extend(read_species_file(path)?);
    }
    if species.is_empty() {
        species = DEFAULT_SPECIES.iter().map(|s| s.to_string()).collect();
    }
    Ok(species)
}
