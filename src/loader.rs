//! Declaration discovery and parsing
//!
//! A declaration is a `convoy.toml` or `convoy.json` file mapping resource
//! names to specs. Resources keep the order they are written in, across files
//! in path order.

use reconcile::{DeclaredResource, Error, ResourceSpec, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File names recognized as declarations
pub const DECLARATION_FILES: [&str; 2] = ["convoy.toml", "convoy.json"];

fn spec_error(path: &Path, message: impl Into<String>) -> Error {
    Error::SpecParse {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Find declaration files under `dir`, at most `depth` levels down
pub fn discover(dir: &Path, depth: usize) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(depth.max(1))
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| spec_error(dir, e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if DECLARATION_FILES.contains(&name.as_ref()) {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

/// Parse one declaration file into (name, spec) pairs in written order
pub fn parse_file(path: &Path) -> Result<Vec<(String, ResourceSpec)>> {
    let content = fs::read_to_string(path).map_err(|e| spec_error(path, e.to_string()))?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    if is_json {
        parse_json(path, &content)
    } else {
        parse_toml(path, &content)
    }
}

fn parse_toml(path: &Path, content: &str) -> Result<Vec<(String, ResourceSpec)>> {
    let table: toml::Table = toml::from_str(content).map_err(|e| spec_error(path, e.to_string()))?;
    table
        .into_iter()
        .map(|(name, value)| {
            let spec: ResourceSpec = value
                .try_into()
                .map_err(|e| spec_error(path, format!("resource {name}: {e}")))?;
            Ok((name, spec))
        })
        .collect()
}

fn parse_json(path: &Path, content: &str) -> Result<Vec<(String, ResourceSpec)>> {
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(content).map_err(|e| spec_error(path, e.to_string()))?;
    map.into_iter()
        .map(|(name, value)| {
            let spec: ResourceSpec = serde_json::from_value(value)
                .map_err(|e| spec_error(path, format!("resource {name}: {e}")))?;
            Ok((name, spec))
        })
        .collect()
}

/// Load every resource declared under `dir`.
///
/// Local file sources resolve against the directory of the declaration that
/// names them. A resource name may only be declared once.
pub fn load_resources(dir: &Path, depth: usize) -> Result<Vec<DeclaredResource>> {
    let mut resources = Vec::new();
    let mut seen = HashSet::new();

    for path in discover(dir, depth)? {
        let source_dir = path.parent().unwrap_or(dir).to_path_buf();
        let entries = parse_file(&path)?;
        log::debug!("Found {} resources in {}", entries.len(), path.display());

        for (name, spec) in entries {
            if !seen.insert(name.clone()) {
                return Err(spec_error(
                    &path,
                    format!("resource {name} is declared more than once"),
                ));
            }
            resources.push(DeclaredResource::new(&name, spec, source_dir.clone()));
        }
    }
    Ok(resources)
}
