//! CSV seeding for the ingredient and tag catalogs.
//!
//! `load-ingredients` expects `name,measurement_unit` rows and
//! `load-tags` expects `name,color,slug` rows. Existing entries are
//! skipped so both commands are safe to re-run.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::db::PantryDb;

#[derive(Debug, Default, PartialEq)]
pub struct LoadStats {
    pub created: usize,
    pub skipped: usize,
}

pub fn load_ingredients(db: &PantryDb, path: &Path) -> Result<LoadStats> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut stats = LoadStats::default();
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        let [name, measurement_unit] = fields.as_slice() else {
            bail!("{}:{}: expected 2 columns, got {}", path.display(), line_no + 1, fields.len());
        };
        if db.find_ingredient(name, measurement_unit)?.is_some() {
            stats.skipped += 1;
        } else {
            db.create_ingredient(name, measurement_unit)?;
            stats.created += 1;
        }
    }
    Ok(stats)
}

pub fn load_tags(db: &PantryDb, path: &Path) -> Result<LoadStats> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut stats = LoadStats::default();
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        let [name, color, slug] = fields.as_slice() else {
            bail!("{}:{}: expected 3 columns, got {}", path.display(), line_no + 1, fields.len());
        };
        if db.tag_by_slug(slug)?.is_some() {
            stats.skipped += 1;
        } else {
            db.create_tag(name, color, slug)?;
            stats.created += 1;
        }
    }
    Ok(stats)
}

/// Split one CSV line on commas, honoring double-quoted fields with
/// `""` escapes. Ingredient names in the source data contain commas.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
