use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::extract::ExtractionResult;
use crate::normalize::{self, NormalizedEntry};

/// Reduced export: run metadata plus normalized entries only.
#[derive(Debug, Serialize, Deserialize)]
pub struct CleanExport {
    pub metadata: Metadata,
    pub entries: Vec<NormalizedEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Metadata {
    pub total_records: u64,
    pub extracted_records: u64,
    pub extraction_timestamp: String,
}

/// Write the full extraction result verbatim, raw rows included.
pub fn save_raw(result: &ExtractionResult, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), result)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write the reduced document: metadata plus one normalized entry per row.
pub fn save_clean(result: &ExtractionResult, path: &Path) -> Result<()> {
    let export = CleanExport {
        metadata: Metadata {
            total_records: result.total_records,
            extracted_records: result.extracted_records,
            extraction_timestamp: result.extraction_timestamp.clone(),
        },
        entries: result.entries.iter().map(normalize::normalize).collect(),
    };

    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &export)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Reload a previously saved raw export.
pub fn load_raw(path: &Path) -> Result<ExtractionResult> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let result = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(result)
}

/// Print the first few normalized entries for a quick eyeball check.
pub fn print_samples(result: &ExtractionResult, count: usize) {
    let shown = count.min(result.entries.len());
    if shown == 0 {
        return;
    }

    println!("\nShowing {} sample entries:", shown);
    println!("{}", "-".repeat(80));
    for (i, raw) in result.entries.iter().take(shown).enumerate() {
        let n = normalize::normalize(raw);
        println!("#{} ID: {} | Date: {}", i + 1, n.id, n.date);
        println!("    Query:    {}", n.query);
        println!("    Category: {}", n.category);
        println!("    Author:   {}", n.author);
        println!("{}", "-".repeat(80));
    }
}

/// Top categories by row count, descending.
pub fn category_breakdown(result: &ExtractionResult, top: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for raw in &result.entries {
        let n = normalize::normalize(raw);
        let name = if n.category.is_empty() {
            "Uncategorized".to_string()
        } else {
            n.category
        };
        *counts.entry(name).or_insert(0) += 1;
    }

    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted.truncate(top);
    sorted
}

pub fn print_category_breakdown(result: &ExtractionResult) {
    let breakdown = category_breakdown(result, 10);
    if breakdown.is_empty() {
        return;
    }

    println!("\nCategory distribution:");
    for (category, count) in &breakdown {
        println!("  {:<40} {:>6}", category, count);
    }
}
