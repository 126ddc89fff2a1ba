//! JSON output for the index, word counts and search results
//!
//! Output is pretty-printed with tab indentation. Every map is a `BTreeMap`,
//! so keys come out sorted and the files are deterministic.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::models::SearchResult;
use crate::shared_index::SharedIndex;

/// Serialize `value` to `writer` as tab-indented JSON
pub fn write_pretty<T, W>(value: &T, writer: W) -> Result<()>
where
    T: Serialize + ?Sized,
    W: Write,
{
    let formatter = PrettyFormatter::with_indent(b"\t");
    let mut serializer = Serializer::with_formatter(writer, formatter);
    value
        .serialize(&mut serializer)
        .context("Failed to serialize JSON")?;
    Ok(())
}

/// Serialize `value` to a tab-indented JSON string
pub fn to_pretty_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buffer = Vec::new();
    write_pretty(value, &mut buffer)?;
    String::from_utf8(buffer).context("Serialized JSON was not valid UTF-8")
}

/// Write `value` to the file at `path`, replacing any existing file
pub fn write_file<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_pretty(value, &mut writer)?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

/// Write word → location → positions, holding the read lock throughout
pub fn write_index(index: &SharedIndex, path: &Path) -> Result<()> {
    index.with_read(|index| write_file(index.positions(), path))
}

/// Write location → word count, holding the read lock throughout
pub fn write_counts(index: &SharedIndex, path: &Path) -> Result<()> {
    index.with_read(|index| write_file(index.counts(), path))
}

/// Write canonical query → ranked results
pub fn write_results(results: &BTreeMap<String, Vec<SearchResult>>, path: &Path) -> Result<()> {
    write_file(results, path)
}
