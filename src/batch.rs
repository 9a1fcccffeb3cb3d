//! CSV batch mapping
//!
//! Reads the `term` column of an input CSV, maps every term in order and
//! writes one `CONCEPT_ID,CODE,NAME,REASON` row per input row.

use crate::error::{MapperError, Result};
use crate::mapping::{ConceptMapper, MappingResult};
use csv::{ReaderBuilder, WriterBuilder};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const TERM_COLUMN: &str = "term";
pub const OUTPUT_HEADER: [&str; 4] = ["CONCEPT_ID", "CODE", "NAME", "REASON"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub terms: usize,
    /// Rows that came back without a concept id
    pub unparsed: usize,
    pub output: PathBuf,
}

/// Terms from the `term` column, in file order.
pub fn read_terms<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let term_idx = rdr
        .headers()?
        .iter()
        .position(|h| h.trim() == TERM_COLUMN)
        .ok_or_else(|| {
            MapperError::InvalidInput(format!("input CSV has no '{}' column", TERM_COLUMN))
        })?;

    let mut terms = Vec::new();
    for record in rdr.records() {
        let record = record?;
        terms.push(record.get(term_idx).unwrap_or("").trim().to_string());
    }
    Ok(terms)
}

/// The header row is written even when there are no results.
pub fn write_mappings<W: Write>(writer: W, results: &[MappingResult]) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(OUTPUT_HEADER)?;
    for result in results {
        wtr.serialize(result)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Map every term sequentially. Stops at the first mapping error.
pub async fn map_terms(mapper: &dyn ConceptMapper, terms: &[String]) -> Result<Vec<MappingResult>> {
    let mut results = Vec::with_capacity(terms.len());
    for (i, term) in terms.iter().enumerate() {
        info!("Mapping term {}/{}: {}", i + 1, terms.len(), term);
        results.push(mapper.map_term(term).await?);
    }
    Ok(results)
}

pub async fn run_batch(
    mapper: &dyn ConceptMapper,
    input: &Path,
    output: &Path,
) -> Result<BatchSummary> {
    info!("Reading terms from {:?}", input);
    let terms = read_terms(std::fs::File::open(input)?)?;

    let results = map_terms(mapper, &terms).await?;
    write_mappings(std::fs::File::create(output)?, &results)?;

    let summary = BatchSummary {
        terms: results.len(),
        unparsed: results.iter().filter(|r| r.is_unmapped()).count(),
        output: output.to_path_buf(),
    };
    info!(
        "Wrote {} mappings ({} unparsed) to {:?}",
        summary.terms, summary.unparsed, summary.output
    );
    Ok(summary)
}
