//! Locates the polymorphic-site annotation and the per-deme sample blocks
//! of an Arlequin file and turns them into a raw token matrix.

use crate::prelude::*;
use log::{debug, warn};
use ndarray;
use std::fs;
use std::path::Path;

const POLYMORPHIC_MARKER: &str = "polymorphic positions on";
const SAMPLE_MARKER: &str = "SampleData=";
const BLOCK_END: &str = "}";

/// What an Arlequin file holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// No sample-data blocks at all
    NoData,
    /// The annotation reports zero polymorphic sites on every chromosome
    Monomorphic,
    Samples { raw: RawSamples, layout: Layout },
}

/// Reads and extracts one Arlequin file.
pub fn extract(path: &Path) -> Result<Extraction> {
    if !path.exists() {
        return Err(ArpError::not_found(format!(
            "file {} does not exist",
            path.display()
        )));
    }
    let text = fs::read_to_string(path)?;
    let extraction = parse(&text)?;
    match &extraction {
        Extraction::NoData => warn!("no sample data in {}", path.display()),
        Extraction::Monomorphic => warn!("no polymorphic sites in {}", path.display()),
        Extraction::Samples { .. } => {}
    }
    Ok(extraction)
}

/// Extracts the contents of an Arlequin file already in memory.
pub fn parse(text: &str) -> Result<Extraction> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let layout = match polymorphic_positions(&lines)? {
        None => Layout::FullSite,
        Some(positions) if positions.is_empty() => return Ok(Extraction::Monomorphic),
        Some(positions) => Layout::Polymorphic(positions),
    };

    let blocks = sample_blocks(&lines)?;
    if blocks.iter().all(|rows| rows.is_empty()) {
        return Ok(Extraction::NoData);
    }
    let raw = assemble(blocks)?;
    debug!(
        "extracted {} samples x {} columns ({})",
        raw.n_rows(),
        raw.width(),
        match &layout {
            Layout::FullSite => "full sites".to_owned(),
            Layout::Polymorphic(p) => format!("{} polymorphic sites", p.len()),
        }
    );
    Ok(Extraction::Samples { raw, layout })
}

/// Collects the positions listed after each "N polymorphic positions on
/// chromosome C" line.
///
/// Returns `None` when the file carries no such annotation, and an empty
/// list when it does but every chromosome reports zero sites.
fn polymorphic_positions(lines: &[&str]) -> Result<Option<Vec<PolyPosition>>> {
    let mut found = false;
    let mut positions = vec![];
    for (i, line) in lines.iter().enumerate() {
        let at = match line.find(POLYMORPHIC_MARKER) {
            Some(at) => at,
            None => continue,
        };
        found = true;

        let count: usize = parse_number(&line[..at], line)?;
        let chromosome: u32 = parse_number(
            line[at + POLYMORPHIC_MARKER.len()..]
                .split_whitespace()
                .last()
                .unwrap_or(""),
            line,
        )?;
        if count == 0 {
            continue;
        }

        let list = lines.get(i + 1).ok_or_else(|| {
            ArpError::inconsistent(format!("missing position list after '{}'", line))
        })?;
        let sites = list
            .trim_start_matches('#')
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|x| !x.is_empty())
            .map(|x| parse_number::<u64>(x, list))
            .collect::<Result<Vec<_>>>()?;
        if sites.len() != count {
            return Err(ArpError::inconsistent(format!(
                "chromosome {} reports {} polymorphic positions but lists {}",
                chromosome,
                count,
                sites.len()
            )));
        }
        positions.extend(sites.into_iter().map(|position| PolyPosition {
            chromosome,
            position,
        }));
    }
    Ok(if found { Some(positions) } else { None })
}

fn parse_number<T: std::str::FromStr>(field: &str, line: &str) -> Result<T> {
    field
        .trim_matches(|c: char| !c.is_ascii_digit())
        .parse()
        .map_err(|_| ArpError::inconsistent(format!("expected a number in '{}'", line)))
}

type SampleRow = (String, Vec<String>);

/// Rows of every "SampleData=" block, one list per deme.
fn sample_blocks(lines: &[&str]) -> Result<Vec<Vec<SampleRow>>> {
    let mut blocks = vec![];
    let mut i = 0;
    while i < lines.len() {
        if !lines[i].contains(SAMPLE_MARKER) {
            i += 1;
            continue;
        }
        let start = i + 1;
        let end = lines[start..]
            .iter()
            .position(|line| *line == BLOCK_END)
            .map(|offset| start + offset)
            .ok_or_else(|| {
                ArpError::inconsistent(format!("sample block {} is never closed", blocks.len() + 1))
            })?;
        let rows = lines[start..end]
            .iter()
            .map(|line| sample_row(line))
            .collect::<Result<Vec<_>>>()?;
        blocks.push(rows);
        i = end + 1;
    }
    Ok(blocks)
}

/// `<id> <frequency> <token>...`; the frequency is dropped.
fn sample_row(line: &str) -> Result<SampleRow> {
    let mut fields = line.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(id), Some(_frequency)) => Ok((id.to_owned(), fields.map(str::to_owned).collect())),
        _ => Err(ArpError::inconsistent(format!(
            "sample line '{}' has no frequency field",
            line
        ))),
    }
}

fn assemble(blocks: Vec<Vec<SampleRow>>) -> Result<RawSamples> {
    let width = blocks
        .iter()
        .flatten()
        .next()
        .map(|(_, tokens)| tokens.len())
        .unwrap_or(0);

    let mut ids = vec![];
    let mut demes = vec![];
    let mut values = vec![];
    for (deme, rows) in blocks.into_iter().enumerate() {
        for (id, tokens) in rows {
            if tokens.len() != width {
                return Err(ArpError::inconsistent(format!(
                    "sample '{}' has {} tokens, expected {}",
                    id,
                    tokens.len(),
                    width
                )));
            }
            ids.push(id);
            demes.push(deme + 1);
            values.extend(tokens);
        }
    }

    let data = ndarray::Array2::from_shape_vec((ids.len(), width), values)?;
    Ok(RawSamples {
        ids,
        demes,
        columns: (1..=width).map(|i| format!("V{}", i)).collect(),
        data,
    })
}
