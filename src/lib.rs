#![crate_name = "arlequin"]
use ndarray;
use ndarray::ShapeBuilder;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

pub mod prelude;

pub mod blocks;
pub mod error;
pub mod full_site;
pub mod genotypes;
pub mod loci;
pub mod output;
pub mod polymorphic;
pub mod reader;
pub mod select;

pub use error::{ArpError, Result};

/// Biological data type of a locus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum MarkerKind {
    Dna,
    Snp,
    Microsat,
    Standard,
}

impl MarkerKind {
    /// DNA and SNP loci are emitted as character blobs.
    pub fn is_sequence(self) -> bool {
        matches!(self, MarkerKind::Dna | MarkerKind::Snp)
    }
}

impl FromStr for MarkerKind {
    type Err = ArpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DNA" => Ok(MarkerKind::Dna),
            "SNP" => Ok(MarkerKind::Snp),
            "MICROSAT" => Ok(MarkerKind::Microsat),
            "STANDARD" => Ok(MarkerKind::Standard),
            _ => Err(ArpError::unsupported(format!("unknown marker kind '{}'", s))),
        }
    }
}

impl TryFrom<String> for MarkerKind {
    type Error = ArpError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarkerKind::Dna => "DNA",
            MarkerKind::Snp => "SNP",
            MarkerKind::Microsat => "MICROSAT",
            MarkerKind::Standard => "STANDARD",
        };
        f.write_str(name)
    }
}

/// A variable site reported in the polymorphic-sites annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolyPosition {
    pub chromosome: u32,
    pub position: u64,
}

/// A `PolyPosition` attached to its owning locus and raw column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPosition {
    pub chromosome: u32,
    pub position: u64,
    pub locus: String,
    pub kind: MarkerKind,
    pub actual_kind: MarkerKind,
    /// Raw data column holding this site
    pub column: usize,
    /// Character index of the site inside a sequence token
    pub offset: usize,
}

/// Ordered mapping from locus name to the half-open range of data columns
/// it occupies. Ranges are appended back to back so they always partition
/// the columns of the table they describe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocusMap {
    spans: Vec<(String, Range<usize>)>,
}

impl LocusMap {
    pub fn new() -> Self {
        Self { spans: vec![] }
    }

    /// Appends a locus `width` columns wide and returns its range.
    pub fn push(&mut self, name: &str, width: usize) -> Range<usize> {
        let start = self.width();
        let range = start..start + width;
        self.spans.push((name.to_owned(), range.clone()));
        range
    }

    pub fn get(&self, name: &str) -> Option<Range<usize>> {
        self.spans
            .iter()
            .find(|(locus, _)| locus == name)
            .map(|(_, range)| range.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.spans.iter().any(|(locus, _)| locus == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Range<usize>)> + '_ {
        self.spans
            .iter()
            .map(|(name, range)| (name.as_str(), range.clone()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.spans.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Total number of columns covered.
    pub fn width(&self) -> usize {
        self.spans.last().map(|(_, range)| range.end).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Haploid samples straight out of the sample-data blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSamples {
    pub ids: Vec<String>,
    /// 1-based deme index, numbered by block order
    pub demes: Vec<usize>,
    pub columns: Vec<String>,
    pub data: ndarray::Array2<String>,
}

impl RawSamples {
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }
}

/// Haploid samples with data columns grouped by locus.
#[derive(Debug, Clone, PartialEq)]
pub struct LocusTable {
    pub ids: Vec<String>,
    pub demes: Vec<usize>,
    pub columns: Vec<String>,
    pub data: ndarray::Array2<String>,
    pub loci: LocusMap,
}

impl LocusTable {
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    /// Column names belonging to one locus.
    pub fn locus_columns(&self, name: &str) -> Option<&[String]> {
        self.loci.get(name).map(|range| &self.columns[range])
    }

    /// Copies the listed loci, in table order, into a new table.
    ///
    /// Names that are not in the table are ignored.
    pub fn project(&self, names: &[&str]) -> Result<LocusTable> {
        let wanted: HashSet<&str> = names.iter().copied().collect();
        let keep: Vec<(&str, Vec<usize>)> = self
            .loci
            .iter()
            .filter(|(name, _)| wanted.contains(name))
            .map(|(name, range)| (name, range.collect()))
            .collect();
        self.select_columns(&keep)
    }

    /// Builds a new table from per-locus lists of column indices.
    pub(crate) fn select_columns(&self, keep: &[(&str, Vec<usize>)]) -> Result<LocusTable> {
        let mut builder = LocusTableBuilder::new(self.ids.clone(), self.demes.clone());
        for (name, indices) in keep {
            let columns = indices
                .iter()
                .map(|&c| (self.columns[c].clone(), self.data.column(c).to_vec()))
                .collect();
            builder.push_named(name, columns)?;
        }
        builder.build()
    }
}

/// Accumulates locus columns and assembles them into a `LocusTable`.
pub struct LocusTableBuilder {
    ids: Vec<String>,
    demes: Vec<usize>,
    columns: Vec<String>,
    values: Vec<String>,
    loci: LocusMap,
}

impl LocusTableBuilder {
    pub fn new(ids: Vec<String>, demes: Vec<usize>) -> Self {
        Self {
            ids,
            demes,
            columns: vec![],
            values: vec![],
            loci: LocusMap::new(),
        }
    }

    /// Adds a locus, naming its columns after the locus.
    ///
    /// A single column keeps the locus name; several columns get the locus
    /// name plus a zero-padded 1-based site index (`L_01`, `L_02`, ...).
    pub fn push_locus(&mut self, name: &str, columns: Vec<Vec<String>>) -> Result<()> {
        let width = columns.len();
        let pad = width.to_string().len();
        let named = columns
            .into_iter()
            .enumerate()
            .map(|(i, column)| {
                let label = if width == 1 {
                    name.to_owned()
                } else {
                    format!("{}_{:0pad$}", name, i + 1, pad = pad)
                };
                (label, column)
            })
            .collect();
        self.push_named(name, named)
    }

    /// Adds a locus whose columns already carry their final names.
    pub fn push_named(&mut self, name: &str, columns: Vec<(String, Vec<String>)>) -> Result<()> {
        if columns.is_empty() {
            return Ok(());
        }
        if self.loci.contains(name) {
            return Err(ArpError::inconsistent(format!(
                "locus '{}' appears more than once",
                name
            )));
        }
        for (label, values) in columns.iter() {
            if values.len() != self.ids.len() {
                return Err(ArpError::inconsistent(format!(
                    "column '{}' has {} values for {} samples",
                    label,
                    values.len(),
                    self.ids.len()
                )));
            }
        }
        self.loci.push(name, columns.len());
        for (label, values) in columns {
            self.columns.push(label);
            self.values.extend(values);
        }
        Ok(())
    }

    pub fn build(self) -> Result<LocusTable> {
        let shape = (self.ids.len(), self.columns.len());
        // values were pushed column by column
        let data = ndarray::Array2::from_shape_vec(shape.f(), self.values)?;
        Ok(LocusTable {
            ids: self.ids,
            demes: self.demes,
            columns: self.columns,
            data,
            loci: self.loci,
        })
    }
}

/// Which layout the sample data was written in.
#[derive(Debug, Clone, PartialEq)]
pub enum Layout {
    /// Genotypes at every site
    FullSite,
    /// Only variable sites, listed in the annotation
    Polymorphic(Vec<PolyPosition>),
}

/// The haploid table produced by either layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub table: LocusTable,
    pub positions: Option<Vec<ResolvedPosition>>,
}
