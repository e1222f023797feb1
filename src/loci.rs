use crate::prelude::*;
use csv;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::Path;

/// One declared locus of the simulated genome.
///
/// Column and character coordinates are 1-based and inclusive, the way the
/// simulator parameters are written. `kind` is how the block was simulated
/// and `actual_kind` how it should be reported: a DNA block of length one is
/// simulated as `DNA` but reported as `SNP`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LocusMeta {
    pub name: String,
    pub block: String,
    pub chromosome: u32,
    pub kind: MarkerKind,
    pub actual_kind: MarkerKind,
    pub column_start: usize,
    pub column_end: usize,
    #[serde(default)]
    pub dna_start: Option<usize>,
    #[serde(default)]
    pub dna_end: Option<usize>,
    pub chrom_position: u64,
}

impl LocusMeta {
    /// A single-column locus of the given kind.
    pub fn new(name: &str, chromosome: u32, kind: MarkerKind, column: usize) -> Self {
        Self {
            name: name.into(),
            block: name.into(),
            chromosome,
            kind,
            actual_kind: kind,
            column_start: column,
            column_end: column,
            dna_start: None,
            dna_end: None,
            chrom_position: 0,
        }
    }

    pub fn block(mut self, block: &str) -> Self {
        self.block = block.into();
        self
    }

    pub fn actual(mut self, kind: MarkerKind) -> Self {
        self.actual_kind = kind;
        self
    }

    pub fn columns(mut self, start: usize, end: usize) -> Self {
        self.column_start = start;
        self.column_end = end;
        self
    }

    pub fn dna_range(mut self, start: usize, end: usize) -> Self {
        self.dna_start = Some(start);
        self.dna_end = Some(end);
        self
    }

    pub fn chrom_position(mut self, position: u64) -> Self {
        self.chrom_position = position;
        self
    }

    /// Raw data columns as a 0-based half-open range.
    pub fn raw_columns(&self) -> Range<usize> {
        self.column_start.saturating_sub(1)..self.column_end
    }

    /// The characters of a sequence token of length `len` that belong to
    /// this locus, as a 0-based half-open range. Defaults to the whole token.
    pub fn dna_chars(&self, len: usize) -> Result<Range<usize>> {
        let start = self.dna_start.unwrap_or(1);
        let end = self.dna_end.unwrap_or(len);
        if end > len {
            return Err(ArpError::inconsistent(format!(
                "locus '{}' ends at character {} of a {} character sequence",
                self.name, end, len
            )));
        }
        Ok(start.saturating_sub(1)..end)
    }

    /// Reads locus metadata from CSV with a header row.
    ///
    /// Expected columns: `name, block, chromosome, kind, actual_kind,
    /// column_start, column_end, dna_start, dna_end, chrom_position`. The
    /// DNA character range may be left empty.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<LocusMeta>> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let loci = rdr
            .deserialize()
            .collect::<std::result::Result<Vec<LocusMeta>, csv::Error>>()?;
        validate(&loci)?;
        Ok(loci)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<LocusMeta>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ArpError::not_found(format!(
                "file {} does not exist",
                path.display()
            )));
        }
        Self::from_reader(File::open(path)?)
    }
}

/// Checks the metadata rows against each other.
pub fn validate(loci: &[LocusMeta]) -> Result<()> {
    let mut names = HashSet::new();
    for locus in loci {
        if !names.insert(locus.name.as_str()) {
            return Err(ArpError::inconsistent(format!(
                "locus '{}' is declared more than once",
                locus.name
            )));
        }
        if locus.chromosome == 0 {
            return Err(ArpError::inconsistent(format!(
                "locus '{}' has chromosome 0, chromosomes are numbered from 1",
                locus.name
            )));
        }
        if locus.column_start == 0 || locus.column_start > locus.column_end {
            return Err(ArpError::inconsistent(format!(
                "locus '{}' has invalid columns {}..={}",
                locus.name, locus.column_start, locus.column_end
            )));
        }
        if let (Some(start), Some(end)) = (locus.dna_start, locus.dna_end) {
            if start == 0 || start > end {
                return Err(ArpError::inconsistent(format!(
                    "locus '{}' has invalid characters {}..={}",
                    locus.name, start, end
                )));
            }
        }
    }
    Ok(())
}

/// Highest chromosome number declared.
pub fn max_chromosome(loci: &[LocusMeta]) -> u32 {
    loci.iter().map(|l| l.chromosome).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    const LOCI: &str = "\
name,block,chromosome,kind,actual_kind,column_start,column_end,dna_start,dna_end,chrom_position
C1B1L1,C1B1,1,dna,DNA,1,1,1,10,0
C1B1L2,C1B1,1,DNA,snp,1,1,11,11,10
C2B1L1,C2B1,2,MICROSAT,MICROSAT,2,2,,,0
";

    #[test]
    fn test_loci_from_csv() -> Result<(), Box<dyn Error>> {
        let loci = LocusMeta::from_reader(LOCI.as_bytes())?;
        assert_eq!(loci.len(), 3);
        assert_eq!(loci[1].kind, MarkerKind::Dna);
        assert_eq!(loci[1].actual_kind, MarkerKind::Snp);
        assert_eq!(loci[1].dna_chars(20)?, 10..11);
        assert_eq!(loci[2].dna_start, None);
        assert_eq!(loci[2].raw_columns(), 1..2);
        assert_eq!(max_chromosome(&loci), 2);
        Ok(())
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let text = "name,block,chromosome,kind,actual_kind,column_start,column_end,dna_start,dna_end,chrom_position\n\
                    L,B,1,RFLP,RFLP,1,1,,,0\n";
        assert!(LocusMeta::from_reader(text.as_bytes()).is_err());
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let loci = vec![
            LocusMeta::new("L", 1, MarkerKind::Microsat, 1),
            LocusMeta::new("L", 1, MarkerKind::Microsat, 2),
        ];
        assert!(validate(&loci).is_err());
    }

    #[test]
    fn test_dna_chars_default_to_whole_token() -> Result<(), Box<dyn Error>> {
        let locus = LocusMeta::new("L", 1, MarkerKind::Dna, 1);
        assert_eq!(locus.dna_chars(7)?, 0..7);
        assert!(locus.dna_range(3, 9).dna_chars(7).is_err());
        Ok(())
    }

    #[test]
    fn test_missing_metadata_file() {
        match LocusMeta::from_path("/does/not/exist.csv") {
            Err(ArpError::NotFound { message }) => assert!(message.contains("exist.csv")),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
