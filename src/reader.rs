use crate::blocks::{self, Extraction};
use crate::genotypes::{self, check_dosage};
use crate::loci::validate;
use crate::prelude::*;
use crate::select::{self, drop_monomorphic, parse_markers, select_loci};
use crate::{full_site, polymorphic};
use log::info;
use std::path::{Path, PathBuf};

/// Path of the Arlequin file for one replicate and sub-replicate:
/// `<folder>/<label>_<replicate>_<subreplicate>.arp`.
pub fn arp_path<P: AsRef<Path>>(
    folder: P,
    label: &str,
    replicate: usize,
    subreplicate: usize,
) -> PathBuf {
    folder
        .as_ref()
        .join(format!("{}_{}_{}.arp", label, replicate, subreplicate))
}

/// Reads Arlequin files into genotype tables.
///
/// Settings are chained on a reader and applied to every file it reads.
/// Locus metadata is passed to each read and never modified, so one reader
/// and one metadata table can serve any number of replicates.
pub struct ArpReader {
    chromosomes: Option<Vec<u32>>,
    markers: Vec<String>,
    ploidy: usize,
    separator: String,
    encoding: Encoding,
    deme_names: Option<Vec<String>>,
    drop_monomorphic: bool,
}

impl ArpReader {
    /// Construct a new reader for diploid data, keeping every locus
    pub fn new() -> Self {
        Self {
            chromosomes: None,
            markers: vec!["all".to_owned()],
            ploidy: 2,
            separator: "/".to_owned(),
            encoding: Encoding::default(),
            deme_names: None,
            drop_monomorphic: false,
        }
    }

    pub fn chromosomes(&mut self, chromosomes: &[u32]) -> &mut Self {
        self.chromosomes = Some(chromosomes.to_vec());
        self
    }

    /// Marker kinds to keep: any of `dna`, `snp`, `microsat`, `standard` or
    /// `all`, in any case.
    pub fn markers(&mut self, markers: &[&str]) -> &mut Self {
        self.markers = markers.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn ploidy(&mut self, ploidy: usize) -> &mut Self {
        self.ploidy = ploidy;
        self
    }

    pub fn separator(&mut self, separator: &str) -> &mut Self {
        self.separator = separator.to_owned();
        self
    }

    pub fn encoding(&mut self, encoding: Encoding) -> &mut Self {
        self.encoding = encoding;
        self
    }

    /// Names for the demes, in sample block order.
    pub fn deme_names(&mut self, names: &[&str]) -> &mut Self {
        self.deme_names = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn drop_monomorphic(&mut self, drop: bool) -> &mut Self {
        self.drop_monomorphic = drop;
        self
    }

    /// Locus metadata narrowed to the requested chromosomes and markers.
    ///
    /// Fails on an impossible request before any file is touched.
    pub fn selected_loci(&self, loci: &[LocusMeta]) -> Result<Vec<LocusMeta>> {
        if self.ploidy == 0 {
            return Err(ArpError::unsupported("ploidy must be at least 1"));
        }
        validate(loci)?;
        let markers = parse_markers(&self.markers)?;
        let selected = select_loci(loci, self.chromosomes.as_deref(), markers.as_deref())?;
        if self.encoding == Encoding::SnpDosage {
            check_dosage(&selected, self.ploidy)?;
        }
        Ok(selected)
    }

    /// Reads the haploid locus table of one file, restricted to the
    /// selected loci.
    ///
    /// Returns `None` when the file has no sample data or no polymorphic
    /// sites.
    pub fn read_haploid<P: AsRef<Path>>(
        &self,
        path: P,
        loci: &[LocusMeta],
    ) -> Result<Option<Reconstruction>> {
        let selected = self.selected_loci(loci)?;
        self.haploid(path.as_ref(), loci, &selected)
    }

    fn haploid(
        &self,
        path: &Path,
        loci: &[LocusMeta],
        selected: &[LocusMeta],
    ) -> Result<Option<Reconstruction>> {
        let (raw, layout) = match blocks::extract(path)? {
            Extraction::NoData | Extraction::Monomorphic => return Ok(None),
            Extraction::Samples { raw, layout } => (raw, layout),
        };

        // the raw columns follow the full declaration, so reconstruct
        // every locus before narrowing
        let reconstruction = match layout {
            Layout::FullSite => Reconstruction {
                table: full_site::reconstruct(&raw, loci)?,
                positions: None,
            },
            Layout::Polymorphic(positions) => {
                let (table, resolved) = polymorphic::reconstruct(&raw, &positions, loci)?;
                Reconstruction {
                    table,
                    positions: Some(resolved),
                }
            }
        };

        let mut filtered = select::filter(&reconstruction, selected)?;
        if self.drop_monomorphic {
            filtered.table = drop_monomorphic(&filtered.table)?;
        }
        Ok(Some(filtered))
    }

    /// Reads one file into a table of individuals.
    ///
    /// Returns `None` when the file has no sample data or no polymorphic
    /// sites.
    pub fn read<P: AsRef<Path>>(&self, path: P, loci: &[LocusMeta]) -> Result<Option<GenotypeTable>> {
        let path = path.as_ref();
        let selected = self.selected_loci(loci)?;
        let haploid = match self.haploid(path, loci, &selected)? {
            Some(haploid) => haploid,
            None => return Ok(None),
        };

        let mut table = genotypes::format(
            &haploid.table,
            &selected,
            self.ploidy,
            self.encoding,
            &self.separator,
        )?;
        table.name_demes(self.deme_names.as_deref())?;
        table.positions = haploid.positions;
        table.source = Some(path.to_path_buf());

        info!(
            "read {} individuals x {} columns from {}",
            table.n_individuals(),
            table.columns.len(),
            path.display()
        );
        Ok(Some(table))
    }
}

impl Default for ArpReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_arp_path() {
        assert_eq!(
            arp_path("sims/run", "run", 3, 1),
            PathBuf::from("sims/run/run_3_1.arp")
        );
    }

    #[test]
    fn test_dosage_rejected_before_reading() {
        let loci = vec![LocusMeta::new("C1B1L1", 1, MarkerKind::Microsat, 1)];
        let result = ArpReader::new()
            .encoding(Encoding::SnpDosage)
            .read("/no/such/file.arp", &loci);
        assert!(matches!(result, Err(ArpError::UnsupportedRequest { .. })));
    }

    #[test]
    fn test_dosage_needs_diploid() {
        let loci = vec![LocusMeta::new("C1B1L1", 1, MarkerKind::Dna, 1).actual(MarkerKind::Snp)];
        let result = ArpReader::new()
            .encoding(Encoding::SnpDosage)
            .ploidy(1)
            .selected_loci(&loci);
        assert!(matches!(result, Err(ArpError::UnsupportedRequest { .. })));
    }

    #[test]
    fn test_unknown_marker() {
        let loci = vec![LocusMeta::new("C1B1L1", 1, MarkerKind::Microsat, 1)];
        let result = ArpReader::new().markers(&["allozyme"]).selected_loci(&loci);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_names_path() -> Result<(), Box<dyn Error>> {
        let loci = vec![LocusMeta::new("C1B1L1", 1, MarkerKind::Microsat, 1)];
        match ArpReader::new().read("/no/such/file.arp", &loci) {
            Err(ArpError::NotFound { message }) => assert!(message.contains("/no/such/file.arp")),
            other => panic!("expected NotFound, got {:?}", other),
        }
        Ok(())
    }
}
