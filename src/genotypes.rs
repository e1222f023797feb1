use crate::prelude::*;
use log::debug;
use ndarray;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// How the copies of an individual's genotype are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// One column per copy, named `<column>.<copy>`
    Separate,
    /// One column per locus column, copies joined by the separator
    SingleColumn,
    /// Diploid SNPs as the number of non-majority alleles
    SnpDosage,
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::Separate
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Genotypes {
    Alleles(ndarray::Array2<String>),
    Dosage(ndarray::Array2<u8>),
}

impl Genotypes {
    pub fn ncols(&self) -> usize {
        match self {
            Genotypes::Alleles(data) => data.ncols(),
            Genotypes::Dosage(data) => data.ncols(),
        }
    }

    /// Cell `[row, column]` as text.
    pub fn value(&self, row: usize, column: usize) -> String {
        match self {
            Genotypes::Alleles(data) => data[[row, column]].clone(),
            Genotypes::Dosage(data) => data[[row, column]].to_string(),
        }
    }

    fn select_columns(&self, indices: &[usize]) -> Genotypes {
        match self {
            Genotypes::Alleles(data) => Genotypes::Alleles(ndarray::Array2::from_shape_fn(
                (data.nrows(), indices.len()),
                |(r, c)| data[[r, indices[c]]].clone(),
            )),
            Genotypes::Dosage(data) => Genotypes::Dosage(ndarray::Array2::from_shape_fn(
                (data.nrows(), indices.len()),
                |(r, c)| data[[r, indices[c]]],
            )),
        }
    }
}

/// One row per individual.
#[derive(Debug, Clone, PartialEq)]
pub struct GenotypeTable {
    pub ids: Vec<String>,
    pub demes: Vec<usize>,
    /// Deme names, filled in by `name_demes`
    pub deme_names: Vec<String>,
    pub columns: Vec<String>,
    pub genotypes: Genotypes,
    pub positions: Option<Vec<ResolvedPosition>>,
    pub source: Option<PathBuf>,
}

impl GenotypeTable {
    pub fn n_individuals(&self) -> usize {
        self.ids.len()
    }

    /// Resolves deme indices to names. Index `i` takes `names[i - 1]`;
    /// without names the index itself is used.
    pub fn name_demes(&mut self, names: Option<&[String]>) -> Result<()> {
        self.deme_names = self
            .demes
            .iter()
            .map(|&deme| match names {
                None => Ok(deme.to_string()),
                Some(names) => deme.checked_sub(1).and_then(|i| names.get(i)).cloned().ok_or_else(|| {
                    ArpError::inconsistent(format!(
                        "deme {} has no name ({} names given)",
                        deme,
                        names.len()
                    ))
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(())
    }

    /// Splits the genotype columns into one table per chromosome, using the
    /// `C<n>` prefix of the column names (`C2B1L3.1` is on chromosome 2).
    pub fn split_by_chromosome(&self) -> Result<BTreeMap<u32, GenotypeTable>> {
        let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (i, name) in self.columns.iter().enumerate() {
            let chromosome = chromosome_prefix(name).ok_or_else(|| {
                ArpError::inconsistent(format!("column '{}' has no chromosome prefix", name))
            })?;
            groups.entry(chromosome).or_default().push(i);
        }
        Ok(groups
            .into_iter()
            .map(|(chromosome, indices)| {
                let table = GenotypeTable {
                    ids: self.ids.clone(),
                    demes: self.demes.clone(),
                    deme_names: self.deme_names.clone(),
                    columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
                    genotypes: self.genotypes.select_columns(&indices),
                    positions: self.positions.as_ref().map(|positions| {
                        positions
                            .iter()
                            .filter(|p| p.chromosome == chromosome)
                            .cloned()
                            .collect()
                    }),
                    source: self.source.clone(),
                };
                (chromosome, table)
            })
            .collect())
    }
}

fn chromosome_prefix(name: &str) -> Option<u32> {
    let rest = name.strip_prefix('C')?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Rejects SNP dosage coding unless every locus is a SNP and the samples
/// are diploid.
pub fn check_dosage(loci: &[LocusMeta], ploidy: usize) -> Result<()> {
    if ploidy != 2 {
        return Err(ArpError::unsupported(format!(
            "SNP dosage coding needs diploid samples, ploidy is {}",
            ploidy
        )));
    }
    if let Some(locus) = loci.iter().find(|l| l.actual_kind != MarkerKind::Snp) {
        return Err(ArpError::unsupported(format!(
            "SNP dosage coding needs SNP loci only, '{}' is {}",
            locus.name, locus.actual_kind
        )));
    }
    Ok(())
}

/// Groups every `ploidy` consecutive haploid rows into one individual.
///
/// `loci` must describe the loci of `table`; they are only consulted for
/// SNP dosage coding, which rejects any table locus without a SNP row. Deme names are left as indices until `name_demes`.
pub fn format(
    table: &LocusTable,
    loci: &[LocusMeta],
    ploidy: usize,
    encoding: Encoding,
    separator: &str,
) -> Result<GenotypeTable> {
    if ploidy == 0 {
        return Err(ArpError::unsupported("ploidy must be at least 1"));
    }
    if encoding == Encoding::SnpDosage {
        let present = table
            .loci
            .names()
            .into_iter()
            .map(|name| {
                loci.iter().find(|l| l.name == name).cloned().ok_or_else(|| {
                    ArpError::unsupported(format!(
                        "SNP dosage coding needs metadata for locus '{}'",
                        name
                    ))
                })
            })
            .collect::<Result<Vec<LocusMeta>>>()?;
        check_dosage(&present, ploidy)?;
    }
    let n_rows = table.n_rows();
    if n_rows % ploidy != 0 {
        return Err(ArpError::inconsistent(format!(
            "{} haploid samples cannot be grouped by ploidy {}",
            n_rows, ploidy
        )));
    }

    let n = n_rows / ploidy;
    let mut ids = Vec::with_capacity(n);
    let mut demes = Vec::with_capacity(n);
    for i in 0..n {
        let rows = i * ploidy..(i + 1) * ploidy;
        let deme = table.demes[rows.start];
        if table.demes[rows.clone()].iter().any(|&d| d != deme) {
            return Err(ArpError::inconsistent(format!(
                "individual {} spans more than one deme",
                table.ids[rows].join(separator)
            )));
        }
        ids.push(table.ids[rows].join(separator));
        demes.push(deme);
    }

    let data = &table.data;
    let m = data.ncols();
    let (columns, genotypes) = match encoding {
        Encoding::Separate => {
            let columns: Vec<String> = table
                .columns
                .iter()
                .flat_map(|name| (1..=ploidy).map(move |copy| format!("{}.{}", name, copy)))
                .collect();
            let values = ndarray::Array2::from_shape_fn((n, m * ploidy), |(i, j)| {
                data[[i * ploidy + j % ploidy, j / ploidy]].clone()
            });
            (columns, Genotypes::Alleles(values))
        }
        Encoding::SingleColumn => {
            let values = ndarray::Array2::from_shape_fn((n, m), |(i, j)| {
                (0..ploidy)
                    .map(|copy| data[[i * ploidy + copy, j]].as_str())
                    .collect::<Vec<_>>()
                    .join(separator)
            });
            (table.columns.clone(), Genotypes::Alleles(values))
        }
        Encoding::SnpDosage => {
            let majority: Vec<&str> = (0..m).map(|j| majority_allele(data.column(j))).collect();
            let values = ndarray::Array2::from_shape_fn((n, m), |(i, j)| {
                (0..ploidy)
                    .filter(|copy| data[[i * ploidy + copy, j]] != majority[j])
                    .count() as u8
            });
            (table.columns.clone(), Genotypes::Dosage(values))
        }
    };

    debug!(
        "formatted {} haploid samples into {} individuals x {} columns",
        n_rows,
        n,
        genotypes.ncols()
    );
    Ok(GenotypeTable {
        ids,
        deme_names: demes.iter().map(|d| d.to_string()).collect(),
        demes,
        columns,
        genotypes,
        positions: None,
        source: None,
    })
}

/// Most frequent allele of a column; ties go to the lexicographically
/// smallest allele.
fn majority_allele<'a>(column: ndarray::ArrayView1<'a, String>) -> &'a str {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for allele in column {
        *counts.entry(allele.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|(a, x), (b, y)| x.cmp(y).then_with(|| b.cmp(a)))
        .map(|(allele, _)| allele)
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn table(ids: &[&str], demes: &[usize], columns: &[(&str, Vec<&str>)]) -> LocusTable {
        let mut builder = LocusTableBuilder::new(
            ids.iter().map(|x| x.to_string()).collect(),
            demes.to_vec(),
        );
        for (name, values) in columns {
            builder
                .push_locus(name, vec![values.iter().map(|x| x.to_string()).collect()])
                .unwrap();
        }
        builder.build().unwrap()
    }

    fn snp(name: &str) -> LocusMeta {
        LocusMeta::new(name, 1, MarkerKind::Dna, 1).actual(MarkerKind::Snp)
    }

    #[test]
    fn test_separate_columns() -> Result<(), Box<dyn Error>> {
        let t = table(
            &["1", "2", "3", "4"],
            &[1, 1, 1, 1],
            &[("locus", vec!["ACG", "ACA", "ACG", "ACT"])],
        );
        let g = format(&t, &[], 2, Encoding::Separate, "/")?;
        assert_eq!(g.columns, vec!["locus.1", "locus.2"]);
        assert_eq!(g.ids, vec!["1/2", "3/4"]);
        assert_eq!(g.genotypes.value(0, 0), "ACG");
        assert_eq!(g.genotypes.value(0, 1), "ACA");
        assert_eq!(g.genotypes.value(1, 0), "ACG");
        assert_eq!(g.genotypes.value(1, 1), "ACT");
        Ok(())
    }

    #[test]
    fn test_single_column() -> Result<(), Box<dyn Error>> {
        let t = table(&["1", "2"], &[1, 1], &[("locus", vec!["A", "T"])]);
        let g = format(&t, &[], 2, Encoding::SingleColumn, "/")?;
        assert_eq!(g.n_individuals(), 1);
        assert_eq!(g.columns, vec!["locus"]);
        assert_eq!(g.genotypes.value(0, 0), "A/T");
        Ok(())
    }

    #[test]
    fn test_snp_dosage() -> Result<(), Box<dyn Error>> {
        let t = table(&["1", "2", "3", "4"], &[1, 1, 1, 1], &[("s", vec!["A", "A", "A", "T"])]);
        let g = format(&t, &[snp("s")], 2, Encoding::SnpDosage, "/")?;
        match g.genotypes {
            Genotypes::Dosage(d) => assert_eq!(d.column(0).to_vec(), vec![0, 1]),
            other => panic!("expected dosage, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_dosage_tie_goes_to_smallest_allele() -> Result<(), Box<dyn Error>> {
        let t = table(&["1", "2", "3", "4"], &[1, 1, 1, 1], &[("s", vec!["T", "T", "G", "G"])]);
        let g = format(&t, &[snp("s")], 2, Encoding::SnpDosage, "/")?;
        assert_eq!(g.genotypes.value(0, 0), "2");
        assert_eq!(g.genotypes.value(1, 0), "0");
        Ok(())
    }

    #[test]
    fn test_dosage_rejections() {
        let t = table(&["1", "2"], &[1, 1], &[("s", vec!["A", "T"])]);
        assert!(matches!(
            format(&t, &[snp("s")], 1, Encoding::SnpDosage, "/"),
            Err(ArpError::UnsupportedRequest { .. })
        ));
        let dna = LocusMeta::new("s", 1, MarkerKind::Dna, 1);
        assert!(matches!(
            format(&t, &[dna], 2, Encoding::SnpDosage, "/"),
            Err(ArpError::UnsupportedRequest { .. })
        ));
    }

    #[test]
    fn test_dosage_needs_metadata_for_every_locus() {
        let t = table(&["1", "2"], &[1, 1], &[("seq", vec!["ACG", "ACT"])]);
        assert!(matches!(
            format(&t, &[], 2, Encoding::SnpDosage, "/"),
            Err(ArpError::UnsupportedRequest { .. })
        ));
        let both = table(&["1", "2"], &[1, 1], &[("s", vec!["A", "T"]), ("seq", vec!["ACG", "ACT"])]);
        assert!(matches!(
            format(&both, &[snp("s")], 2, Encoding::SnpDosage, "/"),
            Err(ArpError::UnsupportedRequest { .. })
        ));
    }

    #[test]
    fn test_ploidy_grouping() -> Result<(), Box<dyn Error>> {
        let even = table(&["1", "2", "3", "4"], &[1, 1, 2, 2], &[("l", vec!["1", "2", "3", "4"])]);
        assert_eq!(format(&even, &[], 2, Encoding::Separate, "/")?.n_individuals(), 2);
        let odd = table(&["1", "2", "3"], &[1, 1, 1], &[("l", vec!["1", "2", "3"])]);
        assert!(matches!(
            format(&odd, &[], 2, Encoding::Separate, "/"),
            Err(ArpError::InconsistentInput { .. })
        ));
        let straddle = table(&["1", "2"], &[1, 2], &[("l", vec!["1", "2"])]);
        assert!(format(&straddle, &[], 2, Encoding::Separate, "/").is_err());
        Ok(())
    }

    #[test]
    fn test_name_demes() -> Result<(), Box<dyn Error>> {
        let t = table(&["1", "2", "3", "4"], &[1, 1, 2, 2], &[("l", vec!["1", "2", "3", "4"])]);
        let mut g = format(&t, &[], 2, Encoding::Separate, "/")?;
        assert_eq!(g.deme_names, vec!["1", "2"]);
        let names = vec!["north".to_string(), "south".to_string()];
        g.name_demes(Some(&names[..]))?;
        assert_eq!(g.deme_names, vec!["north", "south"]);
        assert!(g.name_demes(Some(&names[..1])).is_err());
        Ok(())
    }

    #[test]
    fn test_split_by_chromosome() -> Result<(), Box<dyn Error>> {
        let t = table(
            &["1", "2"],
            &[1, 1],
            &[("C1B1L1", vec!["A", "T"]), ("C2B1L1", vec!["G", "C"]), ("C1B2L1", vec!["7", "8"])],
        );
        let g = format(&t, &[], 2, Encoding::SingleColumn, "/")?;
        let split = g.split_by_chromosome()?;
        assert_eq!(split.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(split[&1].columns, vec!["C1B1L1", "C1B2L1"]);
        assert_eq!(split[&1].genotypes.value(0, 1), "7/8");
        assert_eq!(split[&2].genotypes.value(0, 0), "G/C");

        let unprefixed = table(&["1"], &[1], &[("locus", vec!["A"])]);
        let g = format(&unprefixed, &[], 1, Encoding::Separate, "/")?;
        assert!(g.split_by_chromosome().is_err());
        Ok(())
    }
}
