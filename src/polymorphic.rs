//! Reassembles loci when the file lists only variable sites.
//!
//! The simulator writes every variable site of a chromosome's sequence
//! blocks into one token, so each site must first be traced back to the
//! locus that owns it and to its character offset inside that token.

use crate::prelude::*;
use crate::full_site::{explode, sequence_length, slice_sequences};
use log::debug;
use std::collections::{BTreeMap, HashMap};

/// Finds the owning locus, raw column and token offset of every site.
///
/// Sites are looked up on their chromosome by nearest-below match on each
/// locus's `chrom_position`. Loci on a chromosome must be declared in
/// strictly increasing position order, and the sites of a chromosome must
/// come in ascending position order.
pub fn resolve(positions: &[PolyPosition], loci: &[LocusMeta]) -> Result<Vec<ResolvedPosition>> {
    let mut chromosomes: BTreeMap<u32, Vec<&LocusMeta>> = BTreeMap::new();
    for locus in loci {
        let declared = chromosomes.entry(locus.chromosome).or_default();
        if let Some(previous) = declared.last() {
            if previous.chrom_position >= locus.chrom_position {
                return Err(ArpError::inconsistent(format!(
                    "locus '{}' starts at {} on chromosome {}, not after '{}' at {}",
                    locus.name,
                    locus.chrom_position,
                    locus.chromosome,
                    previous.name,
                    previous.chrom_position
                )));
            }
        }
        declared.push(locus);
    }

    let mut resolved: Vec<ResolvedPosition> = Vec::with_capacity(positions.len());
    let mut last_seen: BTreeMap<u32, u64> = BTreeMap::new();
    for site in positions {
        if let Some(&previous) = last_seen.get(&site.chromosome) {
            if site.position < previous {
                return Err(ArpError::inconsistent(format!(
                    "polymorphic position {} on chromosome {} comes after position {}",
                    site.position, site.chromosome, previous
                )));
            }
        }
        last_seen.insert(site.chromosome, site.position);

        let declared = chromosomes.get(&site.chromosome).ok_or_else(|| {
            ArpError::inconsistent(format!(
                "polymorphic position {} is on chromosome {} which has no loci",
                site.position, site.chromosome
            ))
        })?;
        let below = declared.partition_point(|l| l.chrom_position <= site.position);
        let locus = match below {
            0 => {
                return Err(ArpError::inconsistent(format!(
                    "polymorphic position {} on chromosome {} precedes every locus",
                    site.position, site.chromosome
                )))
            }
            n => declared[n - 1],
        };

        // DNA sites on one chromosome share a token
        let (column, offset) = match resolved.last() {
            None => (0, 0),
            Some(prev)
                if prev.kind == MarkerKind::Dna
                    && locus.kind == MarkerKind::Dna
                    && prev.chromosome == site.chromosome =>
            {
                (prev.column, prev.offset + 1)
            }
            Some(prev) => (prev.column + 1, 0),
        };

        resolved.push(ResolvedPosition {
            chromosome: site.chromosome,
            position: site.position,
            locus: locus.name.clone(),
            kind: locus.kind,
            actual_kind: locus.actual_kind,
            column,
            offset,
        });
    }
    Ok(resolved)
}

/// Builds the haploid locus table from polymorphic-only sample data.
///
/// Returns the table together with the resolved sites. Loci without any
/// variable site are absent from the table.
pub fn reconstruct(
    raw: &RawSamples,
    positions: &[PolyPosition],
    loci: &[LocusMeta],
) -> Result<(LocusTable, Vec<ResolvedPosition>)> {
    let resolved = resolve(positions, loci)?;
    let needed = resolved.last().map(|r| r.column + 1).unwrap_or(0);
    if needed != raw.width() {
        return Err(ArpError::inconsistent(format!(
            "{} polymorphic positions need {} data columns but the file has {}",
            resolved.len(),
            needed,
            raw.width()
        )));
    }

    let mut sites: HashMap<&str, Vec<&ResolvedPosition>> = HashMap::new();
    for site in resolved.iter() {
        sites.entry(site.locus.as_str()).or_default().push(site);
    }

    let mut builder = LocusTableBuilder::new(raw.ids.clone(), raw.demes.clone());
    for locus in loci {
        let own = match sites.get(locus.name.as_str()) {
            Some(own) => own,
            None => continue,
        };
        let mut columns: Vec<usize> = own.iter().map(|s| s.column).collect();
        columns.dedup();

        let mut values = vec![];
        for c in columns {
            let column = raw.data.column(c);
            if !locus.kind.is_sequence() {
                values.push(column.to_vec());
                continue;
            }
            sequence_length(column, &locus.name)?;
            let offsets = own.iter().filter(|s| s.column == c).map(|s| s.offset);
            let first = offsets.clone().min().unwrap_or(0);
            let last = offsets.max().unwrap_or(0);
            let sequence = slice_sequences(column, first..last + 1, &locus.name)?;
            if locus.actual_kind == MarkerKind::Snp {
                values.extend(explode(&sequence, &locus.name)?);
            } else {
                values.push(sequence);
            }
        }
        builder.push_locus(&locus.name, values)?;
    }

    let table = builder.build()?;
    debug!(
        "polymorphic layout: {} sites in {} of {} loci",
        resolved.len(),
        table.loci.len(),
        loci.len()
    );
    Ok((table, resolved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{parse, Extraction};
    use std::error::Error;

    fn site(chromosome: u32, position: u64) -> PolyPosition {
        PolyPosition {
            chromosome,
            position,
        }
    }

    // chromosome 1: two sequence loci, chromosome 2: a microsatellite then a
    // SNP block
    fn loci() -> Vec<LocusMeta> {
        vec![
            LocusMeta::new("C1B1L1", 1, MarkerKind::Dna, 1).chrom_position(0),
            LocusMeta::new("C1B1L2", 1, MarkerKind::Dna, 1)
                .actual(MarkerKind::Snp)
                .chrom_position(100),
            LocusMeta::new("C2B1L1", 2, MarkerKind::Microsat, 2).chrom_position(0),
            LocusMeta::new("C2B2L1", 2, MarkerKind::Dna, 3)
                .actual(MarkerKind::Snp)
                .chrom_position(1),
        ]
    }

    fn positions() -> Vec<PolyPosition> {
        vec![
            site(1, 3),
            site(1, 40),
            site(1, 101),
            site(1, 150),
            site(2, 0),
            site(2, 7),
        ]
    }

    #[test]
    fn test_sites_resolve_to_containing_locus() -> Result<(), Box<dyn Error>> {
        let resolved = resolve(&positions(), &loci())?;
        let owners: Vec<&str> = resolved.iter().map(|r| r.locus.as_str()).collect();
        assert_eq!(
            owners,
            vec!["C1B1L1", "C1B1L1", "C1B1L2", "C1B1L2", "C2B1L1", "C2B2L1"]
        );
        for r in resolved.iter() {
            let locus = loci().into_iter().find(|l| l.name == r.locus).unwrap();
            assert_eq!(locus.chromosome, r.chromosome);
            assert!(locus.chrom_position <= r.position);
        }
        Ok(())
    }

    #[test]
    fn test_sequence_sites_share_a_column() -> Result<(), Box<dyn Error>> {
        let resolved = resolve(&positions(), &loci())?;
        let placed: Vec<(usize, usize)> = resolved.iter().map(|r| (r.column, r.offset)).collect();
        assert_eq!(placed, vec![(0, 0), (0, 1), (0, 2), (0, 3), (1, 0), (2, 0)]);
        Ok(())
    }

    #[test]
    fn test_chromosome_change_starts_new_column() -> Result<(), Box<dyn Error>> {
        let loci = vec![
            LocusMeta::new("C1", 1, MarkerKind::Dna, 1),
            LocusMeta::new("C2", 2, MarkerKind::Dna, 2),
        ];
        let resolved = resolve(&[site(1, 5), site(2, 5)], &loci)?;
        assert_eq!(resolved[1].column, 1);
        assert_eq!(resolved[1].offset, 0);
        Ok(())
    }

    #[test]
    fn test_snp_kind_sites_take_one_column_each() -> Result<(), Box<dyn Error>> {
        let loci = vec![
            LocusMeta::new("A", 1, MarkerKind::Snp, 1).chrom_position(0),
            LocusMeta::new("B", 1, MarkerKind::Snp, 1).chrom_position(1),
        ];
        let sites = [site(1, 0), site(1, 1)];
        let resolved = resolve(&sites, &loci)?;
        let placed: Vec<(usize, usize)> = resolved.iter().map(|r| (r.column, r.offset)).collect();
        assert_eq!(placed, vec![(0, 0), (1, 0)]);

        let raw = match parse("SampleData= {\n1_1 1 A G\n1_2 1 T G\n}\n")? {
            Extraction::Samples { raw, .. } => raw,
            other => panic!("expected samples, got {:?}", other),
        };
        let (table, _) = reconstruct(&raw, &sites, &loci)?;
        assert_eq!(table.columns, vec!["A", "B"]);
        assert_eq!(table.data.column(0).to_vec(), vec!["A", "T"]);
        assert_eq!(table.data.column(1).to_vec(), vec!["G", "G"]);
        Ok(())
    }

    #[test]
    fn test_descending_sites_are_rejected() {
        let loci = vec![
            LocusMeta::new("A", 1, MarkerKind::Dna, 1).chrom_position(0),
            LocusMeta::new("B", 1, MarkerKind::Dna, 1).chrom_position(50),
        ];
        assert!(matches!(
            resolve(&[site(1, 60), site(1, 5)], &loci),
            Err(ArpError::InconsistentInput { .. })
        ));
    }

    #[test]
    fn test_unresolvable_sites() {
        let loci = vec![LocusMeta::new("L", 1, MarkerKind::Dna, 1).chrom_position(10)];
        assert!(resolve(&[site(1, 4)], &loci).is_err());
        assert!(resolve(&[site(3, 40)], &loci).is_err());
    }

    #[test]
    fn test_unordered_loci_are_rejected() {
        let loci = vec![
            LocusMeta::new("A", 1, MarkerKind::Dna, 1).chrom_position(50),
            LocusMeta::new("B", 1, MarkerKind::Dna, 1).chrom_position(10),
        ];
        assert!(resolve(&[site(1, 60)], &loci).is_err());
    }

    #[test]
    fn test_reconstruct_groups_columns_by_locus() -> Result<(), Box<dyn Error>> {
        let text = "\
SampleData= {
1_1 1 ACGT 120 A
1_2 1 ACTT 122 G
}
";
        let raw = match parse(text)? {
            Extraction::Samples { raw, .. } => raw,
            other => panic!("expected samples, got {:?}", other),
        };
        let (table, resolved) = reconstruct(&raw, &positions(), &loci())?;
        assert_eq!(resolved.len(), 6);
        assert_eq!(
            table.columns,
            vec!["C1B1L1", "C1B1L2_1", "C1B1L2_2", "C2B1L1", "C2B2L1"]
        );
        assert_eq!(table.data.row(0).to_vec(), vec!["AC", "G", "T", "120", "A"]);
        assert_eq!(table.data.row(1).to_vec(), vec!["AC", "T", "T", "122", "G"]);
        assert_eq!(table.loci.get("C1B1L2"), Some(1..3));
        Ok(())
    }

    #[test]
    fn test_reconstruct_rejects_column_mismatch() -> Result<(), Box<dyn Error>> {
        let raw = match parse("SampleData= {\n1_1 1 ACGT\n}\n")? {
            Extraction::Samples { raw, .. } => raw,
            other => panic!("expected samples, got {:?}", other),
        };
        assert!(reconstruct(&raw, &positions(), &loci()).is_err());
        Ok(())
    }
}
