use crate::loci::max_chromosome;
use crate::prelude::*;
use log::debug;
use std::collections::HashSet;

/// Parses requested marker kinds.
///
/// Tokens are matched case-insensitively against `DNA`, `SNP`, `MICROSAT`,
/// `STANDARD` and `ALL`. Returns `None` when every kind is wanted.
pub fn parse_markers<S: AsRef<str>>(tokens: &[S]) -> Result<Option<Vec<MarkerKind>>> {
    let mut kinds = vec![];
    for token in tokens {
        let token = token.as_ref();
        if token.trim().eq_ignore_ascii_case("all") {
            return Ok(None);
        }
        kinds.push(token.parse::<MarkerKind>()?);
    }
    Ok(if kinds.is_empty() { None } else { Some(kinds) })
}

/// Restricts locus metadata to the requested chromosomes and marker kinds,
/// keeping declared order.
pub fn select_loci(
    loci: &[LocusMeta],
    chromosomes: Option<&[u32]>,
    markers: Option<&[MarkerKind]>,
) -> Result<Vec<LocusMeta>> {
    let mut selected: Vec<&LocusMeta> = loci.iter().collect();

    if let Some(chromosomes) = chromosomes {
        let max = max_chromosome(loci);
        if let Some(bad) = chromosomes.iter().find(|&&c| c == 0 || c > max) {
            return Err(ArpError::not_found(format!(
                "chromosome {} (loci are declared on chromosomes 1 to {})",
                bad, max
            )));
        }
        let wanted: HashSet<u32> = chromosomes.iter().copied().collect();
        selected.retain(|l| wanted.contains(&l.chromosome));
    }

    if let Some(markers) = markers {
        selected.retain(|l| markers.contains(&l.actual_kind));
    }

    if selected.is_empty() {
        return Err(ArpError::not_found(format!(
            "no loci for chromosomes {} and markers {}",
            describe(chromosomes),
            describe(markers)
        )));
    }
    Ok(selected.into_iter().cloned().collect())
}

fn describe<T: std::fmt::Display>(values: Option<&[T]>) -> String {
    match values {
        None => "all".to_owned(),
        Some(values) => values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Keeps the columns of the selected loci, and the polymorphic sites they
/// own, in their original order.
pub fn filter(reconstruction: &Reconstruction, selected: &[LocusMeta]) -> Result<Reconstruction> {
    let names: Vec<&str> = selected.iter().map(|l| l.name.as_str()).collect();
    let table = reconstruction.table.project(&names)?;
    let positions = reconstruction.positions.as_ref().map(|positions| {
        positions
            .iter()
            .filter(|p| table.loci.contains(&p.locus))
            .cloned()
            .collect()
    });
    debug!(
        "kept {} of {} loci",
        table.loci.len(),
        reconstruction.table.loci.len()
    );
    Ok(Reconstruction { table, positions })
}

/// Removes columns where every haploid sample carries the same allele.
///
/// Loci left without columns disappear from the table; their polymorphic
/// sites are kept.
pub fn drop_monomorphic(table: &LocusTable) -> Result<LocusTable> {
    let keep: Vec<(&str, Vec<usize>)> = table
        .loci
        .iter()
        .map(|(name, range)| {
            let variable = range
                .filter(|&c| {
                    let column = table.data.column(c);
                    let first = column.iter().next();
                    column.iter().any(|x| Some(x) != first)
                })
                .collect();
            (name, variable)
        })
        .collect();
    let dropped = table.columns.len() - keep.iter().map(|(_, c)| c.len()).sum::<usize>();
    if dropped > 0 {
        debug!("dropped {} monomorphic columns", dropped);
    }
    table.select_columns(&keep)
}
