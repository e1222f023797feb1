use crate::prelude::*;
use log::debug;
use ndarray::ArrayView1;
use std::ops::Range;

/// Maps raw columns onto loci when the file reports every site.
///
/// Loci are processed in declared order. Sequence loci are cut down to their
/// character range, and loci reported as SNPs are split into one column per
/// site.
pub fn reconstruct(raw: &RawSamples, loci: &[LocusMeta]) -> Result<LocusTable> {
    let mut builder = LocusTableBuilder::new(raw.ids.clone(), raw.demes.clone());
    for locus in loci {
        let columns = locus.raw_columns();
        if columns.end > raw.width() {
            return Err(ArpError::inconsistent(format!(
                "locus '{}' needs column {} but the file has {}",
                locus.name,
                columns.end,
                raw.width()
            )));
        }

        let mut values = vec![];
        for c in columns {
            let column = raw.data.column(c);
            if !locus.kind.is_sequence() {
                values.push(column.to_vec());
                continue;
            }
            let len = sequence_length(column, &locus.name)?;
            let chars = locus.dna_chars(len)?;
            let sequence = slice_sequences(column, chars, &locus.name)?;
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
        "full-site layout: {} loci in {} columns",
        table.loci.len(),
        table.columns.len()
    );
    Ok(table)
}

/// Common length of the sequences in one raw column.
pub(crate) fn sequence_length(column: ArrayView1<String>, locus: &str) -> Result<usize> {
    let mut tokens = column.iter();
    let len = match tokens.next() {
        Some(first) => first.len(),
        None => return Ok(0),
    };
    match tokens.find(|token| token.len() != len) {
        Some(token) => Err(ArpError::inconsistent(format!(
            "sequences of locus '{}' differ in length ({} and {})",
            locus,
            len,
            token.len()
        ))),
        None => Ok(len),
    }
}

/// Cuts the same character range out of every token of a column.
pub(crate) fn slice_sequences(
    column: ArrayView1<String>,
    chars: Range<usize>,
    locus: &str,
) -> Result<Vec<String>> {
    column
        .iter()
        .map(|token| {
            token.get(chars.clone()).map(str::to_owned).ok_or_else(|| {
                ArpError::inconsistent(format!(
                    "sequence '{}' is too short for characters {}..{} of locus '{}'",
                    token, chars.start, chars.end, locus
                ))
            })
        })
        .collect()
}

/// Splits equal-length sequences into one column per character.
pub(crate) fn explode(sequences: &[String], locus: &str) -> Result<Vec<Vec<String>>> {
    let chars: Vec<Vec<char>> = sequences.iter().map(|s| s.chars().collect()).collect();
    let width = chars.first().map(Vec::len).unwrap_or(0);
    if let Some(ragged) = chars.iter().find(|c| c.len() != width) {
        return Err(ArpError::inconsistent(format!(
            "SNP sites of locus '{}' differ in count ({} and {})",
            locus,
            width,
            ragged.len()
        )));
    }
    Ok((0..width)
        .map(|site| chars.iter().map(|c| c[site].to_string()).collect())
        .collect())
}
