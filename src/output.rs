use crate::prelude::*;
use csv;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a `GenotypeTable` as delimited text.
///
/// Each row is `id, deme, genotype columns...`, with the deme written by
/// name.
pub struct TableWriter {
    headers: bool,
    delimiter: u8,
}

impl TableWriter {
    /// Construct a new comma-separated writer with a header row
    pub fn new() -> Self {
        Self {
            headers: true,
            delimiter: b',',
        }
    }

    pub fn headers(&mut self, headers: bool) -> &mut Self {
        self.headers = headers;
        self
    }

    pub fn delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    pub fn to_writer<W: Write>(&self, table: &GenotypeTable, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(writer);

        if self.headers {
            let mut header = vec!["id", "deme"];
            header.extend(table.columns.iter().map(String::as_str));
            wtr.write_record(&header)?;
        }

        for (i, id) in table.ids.iter().enumerate() {
            let mut record = vec![id.clone(), table.deme_names[i].clone()];
            record.extend((0..table.genotypes.ncols()).map(|j| table.genotypes.value(i, j)));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn to_path<P: AsRef<Path>>(&self, table: &GenotypeTable, path: P) -> Result<()> {
        self.to_writer(table, File::create(path)?)
    }
}

impl Default for TableWriter {
    fn default() -> Self {
        Self::new()
    }
}
