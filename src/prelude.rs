pub use crate::error::{ArpError, Result};
pub use crate::genotypes::{Encoding, GenotypeTable, Genotypes};
pub use crate::loci::LocusMeta;
pub use crate::reader::ArpReader;
pub use crate::{
    Layout, LocusMap, LocusTable, LocusTableBuilder, MarkerKind, PolyPosition, RawSamples,
    Reconstruction, ResolvedPosition,
};
