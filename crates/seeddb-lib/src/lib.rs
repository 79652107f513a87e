// seeddb: seeded suffix-array databases for biological sequences
//
// Builds an on-disk bundle of suffix arrays restricted to cyclic
// subset seed positions, for use by local-homology search tools.

#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod alphabet;
pub mod config;
pub mod error;
pub mod manifest;
pub mod multiseq;
pub mod pipeline;
pub mod seed;
pub mod suffix_array;
pub mod tantan;
pub mod volume;

pub use alphabet::Alphabet;
pub use config::{BuildConfig, ChildTableKind, InputFormat};
pub use error::{Error, Result};
pub use multiseq::MultiSequence;
pub use seed::CyclicSubsetSeed;
pub use suffix_array::SubsetSuffixArray;
pub use tantan::TantanMasker;

/// A text position; the per-volume letter cap keeps positions in range
pub type Position = u32;

/// Crate version, as written into manifests
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_nonempty() {
        assert!(!version().is_empty());
    }
}
