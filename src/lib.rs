//! rebabel-conllu: CoNLL-U to annotation graph conversion
//!
//! Decodes CoNLL-U treebanks into a graph of typed units, namespaced typed
//! features, and relations, and encodes that graph back into CoNLL-U.

pub mod blocks; // Blank-line block splitting over strings and (gzipped) files
pub mod conllu; // CoNLL-U decoder and encoder
pub mod importer; // Batch import with per-file failure isolation
pub mod model; // Units, tiers, and typed feature values
pub mod store; // Annotation store interfaces and in-memory implementation

// Python bindings
#[cfg(feature = "pyo3")]
pub mod python;

// Re-exports for convenience
pub use blocks::{BlockReader, ReaderError};
pub use conllu::{ConlluError, ConlluReader, ConlluWriter, ReaderOptions, read_str, write_string};
pub use importer::{ImportSummary, import_files};
pub use model::{FeatureKey, NodeKind, RawValue, Tier, UnitId, UnitType, Value, ValueType};
pub use store::{AnnotationSink, AnnotationSource, KeyId, MemoryStore, StoreError, UnitRecord};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dog_scenario() {
        let input = "1\tThe\tthe\tDET\t_\t_\t2\tdet\t_\t_\n\
                     2\tdog\tdog\tNOUN\t_\t_\t0\troot\t_\tSpaceAfter=No\n\n";
        let mut store = MemoryStore::new();
        read_str(&mut store, input).unwrap();

        let output = write_string(&store).unwrap();
        let rows: Vec<&str> = output.lines().skip(1).filter(|l| !l.is_empty()).collect();
        assert_eq!(
            rows,
            vec![
                "1\tThe\tthe\tDET\t_\t_\t2\tdet\t_\t_",
                "2\tdog\tdog\tNOUN\t_\t_\t0\troot\t_\tSpaceAfter=No",
            ]
        );
    }
}
