//! Batch import of CoNLL-U files
//!
//! Each file is decoded independently; a file that fails to decode is logged
//! and skipped without stopping the rest of the batch.

use crate::blocks::{ReaderError, read_path};
use crate::conllu::{ConlluReader, ReaderOptions};
use crate::store::AnnotationSink;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

/// Outcome of a batch import
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl ImportSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Decode every file into `sink`, in order
///
/// Sentence indices keep counting across files so that `meta:index` follows
/// input order for the whole batch.
pub fn import_files<S, P>(sink: &mut S, paths: &[P]) -> ImportSummary
where
    S: AnnotationSink + ?Sized,
    P: AsRef<Path>,
{
    import_files_with_options(sink, paths, ReaderOptions::default())
}

pub fn import_files_with_options<S, P>(
    sink: &mut S,
    paths: &[P],
    options: ReaderOptions,
) -> ImportSummary
where
    S: AnnotationSink + ?Sized,
    P: AsRef<Path>,
{
    let mut summary = ImportSummary::default();
    let mut reader = ConlluReader::with_options(sink, options);

    for path in paths {
        let path = path.as_ref();
        let start = Instant::now();
        match import_file(&mut reader, path) {
            Ok(()) => {
                info!(
                    "Read '{}' in {} seconds.",
                    path.display(),
                    start.elapsed().as_secs_f64()
                );
                summary.succeeded.push(path.to_path_buf());
            }
            Err(e) => {
                error!("Import of '{}' failed: {}", path.display(), e);
                summary.failed.push(path.to_path_buf());
            }
        }
    }

    summary
}

/// Decode a single file, dropping its in-progress block on failure
pub fn import_file<S: AnnotationSink + ?Sized>(
    reader: &mut ConlluReader<'_, S>,
    path: &Path,
) -> Result<(), ReaderError> {
    let result = read_path(reader, path);
    if result.is_err() {
        reader.abandon_block();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Tier, UnitType, Value};
    use crate::store::MemoryStore;
    use std::fs;
    use std::io::Write;
    use tempfile::{TempDir, tempdir};

    /// Helper to create test files with given content
    fn create_test_files(contents: &[(&str, &str)]) -> (TempDir, Vec<PathBuf>) {
        let dir = tempdir().unwrap();
        let mut paths = Vec::new();

        for (filename, content) in contents {
            let path = dir.path().join(filename);
            let mut file = fs::File::create(&path).unwrap();
            write!(file, "{}", content).unwrap();
            paths.push(path);
        }

        (dir, paths)
    }

    #[test]
    fn test_import_multiple_files() {
        let (_dir, paths) = create_test_files(&[
            (
                "file1.conllu",
                "1\tThe\tthe\tDET\tDT\t_\t2\tdet\t_\t_\n2\tdog\tdog\tNOUN\tNN\t_\t0\troot\t_\t_\n",
            ),
            (
                "file2.conllu",
                "1\tCats\tcat\tNOUN\tNNS\t_\t2\tnsubj\t_\t_\n2\tsleep\tsleep\tVERB\tVBP\t_\t0\troot\t_\t_\n",
            ),
        ]);

        let mut store = MemoryStore::new();
        let summary = import_files(&mut store, &paths);

        assert!(summary.is_success());
        assert_eq!(summary.succeeded, paths);

        // Sentence indices continue across files
        let sentences = store.units_of_type(UnitType::Sentence);
        assert_eq!(sentences.len(), 2);
        assert_eq!(
            store.feature(sentences[1], Tier::Meta, "index"),
            Some(&Value::Int(1))
        );
    }

    #[test]
    fn test_repeated_batches_continue_numbering() {
        let (_dir, paths) = create_test_files(&[
            ("a.conllu", "1\truns\trun\tVERB\tVBZ\t_\t0\troot\t_\t_\n"),
            ("b.conllu", "1\tsleeps\tsleep\tVERB\tVBZ\t_\t0\troot\t_\t_\n"),
        ]);

        let mut store = MemoryStore::new();
        import_files(&mut store, &paths[..1]);
        import_files(&mut store, &paths[1..]);

        let sentences = store.units_of_type(UnitType::Sentence);
        assert_eq!(
            store.feature(sentences[0], Tier::Meta, "index"),
            Some(&Value::Int(0))
        );
        assert_eq!(
            store.feature(sentences[1], Tier::Meta, "index"),
            Some(&Value::Int(1))
        );
    }

    #[test]
    fn test_bad_file_does_not_stop_batch() {
        let (dir, mut paths) = create_test_files(&[
            (
                "bad.conllu",
                "1\tok\tok\tX\t_\t_\t0\troot\t_\t_\n\n1\tbad\tbad\tX\t_\t_\t0\troot\t_\n",
            ),
            ("good.conllu", "1\truns\trun\tVERB\tVBZ\t_\t0\troot\t_\t_\n"),
        ]);
        paths.insert(1, dir.path().join("nonexistent.conllu"));

        let mut store = MemoryStore::new();
        let summary = import_files(&mut store, &paths);

        assert_eq!(summary.failed, vec![paths[0].clone(), paths[1].clone()]);
        assert_eq!(summary.succeeded, vec![paths[2].clone()]);

        // The first block of the bad file was committed before the error
        assert_eq!(store.units_of_type(UnitType::Sentence).len(), 2);
        assert_eq!(store.units_of_type(UnitType::Word).len(), 2);
    }

    #[test]
    fn test_failed_block_is_discarded() {
        let (_dir, paths) = create_test_files(&[
            (
                "bad.conllu",
                "1\ta\ta\tX\t_\t_\t0\troot\t_\t_\n2\tb\tb\tX\t_\tBroken\t1\tdep\t_\t_\n",
            ),
            ("good.conllu", "1\tc\tc\tX\t_\t_\t0\troot\t_\t_\n"),
        ]);

        let mut store = MemoryStore::new();
        let summary = import_files(&mut store, &paths);
        assert_eq!(summary.failed.len(), 1);

        // Word "a" from the failed block must not leak into the next file's sentence
        let sentences = store.units_of_type(UnitType::Sentence);
        assert_eq!(sentences.len(), 1);
        assert_eq!(store.children(sentences[0], UnitType::Word).len(), 1);
    }
}
