//! Python bindings for rebabel-conllu
//!
//! This module provides PyO3-based Python bindings for the Rust core.

use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;
use std::path::PathBuf;

use crate::blocks::ReaderError;
use crate::conllu::{ConlluWriter, read_str};
use crate::importer::import_files;
use crate::model::UnitType;
use crate::store::MemoryStore;

/// Convert ReaderError to Python exception
impl From<ReaderError> for PyErr {
    fn from(err: ReaderError) -> PyErr {
        match err {
            ReaderError::Io(e) => PyIOError::new_err(e.to_string()),
            ReaderError::FileOpen { path, source } => PyIOError::new_err(format!(
                "Failed to open file {}: {}",
                path.display(),
                source
            )),
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

/// In-memory annotation store filled from CoNLL-U input
#[pyclass(name = "Store", unsendable)]
#[derive(Default)]
pub struct PyStore {
    inner: MemoryStore,
}

#[pymethods]
impl PyStore {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    /// Decode CoNLL-U text into the store.
    ///
    /// Raises:
    ///     ValueError: If a row is malformed
    fn read_string(&mut self, text: &str) -> PyResult<()> {
        read_str(&mut self.inner, text)?;
        Ok(())
    }

    /// Decode files into the store, skipping files that fail.
    ///
    /// Returns:
    ///     (succeeded, failed) lists of paths
    fn import_files(&mut self, paths: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let summary = import_files(&mut self.inner, &paths);
        (summary.succeeded, summary.failed)
    }

    /// Encode the whole store as CoNLL-U text
    fn write_string(&self) -> PyResult<String> {
        ConlluWriter::new(&self.inner)
            .write_to_string()
            .map_err(|e| PyIOError::new_err(e.to_string()))
    }

    #[getter]
    fn sentence_count(&self) -> usize {
        self.inner.units_of_type(UnitType::Sentence).len()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "<Store units={} sentences={}>",
            self.inner.len(),
            self.sentence_count()
        )
    }
}

#[pyfunction]
fn __version__() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pymodule]
fn rebabel_conllu(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyStore>()?;
    m.add_function(wrap_pyfunction!(__version__, m)?)?;
    Ok(())
}
