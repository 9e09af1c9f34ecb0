//! Line sources and blank-line block splitting
//!
//! Feeds lines from a string, file, or gzipped file to a [`BlockReader`],
//! calling its hooks at the start and end of every blank-line-delimited block.

use crate::conllu::ConlluError;
use crate::store::StoreError;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error that aborts reading the current input
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error(transparent)]
    Conllu(#[from] ConlluError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open file {path}: {source}")]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Consumer of blank-line-delimited blocks
pub trait BlockReader {
    /// Called before the first line of every block
    fn reset(&mut self);

    /// Called for each non-blank line; `line_num` is 1-based within the input
    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), ReaderError>;

    /// Called after the last line of every block
    fn end(&mut self) -> Result<(), ReaderError>;
}

/// Open a path for line reading, decompressing `.gz` files
pub fn open_path(path: &Path) -> Result<Box<dyn BufRead>, ReaderError> {
    let file = File::open(path).map_err(|source| ReaderError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;

    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Drive `reader` over every block of `input`
///
/// Runs of blank lines never produce empty blocks; end of input closes the
/// final block even without a trailing blank line.
pub fn read_blocks<B, R>(reader: &mut B, input: R) -> Result<(), ReaderError>
where
    B: BlockReader + ?Sized,
    R: BufRead,
{
    let mut in_block = false;

    for (i, line) in input.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            // Blank line = block boundary
            if in_block {
                reader.end()?;
                in_block = false;
            }
            continue;
        }

        if !in_block {
            reader.reset();
            in_block = true;
        }
        reader.process_line(line, i + 1)?;
    }

    if in_block {
        reader.end()?;
    }
    Ok(())
}

/// Drive `reader` over an in-memory string
pub fn read_str<B: BlockReader + ?Sized>(reader: &mut B, text: &str) -> Result<(), ReaderError> {
    read_blocks(reader, Cursor::new(text.as_bytes()))
}

/// Drive `reader` over a file (plain or gzipped)
pub fn read_path<B: BlockReader + ?Sized>(reader: &mut B, path: &Path) -> Result<(), ReaderError> {
    let input = open_path(path)?;
    read_blocks(reader, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    /// Records block structure as nested vectors
    #[derive(Default)]
    struct Recorder {
        blocks: Vec<Vec<(usize, String)>>,
        resets: usize,
        ends: usize,
    }

    impl BlockReader for Recorder {
        fn reset(&mut self) {
            self.resets += 1;
            self.blocks.push(Vec::new());
        }

        fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), ReaderError> {
            self.blocks
                .last_mut()
                .unwrap()
                .push((line_num, line.to_string()));
            Ok(())
        }

        fn end(&mut self) -> Result<(), ReaderError> {
            self.ends += 1;
            Ok(())
        }
    }

    #[test]
    fn test_blocks_split_on_blank_lines() {
        let mut rec = Recorder::default();
        read_str(&mut rec, "a\nb\n\nc\n\n").unwrap();

        assert_eq!(rec.resets, 2);
        assert_eq!(rec.ends, 2);
        assert_eq!(
            rec.blocks,
            vec![
                vec![(1, "a".to_string()), (2, "b".to_string())],
                vec![(4, "c".to_string())],
            ]
        );
    }

    #[test]
    fn test_repeated_blank_lines() {
        let mut rec = Recorder::default();
        read_str(&mut rec, "\n\na\n\n\n\nb\n   \n").unwrap();

        assert_eq!(rec.blocks.len(), 2);
        assert_eq!(rec.ends, 2);
    }

    #[test]
    fn test_final_block_without_blank_line() {
        let mut rec = Recorder::default();
        read_str(&mut rec, "a\nb").unwrap();

        assert_eq!(rec.blocks.len(), 1);
        assert_eq!(rec.ends, 1);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut rec = Recorder::default();
        read_str(&mut rec, "a\r\n\r\nb\r\n").unwrap();

        assert_eq!(
            rec.blocks,
            vec![vec![(1, "a".to_string())], vec![(3, "b".to_string())]]
        );
    }

    #[test]
    fn test_empty_input() {
        let mut rec = Recorder::default();
        read_str(&mut rec, "").unwrap();
        assert!(rec.blocks.is_empty());
        assert_eq!(rec.ends, 0);
    }

    #[test]
    fn test_gzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.conllu.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"a\n\nb\n").unwrap();
        encoder.finish().unwrap();

        let mut rec = Recorder::default();
        read_path(&mut rec, &path).unwrap();
        assert_eq!(rec.blocks.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let mut rec = Recorder::default();
        let err = read_path(&mut rec, Path::new("/nonexistent/file.conllu")).unwrap_err();
        assert!(matches!(err, ReaderError::FileOpen { .. }));
    }
}
