//! CoNLL-U conversion
//!
//! Decodes CoNLL-U sentence blocks into an annotation graph and encodes the
//! graph back into CoNLL-U rows.
//!
//! Units imported:
//! - `sentence`: one per block with at least one row. Comment lines containing
//!   `=` become string features in the `UD` tier.
//! - `word`, `token`: one per row, parented to the sentence. Overt words get a
//!   relation to the multiword token containing them.
//! - `UD-edep`: one per enhanced dependency, with reference features
//!   `UD:parent` and `UD:child` and a string feature `UD:deprel`.
//!
//! CoNLL-U format: https://universaldependencies.org/format.html

use crate::blocks::{BlockReader, ReaderError};
use crate::model::{FeatureKey, NodeKind, Tier, UnitId, UnitType, Value, ValueType, parse_index};
use crate::store::{AnnotationSink, AnnotationSource, KeyId, UnitRecord};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::io::{self, Write};
use thiserror::Error;
use tracing::debug;

/// Block-local name of the sentence node
const SENTENCE: &str = "sentence";

/// Number of tab-separated columns in an annotation row
pub const COLUMN_COUNT: usize = 10;

const ID: usize = 0;
const FEATS: usize = 5;
const HEAD: usize = 6;
const DEPREL: usize = 7;
const DEPS: usize = 8;
const MISC: usize = 9;

/// Scalar columns stored as `UD` tier features
const SCALAR_COLUMNS: [(&str, usize); 6] = [
    ("form", 1),
    ("lemma", 2),
    ("upos", 3),
    ("xpos", 4),
    ("head", HEAD),
    ("deprel", DEPREL),
];

/// Error during CoNLL-U decoding
#[derive(Debug, Error)]
pub enum ConlluError {
    #[error("Line {line}: expected 10 columns, found {found}")]
    ColumnCount { line: usize, found: usize },

    #[error("Line {line}: invalid key-value pair '{pair}'")]
    InvalidFeaturePair { line: usize, pair: String },

    #[error("Line {line}: invalid dependency specifier '{pair}'")]
    InvalidEnhancedDependency { line: usize, pair: String },
}

/// Options for [`ConlluReader`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    /// `meta:index` assigned to the first sentence; when unset, numbering
    /// continues from the blocks the sink has already committed
    pub block_offset: Option<usize>,
}

/// Counters scoped to a single sentence block
#[derive(Debug, Default)]
struct BlockContext {
    word_idx: i64,
    token_idx: i64,
    edep_count: usize,
    rows: usize,
    /// Multiword token names with their numeric spans
    spans: Vec<(String, usize, usize)>,
    /// Plain integer word ids declared in this block
    words: Vec<usize>,
}

/// Decoder from CoNLL-U lines into an [`AnnotationSink`]
pub struct ConlluReader<'a, S: AnnotationSink + ?Sized> {
    sink: &'a mut S,
    block: BlockContext,
    block_count: usize,
}

impl<'a, S: AnnotationSink + ?Sized> ConlluReader<'a, S> {
    pub fn new(sink: &'a mut S) -> Self {
        Self::with_options(sink, ReaderOptions::default())
    }

    pub fn with_options(sink: &'a mut S, options: ReaderOptions) -> Self {
        let block_count = options
            .block_offset
            .unwrap_or_else(|| sink.committed_blocks());
        Self {
            sink,
            block: BlockContext::default(),
            block_count,
        }
    }

    /// Number of blocks processed so far, including the offset
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Drop any partially decoded block
    pub fn abandon_block(&mut self) {
        self.sink.discard_block();
        self.block = BlockContext::default();
    }

    fn process_comment(&mut self, comment: &str) {
        // Comments without `=` carry nothing we import
        if let Some((key, value)) = comment.split_once('=') {
            self.sink.set_feature(
                SENTENCE,
                Tier::UD,
                key.trim(),
                Value::Str(value.trim().to_string()),
            );
        }
    }

    fn process_row(&mut self, row: &str, line: usize) -> Result<(), ReaderError> {
        let found = memchr::memchr_iter(b'\t', row.as_bytes()).count() + 1;
        if found != COLUMN_COUNT {
            return Err(ConlluError::ColumnCount { line, found }.into());
        }
        let mut columns = [""; COLUMN_COUNT];
        for (slot, column) in columns.iter_mut().zip(row.split('\t')) {
            *slot = column;
        }
        self.block.rows += 1;

        let name = columns[ID];
        let kind = NodeKind::classify(name);
        self.sink.set_type(name, kind.unit_type())?;
        self.sink.set_parent(name, SENTENCE);
        self.sink
            .set_feature(name, Tier::UD, "id", Value::Str(name.to_string()));

        match kind {
            NodeKind::Token(span) => {
                self.block.token_idx += 1;
                self.sink
                    .set_feature(name, Tier::Meta, "index", Value::Int(self.block.token_idx));
                // Containment is resolved at block end, once the covered words are known
                if let Some((start, end)) = span {
                    self.block.spans.push((name.to_string(), start, end));
                }
            }
            NodeKind::Word | NodeKind::EmptyWord => {
                if let Some(n) = parse_index(name).filter(|n| n.to_string() == name) {
                    self.block.words.push(n);
                }
                self.block.word_idx += 1;
                self.sink
                    .set_feature(name, Tier::Meta, "index", Value::Int(self.block.word_idx));
                self.sink.set_feature(
                    name,
                    Tier::UD,
                    "null",
                    Value::Bool(kind == NodeKind::EmptyWord),
                );
            }
        }

        for (tier, column) in [(Tier::Feats, columns[FEATS]), (Tier::Misc, columns[MISC])] {
            for (key, value) in parse_pairs(column, line)? {
                let value = if tier == Tier::Misc && key == "SpaceAfter" {
                    Value::Bool(value != "No")
                } else {
                    Value::Str(value.to_string())
                };
                self.sink.set_feature(name, tier, key, value);
            }
        }

        for (feature, col) in SCALAR_COLUMNS {
            let value = columns[col];
            if value == "_" {
                continue;
            }
            let value = if col == HEAD {
                // Root is marked by the absence of a head
                if value == "0" {
                    continue;
                }
                Value::Ref(value.to_string())
            } else {
                Value::Str(value.to_string())
            };
            self.sink.set_feature(name, Tier::UD, feature, value);
        }

        for (head, deprel) in parse_deps(columns[DEPS], line)? {
            self.block.edep_count += 1;
            let edge = format!("\t{}", self.block.edep_count);
            self.sink.set_type(&edge, UnitType::Edep)?;
            self.sink.set_parent(&edge, SENTENCE);
            self.sink
                .set_feature(&edge, Tier::UD, "parent", Value::Ref(head.to_string()));
            self.sink
                .set_feature(&edge, Tier::UD, "child", Value::Ref(name.to_string()));
            self.sink
                .set_feature(&edge, Tier::UD, "deprel", Value::Str(deprel.to_string()));
        }

        Ok(())
    }
}

impl<S: AnnotationSink + ?Sized> BlockReader for ConlluReader<'_, S> {
    fn reset(&mut self) {
        self.block = BlockContext::default();
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), ReaderError> {
        if line.is_empty() {
            return Ok(());
        }
        if let Some(comment) = line.strip_prefix('#') {
            self.process_comment(comment);
            return Ok(());
        }
        self.process_row(line.trim(), line_num)
    }

    fn end(&mut self) -> Result<(), ReaderError> {
        for (token, start, end) in &self.block.spans {
            for word in self.block.words.iter().filter(|w| (*start..=*end).contains(*w)) {
                self.sink.add_relation(&word.to_string(), token);
            }
        }
        if self.block.rows > 0 {
            self.sink.set_type(SENTENCE, UnitType::Sentence)?;
            self.sink.set_feature(
                SENTENCE,
                Tier::Meta,
                "index",
                Value::Int(self.block_count as i64),
            );
        }
        debug!(
            block = self.block_count,
            rows = self.block.rows,
            edeps = self.block.edep_count,
            "end of block"
        );
        self.sink.end_block()?;
        self.block_count += 1;
        Ok(())
    }
}

/// Parse a FEATS or MISC column (`key=value|key=value`)
fn parse_pairs(column: &str, line: usize) -> Result<Vec<(&str, &str)>, ConlluError> {
    if column == "_" {
        return Ok(Vec::new());
    }
    column
        .split('|')
        .map(|pair| {
            pair.split_once('=')
                .ok_or_else(|| ConlluError::InvalidFeaturePair {
                    line,
                    pair: pair.to_string(),
                })
        })
        .collect()
}

/// Parse a DEPS column (`head:deprel|head:deprel`)
fn parse_deps(column: &str, line: usize) -> Result<Vec<(&str, &str)>, ConlluError> {
    if column == "_" {
        return Ok(Vec::new());
    }
    column
        .split('|')
        .map(|pair| {
            pair.split_once(':')
                .ok_or_else(|| ConlluError::InvalidEnhancedDependency {
                    line,
                    pair: pair.to_string(),
                })
        })
        .collect()
}

/// Feature keys the encoder needs, aggregated once per output run
struct KeyTable {
    keys: BTreeMap<KeyId, FeatureKey>,
    requested: Vec<KeyId>,
    sent_id: Vec<KeyId>,
    null: Option<KeyId>,
}

impl KeyTable {
    fn build<S: AnnotationSource + ?Sized>(source: &S) -> Self {
        let keys = source.feature_keys(&[Tier::UD, Tier::Feats, Tier::Misc]);
        let requested = keys.keys().copied().collect();
        let sent_id = keys
            .iter()
            .filter(|(_, k)| {
                k.is(Tier::UD, "sent_id", ValueType::Str) || k.is(Tier::UD, "sent_id", ValueType::Int)
            })
            .map(|(id, _)| *id)
            .collect();
        let null = keys
            .iter()
            .find(|(_, k)| k.is(Tier::UD, "null", ValueType::Bool))
            .map(|(id, _)| *id);
        Self {
            keys,
            requested,
            sent_id,
            null,
        }
    }
}

/// Major/minor position counter for word rows
///
/// Empty words take the next minor index after the preceding overt word.
#[derive(Debug, Default)]
struct Position {
    major: usize,
    minor: usize,
}

impl Position {
    fn next(&mut self, empty: bool) -> String {
        if empty {
            self.minor += 1;
            format!("{}:{}", self.major, self.minor)
        } else {
            self.major += 1;
            self.minor = 0;
            self.major.to_string()
        }
    }
}

/// Encoder from an [`AnnotationSource`] to CoNLL-U text
pub struct ConlluWriter<'a, S: AnnotationSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: AnnotationSource + ?Sized> ConlluWriter<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Write every sentence in the store
    pub fn write<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        let table = KeyTable::build(self.source);
        for sentence in self
            .source
            .iter_units(UnitType::Sentence, &table.requested, None)
        {
            self.write_sentence(&table, &sentence, out)?;
        }
        Ok(())
    }

    /// Encode the whole store into a string
    pub fn write_to_string(&self) -> io::Result<String> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn write_sentence<W: Write + ?Sized>(
        &self,
        table: &KeyTable,
        sentence: &UnitRecord,
        out: &mut W,
    ) -> io::Result<()> {
        match table.sent_id.iter().find_map(|k| sentence.get(*k)) {
            Some(sent_id) => writeln!(out, "# sent_id = {}", sent_id)?,
            None => writeln!(out, "# sent_id = {}", sentence.id)?,
        }
        for (key, value) in &sentence.features {
            if table.sent_id.contains(key) {
                continue;
            }
            let feature = &table.keys[key];
            if feature.tier == Tier::UD {
                writeln!(out, "# {} = {}", feature.name, value)?;
            }
        }

        let rows = self.word_rows(table, sentence.id);
        for row in &rows {
            writeln!(out, "{}", row.join("\t"))?;
        }
        writeln!(out)
    }

    /// Build the rows for every word of a sentence, resolving heads once all
    /// positions are known
    fn word_rows(&self, table: &KeyTable, sentence: UnitId) -> Vec<[String; COLUMN_COUNT]> {
        let mut rows: Vec<[String; COLUMN_COUNT]> = Vec::new();
        let mut positions: FxHashMap<UnitId, String> = FxHashMap::default();
        let mut heads: Vec<(usize, UnitId)> = Vec::new();
        let mut position = Position::default();

        for word in self
            .source
            .iter_units(UnitType::Word, &table.requested, Some(sentence))
        {
            let empty = table
                .null
                .and_then(|k| word.get(k))
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let pos = position.next(empty);
            positions.insert(word.id, pos.clone());

            let mut row: [String; COLUMN_COUNT] = std::array::from_fn(|_| "_".to_string());
            row[ID] = pos;

            let mut feats = Vec::new();
            let mut misc = Vec::new();
            for (key, value) in &word.features {
                let feature = &table.keys[key];
                match feature.tier {
                    Tier::Feats => feats.push(format!("{}={}", feature.name, value)),
                    Tier::Misc => misc.push(format_misc(feature, value)),
                    Tier::UD => match (feature.name.as_str(), value) {
                        ("form", v) => row[1] = v.to_string(),
                        ("lemma", v) => row[2] = v.to_string(),
                        ("upos", v) => row[3] = v.to_string(),
                        ("xpos", v) => row[4] = v.to_string(),
                        ("deprel", v) => row[DEPREL] = v.to_string(),
                        ("head", Value::Ref(target)) => heads.push((rows.len(), *target)),
                        _ => {}
                    },
                    Tier::Meta => {}
                }
            }
            if !feats.is_empty() {
                feats.sort();
                row[FEATS] = feats.join("|");
            }
            if !misc.is_empty() {
                misc.sort();
                row[MISC] = misc.join("|");
            }
            rows.push(row);
        }

        // Heads pointing outside this sentence's words stay `_`
        for (i, target) in heads {
            if let Some(pos) = positions.get(&target) {
                rows[i][HEAD] = pos.clone();
            }
        }

        for row in &mut rows {
            if row[HEAD] == "_" && row[DEPREL] == "root" {
                row[HEAD] = "0".to_string();
            }
        }

        rows
    }
}

fn format_misc(feature: &FeatureKey, value: &Value) -> String {
    match value {
        Value::Bool(b) if feature.name == "SpaceAfter" => {
            format!("SpaceAfter={}", if *b { "Yes" } else { "No" })
        }
        _ => format!("{}={}", feature.name, value),
    }
}

/// Decode CoNLL-U text into `sink`
pub fn read_str<S: AnnotationSink + ?Sized>(sink: &mut S, text: &str) -> Result<(), ReaderError> {
    let mut reader = ConlluReader::new(sink);
    let result = crate::blocks::read_str(&mut reader, text);
    if result.is_err() {
        reader.abandon_block();
    }
    result
}

/// Encode everything in `source` as CoNLL-U text
pub fn write_string<S: AnnotationSource + ?Sized>(source: &S) -> io::Result<String> {
    ConlluWriter::new(source).write_to_string()
}
