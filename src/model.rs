//! Shared annotation-graph vocabulary
//!
//! Unit types, feature tiers, typed feature values, and the classification
//! of CoNLL-U node ids into words, multiword tokens, and empty words.

use std::fmt;

/// Store-assigned identifier for a unit (sentence, word, token, or edge)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The type of a unit. Assigned once, never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitType {
    Sentence,
    Word,
    Token,
    Edep,
}

impl UnitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitType::Sentence => "sentence",
            UnitType::Word => "word",
            UnitType::Token => "token",
            UnitType::Edep => "UD-edep",
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tier {
    /// Core columns and sentence comments
    UD,
    /// Morphological features (FEATS column)
    Feats,
    /// Miscellaneous annotations (MISC column)
    Misc,
    /// Internal bookkeeping such as sequence indices
    Meta,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::UD => "UD",
            Tier::Feats => "UD/FEATS",
            Tier::Misc => "UD/MISC",
            Tier::Meta => "meta",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Str,
    Int,
    Bool,
    Ref,
}

/// A typed feature value
///
/// `R` is the representation of references: block-local node names while
/// decoding (`Value<String>`), store unit ids once committed (`Value<UnitId>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<R = UnitId> {
    Str(String),
    Int(i64),
    Bool(bool),
    Ref(R),
}

/// A value as produced by the decoder, before references are resolved
pub type RawValue = Value<String>;

impl<R> Value<R> {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Str(_) => ValueType::Str,
            Value::Int(_) => ValueType::Int,
            Value::Bool(_) => ValueType::Bool,
            Value::Ref(_) => ValueType::Ref,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_ref_target(&self) -> Option<&R> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    /// Translate the reference representation, failing if the reference
    /// cannot be translated
    pub fn try_map_ref<S>(self, f: impl FnOnce(R) -> Option<S>) -> Option<Value<S>> {
        Some(match self {
            Value::Str(s) => Value::Str(s),
            Value::Int(n) => Value::Int(n),
            Value::Bool(b) => Value::Bool(b),
            Value::Ref(r) => Value::Ref(f(r)?),
        })
    }
}

impl<R: fmt::Display> fmt::Display for Value<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Ref(r) => write!(f, "{}", r),
        }
    }
}

/// Identity of a feature: (tier, name, declared type)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureKey {
    pub tier: Tier,
    pub name: String,
    pub value_type: ValueType,
}

impl FeatureKey {
    pub fn new(tier: Tier, name: &str, value_type: ValueType) -> Self {
        Self {
            tier,
            name: name.to_string(),
            value_type,
        }
    }

    #[inline]
    pub fn is(&self, tier: Tier, name: &str, value_type: ValueType) -> bool {
        self.tier == tier && self.value_type == value_type && self.name == name
    }
}

/// Shape of a CoNLL-U ID column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Plain integer id
    Word,
    /// `a-b` multiword token; the span is present only when both ends are numeric
    Token(Option<(usize, usize)>),
    /// `a.b` empty word
    EmptyWord,
}

impl NodeKind {
    /// Classify an ID column
    pub fn classify(id: &str) -> Self {
        if let Some((start, end)) = id.split_once('-') {
            NodeKind::Token(parse_index(start).zip(parse_index(end)))
        } else if id.contains('.') {
            NodeKind::EmptyWord
        } else {
            NodeKind::Word
        }
    }

    pub fn unit_type(&self) -> UnitType {
        match self {
            NodeKind::Token(_) => UnitType::Token,
            NodeKind::Word | NodeKind::EmptyWord => UnitType::Word,
        }
    }
}

/// Parse a non-empty, all-digit index
pub fn parse_index(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    atoi::atoi::<usize>(s.as_bytes())
}
