//! Intent source parsing and merging.
//!
//! Three on-disk formats feed one canonical [`IntentTable`]:
//!
//! - **Legacy delimited** (`.anl`): `---` separated sections; records of the
//!   form `TYPE:intent_id:example` live in the third section.
//! - **Compact JSON A** (`ava-1.0`): `{"i": [{"id", "s": [...], "c"}]}`.
//! - **Compact JSON B** (`vos-1.0`): `{"commands": [{"action", "cmd", "syn": [...]}]}`.
//!
//! Parsing never fails loudly. [`parse_source`] returns a [`ParseOutcome`]
//! that keeps "parsed nothing because the file is empty" apart from
//! "parsed nothing because the file is broken".

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

/// Literal section delimiter line of the legacy format.
const SECTION_DELIMITER: &str = "---";

/// Delimiters that must precede the intent section.
const INTENT_SECTION_INDEX: usize = 2;

/// One intent and its ordered, de-duplicated example phrases.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Intent {
    /// Stable intent identifier.
    pub id: String,
    /// Example phrases in first-seen order.
    pub examples: Vec<String>,
}

/// Insertion-ordered intent id → examples table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IntentTable {
    intents: Vec<Intent>,
    index: HashMap<String, usize>,
}

impl IntentTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add examples to an intent, creating it if absent.
    ///
    /// Examples already present (exact match) are skipped.
    pub fn insert<I, S>(&mut self, id: &str, examples: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slot = match self.index.get(id) {
            Some(&slot) => slot,
            None => {
                let slot = self.intents.len();
                self.intents.push(Intent {
                    id: id.to_string(),
                    examples: Vec::new(),
                });
                let _ = self.index.insert(id.to_string(), slot);
                slot
            }
        };
        let intent = &mut self.intents[slot];
        for example in examples {
            let example = example.into();
            if !intent.examples.contains(&example) {
                intent.examples.push(example);
            }
        }
    }

    /// Merge `other` into `self`, preserving existing order then `other`'s order.
    #[must_use]
    pub fn merge(mut self, other: IntentTable) -> IntentTable {
        for intent in other.intents {
            self.insert(&intent.id, intent.examples);
        }
        self
    }

    /// Look up an intent by id.
    pub fn get(&self, id: &str) -> Option<&Intent> {
        self.index.get(id).map(|&slot| &self.intents[slot])
    }

    /// Intents in canonical (first-seen) order.
    pub fn iter(&self) -> impl Iterator<Item = &Intent> {
        self.intents.iter()
    }

    /// Number of intents.
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    /// Whether the table has no intents.
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Total examples across all intents.
    pub fn example_count(&self) -> usize {
        self.intents.iter().map(|i| i.examples.len()).sum()
    }
}

impl<'a> IntoIterator for &'a IntentTable {
    type Item = &'a Intent;
    type IntoIter = std::slice::Iter<'a, Intent>;

    fn into_iter(self) -> Self::IntoIter {
        self.intents.iter()
    }
}

/// Source format chosen by [`classify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    /// `---` sectioned text with `TYPE:id:example` records.
    LegacyDelimited,
    /// JSON object with an `i` array of `{id, s, c}` entries.
    CompactJsonA,
    /// JSON object with a `commands` array of `{action, cmd, syn}` entries.
    CompactJsonB,
    /// JSON-looking content matching neither shape.
    Unrecognized,
}

/// Result of parsing one source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseOutcome {
    /// At least one intent was found.
    Parsed(IntentTable),
    /// The content is well-formed but declares no intents.
    Empty,
    /// The content could not be understood.
    Failed(String),
}

impl ParseOutcome {
    /// The parsed table, or an empty one.
    pub fn into_table(self) -> IntentTable {
        match self {
            Self::Parsed(table) => table,
            Self::Empty | Self::Failed(_) => IntentTable::new(),
        }
    }

    fn from_table(table: IntentTable) -> Self {
        if table.is_empty() {
            Self::Empty
        } else {
            Self::Parsed(table)
        }
    }
}

/// Pick the source format by inspecting raw content.
pub fn classify(content: &str) -> SourceFormat {
    if !content.trim_start().starts_with('{') {
        return SourceFormat::LegacyDelimited;
    }
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => {
            if map.get("i").is_some_and(Value::is_array) {
                SourceFormat::CompactJsonA
            } else if map.get("commands").is_some_and(Value::is_array) {
                SourceFormat::CompactJsonB
            } else {
                SourceFormat::Unrecognized
            }
        }
        _ => SourceFormat::Unrecognized,
    }
}

/// Parse one source file's content into intents.
///
/// A compact-A document that yields nothing is retried as compact-B.
pub fn parse_source(content: &str) -> ParseOutcome {
    match classify(content) {
        SourceFormat::LegacyDelimited => parse_legacy(content),
        SourceFormat::CompactJsonA => match parse_compact_a(content) {
            ParseOutcome::Empty => match parse_compact_b(content) {
                ParseOutcome::Failed(_) => ParseOutcome::Empty,
                other => other,
            },
            other => other,
        },
        SourceFormat::CompactJsonB => parse_compact_b(content),
        SourceFormat::Unrecognized => ParseOutcome::Failed(unrecognized_reason(content)),
    }
}

fn unrecognized_reason(content: &str) -> String {
    match serde_json::from_str::<Value>(content) {
        Err(e) => format!("invalid JSON: {e}"),
        Ok(_) => "JSON has neither an \"i\" nor a \"commands\" array".to_string(),
    }
}

/// Parse the legacy `---` sectioned format.
///
/// Only lines seen after exactly two delimiter lines are candidate records.
pub fn parse_legacy(content: &str) -> ParseOutcome {
    let mut table = IntentTable::new();
    let mut delimiters = 0usize;
    let mut meaningful = false;

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        meaningful = true;
        if line == SECTION_DELIMITER {
            delimiters += 1;
            continue;
        }
        if delimiters != INTENT_SECTION_INDEX {
            continue;
        }
        if let Some((id, example)) = parse_legacy_record(line) {
            table.insert(id, [example]);
        }
    }

    if !meaningful {
        return ParseOutcome::Empty;
    }
    if delimiters < INTENT_SECTION_INDEX {
        return ParseOutcome::Failed(format!(
            "expected an intent section after {INTENT_SECTION_INDEX} '{SECTION_DELIMITER}' lines, found {delimiters}"
        ));
    }
    ParseOutcome::from_table(table)
}

/// Split a `TYPE:id:text` record. `text` keeps any further colons.
fn parse_legacy_record(line: &str) -> Option<(&str, &str)> {
    let mut parts = line.splitn(3, ':');
    let kind = parts.next()?.trim();
    let id = parts.next()?.trim();
    let example = parts.next()?.trim();

    if !is_record_type(kind) || id.is_empty() || example.is_empty() {
        return None;
    }
    Some((id, example))
}

/// Record types are uppercase tags such as `VCM`, `INFO`, `JIT`.
fn is_record_type(kind: &str) -> bool {
    !kind.is_empty()
        && !kind.chars().any(char::is_whitespace)
        && kind.chars().any(char::is_uppercase)
        && !kind.chars().any(char::is_lowercase)
}

#[derive(Deserialize)]
struct CompactA {
    #[serde(default)]
    i: Vec<CompactAIntent>,
}

#[derive(Deserialize)]
struct CompactAIntent {
    #[serde(default)]
    id: String,
    #[serde(default)]
    s: Vec<String>,
    #[serde(default)]
    c: Option<String>,
}

/// Parse compact JSON shape A. The canonical phrase `c` is listed first.
pub fn parse_compact_a(content: &str) -> ParseOutcome {
    let doc: CompactA = match serde_json::from_str(content) {
        Ok(doc) => doc,
        Err(e) => return ParseOutcome::Failed(format!("compact intent JSON: {e}")),
    };

    let mut table = IntentTable::new();
    for entry in doc.i {
        if entry.id.is_empty() {
            continue;
        }
        let canonical = entry.c.filter(|c| !c.is_empty());
        let examples: Vec<String> = canonical.into_iter().chain(entry.s).collect();
        if !examples.is_empty() {
            table.insert(&entry.id, examples);
        }
    }
    ParseOutcome::from_table(table)
}

#[derive(Deserialize)]
struct CompactB {
    #[serde(default)]
    commands: Vec<CompactBCommand>,
}

#[derive(Deserialize)]
struct CompactBCommand {
    #[serde(default)]
    action: String,
    #[serde(default)]
    cmd: String,
    #[serde(default)]
    syn: Vec<String>,
}

/// Parse compact JSON shape B. Intent id is the lowercased `action`.
pub fn parse_compact_b(content: &str) -> ParseOutcome {
    let doc: CompactB = match serde_json::from_str(content) {
        Ok(doc) => doc,
        Err(e) => return ParseOutcome::Failed(format!("command JSON: {e}")),
    };

    let mut table = IntentTable::new();
    for command in doc.commands {
        if command.action.is_empty() || command.cmd.is_empty() {
            continue;
        }
        let id = command.action.to_lowercase();
        table.insert(&id, std::iter::once(command.cmd).chain(command.syn));
    }
    ParseOutcome::from_table(table)
}

/// Parse a flat `{"intent_id": ["example", ...]}` map (document order kept).
pub fn load_intents_json(content: &str) -> Result<IntentTable, serde_json::Error> {
    let map: serde_json::Map<String, Value> = serde_json::from_str(content)?;
    let mut table = IntentTable::new();
    for (id, value) in map {
        let examples: Vec<String> = serde_json::from_value(value)?;
        if !id.is_empty() && !examples.is_empty() {
            table.insert(&id, examples);
        }
    }
    Ok(table)
}
