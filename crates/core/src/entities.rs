//! Classified entities and the redact set derived from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::classifier::ClassifyError;

/// Field values of one sensitive item, keyed by field name (`"Name"`, `"Email"`, ...).
pub type EntityFields = BTreeMap<String, String>;

/// Everything the classifier found on one page, keyed by ordinal (`"1"`, `"2"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRecord {
    entries: BTreeMap<String, EntityFields>,
}

impl EntityRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ordinal: impl Into<String>, fields: EntityFields) {
        self.entries.insert(ordinal.into(), fields);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntityFields)> {
        self.entries.iter()
    }

    /// Parses a classifier reply.
    ///
    /// The reply must be a JSON object whose keys are ordinals and whose
    /// values are objects of string fields. Anything else is rejected as a
    /// whole; there is no partial acceptance.
    pub fn parse(raw: &str) -> Result<Self, ClassifyError> {
        let value: Value = serde_json::from_str(raw.trim())
            .map_err(|e| ClassifyError::MalformedJson(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, ClassifyError> {
        let top = match value {
            Value::Object(top) => top,
            other => {
                return Err(ClassifyError::UnexpectedShape(format!(
                    "expected an object at top level, got {}",
                    kind_of(&other)
                )));
            }
        };

        let mut record = EntityRecord::new();
        for (ordinal, entry) in top {
            if ordinal.is_empty() || !ordinal.chars().all(|c| c.is_ascii_digit()) {
                return Err(ClassifyError::UnexpectedShape(format!(
                    "key {ordinal:?} is not an ordinal"
                )));
            }
            let fields = match entry {
                Value::Object(fields) => fields,
                other => {
                    return Err(ClassifyError::UnexpectedShape(format!(
                        "entry {ordinal} is {}, expected an object",
                        kind_of(&other)
                    )));
                }
            };

            let mut parsed = EntityFields::new();
            for (field, value) in fields {
                match value {
                    Value::String(s) => {
                        parsed.insert(field, s);
                    }
                    other => {
                        return Err(ClassifyError::UnexpectedShape(format!(
                            "field {field:?} of entry {ordinal} is {}, expected a string",
                            kind_of(&other)
                        )));
                    }
                }
            }
            record.insert(ordinal, parsed);
        }

        Ok(record)
    }

    /// Checks that every entry carries exactly the `expected` field names,
    /// no more and no fewer.
    pub fn check_fields<S: AsRef<str>>(&self, expected: &[S]) -> Result<(), ClassifyError> {
        for (ordinal, fields) in &self.entries {
            if let Some(missing) = expected
                .iter()
                .map(AsRef::as_ref)
                .find(|name| !fields.contains_key(*name))
            {
                return Err(ClassifyError::UnexpectedShape(format!(
                    "entry {ordinal} is missing field {missing:?}"
                )));
            }
            if let Some(extra) = fields
                .keys()
                .find(|key| !expected.iter().any(|name| name.as_ref() == key.as_str()))
            {
                return Err(ClassifyError::UnexpectedShape(format!(
                    "entry {ordinal} has unexpected field {extra:?}"
                )));
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, EntityFields)> for EntityRecord {
    fn from_iter<T: IntoIterator<Item = (String, EntityFields)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Tokens to black out on one page.
///
/// Tokens keep the case the classifier returned; matching lower-cases both
/// sides when a [`TokenMatcher`] is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedactSet {
    tokens: BTreeSet<String>,
}

impl RedactSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splits every non-empty field value on whitespace and collects the pieces.
    pub fn from_entities(entities: &EntityRecord) -> Self {
        let mut set = RedactSet::new();
        for (_, fields) in entities.iter() {
            for value in fields.values().filter(|v| !v.is_empty()) {
                for token in value.split_whitespace() {
                    set.insert(token);
                }
            }
        }
        set
    }

    pub fn insert(&mut self, token: impl Into<String>) -> bool {
        self.tokens.insert(token.into())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Tokens in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn matcher(&self) -> TokenMatcher {
        TokenMatcher {
            lowered: self.tokens.iter().map(|t| t.to_lowercase()).collect(),
        }
    }
}

impl<S: Into<String>> FromIterator<S> for RedactSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self {
            tokens: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Case-insensitive, exact-token lookup over a [`RedactSet`].
#[derive(Debug, Clone)]
pub struct TokenMatcher {
    lowered: HashSet<String>,
}

impl TokenMatcher {
    pub fn matches(&self, word: &str) -> bool {
        !word.is_empty() && self.lowered.contains(&word.to_lowercase())
    }
}
