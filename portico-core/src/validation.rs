//! Declarative field rules.
//!
//! A [`RuleSet`] maps field names to an ordered list of [`Rule`]s. Evaluating it against an
//! [`Input`] yields a [`Validation`] holding at most one [`FieldMessage`] per field (the first rule
//! that failed), plus the [`UniqueProbe`]s that still need an answer from the account store.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

static EMAIL_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Field must be present and not blank.
    Required,
    /// At least this many characters, surrounding whitespace excluded.
    Min(usize),
    /// At most this many characters.
    Max(usize),
    /// Looks like an email address.
    Email,
    /// Equals the `<field>_confirmation` field.
    Confirmed,
    /// Value is an `image/*` MIME type.
    Image,
    /// No other account holds this value. `ignore` is the value the caller already owns, compared
    /// after Unicode lower-casing.
    Unique { ignore: Option<String> },
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::Min(_) => "min",
            Rule::Max(_) => "max",
            Rule::Email => "email",
            Rule::Confirmed => "confirmed",
            Rule::Image => "image",
            Rule::Unique { .. } => "unique",
        }
    }
}

/// Request payload as seen by the rules: field name to raw string value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Input {
    fields: BTreeMap<String, String>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Sets the field only when a value is given; absent stays absent.
    pub fn with_opt(mut self, field: impl Into<String>, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.set(field, value);
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Value of the field if present and non-empty.
    fn filled(&self, field: &str) -> Option<&str> {
        self.get(field).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMessage {
    pub message: String,
    pub field: String,
    pub validation: &'static str,
}

impl FieldMessage {
    pub fn new(field: &str, validation: &'static str) -> Self {
        Self {
            message: format!("{validation} validation failed on {field}"),
            field: field.to_string(),
            validation,
        }
    }
}

/// A uniqueness check the rules cannot answer on their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueProbe {
    pub field: String,
    pub value: String,
    /// Position of the field in its rule set; keeps a late `unique` message in declaration order.
    pub slot: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    messages: Vec<FieldMessage>,
    slots: Vec<usize>,
}

impl Validation {
    pub fn fails(&self) -> bool {
        !self.messages.is_empty()
    }

    pub fn messages(&self) -> &[FieldMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<FieldMessage> {
        self.messages
    }

    fn insert(&mut self, slot: usize, message: FieldMessage) {
        let at = self.slots.partition_point(|s| *s <= slot);
        self.slots.insert(at, slot);
        self.messages.insert(at, message);
    }

    /// Folds the answer to a probe back into the result.
    pub fn resolve(&mut self, probe: &UniqueProbe, taken: bool) {
        if taken {
            self.insert(probe.slot, FieldMessage::new(&probe.field, "unique"));
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    fields: Vec<(String, Vec<Rule>)>,
}

enum Outcome {
    Pass,
    Fail,
    Probe(UniqueProbe),
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.fields.push((name.to_string(), rules.into_iter().collect()));
        self
    }

    /// Runs every synchronous rule. Fields that failed are never probed for uniqueness.
    pub fn evaluate(&self, input: &Input) -> (Validation, Vec<UniqueProbe>) {
        let mut validation = Validation::default();
        let mut probes = Vec::new();

        for (slot, (field, rules)) in self.fields.iter().enumerate() {
            let value = input.filled(field);
            let mut pending = None;

            for rule in rules {
                match check(rule, slot, field, value, input) {
                    Outcome::Pass => {}
                    Outcome::Fail => {
                        validation.insert(slot, FieldMessage::new(field, rule.name()));
                        pending = None;
                        break;
                    }
                    Outcome::Probe(p) => pending = Some(p),
                }
            }

            probes.extend(pending);
        }

        (validation, probes)
    }
}

fn check(rule: &Rule, slot: usize, field: &str, value: Option<&str>, input: &Input) -> Outcome {
    let Some(value) = value else {
        return match rule {
            Rule::Required => Outcome::Fail,
            _ => Outcome::Pass,
        };
    };

    let ok = match rule {
        Rule::Required => !value.trim().is_empty(),
        // padding does not count towards the minimum
        Rule::Min(n) => value.trim().chars().count() >= *n,
        Rule::Max(n) => value.chars().count() <= *n,
        Rule::Email => EMAIL_RE.as_ref().is_some_and(|re| re.is_match(value)),
        Rule::Confirmed => input.get(&format!("{field}_confirmation")) == Some(value),
        Rule::Image => value.starts_with("image/"),
        Rule::Unique { ignore } => {
            // same notion of equality as the stores' lower-cased email keys
            if ignore.as_deref().is_some_and(|own| own.to_lowercase() == value.to_lowercase()) {
                return Outcome::Pass;
            }
            return Outcome::Probe(UniqueProbe {
                field: field.to_string(),
                value: value.to_string(),
                slot,
            });
        }
    };

    if ok { Outcome::Pass } else { Outcome::Fail }
}
