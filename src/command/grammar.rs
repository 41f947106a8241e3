//! Per-operation command grammars, held as data
//!
//! A grammar is the operation literal, required clauses in fixed order,
//! optional clauses in any order and an optional trailing repeatable clause.
//! [`Grammar::compile`] turns it into one whole-string regex used for
//! validation plus one extractor per field.

use std::collections::HashMap;

use regex::Regex;

use super::codec::{self, DecodeError, Repeat};
use crate::handlers::OperationError;

/// Alphabet of base64url-encoded values.
pub const TOKEN: &str = "[0-9A-Za-z_=-]+";
pub const INTEGER: &str = r"\d+";
pub const FLAG: &str = "0|1";

/// A single `name/<value>` clause, `value` being a regex fragment.
#[derive(Debug, Clone, Copy)]
pub struct Clause {
    pub name: &'static str,
    pub value: &'static str,
}

impl Clause {
    pub const fn new(name: &'static str, value: &'static str) -> Self {
        Self { name, value }
    }

    fn fragment(&self) -> String {
        format!("/{}/(?:{})", self.name, self.value)
    }

    fn extractor(&self) -> Regex {
        compile_regex(&format!("(?:^|/){}/(?:{})", self.name, self.value))
    }
}

/// Trailing clause that may occur several times, with an optional companion
/// clause attached to each occurrence.
#[derive(Debug, Clone, Copy)]
pub struct Repeatable {
    pub clause: Clause,
    pub companion: Option<Clause>,
    pub min: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Grammar {
    pub operation: &'static str,
    pub required: &'static [Clause],
    pub optional: &'static [Clause],
    pub repeatable: Option<Repeatable>,
}

impl Grammar {
    pub fn compile(&self) -> CompiledGrammar {
        let mut whole = format!("^{}", regex::escape(self.operation));

        for clause in self.required {
            whole.push_str(&clause.fragment());
        }

        if !self.optional.is_empty() {
            let alternatives: Vec<String> =
                self.optional.iter().map(Clause::fragment).collect();
            whole.push_str(&format!(
                "(?:{}){{0,{}}}",
                alternatives.join("|"),
                self.optional.len()
            ));
        }

        let repeat = self.repeatable.map(|repeatable| {
            let mut fragment = repeatable.clause.fragment();
            if let Some(companion) = repeatable.companion {
                fragment.push_str(&format!("(?:{})?", companion.fragment()));
            }

            let quantifier = match repeatable.min {
                0 => "*".to_string(),
                1 => "+".to_string(),
                n => format!("{{{n},}}"),
            };
            whole.push_str(&format!("(?:{fragment}){quantifier}"));

            let extractor = compile_regex(&format!("(?:^|/){}", &fragment[1..]));
            (repeatable, extractor)
        });

        whole.push('$');

        let fields = self
            .required
            .iter()
            .chain(self.optional.iter())
            .map(|clause| (clause.name, clause.extractor()))
            .collect();

        CompiledGrammar {
            operation: self.operation,
            whole: compile_regex(&whole),
            fields,
            repeat,
        }
    }
}

/// A grammar ready for matching. Built once per operation and kept in a
/// static.
#[derive(Debug)]
pub struct CompiledGrammar {
    operation: &'static str,
    whole: Regex,
    fields: HashMap<&'static str, Regex>,
    repeat: Option<(Repeatable, Regex)>,
}

impl CompiledGrammar {
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Whole-string structural check; nothing is extracted from a command
    /// that fails it.
    pub fn validate(&self, command: &str) -> Result<(), OperationError> {
        if self.whole.is_match(command) {
            Ok(())
        } else {
            Err(OperationError::CommandFormat {
                operation: self.operation.to_string(),
            })
        }
    }

    /// Raw value of a field, `None` when absent.
    pub fn plain<'a>(&self, command: &'a str, field: &str) -> Option<&'a str> {
        let pattern = self.fields.get(field)?;
        codec::plain_value(command, pattern, field)
    }

    /// Decoded value of a base64url field, `None` when absent.
    pub fn decoded(&self, command: &str, field: &str) -> Result<Option<String>, DecodeError> {
        match self.fields.get(field) {
            Some(pattern) => codec::decoded_value(command, pattern, field),
            None => Ok(None),
        }
    }

    /// Decoded value of a field the grammar requires.
    pub fn required(&self, command: &str, field: &str) -> Result<String, OperationError> {
        self.decoded(command, field)?
            .ok_or_else(|| OperationError::invalid(field, "missing"))
    }

    /// Integer field, `None` when absent.
    pub fn integer(&self, command: &str, field: &str) -> Result<Option<u32>, OperationError> {
        self.plain(command, field)
            .map(|raw| {
                raw.parse::<u32>()
                    .map_err(|err| OperationError::invalid(field, err.to_string()))
            })
            .transpose()
    }

    /// `0|1` field, `default` when absent.
    pub fn flag(&self, command: &str, field: &str, default: bool) -> bool {
        self.plain(command, field)
            .map(|raw| raw == "1")
            .unwrap_or(default)
    }

    /// All occurrences of the repeatable clause in input order.
    pub fn repeats(&self, command: &str) -> Result<Vec<Repeat>, DecodeError> {
        match &self.repeat {
            Some((repeatable, pattern)) => codec::repeated_values(
                command,
                pattern,
                repeatable.clause.name,
                repeatable.companion.map(|clause| clause.name),
            ),
            None => Ok(Vec::new()),
        }
    }
}

/// Grammar fragments are compile-time constants; a bad one is a programming
/// error caught by the grammar tests.
fn compile_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid grammar pattern {pattern}: {err}"))
}
