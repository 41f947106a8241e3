use std::collections::HashSet;

use once_cell::sync::Lazy;

use super::object_key;
use crate::command::grammar::{Clause, CompiledGrammar, FLAG, Grammar, Repeatable, TOKEN};
use crate::handlers::OperationError;

const MKZIP: Grammar = Grammar {
    operation: "mkzip",
    required: &[Clause::new("bucket", TOKEN)],
    optional: &[Clause::new("encoding", TOKEN)],
    repeatable: Some(Repeatable {
        clause: Clause::new("url", TOKEN),
        companion: Some(Clause::new("alias", TOKEN)),
        min: 1,
    }),
};

const UNZIP: Grammar = Grammar {
    operation: "unzip",
    required: &[Clause::new("bucket", TOKEN)],
    optional: &[Clause::new("prefix", TOKEN), Clause::new("overwrite", FLAG)],
    repeatable: None,
};

static MKZIP_GRAMMAR: Lazy<CompiledGrammar> = Lazy::new(|| MKZIP.compile());
static UNZIP_GRAMMAR: Lazy<CompiledGrammar> = Lazy::new(|| UNZIP.compile());

/// Encoding of entry names inside the produced archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameEncoding {
    Utf8,
}

impl NameEncoding {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Some(NameEncoding::Utf8),
            _ => None,
        }
    }
}

/// One file going into the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub url: String,
    /// Object key in the bucket, taken from the url path
    pub key: String,
    /// Entry name inside the archive
    pub alias: String,
}

/// `mkzip/bucket/<b64>[/encoding/<b64>](/url/<b64>[/alias/<b64>])+`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MkzipParams {
    bucket: String,
    encoding: NameEncoding,
    entries: Vec<ArchiveEntry>,
}

impl MkzipParams {
    pub fn parse(command: &str) -> Result<Self, OperationError> {
        let grammar = &*MKZIP_GRAMMAR;
        grammar.validate(command)?;

        let bucket = grammar.required(command, "bucket")?;

        let encoding = match grammar.decoded(command, "encoding")? {
            Some(name) => NameEncoding::from_name(&name).ok_or_else(|| {
                OperationError::invalid("encoding", format!("unsupported encoding '{name}'"))
            })?,
            None => NameEncoding::Utf8,
        };

        let mut aliases = HashSet::new();
        let mut entries = Vec::new();
        for repeat in grammar.repeats(command)? {
            let key = object_key("url", &repeat.value)?;
            let alias = repeat.companion.unwrap_or_else(|| key.clone());

            if !aliases.insert(alias.clone()) {
                return Err(OperationError::invalid(
                    "alias",
                    format!("duplicate resource alias '{alias}'"),
                ));
            }

            entries.push(ArchiveEntry {
                url: repeat.value,
                key,
                alias,
            });
        }

        Ok(Self {
            bucket,
            encoding,
            entries,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn encoding(&self) -> NameEncoding {
        self.encoding
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }
}

/// `unzip/bucket/<b64>[/prefix/<b64>][/overwrite/(0|1)]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnzipParams {
    bucket: String,
    prefix: String,
    overwrite: bool,
}

impl UnzipParams {
    pub fn parse(command: &str) -> Result<Self, OperationError> {
        let grammar = &*UNZIP_GRAMMAR;
        grammar.validate(command)?;

        Ok(Self {
            bucket: grammar.required(command, "bucket")?,
            prefix: grammar.decoded(command, "prefix")?.unwrap_or_default(),
            overwrite: grammar.flag(command, "overwrite", false),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }
}
