use once_cell::sync::Lazy;

use super::object_key;
use crate::command::grammar::{Clause, CompiledGrammar, Grammar, TOKEN};
use crate::handlers::OperationError;

const AMERGE: Grammar = Grammar {
    operation: "amerge",
    required: &[
        Clause::new("format", "[0-9A-Za-z]+"),
        Clause::new("mime", TOKEN),
        Clause::new("bucket", TOKEN),
        Clause::new("url", TOKEN),
    ],
    optional: &[Clause::new("duration", "first|shortest|longest")],
    repeatable: None,
};

static AMERGE_GRAMMAR: Lazy<CompiledGrammar> = Lazy::new(|| AMERGE.compile());

/// Length of the merged stream, as understood by ffmpeg's `amix`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDuration {
    First,
    Shortest,
    Longest,
}

impl MergeDuration {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "first" => Some(MergeDuration::First),
            "shortest" => Some(MergeDuration::Shortest),
            "longest" => Some(MergeDuration::Longest),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeDuration::First => "first",
            MergeDuration::Shortest => "shortest",
            MergeDuration::Longest => "longest",
        }
    }
}

/// `amerge/format/<fmt>/mime/<b64>/bucket/<b64>/url/<b64>[/duration/<d>]`
///
/// The request source is the first stream; `url` names the second one,
/// which must live in `bucket`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmergeParams {
    format: String,
    mime: String,
    bucket: String,
    url: String,
    key: String,
    duration: MergeDuration,
}

impl AmergeParams {
    pub fn parse(command: &str) -> Result<Self, OperationError> {
        let grammar = &*AMERGE_GRAMMAR;
        grammar.validate(command)?;

        let format = grammar
            .plain(command, "format")
            .ok_or_else(|| OperationError::invalid("format", "missing"))?
            .to_string();
        let mime = grammar.required(command, "mime")?;
        let bucket = grammar.required(command, "bucket")?;
        let url = grammar.required(command, "url")?;
        let key = object_key("url", &url)?;

        let duration = grammar
            .plain(command, "duration")
            .and_then(MergeDuration::from_token)
            .unwrap_or(MergeDuration::Longest);

        Ok(Self {
            format,
            mime,
            bucket,
            url,
            key,
            duration,
        })
    }

    /// ffmpeg output format (`-f`)
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Content type of the merged result
    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn duration(&self) -> MergeDuration {
        self.duration
    }
}
