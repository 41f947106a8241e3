use once_cell::sync::Lazy;

use crate::command::grammar::{Clause, CompiledGrammar, FLAG, Grammar, INTEGER, TOKEN};
use crate::handlers::OperationError;
use crate::imaging::OutputFormat;

const HTML2PDF: Grammar = Grammar {
    operation: "html2pdf",
    required: &[],
    optional: &[
        Clause::new("gray", FLAG),
        Clause::new("low", FLAG),
        Clause::new("orient", "Portrait|Landscape"),
        Clause::new("size", "[A-B][0-8]"),
        Clause::new("title", TOKEN),
        Clause::new("collate", FLAG),
        Clause::new("copies", INTEGER),
    ],
    repeatable: None,
};

const HTML2IMAGE: Grammar = Grammar {
    operation: "html2image",
    required: &[],
    optional: &[
        Clause::new("croph", INTEGER),
        Clause::new("cropw", INTEGER),
        Clause::new("cropx", INTEGER),
        Clause::new("cropy", INTEGER),
        Clause::new("format", "png|jpg|jpeg"),
        Clause::new("height", INTEGER),
        Clause::new("width", INTEGER),
        Clause::new("quality", INTEGER),
        Clause::new("force", FLAG),
    ],
    repeatable: None,
};

static HTML2PDF_GRAMMAR: Lazy<CompiledGrammar> = Lazy::new(|| HTML2PDF.compile());
static HTML2IMAGE_GRAMMAR: Lazy<CompiledGrammar> = Lazy::new(|| HTML2IMAGE.compile());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "Portrait",
            Orientation::Landscape => "Landscape",
        }
    }
}

/// `html2pdf[/gray/..][/low/..][/orient/..][/size/..][/title/..][/collate/..][/copies/..]`
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Html2PdfParams {
    pub gray: bool,
    pub low_quality: bool,
    pub orientation: Option<Orientation>,
    pub page_size: Option<String>,
    pub title: Option<String>,
    pub collate: bool,
    pub copies: u32,
}

impl Html2PdfParams {
    pub fn parse(command: &str) -> Result<Self, OperationError> {
        let grammar = &*HTML2PDF_GRAMMAR;
        grammar.validate(command)?;

        let orientation = match grammar.plain(command, "orient") {
            Some("Portrait") => Some(Orientation::Portrait),
            Some("Landscape") => Some(Orientation::Landscape),
            _ => None,
        };

        let copies = grammar.integer(command, "copies")?.unwrap_or(1);
        if copies == 0 {
            return Err(OperationError::invalid("copies", "must be greater than zero"));
        }

        Ok(Self {
            gray: grammar.flag(command, "gray", false),
            low_quality: grammar.flag(command, "low", false),
            orientation,
            page_size: grammar.plain(command, "size").map(str::to_string),
            title: grammar.decoded(command, "title")?,
            collate: grammar.flag(command, "collate", true),
            copies,
        })
    }
}

/// `html2image` with optional crop box, output size, format and quality
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Html2ImageParams {
    pub crop_h: Option<u32>,
    pub crop_w: Option<u32>,
    pub crop_x: Option<u32>,
    pub crop_y: Option<u32>,
    pub format: OutputFormat,
    pub height: Option<u32>,
    pub width: Option<u32>,
    pub quality: Option<u32>,
    /// Disable wkhtmltoimage's smart width
    pub force: bool,
}

impl Html2ImageParams {
    pub fn parse(command: &str) -> Result<Self, OperationError> {
        let grammar = &*HTML2IMAGE_GRAMMAR;
        grammar.validate(command)?;

        let positive = |field: &str| -> Result<Option<u32>, OperationError> {
            match grammar.integer(command, field)? {
                Some(0) => Err(OperationError::invalid(field, "must be greater than zero")),
                value => Ok(value),
            }
        };

        let quality = positive("quality")?;
        if let Some(quality) = quality {
            if quality > 100 {
                return Err(OperationError::invalid("quality", "must be within 1..=100"));
            }
        }

        let format = grammar
            .plain(command, "format")
            .and_then(OutputFormat::from_token)
            .unwrap_or(OutputFormat::Jpeg);

        Ok(Self {
            crop_h: positive("croph")?,
            crop_w: positive("cropw")?,
            crop_x: positive("cropx")?,
            crop_y: positive("cropy")?,
            format,
            height: positive("height")?,
            width: positive("width")?,
            quality,
            force: grammar.flag(command, "force", false),
        })
    }
}
