//! Command grammar
//!
//! A command names one operation followed by slash-delimited `field/value`
//! clauses, e.g.
//!
//! ```text
//! imagecomp/bucket/bXlidWNrZXQ=/rows/2/cols/2/url/aHR0cDovL...
//! ```
//!
//! - [`codec`] extracts and decodes single values
//! - [`grammar`] holds each operation's grammar as data and validates whole
//!   commands
//! - the per-operation records ([`MkzipParams`], [`ImageCompParams`], ...)
//!   are parsed by their own handler; [`ParsedParameters`] parses any
//!   command by its first segment, for callers that only hold the string

pub mod codec;
pub mod grammar;
mod params;

pub use codec::{DecodeError, Repeat, encode_value};
pub use params::{
    AmergeParams, ArchiveEntry, Html2ImageParams, Html2PdfParams, ImageCompParams,
    MAX_SOURCE_IMAGES, MergeDuration, MkzipParams, NameEncoding, Orientation, ParsedParameters,
    RoundPicParams, SourceImage, UnzipParams,
};
