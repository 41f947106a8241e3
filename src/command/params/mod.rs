//! Typed parameter records, one per operation
//!
//! Each record is only obtainable through its `parse` function, which runs
//! the grammar check, decodes every field, applies defaults and does the
//! cross-field checks. A value of any of these types is therefore valid.

mod archive;
mod media;
mod raster;
mod render;

pub use archive::{ArchiveEntry, MkzipParams, NameEncoding, UnzipParams};
pub use media::{AmergeParams, MergeDuration};
pub use raster::{ImageCompParams, MAX_SOURCE_IMAGES, RoundPicParams, SourceImage};
pub use render::{Html2ImageParams, Html2PdfParams, Orientation};

use percent_encoding::percent_decode_str;
use url::Url;

use crate::handlers::OperationError;

/// Parameters of any supported operation
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedParameters {
    Mkzip(MkzipParams),
    Unzip(UnzipParams),
    Amerge(AmergeParams),
    Html2Pdf(Html2PdfParams),
    Html2Image(Html2ImageParams),
    ImageComp(ImageCompParams),
    RoundPic(RoundPicParams),
}

impl ParsedParameters {
    /// Parse a command (already stripped of any operation prefix) by its
    /// first segment.
    pub fn parse(command: &str) -> Result<Self, OperationError> {
        let operation = command.split('/').next().unwrap_or_default();
        match operation {
            "mkzip" => MkzipParams::parse(command).map(Self::Mkzip),
            "unzip" => UnzipParams::parse(command).map(Self::Unzip),
            "amerge" => AmergeParams::parse(command).map(Self::Amerge),
            "html2pdf" => Html2PdfParams::parse(command).map(Self::Html2Pdf),
            "html2image" => Html2ImageParams::parse(command).map(Self::Html2Image),
            "imagecomp" => ImageCompParams::parse(command).map(Self::ImageComp),
            "roundpic" => RoundPicParams::parse(command).map(Self::RoundPic),
            other => Err(OperationError::CommandFormat {
                operation: other.to_string(),
            }),
        }
    }

    pub fn operation(&self) -> &'static str {
        match self {
            ParsedParameters::Mkzip(_) => "mkzip",
            ParsedParameters::Unzip(_) => "unzip",
            ParsedParameters::Amerge(_) => "amerge",
            ParsedParameters::Html2Pdf(_) => "html2pdf",
            ParsedParameters::Html2Image(_) => "html2image",
            ParsedParameters::ImageComp(_) => "imagecomp",
            ParsedParameters::RoundPic(_) => "roundpic",
        }
    }
}

/// Object key addressed by a resource url: its path without the leading
/// slash, percent-decoded. Errors name `field`.
pub(crate) fn object_key(field: &str, raw_url: &str) -> Result<String, OperationError> {
    let url = Url::parse(raw_url)
        .map_err(|err| OperationError::invalid(field, format!("wrong '{raw_url}', {err}")))?;

    let path = url.path().strip_prefix('/').unwrap_or(url.path());
    let key = percent_decode_str(path)
        .decode_utf8()
        .map_err(|err| OperationError::invalid(field, format!("wrong '{raw_url}', {err}")))?;

    if key.is_empty() {
        return Err(OperationError::invalid(
            field,
            format!("'{raw_url}' does not name an object"),
        ));
    }

    Ok(key.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::encode_value;

    #[test]
    fn test_object_key() {
        assert_eq!(object_key("url", "http://cdn.example.com/a/b.jpg").unwrap(), "a/b.jpg");
        assert_eq!(
            object_key("url", "http://cdn.example.com/with%20space.txt").unwrap(),
            "with space.txt"
        );
        assert!(object_key("url", "http://cdn.example.com/").is_err());
        assert!(object_key("url", "not a url").is_err());
    }

    #[test]
    fn test_dispatch_by_operation() {
        let command = format!("unzip/bucket/{}", encode_value("b"));
        let parsed = ParsedParameters::parse(&command).unwrap();
        assert_eq!(parsed.operation(), "unzip");

        let err = ParsedParameters::parse("nope/bucket/YQ==").unwrap_err();
        assert!(matches!(err, OperationError::CommandFormat { .. }));
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let command = format!(
            "imagecomp/bucket/{}/rows/1/url/{}/url/{}",
            encode_value("b"),
            encode_value("http://h/1.png"),
            encode_value("http://h/2.png"),
        );
        assert_eq!(
            ParsedParameters::parse(&command).unwrap(),
            ParsedParameters::parse(&command).unwrap()
        );
    }
}
