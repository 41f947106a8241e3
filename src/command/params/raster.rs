use image::Rgba;
use once_cell::sync::Lazy;

use super::object_key;
use crate::command::grammar::{Clause, CompiledGrammar, Grammar, INTEGER, Repeatable, TOKEN};
use crate::handlers::OperationError;
use crate::imaging::{
    CornerRadius, GridSpec, HorizontalAlign, Layout, OutputFormat, RadiusValue, TraversalOrder,
    VerticalAlign,
};

/// Hard ceiling on composed images, whatever the configuration says.
pub const MAX_SOURCE_IMAGES: usize = 1000;

const RADIUS: &str = r"\d+(?:\.\d+)?%?";

const IMAGECOMP: Grammar = Grammar {
    operation: "imagecomp",
    required: &[Clause::new("bucket", TOKEN)],
    optional: &[
        Clause::new("format", "png|jpg|jpeg"),
        Clause::new("halign", "left|center|right"),
        Clause::new("valign", "top|middle|bottom"),
        Clause::new("rows", INTEGER),
        Clause::new("cols", INTEGER),
        Clause::new("order", "0|1"),
        Clause::new("alpha", INTEGER),
        Clause::new("bgcolor", TOKEN),
        Clause::new("margin", INTEGER),
    ],
    repeatable: Some(Repeatable {
        clause: Clause::new("url", TOKEN),
        companion: None,
        min: 1,
    }),
};

const ROUNDPIC: Grammar = Grammar {
    operation: "roundpic",
    required: &[],
    optional: &[
        Clause::new("radius", RADIUS),
        Clause::new("radius-x", RADIUS),
        Clause::new("radius-y", RADIUS),
    ],
    repeatable: None,
};

static IMAGECOMP_GRAMMAR: Lazy<CompiledGrammar> = Lazy::new(|| IMAGECOMP.compile());
static ROUNDPIC_GRAMMAR: Lazy<CompiledGrammar> = Lazy::new(|| ROUNDPIC.compile());

/// A source image and the object key it must exist under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub url: String,
    pub key: String,
}

/// `imagecomp/bucket/<b64>[options](/url/<b64>)+`
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCompParams {
    bucket: String,
    format: OutputFormat,
    layout: Layout,
    sources: Vec<SourceImage>,
}

impl ImageCompParams {
    pub fn parse(command: &str) -> Result<Self, OperationError> {
        let grammar = &*IMAGECOMP_GRAMMAR;
        grammar.validate(command)?;

        let bucket = grammar.required(command, "bucket")?;

        let format = grammar
            .plain(command, "format")
            .and_then(OutputFormat::from_token)
            .unwrap_or(OutputFormat::Jpeg);
        let halign = grammar
            .plain(command, "halign")
            .and_then(HorizontalAlign::from_token)
            .unwrap_or(HorizontalAlign::Left);
        let valign = grammar
            .plain(command, "valign")
            .and_then(VerticalAlign::from_token)
            .unwrap_or(VerticalAlign::Top);
        let order = grammar
            .plain(command, "order")
            .and_then(TraversalOrder::from_token)
            .unwrap_or(TraversalOrder::ColumnMajor);

        // 0 asks for the dimension to be derived
        let rows = grammar.integer(command, "rows")?.filter(|rows| *rows > 0);
        let cols = grammar.integer(command, "cols")?.filter(|cols| *cols > 0);

        let alpha = match grammar.integer(command, "alpha")? {
            Some(alpha) => u8::try_from(alpha)
                .map_err(|_| OperationError::invalid("alpha", "should be within [0,255]"))?,
            None => format.default_alpha(),
        };

        let [r, g, b] = match grammar.decoded(command, "bgcolor")? {
            Some(color) => parse_hex_color(&color).ok_or_else(|| {
                OperationError::invalid("bgcolor", "should be in format '#FFFFFF'")
            })?,
            None => [0xFF, 0xFF, 0xFF],
        };

        let margin = grammar.integer(command, "margin")?.unwrap_or(0);

        let sources = grammar
            .repeats(command)?
            .into_iter()
            .map(|repeat| {
                let key = object_key("url", &repeat.value)?;
                Ok(SourceImage {
                    url: repeat.value,
                    key,
                })
            })
            .collect::<Result<Vec<_>, OperationError>>()?;

        if sources.len() > MAX_SOURCE_IMAGES {
            return Err(OperationError::invalid(
                "url",
                format!("only allow url count not larger than {MAX_SOURCE_IMAGES}"),
            ));
        }

        let grid = GridSpec::resolve(sources.len(), rows, cols, order)?;

        Ok(Self {
            bucket,
            format,
            layout: Layout {
                grid,
                halign,
                valign,
                margin,
                background: Rgba([r, g, b, alpha]),
            },
            sources,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn sources(&self) -> &[SourceImage] {
        &self.sources
    }
}

fn parse_hex_color(text: &str) -> Option<[u8; 3]> {
    let hex = text.strip_prefix('#')?;
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |at: usize| u8::from_str_radix(&hex[at..at + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/// `roundpic/radius/<r>` or `roundpic/radius-x/<r>/radius-y/<r>`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundPicParams {
    radius: CornerRadius,
}

impl RoundPicParams {
    pub fn parse(command: &str) -> Result<Self, OperationError> {
        let grammar = &*ROUNDPIC_GRAMMAR;
        grammar.validate(command)?;

        let value = |field: &str| -> Result<Option<RadiusValue>, OperationError> {
            grammar
                .plain(command, field)
                .map(|raw| {
                    RadiusValue::parse(raw)
                        .ok_or_else(|| OperationError::invalid(field, format!("bad radius '{raw}'")))
                })
                .transpose()
        };

        let radius = match (value("radius")?, value("radius-x")?, value("radius-y")?) {
            (Some(radius), None, None) => CornerRadius::Uniform(radius),
            (None, Some(x), Some(y)) => CornerRadius::PerAxis { x, y },
            _ => {
                return Err(OperationError::invalid(
                    "radius",
                    "give either radius or both radius-x and radius-y",
                ));
            }
        };

        Ok(Self { radius })
    }

    pub fn radius(&self) -> &CornerRadius {
        &self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::encode_value;

    fn imagecomp(options: &str, urls: usize) -> String {
        let mut command = format!("imagecomp/bucket/{}{options}", encode_value("mybucket"));
        for index in 0..urls {
            command.push_str(&format!(
                "/url/{}",
                encode_value(&format!("http://cdn.example.com/img/{index}.png"))
            ));
        }
        command
    }

    #[test]
    fn test_imagecomp_defaults() {
        let params = ImageCompParams::parse(&imagecomp("", 3)).unwrap();
        let layout = params.layout();

        assert_eq!(params.bucket(), "mybucket");
        assert_eq!(params.format(), OutputFormat::Jpeg);
        assert_eq!(layout.halign, HorizontalAlign::Left);
        assert_eq!(layout.valign, VerticalAlign::Top);
        assert_eq!(layout.grid.order(), TraversalOrder::ColumnMajor);
        assert_eq!((layout.grid.rows(), layout.grid.cols()), (3, 1));
        assert_eq!(layout.margin, 0);
        assert_eq!(layout.background, Rgba([255, 255, 255, 255]));
        assert_eq!(params.sources()[2].key, "img/2.png");
    }

    #[test]
    fn test_imagecomp_png_defaults_to_transparent() {
        let params = ImageCompParams::parse(&imagecomp("/format/png", 1)).unwrap();
        assert_eq!(params.layout().background, Rgba([255, 255, 255, 0]));
    }

    #[test]
    fn test_imagecomp_options() {
        let options = format!(
            "/rows/2/cols/2/order/0/halign/center/valign/bottom/alpha/128/margin/4/bgcolor/{}",
            encode_value("#10a0Ff")
        );
        let params = ImageCompParams::parse(&imagecomp(&options, 3)).unwrap();
        let layout = params.layout();

        assert_eq!(layout.grid.order(), TraversalOrder::RowMajor);
        assert_eq!((layout.grid.rows(), layout.grid.cols()), (2, 2));
        assert_eq!(layout.halign, HorizontalAlign::Center);
        assert_eq!(layout.valign, VerticalAlign::Bottom);
        assert_eq!(layout.margin, 4);
        assert_eq!(layout.background, Rgba([0x10, 0xa0, 0xff, 128]));
    }

    #[test]
    fn test_imagecomp_zero_dimension_is_derived() {
        let params = ImageCompParams::parse(&imagecomp("/rows/0/cols/3", 7)).unwrap();
        assert_eq!(params.layout().grid.rows(), 3);
    }

    #[test]
    fn test_imagecomp_rejects_bad_values() {
        let err = ImageCompParams::parse(&imagecomp("/alpha/256", 1)).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { field, .. } if field == "alpha"));

        let bad_color = format!("/bgcolor/{}", encode_value("red"));
        let err = ImageCompParams::parse(&imagecomp(&bad_color, 1)).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { field, .. } if field == "bgcolor"));

        let err = ImageCompParams::parse(&imagecomp("/rows/2/cols/3/order/0", 3)).unwrap_err();
        assert!(matches!(err, OperationError::GridSize(_)));

        let err = ImageCompParams::parse(&imagecomp("/cols/5", 2)).unwrap_err();
        assert!(matches!(err, OperationError::GridSize(_)));
    }

    #[test]
    fn test_imagecomp_url_limit() {
        let err = ImageCompParams::parse(&imagecomp("", MAX_SOURCE_IMAGES + 1)).unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { field, .. } if field == "url"));
    }

    #[test]
    fn test_roundpic_forms() {
        let uniform = RoundPicParams::parse("roundpic/radius/12.5").unwrap();
        assert_eq!(
            uniform.radius(),
            &CornerRadius::Uniform(RadiusValue::Pixels(12.5))
        );

        let per_axis = RoundPicParams::parse("roundpic/radius-x/10%/radius-y/4").unwrap();
        assert_eq!(
            per_axis.radius(),
            &CornerRadius::PerAxis {
                x: RadiusValue::Percent(10.0),
                y: RadiusValue::Pixels(4.0),
            }
        );
    }

    #[test]
    fn test_roundpic_rejects_mixed_or_partial() {
        for command in [
            "roundpic",
            "roundpic/radius-x/4",
            "roundpic/radius/3/radius-x/4/radius-y/5",
        ] {
            assert!(
                matches!(
                    RoundPicParams::parse(command),
                    Err(OperationError::InvalidParameter { .. })
                ),
                "{command}"
            );
        }
        assert!(matches!(
            RoundPicParams::parse("roundpic/radius/abc"),
            Err(OperationError::CommandFormat { .. })
        ));
    }
}
