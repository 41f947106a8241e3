use image::{DynamicImage, Rgba, RgbaImage};

/// A corner radius as given on the command line: `12`, `12.5` or `20%`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RadiusValue {
    Pixels(f64),
    Percent(f64),
}

impl RadiusValue {
    pub fn parse(token: &str) -> Option<Self> {
        match token.strip_suffix('%') {
            Some(percent) => percent.parse().ok().map(RadiusValue::Percent),
            None => token.parse().ok().map(RadiusValue::Pixels),
        }
    }

    /// Radius in pixels along a side of length `side`. Pixels are capped at
    /// half the side, percentages at 50%.
    fn resolve(&self, side: u32) -> f64 {
        let side = side as f64;
        match *self {
            RadiusValue::Pixels(pixels) => pixels.min(side / 2.0),
            RadiusValue::Percent(percent) => side * percent.min(50.0) / 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CornerRadius {
    /// Same radius on both axes, measured against the shorter side
    Uniform(RadiusValue),
    /// Horizontal radius against the width, vertical against the height
    PerAxis { x: RadiusValue, y: RadiusValue },
}

impl CornerRadius {
    pub fn resolve(&self, width: u32, height: u32) -> (f64, f64) {
        match self {
            CornerRadius::Uniform(value) => {
                let radius = value.resolve(width.min(height));
                (radius, radius)
            }
            CornerRadius::PerAxis { x, y } => (x.resolve(width), y.resolve(height)),
        }
    }
}

/// Copy `image` with every pixel outside the rounded rectangle made fully
/// transparent.
pub fn round_corners(image: &DynamicImage, radius: &CornerRadius) -> RgbaImage {
    let mut output = image.to_rgba8();
    let (width, height) = output.dimensions();
    let (rx, ry) = radius.resolve(width, height);

    if rx <= 0.0 || ry <= 0.0 {
        return output;
    }

    for (x, y, pixel) in output.enumerate_pixels_mut() {
        if !inside(x, y, width, height, rx, ry) {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }

    output
}

fn inside(x: u32, y: u32, width: u32, height: u32, rx: f64, ry: f64) -> bool {
    // pixel centre
    let px = x as f64 + 0.5;
    let py = y as f64 + 0.5;
    let (w, h) = (width as f64, height as f64);

    let cx = if px < rx {
        rx
    } else if px > w - rx {
        w - rx
    } else {
        return true;
    };
    let cy = if py < ry {
        ry
    } else if py > h - ry {
        h - ry
    } else {
        return true;
    };

    let dx = (px - cx) / rx;
    let dy = (py - cy) / ry;
    dx * dx + dy * dy <= 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPAQUE: Rgba<u8> = Rgba([9, 9, 9, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    fn square(side: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(side, side, OPAQUE))
    }

    #[test]
    fn test_parse_radius_tokens() {
        assert_eq!(RadiusValue::parse("12"), Some(RadiusValue::Pixels(12.0)));
        assert_eq!(RadiusValue::parse("2.5"), Some(RadiusValue::Pixels(2.5)));
        assert_eq!(RadiusValue::parse("20%"), Some(RadiusValue::Percent(20.0)));
        assert_eq!(RadiusValue::parse("abc"), None);
    }

    #[test]
    fn test_radius_caps() {
        let uniform = CornerRadius::Uniform(RadiusValue::Pixels(500.0));
        assert_eq!(uniform.resolve(100, 40), (20.0, 20.0));

        let percent = CornerRadius::Uniform(RadiusValue::Percent(80.0));
        assert_eq!(percent.resolve(100, 40), (20.0, 20.0));

        let per_axis = CornerRadius::PerAxis {
            x: RadiusValue::Percent(10.0),
            y: RadiusValue::Pixels(5.0),
        };
        assert_eq!(per_axis.resolve(200, 40), (20.0, 5.0));
    }

    #[test]
    fn test_corners_become_transparent() {
        let rounded = round_corners(&square(20), &CornerRadius::Uniform(RadiusValue::Pixels(8.0)));
        assert_eq!(rounded.get_pixel(0, 0), &CLEAR);
        assert_eq!(rounded.get_pixel(19, 0), &CLEAR);
        assert_eq!(rounded.get_pixel(0, 19), &CLEAR);
        assert_eq!(rounded.get_pixel(19, 19), &CLEAR);
        assert_eq!(rounded.get_pixel(10, 10), &OPAQUE);
        assert_eq!(rounded.get_pixel(10, 0), &OPAQUE);
        assert_eq!(rounded.get_pixel(0, 10), &OPAQUE);
    }

    #[test]
    fn test_zero_radius_keeps_image() {
        let rounded = round_corners(&square(4), &CornerRadius::Uniform(RadiusValue::Pixels(0.0)));
        assert!(rounded.pixels().all(|pixel| *pixel == OPAQUE));
    }
}
