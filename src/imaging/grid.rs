//! Grid image composition
//!
//! N decoded images are laid into a rows x cols grid of uniform blocks. The
//! block is as wide as the widest image and as tall as the tallest one; each
//! image sits inside its block according to the alignment, without scaling.
//! Empty cells and margins show the background colour.

use image::{DynamicImage, Rgba, RgbaImage, imageops};
use thiserror::Error;

use super::OutputFormat;

/// Largest canvas side; also the JPEG dimension limit.
const MAX_CANVAS_SIDE: u32 = 65_535;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("no images to compose")]
    Empty,
    #[error("cols larger than url count ({cols} > {count})")]
    ColsExceedCount { cols: u32, count: usize },
    #[error("rows larger than url count ({rows} > {count})")]
    RowsExceedCount { rows: u32, count: usize },
    #[error("url count larger than rows*cols ({count} > {rows}*{cols})")]
    CountExceedsCells { count: usize, rows: u32, cols: u32 },
    #[error("{count} urls leave gaps outside the last {line} of a {rows}x{cols} grid")]
    ShortfallNotTrailing {
        count: usize,
        rows: u32,
        cols: u32,
        line: &'static str,
    },
    #[error("expected {expected} images, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
    #[error("composed image too large ({width}x{height})")]
    CanvasTooLarge { width: u64, height: u64 },
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("create dst image failed, {0}")]
    Encode(#[from] image::ImageError),
}

/// How the flat image list maps onto cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    /// Fill row 0 left to right, then row 1, ...
    RowMajor,
    /// Fill column 0 top to bottom, then column 1, ...
    ColumnMajor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    Middle,
    Bottom,
}

impl TraversalOrder {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "0" => Some(TraversalOrder::RowMajor),
            "1" => Some(TraversalOrder::ColumnMajor),
            _ => None,
        }
    }
}

impl HorizontalAlign {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "left" => Some(HorizontalAlign::Left),
            "center" => Some(HorizontalAlign::Center),
            "right" => Some(HorizontalAlign::Right),
            _ => None,
        }
    }

    fn offset(&self, slack: u32) -> u32 {
        match self {
            HorizontalAlign::Left => 0,
            HorizontalAlign::Center => slack / 2,
            HorizontalAlign::Right => slack,
        }
    }
}

impl VerticalAlign {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "top" => Some(VerticalAlign::Top),
            "middle" => Some(VerticalAlign::Middle),
            "bottom" => Some(VerticalAlign::Bottom),
            _ => None,
        }
    }

    fn offset(&self, slack: u32) -> u32 {
        match self {
            VerticalAlign::Top => 0,
            VerticalAlign::Middle => slack / 2,
            VerticalAlign::Bottom => slack,
        }
    }
}

/// Resolved grid shape for a known image count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    rows: u32,
    cols: u32,
    count: usize,
    order: TraversalOrder,
}

impl GridSpec {
    /// Resolve the grid shape. `None` means "derive from the count".
    ///
    /// With both dimensions given, any shortfall must stay inside the last
    /// line of the traversal: the last row when filling row-major, the last
    /// column when filling column-major. That line keeps at least one image.
    pub fn resolve(
        count: usize,
        rows: Option<u32>,
        cols: Option<u32>,
        order: TraversalOrder,
    ) -> Result<Self, GridError> {
        if count == 0 {
            return Err(GridError::Empty);
        }

        let (rows, cols) = match (rows, cols) {
            (None, None) => (ceil_div(count, 1)?, 1),
            (None, Some(cols)) => {
                if cols as usize > count {
                    return Err(GridError::ColsExceedCount { cols, count });
                }
                (ceil_div(count, cols)?, cols)
            }
            (Some(rows), None) => {
                if rows as usize > count {
                    return Err(GridError::RowsExceedCount { rows, count });
                }
                (rows, ceil_div(count, rows)?)
            }
            (Some(rows), Some(cols)) => {
                let cells = rows as u64 * cols as u64;
                if count as u64 > cells {
                    return Err(GridError::CountExceedsCells { count, rows, cols });
                }

                let shortfall = cells - count as u64;
                let (line, line_len) = match order {
                    TraversalOrder::RowMajor => ("row", cols),
                    TraversalOrder::ColumnMajor => ("column", rows),
                };
                if shortfall >= line_len as u64 {
                    return Err(GridError::ShortfallNotTrailing {
                        count,
                        rows,
                        cols,
                        line,
                    });
                }
                (rows, cols)
            }
        };

        Ok(Self {
            rows,
            cols,
            count,
            order,
        })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn order(&self) -> TraversalOrder {
        self.order
    }

    /// Cell `(row, col)` of the `index`-th image in traversal order.
    pub fn cell_of(&self, index: usize) -> (u32, u32) {
        let index = index as u32;
        match self.order {
            TraversalOrder::RowMajor => (index / self.cols, index % self.cols),
            TraversalOrder::ColumnMajor => (index % self.rows, index / self.rows),
        }
    }
}

fn ceil_div(count: usize, by: u32) -> Result<u32, GridError> {
    let by = by.max(1) as usize;
    u32::try_from(count.div_ceil(by)).map_err(|_| GridError::CanvasTooLarge {
        width: by as u64,
        height: count as u64,
    })
}

/// Cell -> image index mapping for one composition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionGrid {
    rows: u32,
    cols: u32,
    cells: Vec<Option<usize>>,
}

impl CompositionGrid {
    pub fn place(spec: &GridSpec) -> Self {
        let mut cells = vec![None; spec.rows as usize * spec.cols as usize];
        for index in 0..spec.count {
            let (row, col) = spec.cell_of(index);
            cells[(row * spec.cols + col) as usize] = Some(index);
        }
        Self {
            rows: spec.rows,
            cols: spec.cols,
            cells,
        }
    }

    pub fn get(&self, row: u32, col: u32) -> Option<usize> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells[(row * self.cols + col) as usize]
    }

    fn occupied(&self) -> impl Iterator<Item = (u32, u32, usize)> + '_ {
        self.cells.iter().enumerate().filter_map(|(slot, cell)| {
            let slot = slot as u32;
            cell.map(|index| (slot / self.cols, slot % self.cols, index))
        })
    }
}

/// Everything about the output except the images themselves
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub grid: GridSpec,
    pub halign: HorizontalAlign,
    pub valign: VerticalAlign,
    pub margin: u32,
    pub background: Rgba<u8>,
}

/// Compose `images` (in input order) and encode the result.
///
/// All structural checks run before any pixel is drawn. Source pixels
/// replace the background, no blending.
pub fn compose(
    layout: &Layout,
    images: &[DynamicImage],
    format: OutputFormat,
) -> Result<Vec<u8>, ComposeError> {
    let canvas = compose_canvas(layout, images)?;
    Ok(format.encode(DynamicImage::ImageRgba8(canvas))?)
}

fn compose_canvas(layout: &Layout, images: &[DynamicImage]) -> Result<RgbaImage, GridError> {
    let spec = &layout.grid;
    if images.len() != spec.count {
        return Err(GridError::CountMismatch {
            expected: spec.count,
            actual: images.len(),
        });
    }

    let grid = CompositionGrid::place(spec);

    let block_width = images.iter().map(DynamicImage::width).max().unwrap_or(0);
    let block_height = images.iter().map(DynamicImage::height).max().unwrap_or(0);

    let width = canvas_side(block_width, spec.cols, layout.margin);
    let height = canvas_side(block_height, spec.rows, layout.margin);
    let (width, height) = match (width, height) {
        (Some(w), Some(h)) if w <= MAX_CANVAS_SIDE as u64 && h <= MAX_CANVAS_SIDE as u64 => {
            (w as u32, h as u32)
        }
        (w, h) => {
            return Err(GridError::CanvasTooLarge {
                width: w.unwrap_or(u64::MAX),
                height: h.unwrap_or(u64::MAX),
            });
        }
    };

    let mut canvas = RgbaImage::from_pixel(width, height, layout.background);

    for (row, col, index) in grid.occupied() {
        let image = &images[index];
        let x = col * block_width
            + (col + 1) * layout.margin
            + layout.halign.offset(block_width - image.width());
        let y = row * block_height
            + (row + 1) * layout.margin
            + layout.valign.offset(block_height - image.height());

        imageops::replace(&mut canvas, &image.to_rgba8(), x as i64, y as i64);
    }

    Ok(canvas)
}

/// `block * n + margin * (n + 1)`, `None` on overflow
fn canvas_side(block: u32, n: u32, margin: u32) -> Option<u64> {
    let blocks = (block as u64).checked_mul(n as u64)?;
    let margins = (margin as u64).checked_mul(n as u64 + 1)?;
    blocks.checked_add(margins)
}
