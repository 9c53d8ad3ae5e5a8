use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage, imageops};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// Grid factor used by the viewer's scrambling scheme.
pub const DEFAULT_DIVISIONS: u32 = 4;

const TILE_ALIGN: u32 = 8;

#[derive(Debug, Error)]
pub enum DescrambleError {
    #[error("invalid dimensions: {width}x{height} with {divisions} divisions")]
    InvalidDimensions {
        width: u32,
        height: u32,
        divisions: u32,
    },
    #[error("source image unavailable: {0}")]
    SourceUnavailable(String),
    #[error("failed to encode descrambled image: {0}")]
    EncodeFailed(String),
}

/// Tile layout derived from a page's declared size.
///
/// Tile sizes are always multiples of 8; any remainder strip on the right or
/// bottom edge is not part of the permutation and keeps its source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescrambleGrid {
    pub divisions: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

/// Pixel origins of one tile copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileMove {
    pub index: u32,
    pub target: u32,
    pub src_x: u32,
    pub src_y: u32,
    pub dst_x: u32,
    pub dst_y: u32,
}

impl DescrambleGrid {
    pub fn new(width: u32, height: u32, divisions: u32) -> Result<Self, DescrambleError> {
        let invalid = || DescrambleError::InvalidDimensions {
            width,
            height,
            divisions,
        };
        if width == 0 || height == 0 || divisions == 0 {
            return Err(invalid());
        }
        let unit = divisions.checked_mul(TILE_ALIGN).ok_or_else(invalid)?;
        divisions.checked_mul(divisions).ok_or_else(invalid)?;
        Ok(Self {
            divisions,
            tile_width: width / unit * TILE_ALIGN,
            tile_height: height / unit * TILE_ALIGN,
        })
    }

    pub fn tile_count(&self) -> u32 {
        self.divisions * self.divisions
    }

    /// Destination index for the tile stored at `index` in the scrambled image.
    pub fn permute(&self, index: u32) -> u32 {
        let d = self.divisions;
        (index % d) * d + index / d
    }

    /// Scrambled index of the tile that ends up at `target`.
    pub fn inverse(&self, target: u32) -> u32 {
        (0..self.tile_count())
            .find(|index| self.permute(*index) == target)
            .unwrap_or(target)
    }

    fn origin(&self, index: u32) -> (u32, u32) {
        let d = self.divisions;
        ((index % d) * self.tile_width, (index / d) * self.tile_height)
    }

    /// Tile copies in ascending source index order.
    pub fn moves(&self) -> Vec<TileMove> {
        (0..self.tile_count())
            .map(|index| {
                let target = self.permute(index);
                let (src_x, src_y) = self.origin(index);
                let (dst_x, dst_y) = self.origin(target);
                TileMove {
                    index,
                    target,
                    src_x,
                    src_y,
                    dst_x,
                    dst_y,
                }
            })
            .collect()
    }
}

/// Rebuilds the original page from a scrambled source image.
///
/// `width` and `height` come from the page metadata. A source whose natural
/// size differs is stretched to exactly that size with nearest-neighbour
/// sampling before any tile is moved.
pub fn descramble(
    source: &DynamicImage,
    width: u32,
    height: u32,
    divisions: u32,
) -> Result<RgbaImage, DescrambleError> {
    let grid = DescrambleGrid::new(width, height, divisions)?;
    let canvas = seed_canvas(source, width, height);
    Ok(apply_moves(&canvas, &grid, false))
}

/// Applies the inverse tile map, producing the layout the site serves.
pub fn scramble(
    source: &DynamicImage,
    width: u32,
    height: u32,
    divisions: u32,
) -> Result<RgbaImage, DescrambleError> {
    let grid = DescrambleGrid::new(width, height, divisions)?;
    let canvas = seed_canvas(source, width, height);
    Ok(apply_moves(&canvas, &grid, true))
}

/// Decodes `bytes`, descrambles them and re-encodes the page as PNG.
pub fn descramble_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
    divisions: u32,
) -> Result<Vec<u8>, DescrambleError> {
    DescrambleGrid::new(width, height, divisions)?;
    let source = image::load_from_memory(bytes)
        .map_err(|err| DescrambleError::SourceUnavailable(err.to_string()))?;
    let page = descramble(&source, width, height, divisions)?;
    encode_png(&page)
}

pub fn encode_png(page: &RgbaImage) -> Result<Vec<u8>, DescrambleError> {
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    page.write_to(&mut cursor, ImageFormat::Png)
        .map_err(|err| DescrambleError::EncodeFailed(err.to_string()))?;
    Ok(bytes)
}

fn seed_canvas(source: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    let (natural_w, natural_h) = source.dimensions();
    let rgba = source.to_rgba8();
    if natural_w == width && natural_h == height {
        return rgba;
    }
    debug!(
        "stretching source {}x{} to declared {}x{}",
        natural_w, natural_h, width, height
    );
    imageops::resize(&rgba, width, height, imageops::FilterType::Nearest)
}

fn apply_moves(canvas: &RgbaImage, grid: &DescrambleGrid, reverse: bool) -> RgbaImage {
    let mut output = canvas.clone();
    if grid.tile_width == 0 || grid.tile_height == 0 {
        debug!("page smaller than one tile row; copied unchanged");
        return output;
    }
    debug!(
        "moving {} tiles of {}x{}",
        grid.tile_count(),
        grid.tile_width,
        grid.tile_height
    );
    for tile in grid.moves() {
        let (from, to) = if reverse {
            ((tile.dst_x, tile.dst_y), (tile.src_x, tile.src_y))
        } else {
            ((tile.src_x, tile.src_y), (tile.dst_x, tile.dst_y))
        };
        let block = imageops::crop_imm(canvas, from.0, from.1, grid.tile_width, grid.tile_height)
            .to_image();
        imageops::replace(&mut output, &block, to.0 as i64, to.1 as i64);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::collections::HashSet;

    fn labelled_page(width: u32, height: u32, grid: &DescrambleGrid) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let col = x / grid.tile_width.max(1);
            let row = y / grid.tile_height.max(1);
            if col >= grid.divisions || row >= grid.divisions {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([(row * grid.divisions + col) as u8, (x % 251) as u8, (y % 251) as u8, 255])
            }
        })
    }

    #[test]
    fn grid_tiles_are_multiples_of_eight() {
        let grid = DescrambleGrid::new(800, 1200, 4).expect("grid");
        assert_eq!(grid.tile_width, 200);
        assert_eq!(grid.tile_height, 296);

        let odd = DescrambleGrid::new(843, 1211, 4).expect("grid");
        assert_eq!(odd.tile_width % 8, 0);
        assert_eq!(odd.tile_height % 8, 0);
        assert_eq!(odd.tile_width, 208);
        assert_eq!(odd.tile_height, 296);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        for (w, h, d) in [(0, 10, 4), (10, 0, 4), (10, 10, 0)] {
            let err = DescrambleGrid::new(w, h, d).unwrap_err();
            assert!(matches!(err, DescrambleError::InvalidDimensions { .. }));
        }
        let source = DynamicImage::ImageRgba8(RgbaImage::new(4, 4));
        assert!(descramble(&source, 0, 4, 4).is_err());
    }

    #[test]
    fn permutation_is_a_bijection() {
        for divisions in 1..=9 {
            let grid = DescrambleGrid::new(1024, 1024, divisions).expect("grid");
            let targets: HashSet<u32> = (0..grid.tile_count()).map(|e| grid.permute(e)).collect();
            assert_eq!(targets.len() as u32, grid.tile_count());
            assert!(targets.iter().all(|n| *n < grid.tile_count()));
            for e in 0..grid.tile_count() {
                assert_eq!(grid.inverse(grid.permute(e)), e);
            }
        }
    }

    #[test]
    fn tile_one_moves_to_row_one_col_zero() {
        let grid = DescrambleGrid::new(800, 1200, 4).expect("grid");
        let moves = grid.moves();
        let tile = moves[1];
        assert_eq!(tile.target, 4);
        assert_eq!((tile.src_x, tile.src_y), (200, 0));
        assert_eq!((tile.dst_x, tile.dst_y), (0, 296));
    }

    #[test]
    fn descramble_relocates_labelled_tiles() {
        let grid = DescrambleGrid::new(800, 1200, 4).expect("grid");
        let page = labelled_page(800, 1200, &grid);
        let output = descramble(&DynamicImage::ImageRgba8(page.clone()), 800, 1200, 4).expect("ok");

        assert_eq!(output.dimensions(), (800, 1200));
        // tile e=1 lands at row 1, col 0
        assert_eq!(output.get_pixel(0, 296)[0], 1);
        assert_eq!(output.get_pixel(10, 300), page.get_pixel(210, 4));
        for e in 0..grid.tile_count() {
            let n = grid.permute(e);
            let dst_x = (n % 4) * grid.tile_width;
            let dst_y = (n / 4) * grid.tile_height;
            assert_eq!(output.get_pixel(dst_x + 3, dst_y + 5)[0], e as u8);
        }
        // remainder strip below the grid keeps its seeded pixels
        assert_eq!(output.get_pixel(5, 1199), page.get_pixel(5, 1199));
    }

    #[test]
    fn scramble_undoes_descramble() {
        let grid = DescrambleGrid::new(320, 264, 4).expect("grid");
        let page = labelled_page(320, 264, &grid);
        let descrambled = descramble(&DynamicImage::ImageRgba8(page.clone()), 320, 264, 4).expect("ok");
        let restored = scramble(&DynamicImage::ImageRgba8(descrambled), 320, 264, 4).expect("ok");
        assert_eq!(restored, page);
    }

    #[test]
    fn descramble_is_deterministic() {
        let grid = DescrambleGrid::new(128, 96, 4).expect("grid");
        let page = DynamicImage::ImageRgba8(labelled_page(128, 96, &grid));
        let first = descramble_bytes(&encode_png(&page.to_rgba8()).expect("png"), 128, 96, 4)
            .expect("first");
        let second = descramble_bytes(&encode_png(&page.to_rgba8()).expect("png"), 128, 96, 4)
            .expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn mismatched_source_is_stretched_to_declared_size() {
        let source = DynamicImage::ImageRgba8(RgbaImage::from_pixel(50, 60, Rgba([9, 9, 9, 255])));
        let output = descramble(&source, 100, 120, 4).expect("ok");
        assert_eq!(output.dimensions(), (100, 120));
        assert_eq!(output.get_pixel(99, 119), &Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn tiny_page_is_copied_unchanged() {
        let page = RgbaImage::from_fn(16, 16, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let output = descramble(&DynamicImage::ImageRgba8(page.clone()), 16, 16, 4).expect("ok");
        assert_eq!(output, page);
    }

    #[test]
    fn undecodable_bytes_are_source_unavailable() {
        let err = descramble_bytes(b"not an image", 64, 64, 4).unwrap_err();
        assert!(matches!(err, DescrambleError::SourceUnavailable(_)));
    }
}
