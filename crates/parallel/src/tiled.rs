//! Tiled processing for per-pixel reductions

use kharif_core::raster::{Grid, Raster};
use kharif_core::Result;
use ndarray::{s, Array2};
use rayon::prelude::*;

/// A rectangular window of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Row offset in the source raster
    pub row_offset: usize,
    /// Column offset in the source raster
    pub col_offset: usize,
    /// Number of rows in this tile
    pub rows: usize,
    /// Number of columns in this tile
    pub cols: usize,
}

impl Tile {
    pub fn new(row_offset: usize, col_offset: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_offset,
            col_offset,
            rows,
            cols,
        }
    }

    /// Convert tile-local coordinates to source raster coordinates
    pub fn to_source_coords(&self, local_row: usize, local_col: usize) -> (usize, usize) {
        (self.row_offset + local_row, self.col_offset + local_col)
    }
}

/// Iterator over non-overlapping tiles covering a raster, row-major
pub struct TileIterator {
    total_rows: usize,
    total_cols: usize,
    tile_size: usize,
    current_row: usize,
    current_col: usize,
}

impl TileIterator {
    pub fn new(total_rows: usize, total_cols: usize, tile_size: usize) -> Self {
        Self {
            total_rows,
            total_cols,
            tile_size: tile_size.max(1),
            current_row: 0,
            current_col: 0,
        }
    }
}

impl Iterator for TileIterator {
    type Item = Tile;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.total_rows || self.total_cols == 0 {
            return None;
        }

        let rows = self.tile_size.min(self.total_rows - self.current_row);
        let cols = self.tile_size.min(self.total_cols - self.current_col);
        let tile = Tile::new(self.current_row, self.current_col, rows, cols);

        self.current_col += self.tile_size;
        if self.current_col >= self.total_cols {
            self.current_col = 0;
            self.current_row += self.tile_size;
        }

        Some(tile)
    }
}

/// Computes rasters tile by tile, tiles in parallel.
#[derive(Debug, Clone, Copy)]
pub struct TiledProcessor {
    tile_size: usize,
}

impl Default for TiledProcessor {
    /// 256x256 tiles
    fn default() -> Self {
        Self::new(256)
    }
}

impl TiledProcessor {
    pub fn new(tile_size: usize) -> Self {
        Self {
            tile_size: tile_size.max(1),
        }
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn tiles(&self, grid: &Grid) -> TileIterator {
        TileIterator::new(grid.rows, grid.cols, self.tile_size)
    }

    /// Build a raster on `grid` by evaluating `f(row, col)` for every cell.
    /// `None` results become no-data.
    pub fn generate<F>(&self, grid: &Grid, f: F) -> Result<Raster<f64>>
    where
        F: Fn(usize, usize) -> Option<f64> + Sync + Send,
    {
        let tiles: Vec<Tile> = self.tiles(grid).collect();

        let results: Vec<(Tile, Vec<Option<f64>>)> = tiles
            .into_par_iter()
            .map(|tile| {
                let mut cells = Vec::with_capacity(tile.rows * tile.cols);
                for local_row in 0..tile.rows {
                    for local_col in 0..tile.cols {
                        let (row, col) = tile.to_source_coords(local_row, local_col);
                        cells.push(f(row, col));
                    }
                }
                (tile, cells)
            })
            .collect();

        let mut data = Array2::<f64>::zeros(grid.shape());
        let mut valid = Array2::from_elem(grid.shape(), false);

        for (tile, cells) in results {
            let window = s![
                tile.row_offset..tile.row_offset + tile.rows,
                tile.col_offset..tile.col_offset + tile.cols
            ];
            let mut data_view = data.slice_mut(window);
            let mut valid_view = valid.slice_mut(window);
            for (i, cell) in cells.into_iter().enumerate() {
                let idx = (i / tile.cols, i % tile.cols);
                if let Some(v) = cell {
                    data_view[idx] = v;
                    valid_view[idx] = true;
                }
            }
        }

        Ok(Raster::from_parts(data, valid)?.on_grid(grid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kharif_core::{GeoTransform, CRS};

    #[test]
    fn test_tile_iterator() {
        let tiles: Vec<_> = TileIterator::new(100, 70, 32).collect();
        assert_eq!(tiles.len(), 4 * 3);
        assert_eq!(tiles[0], Tile::new(0, 0, 32, 32));
        assert_eq!(tiles[2], Tile::new(0, 64, 32, 6));
        assert_eq!(tiles[11], Tile::new(96, 64, 4, 6));
    }

    #[test]
    fn test_tile_coverage() {
        let rows = 100;
        let cols = 90;
        let mut covered = vec![vec![0u8; cols]; rows];

        for tile in TileIterator::new(rows, cols, 32) {
            for r in tile.row_offset..tile.row_offset + tile.rows {
                for c in tile.col_offset..tile.col_offset + tile.cols {
                    covered[r][c] += 1;
                }
            }
        }

        // Every cell covered exactly once
        for r in 0..rows {
            for c in 0..cols {
                assert_eq!(covered[r][c], 1, "Cell ({}, {}) coverage", r, c);
            }
        }
    }

    #[test]
    fn test_generate_places_cells() {
        let grid = Grid::new(7, 5, GeoTransform::new(0.0, 7.0, 1.0, -1.0), CRS::wgs84());
        let raster = TiledProcessor::new(3)
            .generate(&grid, |r, c| {
                if (r + c) % 2 == 0 {
                    Some((r * 10 + c) as f64)
                } else {
                    None
                }
            })
            .unwrap();

        assert!(raster.grid().is_aligned_with(&grid));
        assert_eq!(raster.cell(6, 4), Some(64.0));
        assert_eq!(raster.cell(3, 1), Some(31.0));
        assert_eq!(raster.cell(3, 2), None);
    }
}
