//! Isometric projection between grid tiles and screen pixels

use shared::{GridBounds, Tile};

/// Diamond projection parameters: tile footprint in pixels and the screen
/// position of tile (0, 0)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsoProjection {
    pub tile_width: f32,
    pub tile_height: f32,
    pub origin_x: f32,
    pub origin_y: f32,
}

impl Default for IsoProjection {
    fn default() -> Self {
        Self {
            tile_width: 64.0,
            tile_height: 32.0,
            origin_x: 400.0,
            origin_y: 100.0,
        }
    }
}

impl IsoProjection {
    /// Screen position of a tile's centre
    pub fn to_screen(&self, tile: Tile) -> (f32, f32) {
        let gx = tile.x as f32;
        let gy = tile.y as f32;
        (
            (gx - gy) * self.tile_width / 2.0 + self.origin_x,
            (gx + gy) * self.tile_height / 2.0 + self.origin_y,
        )
    }

    /// Inverse projection, floored on both axes. Not bounds checked.
    ///
    /// Flooring always resolves a point to the lower tile index on each axis,
    /// so the result is stable along tile edges instead of rounding to nearest.
    pub fn to_tile(&self, screen_x: f32, screen_y: f32) -> Tile {
        let sx = screen_x - self.origin_x;
        let sy = screen_y - self.origin_y;

        let gx = sx / self.tile_width + sy / self.tile_height;
        let gy = sy / self.tile_height - sx / self.tile_width;

        Tile::new(gx.floor() as i32, gy.floor() as i32)
    }

    /// The tile under a pointer, or None when the pointer is off the grid
    pub fn tile_at(&self, screen_x: f32, screen_y: f32, bounds: GridBounds) -> Option<Tile> {
        let tile = self.to_tile(screen_x, screen_y);
        bounds.contains(tile).then_some(tile)
    }

    /// Corner points of a tile's diamond: top, right, bottom, left
    pub fn diamond(&self, tile: Tile) -> [(f32, f32); 4] {
        let (cx, cy) = self.to_screen(tile);
        let hw = self.tile_width / 2.0;
        let hh = self.tile_height / 2.0;
        [(cx, cy - hh), (cx + hw, cy), (cx, cy + hh), (cx - hw, cy)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_origin_tile_projects_to_origin() {
        let iso = IsoProjection::default();
        let (x, y) = iso.to_screen(Tile::new(0, 0));
        assert_approx_eq!(x, 400.0);
        assert_approx_eq!(y, 100.0);
    }

    #[test]
    fn test_forward_projection() {
        let iso = IsoProjection::default();

        let (x, y) = iso.to_screen(Tile::new(3, 1));
        assert_approx_eq!(x, (3.0 - 1.0) * 32.0 + 400.0);
        assert_approx_eq!(y, (3.0 + 1.0) * 16.0 + 100.0);

        let (x, y) = iso.to_screen(Tile::new(0, 5));
        assert_approx_eq!(x, 400.0 - 160.0);
        assert_approx_eq!(y, 100.0 + 80.0);
    }

    #[test]
    fn test_inverse_of_forward_is_identity() {
        let iso = IsoProjection::default();
        for x in 0..32 {
            for y in 0..32 {
                let tile = Tile::new(x, y);
                let (sx, sy) = iso.to_screen(tile);
                // nudge into the tile so floor cannot land on the neighbour
                assert_eq!(iso.to_tile(sx + 0.5, sy + 0.5), tile);
            }
        }
    }

    #[test]
    fn test_inverse_floors_instead_of_rounding() {
        let iso = IsoProjection::default();
        // Almost one full tile below the centre, still inside (2, 2)
        let (sx, sy) = iso.to_screen(Tile::new(2, 2));
        assert_eq!(iso.to_tile(sx, sy + 31.0), Tile::new(2, 2));
        assert_eq!(iso.to_tile(sx, sy + 32.0), Tile::new(3, 3));
        // Just behind the origin resolves to the negative side
        assert_eq!(iso.to_tile(399.0, 99.0), Tile::new(-1, -1));
    }

    #[test]
    fn test_tile_at_rejects_off_grid() {
        let iso = IsoProjection::default();
        let bounds = GridBounds::default();

        assert_eq!(iso.tile_at(0.0, 0.0, bounds), None);
        assert_eq!(iso.tile_at(400.5, 100.5, bounds), Some(Tile::new(0, 0)));

        let (sx, sy) = iso.to_screen(Tile::new(32, 10));
        assert_eq!(iso.tile_at(sx + 0.5, sy + 0.5, bounds), None);
    }

    #[test]
    fn test_diamond_corners() {
        let iso = IsoProjection::default();
        let [top, right, bottom, left] = iso.diamond(Tile::new(0, 0));
        assert_eq!(top, (400.0, 84.0));
        assert_eq!(right, (432.0, 100.0));
        assert_eq!(bottom, (400.0, 116.0));
        assert_eq!(left, (368.0, 100.0));
    }
}
