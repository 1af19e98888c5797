//! City layout: houses, markets and field bounds.

use crate::geometry::Vec2;
use anyhow::{Result, bail};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Width shared by all houses.
pub const HOUSE_WIDTH: i32 = 40;
/// Height shared by all houses.
pub const HOUSE_HEIGHT: i32 = 40;

/// Free space around every house in the generated grid.
const HOUSE_GAP: i32 = 20;

/// Axis-aligned house anchored at its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct House {
    id: usize,
    corner: Vec2,
    is_market: bool,
    n_residents: usize,
}

impl House {
    pub fn new(id: usize, corner: Vec2, is_market: bool) -> Self {
        Self {
            id,
            corner,
            is_market,
            n_residents: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn corner(&self) -> Vec2 {
        self.corner
    }

    pub fn is_market(&self) -> bool {
        self.is_market
    }

    pub fn n_residents(&self) -> usize {
        self.n_residents
    }

    /// Corner opposite to the anchor.
    pub fn far_corner(&self) -> Vec2 {
        self.corner.translate(Vec2::new(HOUSE_WIDTH, HOUSE_HEIGHT))
    }

    pub fn center(&self) -> Vec2 {
        self.corner
            .translate(Vec2::new(HOUSE_WIDTH / 2, HOUSE_HEIGHT / 2))
    }

    /// Open rectangle: points on the walls are outside.
    pub fn contains_strict(&self, pos: Vec2) -> bool {
        pos.x > self.corner.x
            && pos.x < self.corner.x + HOUSE_WIDTH
            && pos.y > self.corner.y
            && pos.y < self.corner.y + HOUSE_HEIGHT
    }

    /// Half-open rectangle `[x0, x0 + W) x [y0, y0 + H)`.
    pub fn contains_half_open(&self, pos: Vec2) -> bool {
        pos.x >= self.corner.x
            && pos.x < self.corner.x + HOUSE_WIDTH
            && pos.y >= self.corner.y
            && pos.y < self.corner.y + HOUSE_HEIGHT
    }

    /// Closed rectangle: points on the walls are inside.
    pub fn contains_closed(&self, pos: Vec2) -> bool {
        pos.x >= self.corner.x
            && pos.x <= self.corner.x + HOUSE_WIDTH
            && pos.y >= self.corner.y
            && pos.y <= self.corner.y + HOUSE_HEIGHT
    }
}

/// Read-only view of the city consumed by the agent engine.
///
/// Houses are stored by id, so `houses[id].id() == id` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityLayout {
    field_width: i32,
    field_height: i32,
    houses: Vec<House>,
    market_ids: Vec<usize>,
}

impl CityLayout {
    /// Build a layout from explicitly placed houses.
    ///
    /// # Errors
    /// Returns an error if the house ids are not `0..n` in order
    /// or if a house does not fit inside the field.
    pub fn from_houses(field_width: i32, field_height: i32, houses: Vec<House>) -> Result<Self> {
        if field_width <= 0 || field_height <= 0 {
            bail!("field must have positive size, but is {field_width}x{field_height}");
        }
        for (idx, house) in houses.iter().enumerate() {
            if house.id != idx {
                bail!("house at index {idx} has id {}", house.id);
            }
            let far = house.far_corner();
            if house.corner.x < 0 || house.corner.y < 0 || far.x > field_width || far.y > field_height
            {
                bail!("house {idx} does not fit inside the field");
            }
        }
        let market_ids = houses
            .iter()
            .filter(|house| house.is_market())
            .map(|house| house.id)
            .collect();
        Ok(Self {
            field_width,
            field_height,
            houses,
            market_ids,
        })
    }

    /// Place `n_houses` houses on random cells of a regular grid and turn
    /// `n_markets` of them into markets.
    pub fn generate<R: Rng + ?Sized>(
        field_width: i32,
        field_height: i32,
        n_houses: usize,
        n_markets: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let capacity = grid_capacity(field_width, field_height);
        if n_houses > capacity {
            bail!("field fits at most {capacity} houses, but {n_houses} were requested");
        }
        if n_markets >= n_houses {
            bail!("at least one house must remain residential");
        }

        let n_cols = grid_cols(field_width);
        let cell_idxs: Vec<usize> = (0..capacity).collect();
        let mut chosen: Vec<usize> = cell_idxs
            .choose_multiple(rng, n_houses)
            .copied()
            .collect();
        chosen.sort_unstable();

        let house_ids: Vec<usize> = (0..n_houses).collect();
        let market_ids: Vec<usize> = house_ids
            .choose_multiple(rng, n_markets)
            .copied()
            .collect();

        let cell = HOUSE_WIDTH.max(HOUSE_HEIGHT) + HOUSE_GAP;
        let houses = chosen
            .iter()
            .enumerate()
            .map(|(id, &i_cell)| {
                let col = (i_cell % n_cols) as i32;
                let row = (i_cell / n_cols) as i32;
                let corner = Vec2::new(HOUSE_GAP + col * cell, HOUSE_GAP + row * cell);
                House::new(id, corner, market_ids.contains(&id))
            })
            .collect();

        Self::from_houses(field_width, field_height, houses)
    }

    pub fn field_width(&self) -> i32 {
        self.field_width
    }

    pub fn field_height(&self) -> i32 {
        self.field_height
    }

    pub fn houses(&self) -> &[House] {
        &self.houses
    }

    /// Look up a house by id.
    ///
    /// An unknown id is a caller bug and panics.
    pub fn house(&self, id: usize) -> &House {
        &self.houses[id]
    }

    pub fn market_ids(&self) -> &[usize] {
        &self.market_ids
    }

    pub fn markets(&self) -> impl Iterator<Item = &House> {
        self.market_ids.iter().map(|&id| &self.houses[id])
    }

    pub fn residential_ids(&self) -> Vec<usize> {
        self.houses
            .iter()
            .filter(|house| !house.is_market())
            .map(|house| house.id)
            .collect()
    }

    pub fn in_field(&self, pos: Vec2) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x <= self.field_width && pos.y <= self.field_height
    }

    /// True if `pos` is strictly inside any non-market house.
    pub fn in_any_residence(&self, pos: Vec2) -> bool {
        self.houses
            .iter()
            .filter(|house| !house.is_market())
            .any(|house| house.contains_strict(pos))
    }

    pub fn add_resident(&mut self, id: usize) {
        self.houses[id].n_residents += 1;
    }
}

fn grid_cols(field_width: i32) -> usize {
    let cell = HOUSE_WIDTH.max(HOUSE_HEIGHT) + HOUSE_GAP;
    ((field_width - HOUSE_GAP).max(0) / cell) as usize
}

fn grid_rows(field_height: i32) -> usize {
    let cell = HOUSE_WIDTH.max(HOUSE_HEIGHT) + HOUSE_GAP;
    ((field_height - HOUSE_GAP).max(0) / cell) as usize
}

/// Number of houses the generated grid can hold.
pub fn grid_capacity(field_width: i32, field_height: i32) -> usize {
    grid_cols(field_width) * grid_rows(field_height)
}
