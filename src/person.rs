//! Per-person behavior engine.
//!
//! Each [`Person`] combines a movement state machine with a health state
//! machine and advances itself one tick at a time. The city layout and the
//! co-resident snapshot are read-only inputs, so the whole population can be
//! advanced against a consistent picture of the previous tick.

use crate::city::{CityLayout, HOUSE_HEIGHT, HOUSE_WIDTH, House};
use crate::geometry::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Diagonal unit directions a step can take.
const DIRECTIONS: [Vec2; 4] = [
    Vec2::new(-1, -1),
    Vec2::new(-1, 1),
    Vec2::new(1, -1),
    Vec2::new(1, 1),
];

/// Manhattan length of a single step.
pub const MAX_DISTANCE_PER_TURN: i32 = 30;

const STEPS_TO_RECOVERY: u32 = 35;
const STEPS_TO_DECOMPOSE: u32 = 10;
const STEPS_AT_MARKET: u32 = 10;

const PROB_DEATH: f64 = 3e-6;
const PROB_START_WALK: f64 = 0.005;
const PROB_INFECTION: f64 = 0.5;
/// Rolls at or above this send a walking person to the market.
const MARKET_MISS_THRESHOLD: f64 = 0.6;

const BORED_AFTER: u32 = 5;

/// Upper bound on rejected step candidates before a person stays put.
const MAX_STEP_ATTEMPTS: usize = 64;

/// Source of randomness for the behavior engine.
pub trait Dice {
    /// Uniform value in `[0, 1)`.
    fn roll(&mut self) -> f64;

    /// Uniform integer in `0..n`.
    fn below(&mut self, n: u32) -> u32;
}

impl<R: Rng> Dice for R {
    fn roll(&mut self) -> f64 {
        self.random::<f64>()
    }

    fn below(&mut self, n: u32) -> u32 {
        self.random_range(0..n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Health {
    Healthy,
    Sick,
    Dead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Movement {
    AtHome,
    Walking,
    GoingToMarket,
    AtMarket,
    GoingHome,
}

/// What a person exposes to its co-residents during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resident {
    pub id: usize,
    pub home_id: usize,
    pub health: Health,
    pub movement: Movement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    id: usize,
    home_id: usize,
    position: Vec2,

    health: Health,
    movement: Movement,

    steps_to_recovery: u32,
    steps_to_decompose: u32,
    steps_at_market: u32,

    ticks_at_home: u32,
    is_bored: bool,

    /// Fixed at construction.
    nearest_market: Option<usize>,
}

impl Person {
    /// Create a person at a random spot inside its home.
    ///
    /// `home_id` must name a non-market house of `layout`.
    pub fn new<D: Dice + ?Sized>(
        id: usize,
        home_id: usize,
        layout: &CityLayout,
        start_sick: bool,
        dice: &mut D,
    ) -> Self {
        let corner = layout.house(home_id).corner();
        let x = corner.x + dice.below(HOUSE_WIDTH as u32) as i32;
        let y = corner.y + dice.below(HOUSE_HEIGHT as u32) as i32;
        let position = Vec2::new(x, y);

        let mut person = Self {
            id,
            home_id,
            position,
            health: Health::Healthy,
            movement: Movement::AtHome,
            steps_to_recovery: 0,
            steps_to_decompose: 0,
            steps_at_market: 0,
            ticks_at_home: 0,
            is_bored: false,
            nearest_market: find_nearest_market(position, layout),
        };
        if start_sick {
            person.fall_sick();
        }
        person
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn home_id(&self) -> usize {
        self.home_id
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn movement(&self) -> Movement {
        self.movement
    }

    pub fn is_bored(&self) -> bool {
        self.is_bored
    }

    /// Market chosen at construction, if the city has any.
    pub fn nearest_market(&self) -> Option<usize> {
        self.nearest_market
    }

    pub fn steps_to_recovery(&self) -> u32 {
        self.steps_to_recovery
    }

    pub fn steps_to_decompose(&self) -> u32 {
        self.steps_to_decompose
    }

    pub fn steps_at_market(&self) -> u32 {
        self.steps_at_market
    }

    /// Dead and fully decomposed.
    pub fn is_removable(&self) -> bool {
        self.health == Health::Dead && self.steps_to_decompose == 0
    }

    pub fn resident(&self) -> Resident {
        Resident {
            id: self.id,
            home_id: self.home_id,
            health: self.health,
            movement: self.movement,
        }
    }

    /// Advance this person by one tick.
    ///
    /// `co_residents` is the previous-tick snapshot of people sharing the
    /// home; an entry for this person is ignored.
    pub fn advance_tick<D: Dice + ?Sized>(
        &mut self,
        layout: &CityLayout,
        co_residents: &[Resident],
        dice: &mut D,
    ) {
        self.advance(layout, co_residents, dice, true);
    }

    /// Advance this person by one tick without moving it.
    ///
    /// Used for a person that already stepped this tick through
    /// [`Person::force_go_home`].
    pub fn advance_tick_in_place<D: Dice + ?Sized>(
        &mut self,
        layout: &CityLayout,
        co_residents: &[Resident],
        dice: &mut D,
    ) {
        self.advance(layout, co_residents, dice, false);
    }

    fn advance<D: Dice + ?Sized>(
        &mut self,
        layout: &CityLayout,
        co_residents: &[Resident],
        dice: &mut D,
        take_step: bool,
    ) {
        self.update_time_at_home(layout);

        match self.health {
            Health::Dead => {
                self.steps_to_decompose = self.steps_to_decompose.saturating_sub(1);
                return;
            }
            Health::Sick => {
                self.steps_to_recovery = self.steps_to_recovery.saturating_sub(1);
                if self.steps_to_recovery == 0 {
                    self.health = Health::Healthy;
                } else if dice.roll() < PROB_DEATH {
                    self.die();
                    return;
                }
            }
            Health::Healthy => {}
        }

        if take_step {
            self.move_one_step(layout, dice);
        }

        if self.movement == Movement::AtHome {
            self.catch_infection(co_residents, dice);
        }
    }

    /// Send a walking person home, taking the first homing step right away.
    ///
    /// Does nothing in any other movement state.
    pub fn force_go_home(&mut self, layout: &CityLayout) {
        if self.movement != Movement::Walking {
            return;
        }
        self.movement = Movement::GoingHome;
        self.going_home_step(layout);
    }

    fn fall_sick(&mut self) {
        self.health = Health::Sick;
        self.steps_to_recovery = STEPS_TO_RECOVERY;
    }

    fn die(&mut self) {
        self.health = Health::Dead;
        self.steps_to_decompose = STEPS_TO_DECOMPOSE;
    }

    fn home<'a>(&self, layout: &'a CityLayout) -> &'a House {
        layout.house(self.home_id)
    }

    fn update_time_at_home(&mut self, layout: &CityLayout) {
        if self.home(layout).contains_half_open(self.position) {
            self.ticks_at_home = self.ticks_at_home.saturating_add(1);
        } else {
            self.ticks_at_home = 0;
        }
        self.is_bored = self.ticks_at_home >= BORED_AFTER;
    }

    fn move_one_step<D: Dice + ?Sized>(&mut self, layout: &CityLayout, dice: &mut D) {
        if self.movement == Movement::Walking
            && self.nearest_market.is_some()
            && dice.roll() >= MARKET_MISS_THRESHOLD
        {
            self.movement = Movement::GoingToMarket;
        }

        if let Some(market_id) = self.nearest_market {
            let in_market = layout.house(market_id).contains_strict(self.position);
            if in_market && !matches!(self.movement, Movement::AtMarket | Movement::GoingHome) {
                self.movement = Movement::AtMarket;
                self.steps_at_market = STEPS_AT_MARKET;
            }
        }

        match self.movement {
            Movement::AtHome => self.at_home_step(layout, dice),
            Movement::Walking => self.walking_step(layout, dice),
            Movement::GoingHome => self.going_home_step(layout),
            Movement::GoingToMarket => self.going_to_market_step(layout, dice),
            Movement::AtMarket => self.at_market_step(),
        }
    }

    fn at_home_step<D: Dice + ?Sized>(&mut self, layout: &CityLayout, dice: &mut D) {
        if dice.roll() < PROB_START_WALK {
            self.movement = Movement::Walking;
            self.walking_step(layout, dice);
            return;
        }

        // Shuffle around without leaving the house.
        let next = self.position.translate(draw_step(dice));
        if layout.in_field(next) && self.home(layout).contains_closed(next) {
            self.position = next;
        }
    }

    fn walking_step<D: Dice + ?Sized>(&mut self, layout: &CityLayout, dice: &mut D) {
        for _ in 0..MAX_STEP_ATTEMPTS {
            let next = self.position.translate(draw_step(dice));
            if is_open_ground(layout, next) {
                self.position = next;
                return;
            }
        }
        log::debug!(
            "person {} found no valid step from {:?}, staying in place",
            self.id,
            self.position
        );
    }

    fn going_home_step(&mut self, layout: &CityLayout) {
        let center = self.home(layout).center();
        let offset = self.position.offset_to(center);

        if offset.manhattan_len() <= MAX_DISTANCE_PER_TURN {
            self.position = center;
            self.movement = Movement::AtHome;
            return;
        }

        let x_len = offset.x.abs().min(MAX_DISTANCE_PER_TURN);
        let y_len = MAX_DISTANCE_PER_TURN - x_len;
        let delta = Vec2::new(x_len * offset.x.signum(), y_len * offset.y.signum());
        self.position = self.position.translate(delta);
    }

    fn going_to_market_step<D: Dice + ?Sized>(&mut self, layout: &CityLayout, dice: &mut D) {
        let Some(market_id) = self.nearest_market else {
            self.walking_step(layout, dice);
            return;
        };
        let target = layout.house(market_id).far_corner();

        let (x_len, y_len) = draw_lengths(dice);
        let best = DIRECTIONS
            .iter()
            .map(|dir| {
                self.position
                    .translate(Vec2::new(x_len * dir.x, y_len * dir.y))
            })
            .filter(|&next| is_open_ground(layout, next))
            .min_by(|a, b| a.distance_to(target).total_cmp(&b.distance_to(target)));

        match best {
            Some(next) => self.position = next,
            None => self.walking_step(layout, dice),
        }
    }

    fn at_market_step(&mut self) {
        self.steps_at_market = self.steps_at_market.saturating_sub(1);
        if self.steps_at_market == 0 {
            self.movement = Movement::GoingHome;
        }
    }

    fn catch_infection<D: Dice + ?Sized>(&mut self, co_residents: &[Resident], dice: &mut D) {
        let exposed = co_residents.iter().any(|other| {
            other.id != self.id
                && other.home_id == self.home_id
                && other.health == Health::Sick
                && other.movement == Movement::AtHome
        });
        if exposed && dice.roll() < PROB_INFECTION && self.health == Health::Healthy {
            self.fall_sick();
        }
    }
}

fn find_nearest_market(position: Vec2, layout: &CityLayout) -> Option<usize> {
    layout
        .markets()
        .map(|market| (market.id(), position.distance_to(market.corner())))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(id, _)| id)
}

/// Split the step budget between the axes.
fn draw_lengths<D: Dice + ?Sized>(dice: &mut D) -> (i32, i32) {
    let x_len = dice.below(MAX_DISTANCE_PER_TURN as u32) as i32;
    (x_len, MAX_DISTANCE_PER_TURN - x_len)
}

fn draw_step<D: Dice + ?Sized>(dice: &mut D) -> Vec2 {
    let (x_len, y_len) = draw_lengths(dice);
    let dir = DIRECTIONS[dice.below(DIRECTIONS.len() as u32) as usize];
    Vec2::new(x_len * dir.x, y_len * dir.y)
}

/// Inside the field and outside every residential house.
fn is_open_ground(layout: &CityLayout, pos: Vec2) -> bool {
    layout.in_field(pos) && !layout.in_any_residence(pos)
}
