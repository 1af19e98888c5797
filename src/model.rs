//! Simulation data types.

use crate::city::CityLayout;
use crate::geometry::Vec2;
use crate::person::{Health, Movement, Person, Resident};
use serde::{Deserialize, Serialize};

/// State of the simulation at a given tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Number of ticks performed so far.
    pub tick: usize,

    pub layout: CityLayout,

    /// People currently in the simulation.
    pub people: Vec<Person>,

    /// Decomposed people removed so far.
    pub n_removed: usize,
}

impl State {
    /// Snapshot of every person, grouped by home id.
    pub fn residents_by_home(&self) -> Vec<Vec<Resident>> {
        let mut residents = vec![Vec::new(); self.layout.houses().len()];
        for person in &self.people {
            residents[person.home_id()].push(person.resident());
        }
        residents
    }

    pub fn census(&self) -> Census {
        let mut census = Census {
            n_removed: self.n_removed,
            ..Census::default()
        };
        for person in &self.people {
            match person.health() {
                Health::Healthy => census.n_healthy += 1,
                Health::Sick => census.n_sick += 1,
                Health::Dead => census.n_dead += 1,
            }
            match person.movement() {
                Movement::AtHome => census.n_at_home += 1,
                Movement::Walking => census.n_walking += 1,
                Movement::GoingToMarket => census.n_going_to_market += 1,
                Movement::AtMarket => census.n_at_market += 1,
                Movement::GoingHome => census.n_going_home += 1,
            }
        }
        census
    }
}

/// Head counts per health and movement state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Census {
    pub n_healthy: usize,
    pub n_sick: usize,
    pub n_dead: usize,
    pub n_removed: usize,

    pub n_at_home: usize,
    pub n_walking: usize,
    pub n_going_to_market: usize,
    pub n_at_market: usize,
    pub n_going_home: usize,
}

impl Census {
    /// People still in the simulation, decomposing ones included.
    pub fn n_people(&self) -> usize {
        self.n_healthy + self.n_sick + self.n_dead
    }
}

/// Externally visible part of a person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonView {
    pub id: usize,
    pub home_id: usize,
    pub position: Vec2,
    pub health: Health,
    pub movement: Movement,
    pub is_bored: bool,
    pub nearest_market: Option<usize>,
    pub steps_to_recovery: u32,
    pub steps_to_decompose: u32,
    pub steps_at_market: u32,
}

impl From<&Person> for PersonView {
    fn from(person: &Person) -> Self {
        Self {
            id: person.id(),
            home_id: person.home_id(),
            position: person.position(),
            health: person.health(),
            movement: person.movement(),
            is_bored: person.is_bored(),
            nearest_market: person.nearest_market(),
            steps_to_recovery: person.steps_to_recovery(),
            steps_to_decompose: person.steps_to_decompose(),
            steps_at_market: person.steps_at_market(),
        }
    }
}

/// Record of the simulation at a single tick.
///
/// Contains the tick, the census and, optionally, every person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub tick: usize,

    pub census: Census,

    pub people: Option<Vec<PersonView>>,
}
