use crate::city::CityLayout;
use crate::config::Config;
use crate::model::{PersonView, Record, State};
use crate::person::{Movement, Person};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, Uniform};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Simulation engine.
///
/// Holds the configuration, current state, and random number generator,
/// and provides methods to initialize, run, save, and load simulations.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    state: State,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a random city and population.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let mut rng = match cfg.init.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let mut layout = CityLayout::generate(
            cfg.city.field_width,
            cfg.city.field_height,
            cfg.city.n_houses,
            cfg.city.n_markets,
            &mut rng,
        )
        .context("failed to generate city layout")?;

        log::info!(
            "generated {}x{} city with {} houses and {} markets",
            layout.field_width(),
            layout.field_height(),
            layout.houses().len(),
            layout.market_ids().len()
        );

        let residential = layout.residential_ids();
        let home_dist = Uniform::new(0, residential.len())?;

        let ids: Vec<usize> = (0..cfg.init.n_people).collect();
        let sick_ids: Vec<usize> = ids
            .choose_multiple(&mut rng, cfg.init.n_sick)
            .copied()
            .collect();

        let mut people = Vec::with_capacity(cfg.init.n_people);
        for id in ids {
            let home_id = residential[home_dist.sample(&mut rng)];
            layout.add_resident(home_id);
            let is_sick = sick_ids.contains(&id);
            people.push(Person::new(id, home_id, &layout, is_sick, &mut rng));
        }

        let max_residents = layout.houses().iter().map(|h| h.n_residents()).max();
        log::info!("placed {} people, at most {max_residents:?} per house", people.len());

        let state = State {
            tick: 0,
            layout,
            people,
            n_removed: 0,
        };

        Ok(Self { cfg, state, rng })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Perform the simulation and save the resulting records to a binary file.
    pub fn perform_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        for i_save in 0..self.cfg.output.saves_per_file {
            let mut n_sent_home = 0;
            for _ in 0..self.cfg.output.ticks_per_save {
                n_sent_home += self.perform_step().context("failed to perform step")?;
            }

            let record = self.record();
            log::info!(
                "tick {}: {} people, {n_sent_home} sent home, {:?}",
                record.tick,
                record.census.n_people(),
                record.census
            );
            encode::write(&mut writer, &record).context("failed to serialize record")?;

            let progress = 100.0 * (i_save + 1) as f64 / self.cfg.output.saves_per_file as f64;
            log::info!("completed {progress:06.2}%");
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }

    fn record(&self) -> Record {
        let people = self
            .cfg
            .output
            .save_people
            .then(|| self.state.people.iter().map(PersonView::from).collect());
        Record {
            tick: self.state.tick,
            census: self.state.census(),
            people,
        }
    }

    /// Advance the population by one tick and return how many walkers were sent home.
    fn perform_step(&mut self) -> Result<usize> {
        // Nudge some walkers home before the tick starts.
        let sent_home = self
            .send_walkers_home()
            .context("failed to send walkers home")?;

        // Advance everyone against the same snapshot of the population.
        // Nudged walkers already took this tick's step.
        let residents = self.state.residents_by_home();
        let layout = &self.state.layout;
        for (person, &was_sent) in self.state.people.iter_mut().zip(&sent_home) {
            let co_residents = &residents[person.home_id()];
            if was_sent {
                person.advance_tick_in_place(layout, co_residents, &mut self.rng);
            } else {
                person.advance_tick(layout, co_residents, &mut self.rng);
            }
        }

        self.remove_decomposed();

        self.state.tick += 1;

        Ok(sent_home.iter().filter(|&&was_sent| was_sent).count())
    }

    fn send_walkers_home(&mut self) -> Result<Vec<bool>> {
        let go_home_dist = Bernoulli::new(self.cfg.driver.prob_go_home)?;
        let layout = &self.state.layout;
        let mut sent_home = Vec::with_capacity(self.state.people.len());
        for person in &mut self.state.people {
            let send = person.movement() == Movement::Walking && go_home_dist.sample(&mut self.rng);
            if send {
                person.force_go_home(layout);
                log::debug!("sent person {} home", person.id());
            }
            sent_home.push(send);
        }
        Ok(sent_home)
    }

    fn remove_decomposed(&mut self) {
        let n_before = self.state.people.len();
        self.state.people.retain(|person| !person.is_removable());
        let n_removed = n_before - self.state.people.len();
        if n_removed > 0 {
            log::debug!("tick {}: removed {n_removed} people", self.state.tick);
        }
        self.state.n_removed += n_removed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EXAMPLE_CONFIG;
    use crate::person::{Dice, Health, MAX_DISTANCE_PER_TURN};

    fn engine() -> Engine {
        let cfg = Config::from_toml(EXAMPLE_CONFIG).unwrap();
        Engine::generate_initial_condition(cfg).unwrap()
    }

    #[test]
    fn initial_condition_matches_config() {
        let engine = engine();
        let state = engine.state();
        assert_eq!(state.people.len(), 200);
        assert_eq!(state.census().n_sick, 5);
        assert_eq!(state.layout.houses().len(), 40);

        let n_residents: usize = state.layout.houses().iter().map(|h| h.n_residents()).sum();
        assert_eq!(n_residents, 200);
        for person in &state.people {
            assert!(!state.layout.house(person.home_id()).is_market());
        }
    }

    #[test]
    fn steps_keep_population_consistent() {
        let mut engine = engine();
        for _ in 0..300 {
            engine.perform_step().unwrap();
            let state = engine.state();
            assert!(state.people.iter().all(|p| !p.is_removable()));
            assert_eq!(state.people.len() + state.n_removed, 200);
            for person in &state.people {
                assert!(state.layout.in_field(person.position()));
            }
        }
        assert_eq!(engine.state().tick, 300);
    }

    #[test]
    fn nudged_walkers_never_exceed_step_budget() {
        let mut cfg = Config::from_toml(EXAMPLE_CONFIG).unwrap();
        cfg.driver.prob_go_home = 0.5;
        let mut engine = Engine::generate_initial_condition(cfg).unwrap();

        let mut n_sent_home = 0;
        for _ in 0..500 {
            let before: Vec<_> = engine
                .state()
                .people
                .iter()
                .map(|p| (p.id(), p.position()))
                .collect();
            n_sent_home += engine.perform_step().unwrap();
            for person in &engine.state().people {
                let (_, prev) = before.iter().find(|(id, _)| *id == person.id()).unwrap();
                let jump = prev.offset_to(person.position()).manhattan_len();
                assert!(jump <= MAX_DISTANCE_PER_TURN, "person {} jumped {jump}", person.id());
            }
        }
        assert!(n_sent_home > 0);
    }

    #[test]
    fn same_seed_same_trajectory() {
        let mut a = engine();
        let mut b = engine();
        for _ in 0..100 {
            a.perform_step().unwrap();
            b.perform_step().unwrap();
        }
        assert_eq!(a.state(), b.state());
    }

    /// Dice that always rolls zero, which is fatal for sick people.
    struct ZeroDice;

    impl Dice for ZeroDice {
        fn roll(&mut self) -> f64 {
            0.0
        }

        fn below(&mut self, _n: u32) -> u32 {
            0
        }
    }

    #[test]
    fn decomposed_people_are_removed_between_ticks() {
        let mut engine = engine();
        let i_sick = engine
            .state
            .people
            .iter()
            .position(|p| p.health() == Health::Sick)
            .unwrap();
        let victim = &mut engine.state.people[i_sick];
        let victim_id = victim.id();
        victim.advance_tick(&engine.state.layout, &[], &mut ZeroDice);
        assert_eq!(victim.health(), Health::Dead);

        let is_present = |engine: &Engine| engine.state().people.iter().any(|p| p.id() == victim_id);
        for _ in 0..9 {
            engine.perform_step().unwrap();
            assert!(is_present(&engine));
        }
        engine.perform_step().unwrap();
        assert!(!is_present(&engine));
        assert!(engine.state().n_removed >= 1);
    }

    #[test]
    fn checkpoint_round_trip_resumes_identically() {
        let dir = std::env::temp_dir().join(format!("contagion-ckpt-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("checkpoint.msgpack");

        let mut engine = engine();
        engine.perform_step().unwrap();
        engine.save_checkpoint(&file).unwrap();
        let mut resumed = Engine::load_checkpoint(&file).unwrap();
        assert_eq!(resumed.cfg(), engine.cfg());

        for _ in 0..20 {
            engine.perform_step().unwrap();
            resumed.perform_step().unwrap();
        }
        assert_eq!(resumed.state(), engine.state());

        std::fs::remove_dir_all(&dir).ok();
    }
}
