use crate::city::grid_capacity;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub city: CityConfig,
    pub init: InitConfig,
    pub driver: DriverConfig,
    pub output: OutputConfig,
}

/// Field size and house counts of the generated city.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CityConfig {
    pub field_width: i32,
    pub field_height: i32,
    /// Number of houses, markets included.
    pub n_houses: usize,
    pub n_markets: usize,
}

/// Initial population.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct InitConfig {
    pub n_people: usize,
    /// Number of people that start sick.
    pub n_sick: usize,
    /// Seed for the random number generator (drawn from the OS if absent).
    pub seed: Option<u64>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Probability per tick that a walking person is sent home.
    pub prob_go_home: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of ticks between saved records.
    pub ticks_per_save: usize,
    /// Number of records written per trajectory file.
    pub saves_per_file: usize,
    /// Store every person in each record, not only the census.
    #[serde(default)]
    pub save_people: bool,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let city = &self.city;
        check_num(city.field_width, 100..=100_000).context("invalid field width")?;
        check_num(city.field_height, 100..=100_000).context("invalid field height")?;
        let capacity = grid_capacity(city.field_width, city.field_height);
        check_num(city.n_houses, 1..=capacity).context("invalid number of houses")?;
        check_num(city.n_markets, 0..city.n_houses).context("invalid number of markets")?;

        check_num(self.init.n_people, 1..1_000_000).context("invalid number of people")?;
        check_num(self.init.n_sick, 0..=self.init.n_people)
            .context("invalid initial number of sick people")?;

        check_num(self.driver.prob_go_home, 0.0..=1.0)
            .context("invalid probability of going home")?;

        check_num(self.output.ticks_per_save, 1..100_000)
            .context("invalid number of ticks per save")?;
        check_num(self.output.saves_per_file, 1..100_000)
            .context("invalid number of saves per file")?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) const EXAMPLE_CONFIG: &str = r#"
[city]
field_width = 1000
field_height = 500
n_houses = 40
n_markets = 4

[init]
n_people = 200
n_sick = 5
seed = 42

[driver]
prob_go_home = 0.02

[output]
ticks_per_save = 10
saves_per_file = 20
"#;

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
