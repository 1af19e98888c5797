use crate::config::Config;
use crate::model::{Census, Record};
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Summary of the epidemic curve of one run.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub n_records: usize,
    /// Fraction of living people that are sick, over all records.
    pub sick_fraction: AccumulatorReport,
    pub peak_sick: usize,
    pub peak_tick: usize,
    /// Deaths seen so far, counting decomposing and removed people.
    pub n_deaths: usize,
    pub final_census: Option<Census>,
}

pub struct Analyzer {
    cfg: Config,
    sick_fraction: Accumulator,
    n_records: usize,
    peak_sick: usize,
    peak_tick: usize,
    last: Option<Record>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            sick_fraction: Accumulator::new(),
            n_records: 0,
            peak_sick: 0,
            peak_tick: 0,
            last: None,
        }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        for _ in 0..self.cfg.output.saves_per_file {
            let record: Record = decode::from_read(&mut reader).context("failed to read record")?;
            self.add_record(record);
        }
        Ok(())
    }

    pub fn add_record(&mut self, record: Record) {
        let census = &record.census;
        let n_alive = census.n_healthy + census.n_sick;
        if n_alive > 0 {
            self.sick_fraction
                .add(census.n_sick as f64 / n_alive as f64);
        }
        if census.n_sick > self.peak_sick {
            self.peak_sick = census.n_sick;
            self.peak_tick = record.tick;
        }
        self.n_records += 1;
        self.last = Some(record);
    }

    pub fn results(&self) -> Results {
        let final_census = self.last.as_ref().map(|record| record.census.clone());
        let n_deaths = final_census
            .as_ref()
            .map_or(0, |census| census.n_dead + census.n_removed);
        Results {
            n_records: self.n_records,
            sick_fraction: self.sick_fraction.report(),
            peak_sick: self.peak_sick,
            peak_tick: self.peak_tick,
            n_deaths,
            final_census,
        }
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let results = self.results();
        log::info!("{results:#?}");

        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &results).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EXAMPLE_CONFIG;

    fn record(tick: usize, n_healthy: usize, n_sick: usize, n_dead: usize) -> Record {
        Record {
            tick,
            census: Census {
                n_healthy,
                n_sick,
                n_dead,
                n_removed: 1,
                n_at_home: n_healthy + n_sick,
                ..Census::default()
            },
            people: None,
        }
    }

    #[test]
    fn tracks_peak_and_final_census() {
        let cfg = Config::from_toml(EXAMPLE_CONFIG).unwrap();
        let mut analyzer = Analyzer::new(cfg);
        analyzer.add_record(record(10, 9, 1, 0));
        analyzer.add_record(record(20, 6, 4, 0));
        analyzer.add_record(record(30, 8, 2, 2));

        let results = analyzer.results();
        assert_eq!(results.n_records, 3);
        assert_eq!(results.peak_sick, 4);
        assert_eq!(results.peak_tick, 20);
        assert_eq!(results.n_deaths, 3);
        assert!((results.sick_fraction.mean - (0.1 + 0.4 + 0.2) / 3.0).abs() < 1e-12);
        assert_eq!(results.final_census.unwrap().n_dead, 2);
    }

    #[test]
    fn empty_analyzer_has_no_census() {
        let cfg = Config::from_toml(EXAMPLE_CONFIG).unwrap();
        let results = Analyzer::new(cfg).results();
        assert_eq!(results.n_records, 0);
        assert_eq!(results.final_census, None);
        assert_eq!(results.n_deaths, 0);
    }
}
