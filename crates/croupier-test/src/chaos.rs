//! Change storms for realtime chaos testing
//!
//! Generates seeded bursts of backend changes:
//! - Inserts and updates over a small id space (heavy coalescing)
//! - Deletes, including of records with queued updates
//! - Feed drops that force the subscription through its backoff
//! - Irregular gaps, some shorter and some longer than the debounce window

use std::collections::BTreeMap;
use std::time::Duration;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use croupier_core::{Record, RecordId};

/// Storm configuration
#[derive(Clone, Debug)]
pub struct StormConfig {
    pub seed: u64,
    /// Number of steps
    pub steps: usize,
    /// Distinct record ids touched
    pub id_space: usize,
    /// Probability a step deletes
    pub delete_prob: f64,
    /// Probability a step drops every feed
    pub disconnect_prob: f64,
    /// Gap before each step, uniform in this range (ms)
    pub gap_ms: (u64, u64),
}

impl Default for StormConfig {
    fn default() -> Self {
        StormConfig {
            seed: 0x00C0_FFEE,
            steps: 200,
            id_space: 20,
            delete_prob: 0.15,
            disconnect_prob: 0.0,
            gap_ms: (0, 120),
        }
    }
}

impl StormConfig {
    /// Slow trickle: every event lands after the debounce window
    pub fn calm() -> Self {
        StormConfig {
            steps: 50,
            gap_ms: (350, 800),
            ..Default::default()
        }
    }

    /// Dense bursts over few ids with occasional feed drops
    pub fn violent() -> Self {
        StormConfig {
            steps: 500,
            id_space: 8,
            delete_prob: 0.25,
            disconnect_prob: 0.02,
            gap_ms: (0, 40),
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// One storm action
#[derive(Clone, Debug, PartialEq)]
pub enum StormAction {
    Insert(Record),
    Update(Record),
    Delete(RecordId),
    /// Drop every live feed
    Disconnect,
}

/// An action and the delay before it
#[derive(Clone, Debug)]
pub struct StormStep {
    pub gap: Duration,
    pub action: StormAction,
}

/// Seeded storm generator
pub struct EventStorm {
    config: StormConfig,
    rng: StdRng,
    /// Ids currently alive, for picking insert vs update
    live: BTreeMap<usize, u64>,
    version: u64,
}

impl EventStorm {
    pub fn new(config: StormConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        EventStorm {
            config,
            rng,
            live: BTreeMap::new(),
            version: 0,
        }
    }

    /// Generate the full step list
    pub fn generate(&mut self) -> Vec<StormStep> {
        let (lo, hi) = self.config.gap_ms;
        let gaps = Uniform::new_inclusive(lo, hi.max(lo));
        let ids = Uniform::new(0, self.config.id_space.max(1));

        (0..self.config.steps)
            .map(|_| {
                let gap = Duration::from_millis(gaps.sample(&mut self.rng));
                let slot = ids.sample(&mut self.rng);
                let action = self.next_action(slot);
                StormStep { gap, action }
            })
            .collect()
    }

    fn next_action(&mut self, slot: usize) -> StormAction {
        if self.rng.gen_bool(self.config.disconnect_prob) {
            return StormAction::Disconnect;
        }

        let id = storm_id(slot);
        if self.live.contains_key(&slot) && self.rng.gen_bool(self.config.delete_prob) {
            self.live.remove(&slot);
            return StormAction::Delete(id);
        }

        self.version += 1;
        let record = Record::new(id)
            .with_field("name", format!("Storm casino {}", slot))
            .with_field("version", self.version);
        if self.live.insert(slot, self.version).is_some() {
            StormAction::Update(record)
        } else {
            StormAction::Insert(record)
        }
    }
}

pub fn storm_id(slot: usize) -> RecordId {
    RecordId::new(format!("storm-{:02}", slot))
}
