//! Session-clustered event generation.

use crate::config::GeneratorConfig;
use crate::error::ConfigError;
use crate::event::Event;
use crate::sampler::WeightedKeySampler;
use crate::session::SessionClock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

/// Added to address keys before scattering so that the most popular key does
/// not land on `0.0.0.0`.
const ADDRESS_SALT: u32 = 0x0a00_0001;

/// Produces an unbounded, lazily generated stream of events.
///
/// Every session draws a user, settles on one address, and schedules a burst
/// of events spaced by short think times. Scheduled events wait in a min-heap
/// and are only released once no unopened session could start before them,
/// so timestamps come out non-decreasing for every user (and in fact
/// globally).
///
/// All randomness flows from the generator's own RNG: the same config and
/// seed always yield the same sequence.
pub struct LogGenerator<R = StdRng> {
    users: WeightedKeySampler,
    addresses: WeightedKeySampler,
    operations: WeightedKeySampler,
    vocabulary: Vec<String>,
    opening: Option<String>,
    home_probability: f64,
    /// Home address per user, fixed on first appearance.
    homes: HashMap<u32, i32>,
    clock: SessionClock,
    pending: BinaryHeap<Reverse<Scheduled>>,
    scheduled: u64,
    emitted: u64,
    rng: R,
}

/// An event waiting to be released, ordered by time then scheduling order.
#[derive(Debug)]
struct Scheduled {
    time: i64,
    seq: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then(self.seq.cmp(&other.seq))
    }
}

impl<R: Rng> LogGenerator<R> {
    /// Validate `config` and build the key samplers. Fails before any event
    /// can be produced if a parameter is out of range.
    pub fn new(config: GeneratorConfig, mut rng: R) -> Result<Self, ConfigError> {
        config.validate()?;

        let users = WeightedKeySampler::new(config.users.size, config.users.skew, fork(&mut rng))?;
        let addresses = WeightedKeySampler::new(
            config.addresses.size,
            config.addresses.skew,
            fork(&mut rng),
        )?;
        let ops = &config.operations;
        let operations = match &ops.weights {
            Some(weights) => WeightedKeySampler::from_weights(weights, fork(&mut rng))?,
            None => WeightedKeySampler::new(ops.tokens.len() as u64, ops.skew, fork(&mut rng))?,
        };
        let clock = SessionClock::new(&config.time)?;

        tracing::debug!(
            users = config.users.size,
            addresses = config.addresses.size,
            operations = ops.tokens.len(),
            start_millis = config.time.start_millis,
            "log generator ready"
        );

        Ok(Self {
            users,
            addresses,
            operations,
            vocabulary: config.operations.tokens,
            opening: config.operations.opening,
            home_probability: config.addresses.home_probability,
            homes: HashMap::new(),
            clock,
            pending: BinaryHeap::new(),
            scheduled: 0,
            emitted: 0,
            rng,
        })
    }

    /// Next event, serialized in the compact line form.
    pub fn sample(&mut self) -> String {
        self.next_event().serialize()
    }

    /// Next event.
    pub fn next_event(&mut self) -> Event {
        loop {
            let due = matches!(
                self.pending.peek(),
                Some(Reverse(next)) if next.time <= self.clock.next_start_millis()
            );
            if due {
                if let Some(Reverse(next)) = self.pending.pop() {
                    self.emitted += 1;
                    return next.event;
                }
            }
            self.open_session();
        }
    }

    /// Unbounded iterator over events.
    pub fn events(&mut self) -> impl Iterator<Item = Event> + '_ {
        std::iter::from_fn(move || Some(self.next_event()))
    }

    /// Number of events handed out so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Number of events scheduled but not yet handed out.
    pub fn backlog(&self) -> usize {
        self.pending.len()
    }

    fn open_session(&mut self) {
        let start = self.clock.open(&mut self.rng);
        let user = self.users.sample_key() as u32;
        let address = self.session_address(user);
        let length = self.clock.session_length(&mut self.rng);

        let mut offset = start;
        for i in 0..length {
            if i > 0 {
                offset += self.clock.think_time(&mut self.rng);
            }
            let operation = match (&self.opening, i) {
                (Some(opening), 0) => opening.clone(),
                _ => self.vocabulary[self.operations.sample_key() as usize].clone(),
            };
            let time = self.clock.to_millis(offset);
            self.pending.push(Reverse(Scheduled {
                time,
                seq: self.scheduled,
                event: Event::from_parts(user, time, operation, address),
            }));
            self.scheduled += 1;
        }
    }

    fn session_address(&mut self, user: u32) -> i32 {
        let home = *self
            .homes
            .entry(user)
            .or_insert_with(|| scatter_address(self.addresses.sample_key()));
        if self.rng.gen_bool(self.home_probability) {
            home
        } else {
            scatter_address(self.addresses.sample_key())
        }
    }
}

impl LogGenerator<StdRng> {
    /// Generator driven by `StdRng::seed_from_u64(seed)`.
    pub fn seeded(config: GeneratorConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::new(config, StdRng::seed_from_u64(seed))
    }

    /// Seeded from `config.seed` when present, from OS entropy otherwise.
    pub fn from_config(config: GeneratorConfig) -> Result<Self, ConfigError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(config, rng)
    }
}

impl<R: Rng> Iterator for LogGenerator<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        Some(self.sample())
    }
}

/// Independent `StdRng` for a sub-sampler, derived from the parent stream.
fn fork<R: Rng + ?Sized>(rng: &mut R) -> StdRng {
    StdRng::seed_from_u64(rng.gen())
}

/// Spread address keys over the 32-bit space. The murmur3 finalizer is a
/// bijection, so distinct keys always map to distinct addresses.
fn scatter_address(key: u64) -> i32 {
    let mut h = (key as u32).wrapping_add(ADDRESS_SALT);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h as i32
}
