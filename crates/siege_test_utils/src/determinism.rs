//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! RTS simulations must be 100% deterministic for lockstep multiplayer.
//! Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`siege_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted entity ID order.
//!
//! - **System randomness**: No calls to `rand()` without explicit seeds.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual subsystem determinism (pathfinding, combat)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full simulation scenarios are reproducible
//! 4. **Parallel tests**: Running N simulations in parallel all match

use std::thread;

use siege_core::math::Fixed;
use siege_core::sim::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed
    /// error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a scenario multiple times and verify every run hashes the same.
///
/// # Arguments
///
/// * `runs` - Number of times to run the scenario
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance the state by one tick
/// * `hash` - Function to compute a state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Simplified determinism verification for [`Simulation`].
///
/// Runs the scenario twice with identical setup, stepping by `dt`, and
/// verifies the final state hashes match exactly.
pub fn verify_simulation_determinism<F>(setup_fn: F, dt: Fixed, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let result = verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| sim.update(dt),
        Simulation::state_hash,
    );
    result.is_deterministic
}

/// Run N copies of a scenario on separate threads and collect final
/// hashes. Catches non-determinism that only manifests under different
/// thread scheduling or memory layout.
///
/// # Panics
///
/// Panics if a worker thread panics.
#[must_use]
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, dt: Fixed, num_ticks: u64) -> Vec<u64>
where
    F: Fn() -> Simulation + Send + Sync,
{
    let setup_ref = &setup_fn;
    thread::scope(|scope| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                scope.spawn(move || {
                    let mut sim = setup_ref();
                    for _ in 0..num_ticks {
                        sim.update(dt);
                    }
                    sim.state_hash()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{battlefield, fixed_f, spawn_company};
    use siege_core::entity::EntityBlueprint;

    #[test]
    fn test_harness_flags_divergence() {
        let counter = std::cell::Cell::new(0u64);
        let result = verify_determinism(
            3,
            1,
            || (),
            |()| {},
            |()| {
                counter.set(counter.get() + 1);
                counter.get()
            },
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 3);
    }

    #[test]
    fn test_simulation_scenario_is_deterministic() {
        let ok = verify_simulation_determinism(
            || {
                let mut sim = battlefield(32);
                let attackers =
                    spawn_company(&mut sim, 0, &EntityBlueprint::militia(), &[(100, 100)]);
                let defenders =
                    spawn_company(&mut sim, 1, &EntityBlueprint::militia(), &[(300, 100)]);
                sim.order_attack(attackers[0], defenders[0]);
                sim
            },
            fixed_f(0.1),
            50,
        );
        assert!(ok);
    }
}
