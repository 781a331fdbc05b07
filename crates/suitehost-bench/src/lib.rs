//! Benchmark profiles and utilities for the suitehost plugin host.
//!
//! Provides pre-built workloads shared by the Criterion benches:
//!
//! - [`bench_config`]: a session sized like a typical filter host
//! - [`resource_payloads`]: deterministic resource blobs via seed
//! - [`RESOURCE_KINDS`]: the kinds a scripting-aware plugin stores

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use suitehost_core::{four_cc, ResType};
use suitehost_host::SessionConfig;

/// Resource kinds spread across the benchmark collections.
pub const RESOURCE_KINDS: [ResType; 4] = [
    ResType(four_cc(b"Scrp")),
    ResType(four_cc(b"PiPL")),
    ResType(four_cc(b"8BFM")),
    ResType(four_cc(b"TEXT")),
];

/// Session used by every bench: 256 MiB buffer ceiling, 1 MiB resource
/// cap.
pub fn bench_config(plugin_name: &str) -> SessionConfig {
    SessionConfig {
        buffer_ceiling: 256 << 20,
        plugin_name: plugin_name.to_owned(),
        main_window: 0,
        max_resource_bytes: 1 << 20,
    }
}

/// Generate `count` deterministic payloads between 16 and 1040 bytes.
///
/// Lengths and contents come from a linear congruential step on the seed,
/// so every run stores the same bytes.
pub fn resource_payloads(count: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let len = 16 + (state >> 54) as usize;
            let fill = (state >> 24) as u8;
            (0..len).map(|i| fill.wrapping_add(i as u8)).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bench_config_validates() {
        bench_config("bench").validate().unwrap();
    }

    #[test]
    fn payloads_are_deterministic_and_bounded() {
        let a = resource_payloads(64, 7);
        let b = resource_payloads(64, 7);
        assert_eq!(a, b);
        assert!(a.iter().all(|p| (16..=1040).contains(&p.len())));
        assert_ne!(a, resource_payloads(64, 8));
    }

    #[test]
    fn payloads_fit_the_bench_cap() {
        let cap = bench_config("bench").max_resource_bytes;
        assert!(resource_payloads(256, 1).iter().all(|p| p.len() <= cap));
    }
}
