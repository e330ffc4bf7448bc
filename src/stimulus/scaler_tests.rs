//! Scaler Tests
//!
//! Bounds, monotonicity and fallback behavior of both price and both volume
//! strategies, including property tests over hostile inputs.

use proptest::prelude::*;

use crate::stimulus::scaler::{PriceScaling, VolumeScaling, PRICE_CEIL, PRICE_FLOOR};

fn any_real() -> impl Strategy<Value = f64> {
    prop_oneof![
        -1e12f64..1e12f64,
        -10.0f64..10.0f64,
        Just(0.0),
        Just(-0.0),
        Just(f64::MAX),
        Just(f64::MIN),
        Just(f64::MIN_POSITIVE),
        Just(1e308),
    ]
}

// =============================================================================
// PRICE
// =============================================================================

#[test]
fn test_range_anchored_maps_extremes_to_window() {
    let out = PriceScaling::range_anchored().scale(&[148.0, 483.0, 112.0, 300.0]);
    // min -> baseline, max -> baseline + window
    assert_eq!(out[2], 200);
    assert_eq!(out[1], 1000);
    assert!(out[0] > 200 && out[0] < out[3]);
}

#[test]
fn test_range_anchored_flat_series_is_baseline() {
    let out = PriceScaling::range_anchored().scale(&[55.0; 10]);
    assert!(out.iter().all(|&v| v == 200));
}

#[test]
fn test_range_anchored_ignores_non_finite() {
    let out = PriceScaling::range_anchored().scale(&[10.0, f64::NAN, 20.0, f64::INFINITY]);
    assert_eq!(out, vec![200, 200, 1000, 200]);
}

#[test]
fn test_mean_percentage_is_price_level_independent() {
    let scaler = PriceScaling::mean_percentage();
    // Same 10% drop for a $5 and a $500 ticker
    let cheap = scaler.scale(&[5.0, 5.0, 5.0, 4.5]);
    let pricey = scaler.scale(&[500.0, 500.0, 500.0, 450.0]);
    let cheap_delta = cheap[0] as i32 - cheap[3] as i32;
    let pricey_delta = pricey[0] as i32 - pricey[3] as i32;
    assert!((cheap_delta - pricey_delta).abs() <= 1);
    // 10% of the mean is ~200 units
    assert!((cheap_delta - 206).abs() <= 2, "delta {}", cheap_delta);
}

#[test]
fn test_mean_percentage_centers_on_midpoint() {
    let out = PriceScaling::mean_percentage().scale(&[99.0, 100.0, 101.0]);
    assert_eq!(out[1], 2048);
    assert_eq!(out[0], 2028);
    assert_eq!(out[2], 2068);
}

#[test]
fn test_mean_percentage_non_positive_mean_falls_back() {
    let out = PriceScaling::mean_percentage().scale(&[-5.0, 0.0, 5.0]);
    assert!(out.iter().all(|&v| v == 2048));
    assert_eq!(PriceScaling::mean_percentage().scale(&[]), Vec::<u16>::new());
}

// =============================================================================
// VOLUME
// =============================================================================

#[test]
fn test_median_normalized_volume() {
    let out = VolumeScaling::median_normalized().scale(&[1e6, 1e6, 1e6, 1e7, 0.0]);
    assert_eq!(out[0], 100);
    assert_eq!(out[3], 1000);
    // zero volume never reads as "no data"
    assert_eq!(out[4], 1);
}

#[test]
fn test_first_bar_normalized_volume() {
    let out = VolumeScaling::first_bar_normalized().scale(&[2e5, 4e5, 1e8]);
    assert_eq!(out, vec![100, 200, 3000]);
}

#[test]
fn test_volume_strategies_differ() {
    // Opening bar is the quiet one: a 3x surge over the open is not 3x the median.
    let vols = [1e5, 3e5, 3e5, 3e5];
    let median = VolumeScaling::median_normalized().scale(&vols);
    let first = VolumeScaling::first_bar_normalized().scale(&vols);
    assert_eq!(median[1], 100);
    assert_eq!(first[1], 300);
}

#[test]
fn test_volume_zero_anchor_falls_back_to_baseline() {
    let out = VolumeScaling::first_bar_normalized().scale(&[0.0, 5e5, 1e6]);
    assert_eq!(out, vec![100, 100, 100]);
    let out = VolumeScaling::median_normalized().scale(&[0.0, 0.0, 7.0]);
    assert_eq!(out, vec![100, 100, 100]);
}

#[test]
fn test_non_finite_volume_max_uses_default() {
    let config: crate::PipelineConfig =
        toml::from_str("[scaling.volume]\nstrategy = \"median_normalized\"\nmax = nan\n").unwrap();
    assert_eq!(config.scaling.volume.scale(&[1e6, 2e6, 3e6]), vec![50, 100, 150]);

    let inf = VolumeScaling::FirstBarNormalized { baseline: 100.0, max: f64::INFINITY };
    assert_eq!(inf.scale(&[1e6, 1e8]), vec![100, 3000]);
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn prop_price_output_in_12bit_range(prices in prop::collection::vec(any_real(), 0..64)) {
        for scaler in [PriceScaling::range_anchored(), PriceScaling::mean_percentage()] {
            let out = scaler.scale(&prices);
            prop_assert_eq!(out.len(), prices.len());
            for v in out {
                prop_assert!(v <= 4095);
                prop_assert!(v as f64 >= PRICE_FLOOR && v as f64 <= PRICE_CEIL);
            }
        }
    }

    #[test]
    fn prop_volume_output_in_12bit_range(vols in prop::collection::vec(any_real(), 0..64)) {
        for scaler in [VolumeScaling::median_normalized(), VolumeScaling::first_bar_normalized()] {
            let out = scaler.scale(&vols);
            prop_assert_eq!(out.len(), vols.len());
            for v in out {
                prop_assert!((1..=3000).contains(&v));
            }
        }
    }

    #[test]
    fn prop_range_anchored_is_monotonic(prices in prop::collection::vec(-1e9f64..1e9f64, 2..64)) {
        let out = PriceScaling::range_anchored().scale(&prices);
        for i in 0..prices.len() {
            for j in 0..prices.len() {
                if prices[i] < prices[j] {
                    prop_assert!(out[i] <= out[j]);
                }
            }
        }
    }
}
