//! Property tests for the indicator, filter, windowing and selection rules.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use borsa_pipeline::data::Bar;
use borsa_pipeline::forecast::dataset::build_windows;
use borsa_pipeline::forecast::{BestModelSelector, ModelFamily, ModelRun};
use borsa_pipeline::indicators::{IndicatorEngine, NEUTRAL_RELATIVE_VOLUME, NEUTRAL_RSI};
use borsa_pipeline::screener::FilterResult;

fn bars(closes: &[f64], volumes: &[f64]) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 15, 0, 0).unwrap();
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| Bar {
            symbol: "PROP".into(),
            timestamp: start + Duration::days(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume,
        })
        .collect()
}

fn run(family: ModelFamily, mse: f64) -> ModelRun {
    ModelRun {
        family,
        mse,
        mae: 0.1,
        directional_accuracy: 0.5,
        predicted_value: 10.0,
        epochs_run: 10,
    }
}

proptest! {
    #[test]
    fn rsi_stays_in_range(closes in prop::collection::vec(1.0f64..1000.0, 15..80)) {
        let volumes = vec![1000.0; closes.len()];
        let snap = IndicatorEngine::new().compute("PROP", &bars(&closes, &volumes));
        prop_assert!((0.0..=100.0).contains(&snap.rsi));
    }

    #[test]
    fn short_history_is_neutral(closes in prop::collection::vec(1.0f64..1000.0, 0..10)) {
        let volumes: Vec<f64> = closes.iter().map(|c| c * 10.0).collect();
        let snap = IndicatorEngine::new().compute("PROP", &bars(&closes, &volumes));
        prop_assert_eq!(snap.rsi, NEUTRAL_RSI);
        prop_assert_eq!(snap.relative_volume, NEUTRAL_RELATIVE_VOLUME);
    }

    #[test]
    fn pivot_is_typical_price_of_previous_bar(closes in prop::collection::vec(1.0f64..500.0, 2..40)) {
        let volumes = vec![1000.0; closes.len()];
        let series = bars(&closes, &volumes);
        let snap = IndicatorEngine::new().compute("PROP", &series);
        let expected = series[series.len() - 2].typical_price();
        prop_assert!((snap.pivot - expected).abs() < 1e-9);
    }

    #[test]
    fn selection_is_conjunction(r in any::<bool>(), v in any::<bool>(), p in any::<bool>()) {
        prop_assert_eq!(FilterResult::new(r, v, p).is_selected(), r && v && p);
    }

    #[test]
    fn windows_count_and_targets(n in 0usize..300, l in 1usize..40) {
        let windows = build_windows(n, l);
        prop_assert_eq!(windows.len(), n.saturating_sub(l));
        for (i, w) in windows.iter().enumerate() {
            prop_assert_eq!(w.start, i);
            prop_assert_eq!(w.target, i + l);
        }
    }

    #[test]
    fn best_model_has_lowest_mse(a in 0.0f64..1.0, b in 0.0f64..1.0, c in 0.0f64..1.0) {
        let runs = vec![
            run(ModelFamily::Recurrent, a),
            run(ModelFamily::Dense, b),
            run(ModelFamily::Attention, c),
        ];
        let best = BestModelSelector::new().best(&runs).unwrap();
        prop_assert!(runs.iter().all(|r| best.mse <= r.mse));
    }
}

#[test]
fn test_documented_best_model_example() {
    let runs = vec![
        run(ModelFamily::Recurrent, 0.02),
        run(ModelFamily::Dense, 0.01),
        run(ModelFamily::Attention, 0.05),
    ];
    assert_eq!(
        BestModelSelector::new().best(&runs).map(|r| r.family),
        Some(ModelFamily::Dense)
    );
}
