use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;

use event_study_core::event_study::{CarWindows, EventMetrics, EventResult, MetricColumn, StandardWindow};
use event_study_core::statistics::{SignificanceLevel, StatisticalTests, TestDetails};
use event_study_core::{EventStudyConfig, EventType};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn tests() -> StatisticalTests {
    StatisticalTests::new(&EventStudyConfig::default())
}

fn event_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 6, 1).unwrap()
}

fn metrics(ar_day_0: Option<f64>) -> EventMetrics {
    EventMetrics {
        ar_day_0,
        mean_ar: ar_day_0.map(|v| v / 10.0),
        median_ar: Some(0.0),
        std_ar: Some(0.01),
        cars: CarWindows {
            car_0_0: ar_day_0,
            car_m1_1: ar_day_0.map(|v| v + 0.001),
            ..CarWindows::default()
        },
        car_observations: BTreeMap::from([
            (StandardWindow::Car0To0, 1),
            (StandardWindow::CarM1To1, 3),
        ]),
        residual_std: Some(0.02),
        metadata: BTreeMap::new(),
        num_observations: 11,
    }
}

fn valid_result(ticker: &str, event_type: EventType, ar_day_0: f64) -> EventResult {
    EventResult::valid(ticker, event_date(), event_type, metrics(Some(ar_day_0)))
}

/// Valid event whose day-0 abnormal return is undefined.
fn valid_without_day_0(ticker: &str, event_type: EventType) -> EventResult {
    EventResult::valid(ticker, event_date(), event_type, metrics(None))
}

fn invalid_result(ticker: &str) -> EventResult {
    EventResult::invalid(ticker, event_date(), EventType::Release, "Insufficient data")
}

fn mixed_results() -> Vec<EventResult> {
    vec![
        valid_result("ACME", EventType::Release, 0.01),
        valid_result("ACME", EventType::Release, 0.02),
        valid_result("INIT", EventType::Release, 0.03),
        valid_result("ACME", EventType::CommitSpike, -0.01),
        valid_result("INIT", EventType::CommitSpike, 0.0),
        valid_result("INIT", EventType::CommitSpike, -0.02),
        invalid_result("GHOST"),
    ]
}

// ---------------------------------------------------------------------------
// Individual tests
// ---------------------------------------------------------------------------

#[test]
fn test_t_test_known_values() {
    let r = tests().t_test(&[0.01, -0.02, 0.03, -0.01, 0.02], 0.0);
    assert!(r.valid);
    let o = r.outcome.as_ref().unwrap();
    assert_eq!(o.degrees_of_freedom, Some(4.0));
    assert_eq!(o.n, 5);
    assert!((o.statistic.unwrap() - 0.6470).abs() < 1e-3);
    assert_eq!(o.significance_level, SignificanceLevel::NotSignificant);
    assert!(!o.significant);
}

#[test]
fn test_sign_test_eight_of_ten_positive() {
    let values = [0.01, 0.02, 0.03, 0.01, 0.02, 0.04, 0.01, 0.05, -0.01, -0.02];
    let r = tests().sign_test(&values);
    assert!((r.p_value().unwrap() - 0.109375).abs() < 1e-12);
    assert_eq!(
        r.details(),
        Some(&TestDetails::Sign {
            n_positive: 8,
            n_negative: 2,
            n_total: 10,
        })
    );
}

#[test]
fn test_significant_flag_follows_five_percent() {
    let t = tests();
    let strong = t.t_test(&[0.05, 0.051, 0.049, 0.052, 0.048, 0.05], 0.0);
    let o = strong.outcome.unwrap();
    assert!(o.p_value < 0.01);
    assert!(o.significant);
    assert_eq!(o.significance_level.as_str(), "***");

    assert_eq!(t.significance_label(0.07), SignificanceLevel::Weak);
    assert_eq!(t.significance_label(0.01), SignificanceLevel::Moderate);
    assert_eq!(t.significance_label(0.10), SignificanceLevel::NotSignificant);
}

#[test]
fn test_anova_two_event_types() {
    let r = tests().compare_event_types(&mixed_results(), MetricColumn::ArDay0);
    assert_eq!(r.test, "ANOVA");
    assert!(r.valid, "{:?}", r.reason);
    let o = r.outcome.as_ref().unwrap();
    assert!((o.statistic.unwrap() - 13.5).abs() < 1e-9);
    assert!(o.p_value < 0.05);
    assert_eq!(o.significance_level, SignificanceLevel::Moderate);
    match &o.details {
        TestDetails::Anova {
            num_groups,
            df_between,
            df_within,
            group_means,
        } => {
            assert_eq!(*num_groups, 2);
            // two groups of three events
            assert_eq!((*df_between, *df_within), (1.0, 4.0));
            assert!((group_means["release"].unwrap() - 0.02).abs() < 1e-12);
            assert!((group_means["commit_spike"].unwrap() + 0.01).abs() < 1e-12);
        }
        other => panic!("unexpected details {:?}", other),
    }
}

#[test]
fn test_anova_single_event_type_is_invalid() {
    let results = vec![
        valid_result("ACME", EventType::Release, 0.01),
        valid_result("INIT", EventType::Release, 0.02),
        valid_result("INIT", EventType::Release, 0.03),
    ];
    let r = tests().compare_event_types(&results, MetricColumn::ArDay0);
    assert!(!r.valid);
    assert_eq!(r.reason.as_deref(), Some("Need at least 2 event types"));
}

#[test]
fn test_anova_without_valid_events_is_invalid() {
    let results = vec![invalid_result("GHOST"), invalid_result("ACME")];
    let r = tests().compare_event_types(&results, MetricColumn::ArDay0);
    assert!(!r.valid);
    assert_eq!(r.reason.as_deref(), Some("No valid events"));
    assert!(r.outcome.is_none());
}

#[test]
fn test_anova_type_without_values_leaves_one_group() {
    let results = vec![
        valid_result("ACME", EventType::Release, 0.01),
        valid_result("INIT", EventType::Release, 0.03),
        valid_without_day_0("ACME", EventType::CommitSpike),
        valid_without_day_0("INIT", EventType::CommitSpike),
    ];
    let r = tests().compare_event_types(&results, MetricColumn::ArDay0);
    assert!(!r.valid);
    assert_eq!(r.reason.as_deref(), Some("Insufficient data in groups"));

    // std_ar is defined for both types, so both groups form
    let r = tests().compare_event_types(&results, MetricColumn::StdAr);
    assert_eq!(r.reason.as_deref(), Some("Zero within-group variance"));
}

#[test]
fn test_anova_reports_mean_none_for_type_without_values() {
    let results = vec![
        valid_result("ACME", EventType::Release, 0.01),
        valid_result("INIT", EventType::Release, 0.03),
        valid_result("ACME", EventType::CommitSpike, -0.01),
        valid_result("INIT", EventType::CommitSpike, -0.02),
        valid_without_day_0("ACME", EventType::Other("fork_burst".into())),
    ];
    let r = tests().compare_event_types(&results, MetricColumn::ArDay0);
    assert!(r.valid, "{:?}", r.reason);
    match r.details() {
        Some(TestDetails::Anova {
            num_groups,
            df_between,
            df_within,
            group_means,
        }) => {
            assert_eq!(*num_groups, 2);
            assert_eq!((*df_between, *df_within), (1.0, 2.0));
            assert_eq!(group_means.len(), 3);
            assert_eq!(group_means["fork_burst"], None);
            assert!((group_means["release"].unwrap() - 0.02).abs() < 1e-12);
        }
        other => panic!("unexpected details {:?}", other),
    }
}

#[test]
fn test_cross_sectional_needs_two_valid_events() {
    let results = vec![valid_result("ACME", EventType::Release, 0.01), invalid_result("GHOST")];
    let r = tests().cross_sectional_test(&results, MetricColumn::ArDay0);
    assert!(!r.valid);
    assert_eq!(r.reason.as_deref(), Some("Insufficient valid events"));
}

#[test]
fn test_weighted_car_with_equal_variances_is_plain_mean() {
    let cars = [Some(0.02), Some(0.03), None, Some(0.01), Some(0.04)];
    let variances = [Some(1e-4), Some(1e-4), Some(1e-4), Some(1e-4), Some(1e-4)];
    let r = tests().car_significance_test(&cars, Some(&variances));
    assert_eq!(r.test, "CAR-test (weighted)");
    match r.details() {
        Some(TestDetails::WeightedCar { mean_car, std_car }) => {
            assert!((mean_car - 0.025).abs() < 1e-12);
            assert!((std_car - 0.005).abs() < 1e-12);
        }
        other => panic!("unexpected details {:?}", other),
    }
    assert_eq!(r.outcome.unwrap().n, 4);
}

// ---------------------------------------------------------------------------
// Battery and summary
// ---------------------------------------------------------------------------

#[test]
fn test_battery_keys_in_order() {
    let battery = tests().perform_all_tests(&mixed_results(), MetricColumn::ArDay0);
    assert_eq!(
        battery.names().collect::<Vec<_>>(),
        vec![
            "t_test",
            "sign_test",
            "wilcoxon_test",
            "cross_sectional",
            "anova",
            "CAR_0_0_test",
            "CAR_-1_1_test",
        ]
    );
    assert_eq!(battery.get("cross_sectional").unwrap().test, "cross-sectional");
    assert_eq!(battery.get("t_test").unwrap().outcome.as_ref().unwrap().n, 6);
}

#[test]
fn test_battery_empty_without_valid_results() {
    let battery = tests().perform_all_tests(&[invalid_result("GHOST")], MetricColumn::ArDay0);
    assert!(battery.is_empty());
    assert!(tests().summary_table(&battery).is_empty());
}

#[test]
fn test_summary_leaves_out_invalid_tests() {
    let results = vec![
        valid_result("ACME", EventType::Release, 0.01),
        valid_result("ACME", EventType::Release, 0.02),
        valid_result("INIT", EventType::Release, 0.035),
        valid_result("INIT", EventType::Release, -0.005),
    ];
    let t = tests();
    let battery = t.perform_all_tests(&results, MetricColumn::ArDay0);
    assert!(!battery.get("anova").unwrap().valid);

    let summary = t.summary_table(&battery);
    let names: Vec<&str> = summary.iter().map(|r| r.test.as_str()).collect();
    assert!(!names.contains(&"anova"));
    assert!(names.contains(&"t_test"));

    let t_row = summary.iter().find(|r| r.test == "t_test").unwrap();
    assert!((t_row.mean_ar.unwrap() - 0.015).abs() < 1e-12);
    assert_eq!(t_row.mean_car, None);
}

#[test]
fn test_battery_column_selects_car_values() {
    let battery = tests().perform_all_tests(
        &mixed_results(),
        MetricColumn::Car(StandardWindow::CarM1To1),
    );
    let o = battery.get("t_test").unwrap().outcome.as_ref().unwrap();
    match &o.details {
        TestDetails::TTest { mean, .. } => assert!((mean - 0.006).abs() < 1e-12),
        other => panic!("unexpected details {:?}", other),
    }
}
