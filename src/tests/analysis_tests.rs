use super::collection_tests::{plants, provenance, sample_collection};
use crate::analysis::*;
use crate::collection::{Collection, NullModel};
use crate::process::NullModelError;

fn options(seed: u64) -> AnalysisOptions {
    AnalysisOptions {
        iterations: 400,
        seed,
        batch_size: 100,
        model: NullModel::WholeCollection,
        reference_region: None,
    }
}

fn assert_p_in_range(test: &ObservedTest) {
    for p in [test.p.lower, test.p.upper] {
        assert!(
            (0.0..=1.0).contains(&p),
            "{} {}: p-value {} outside [0, 1]",
            test.statistic,
            test.label,
            p
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_survival_test() {
        let collection = sample_collection();
        let test = mean_survival_test(&collection, &options(1)).unwrap();

        // Accession rates 1, 0.5, 0.8, 0, 0.8, 0.5
        assert_eq!(test.label, COLLECTION_LABEL);
        assert!((test.observed - 0.6).abs() < 1e-12);
        assert_eq!(test.null.iterations, 400);
        assert_p_in_range(&test);
    }

    #[test]
    fn test_opportunity_tests_cover_every_region() {
        let collection = sample_collection();
        let tests = opportunity_tests(&collection, &options(2)).unwrap();

        let labels: Vec<&str> = tests.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C"]);

        // Region A rates 1, 0.5, 0: variance 0.25 over mean squared 0.25
        assert!((tests[0].observed - 1.0).abs() < 1e-12);
        // Identical rates in B
        assert!(tests[1].observed.abs() < 1e-12);
        // C has one accession
        assert!(tests[2].observed.is_nan());
        assert!(tests[2].p.lower.is_nan());

        assert_p_in_range(&tests[0]);
        assert_p_in_range(&tests[1]);
    }

    #[test]
    fn test_region_only_model_is_recorded() {
        let collection = sample_collection();
        let mut opts = options(3);
        opts.model = NullModel::RegionOnly;
        let tests = opportunity_tests(&collection, &opts).unwrap();
        assert!(tests.iter().all(|t| t.model == NullModel::RegionOnly));
    }

    #[test]
    fn test_selection_coefficients_against_largest_region() {
        let collection = sample_collection();
        let tests = selection_tests(&collection, &options(4)).unwrap();
        assert_eq!(tests.len(), 3);

        // Region means A 0.5, B 0.8, C 0.5; A has the most plants
        for test in &tests {
            assert_eq!(test.reference.as_deref(), Some("A"));
            assert_p_in_range(test);
        }
        assert!(tests[0].observed.abs() < 1e-12);
        assert!((tests[1].observed - 0.6).abs() < 1e-12);
        assert!(tests[2].observed.abs() < 1e-12);
    }

    #[test]
    fn test_null_reference_is_reselected_per_replicate() {
        // One survivor among 8 plants. A (6 plants) is the observed reference;
        // whenever the survivor lands in B, A's mean is 0 and B takes over.
        let collection = Collection::from_records(
            &plants(&[("a1", 3, 2), ("a2", 3, 3), ("b1", 2, 2)]),
            &provenance(&[("a1", "A"), ("a2", "A"), ("b1", "B")]),
        )
        .unwrap();
        let mut opts = options(9);
        opts.iterations = 2_000;
        let tests = selection_tests(&collection, &opts).unwrap();

        let a = &tests[0];
        assert_eq!(a.label, "A");
        assert_eq!(a.reference.as_deref(), Some("A"));
        assert!(a.observed.abs() < 1e-12);

        // Against B, A's coefficient is 0 / 0.5 - 1 = -1. A reference pinned
        // to A would leave those replicates undefined instead.
        assert_eq!(a.null.undefined, 0);
        assert_eq!(a.null.q025, -1.0);
        assert_eq!(a.null.median, 0.0);
        assert_eq!(a.null.q975, 0.0);

        // B is -1 against A and 0 as its own reference
        let b = &tests[1];
        assert_eq!(b.null.undefined, 0);
        assert_eq!(b.null.q025, -1.0);
        assert_eq!(b.null.q975, 0.0);
    }

    #[test]
    fn test_fixed_reference_region() {
        let collection = sample_collection();
        let mut opts = options(5);
        opts.reference_region = Some("B".to_string());
        let tests = selection_tests(&collection, &opts).unwrap();

        assert_eq!(tests[0].reference.as_deref(), Some("B"));
        assert!((tests[0].observed - (0.5 / 0.8 - 1.0)).abs() < 1e-12);
        assert!(tests[1].observed.abs() < 1e-12);

        opts.reference_region = Some("Z".to_string());
        match selection_tests(&collection, &opts) {
            Err(NullModelError::InvalidConfiguration(msg)) => assert!(msg.contains("'Z'")),
            other => panic!("expected an invalid configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_analyze_collection_is_reproducible() {
        let collection = sample_collection();
        let first = analyze_collection(&collection, &options(42)).unwrap();
        let second = analyze_collection(&collection, &options(42)).unwrap();

        // One mean test, then opportunity and selection tests per region
        assert_eq!(first.len(), 1 + 2 * collection.regions().len());
        assert_eq!(first[0].statistic, ObservedStatistic::MeanSurvivalRate);
        assert_eq!(first[1].statistic, ObservedStatistic::OpportunityForSelection);
        assert_eq!(first[6].statistic, ObservedStatistic::SelectionCoefficient);

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.label, b.label);
            assert_eq!(a.null.q05.to_bits(), b.null.q05.to_bits());
            assert_eq!(a.null.q975.to_bits(), b.null.q975.to_bits());
            assert_eq!(a.p.lower.to_bits(), b.p.lower.to_bits());
        }
    }
}
