use crate::population::GroupedPopulation;
use crate::stats::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_survivors_and_rates() {
        let population = GroupedPopulation::region_only(vec![2, 3, 1], 3).unwrap();
        let outcomes = [1u8, 0, 1, 1, 0, 0];

        let survivors = group_survivors(&outcomes, population.group_boundaries());
        assert_eq!(survivors, vec![1, 2, 0]);

        let rates = survival_rates(&survivors, population.group_sizes());
        assert!(close(rates[0], 0.5));
        assert!(close(rates[1], 2.0 / 3.0));
        assert!(close(rates[2], 0.0));
    }

    #[test]
    fn test_mean_of_ratios_is_not_pooled() {
        // One line of 10 with 10 survivors, one line of 2 with none.
        // Pooled rate would be 10/12; the mean of ratios is 0.5.
        let summary = GroupSummary::from_survivors(vec![10, 0], &[10, 2]);
        assert!(close(summary.mean_rate, 0.5));
        assert!(close(summary.rate_variance, 0.5));
    }

    #[test]
    fn test_mean_and_variance() {
        assert!(mean(&[]).is_nan());
        assert!(close(mean(&[1.0, 2.0, 3.0]), 2.0));
        // n - 1 denominator
        assert!(close(sample_variance(&[1.0, 2.0, 3.0, 4.0]), 5.0 / 3.0));
        assert!(sample_variance(&[1.0]).is_nan());
    }

    #[test]
    fn test_mean_rate_invariant_to_group_order() {
        let forward = GroupedPopulation::region_only(vec![2, 3, 4], 5).unwrap();
        let outcomes = [1u8, 1, 0, 1, 0, 1, 0, 1, 0];
        let a = GroupSummary::from_outcomes(&outcomes, forward.group_boundaries(), forward.group_sizes());

        // Same groups listed in reverse, outcome vector rearranged to match
        let reversed = GroupedPopulation::region_only(vec![4, 3, 2], 5).unwrap();
        let rearranged = [1u8, 0, 1, 0, 0, 1, 0, 1, 1];
        let b = GroupSummary::from_outcomes(&rearranged, reversed.group_boundaries(), reversed.group_sizes());

        assert!(close(a.mean_rate, b.mean_rate));
        assert!(close(a.rate_variance, b.rate_variance));
    }

    #[test]
    fn test_opportunity_for_selection() {
        // rates 0.5, 0.25, 0.75: mean 0.5, variance 0.0625
        let rates = [0.5, 0.25, 0.75];
        assert!(close(opportunity_for_selection(&rates), 0.0625 / 0.25));

        // Identical rates leave no scope for selection
        assert!(close(opportunity_for_selection(&[0.4, 0.4, 0.4]), 0.0));

        // Zero mean survival is undefined, not fatal
        assert!(opportunity_for_selection(&[0.0, 0.0]).is_nan());
        // A single line has no variance
        assert!(opportunity_for_selection(&[0.5]).is_nan());
    }

    #[test]
    fn test_opportunity_is_scale_invariant() {
        let small = GroupSummary::from_survivors(vec![2, 1, 3], &[4, 4, 4]);
        let large = GroupSummary::from_survivors(vec![6, 3, 9], &[12, 12, 12]);
        assert!(close(small.opportunity_for_selection(), large.opportunity_for_selection()));
    }

    #[test]
    fn test_selection_coefficient() {
        assert!(close(selection_coefficient(0.6, 0.5), 0.2));
        assert!(close(selection_coefficient(0.25, 0.5), -0.5));
        assert!(close(selection_coefficient(0.5, 0.5), 0.0));
        assert!(selection_coefficient(0.5, 0.0).is_nan());
    }

    #[test]
    fn test_reference_region_selection() {
        // Largest region has zero survival, so the next largest is used
        assert_eq!(reference_region(&[0.5, 0.0, 0.4], &[10, 50, 20]), Some(2));
        // Ties go to the first region
        assert_eq!(reference_region(&[0.5, 0.3], &[10, 10]), Some(0));
        // Undefined means are skipped too
        assert_eq!(reference_region(&[f64::NAN, 0.1], &[30, 5]), Some(1));
        assert_eq!(reference_region(&[0.0, 0.0], &[10, 5]), None);
    }

    #[test]
    fn test_region_means() {
        let layout = RegionLayout {
            region_ids: vec!["north".to_string(), "south".to_string()],
            members: vec![vec![0, 2], vec![1]],
            plant_totals: vec![8, 3],
        };
        let means = layout.region_means(&[1.0, 0.25, 0.5]);
        assert!(close(means[0], 0.75));
        assert!(close(means[1], 0.25));
        assert_eq!(layout.index_of("south"), Some(1));
        assert_eq!(layout.index_of("east"), None);
    }
}
