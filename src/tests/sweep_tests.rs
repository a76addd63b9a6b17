use crate::population::GroupSizeLayout;
use crate::process::NullModelError;
use crate::sweep::*;

fn opportunity_grid() -> OpportunityGrid {
    OpportunityGrid {
        survival: vec![0.2, 0.5],
        group_counts: vec![5, 10],
        layouts: vec![GroupSizeLayout::Even, GroupSizeLayout::Skewed],
        region_populations: vec![100],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_survival_grid_cells() {
        let grid = SurvivalRateGrid {
            survival: vec![0.1, 0.5, 0.9],
            group_counts: vec![10, 20],
            group_sizes: vec![2, 5],
            draw_population: 800,
        };
        let cells = grid.cells();
        assert_eq!(cells.len(), 3 * 2 * 2);

        let cell = &cells[3];
        assert_eq!(cell.survival, 0.1);
        assert_eq!(cell.group_count, 20);
        assert_eq!(cell.region_population, 100);
        assert_eq!(cell.draw_population, 800);
        assert_eq!(cell.success_count(), 80);
        assert!(cells
            .iter()
            .all(|c| c.statistic == SweepStatistic::MeanSurvivalRate && c.layout == GroupSizeLayout::Even));
    }

    #[test]
    fn test_opportunity_grid_is_region_only() {
        let cells = opportunity_grid().cells();
        assert_eq!(cells.len(), 8);
        for cell in &cells {
            assert_eq!(cell.draw_population, cell.region_population);
            assert!(cell.population().unwrap().is_region_only());
        }
    }

    #[test]
    fn test_results_follow_cell_order() {
        let cells = opportunity_grid().cells();
        let results = SweepRunner::new(300, 8).batch_size(100).run(&cells).unwrap();

        assert_eq!(results.len(), cells.len());
        for (result, cell) in results.iter().zip(&cells) {
            assert_eq!(&result.cell, cell);
            assert_eq!(result.summary.iterations, 300);
        }
    }

    #[test]
    fn test_sweep_is_reproducible() {
        let cells = opportunity_grid().cells();
        let first = SweepRunner::new(200, 77).run(&cells).unwrap();
        let second = SweepRunner::new(200, 77).run(&cells).unwrap();

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.seed, b.seed);
            assert_eq!(a.summary.mean.to_bits(), b.summary.mean.to_bits());
            assert_eq!(a.summary.q975.to_bits(), b.summary.q975.to_bits());
        }
        // Each cell draws its own seed
        assert_ne!(first[0].seed, first[1].seed);
    }

    #[test]
    fn test_invalid_cell_fails_the_sweep() {
        let mut cells = opportunity_grid().cells();
        cells[2].survival = 1.5;

        match SweepRunner::new(100, 1).run(&cells) {
            Err(NullModelError::InvalidConfiguration(msg)) => {
                assert!(msg.contains("1.5"), "message should name the cell: {}", msg)
            }
            other => panic!("expected an invalid configuration error, got {:?}", other),
        }

        // Fewer plants than groups
        let tiny = SweepCell {
            statistic: SweepStatistic::OpportunityForSelection,
            survival: 0.5,
            group_count: 10,
            layout: GroupSizeLayout::Even,
            region_population: 5,
            draw_population: 5,
        };
        assert!(SweepRunner::new(100, 1).run(&[tiny]).is_err());
    }
}
