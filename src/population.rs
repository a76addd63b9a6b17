use crate::process::NullModelError;

use std::fmt;
use std::str::FromStr;

/// GroupSpan represents a half-open interval [start..end) into the flat
/// outcome vector of a `GroupedPopulation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupSpan {
    pub start: usize,
    pub end: usize,
}

impl GroupSpan {
    /// Returns the number of positions covered by this span.
    pub fn len(&self) -> usize {
        if self.end > self.start {
            self.end - self.start
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a slice of `outcomes` corresponding to this span.
    /// This will panic if `end` exceeds `outcomes.len()`.
    pub fn slice<'a>(&self, outcomes: &'a [u8]) -> &'a [u8] {
        &outcomes[self.start..self.end]
    }
}

/// A fixed partition of binary outcomes into contiguous groups.
///
/// `draw_population` (N) items are shuffled each iteration, `success_count` (K)
/// of them are ones. Only the first `assigned_population` (Nr, the sum of the
/// group sizes) positions belong to a group. When N == Nr this is the
/// region-only model; when N > Nr the groups are a sample from a larger
/// superpopulation (whole-collection model).
#[derive(Debug, Clone)]
pub struct GroupedPopulation {
    group_sizes: Vec<usize>,
    spans: Vec<GroupSpan>,
    draw_population: usize,
    success_count: usize,
}

impl GroupedPopulation {
    pub fn new(
        group_sizes: Vec<usize>,
        draw_population: usize,
        success_count: usize,
    ) -> Result<Self, NullModelError> {
        if group_sizes.is_empty() {
            return Err(NullModelError::InvalidConfiguration(
                "at least one group is required".to_string(),
            ));
        }

        let mut spans = Vec::with_capacity(group_sizes.len());
        let mut start = 0usize;
        for &size in &group_sizes {
            let end = start.checked_add(size).ok_or_else(|| {
                NullModelError::InvalidConfiguration("group sizes overflow the population".to_string())
            })?;
            spans.push(GroupSpan { start, end });
            start = end;
        }
        if let Some(idx) = spans.iter().position(GroupSpan::is_empty) {
            return Err(NullModelError::InvalidConfiguration(format!(
                "group {} has size 0; every group needs at least one member",
                idx
            )));
        }
        let assigned = start;
        if draw_population < assigned {
            return Err(NullModelError::InvalidConfiguration(format!(
                "draw population {} is smaller than the {} positions assigned to groups",
                draw_population, assigned
            )));
        }
        if success_count > draw_population {
            return Err(NullModelError::InvalidConfiguration(format!(
                "success count {} exceeds draw population {}",
                success_count, draw_population
            )));
        }

        Ok(GroupedPopulation {
            group_sizes,
            spans,
            draw_population,
            success_count,
        })
    }

    /// Population where exactly the grouped items are shuffled (N == Nr).
    pub fn region_only(group_sizes: Vec<usize>, success_count: usize) -> Result<Self, NullModelError> {
        let total = group_sizes.iter().sum();
        Self::new(group_sizes, total, success_count)
    }

    /// Half-open range of every group into the flat outcome vector.
    pub fn group_boundaries(&self) -> &[GroupSpan] {
        &self.spans
    }

    pub fn group_sizes(&self) -> &[usize] {
        &self.group_sizes
    }

    pub fn group_count(&self) -> usize {
        self.group_sizes.len()
    }

    /// Nr: positions that carry group membership.
    pub fn assigned_population(&self) -> usize {
        self.spans.last().map(|span| span.end).unwrap_or(0)
    }

    /// N: items shuffled on every draw.
    pub fn draw_population(&self) -> usize {
        self.draw_population
    }

    /// K: ones among the `draw_population` items.
    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn is_region_only(&self) -> bool {
        self.draw_population == self.assigned_population()
    }
}

/// How a total population is split into groups for synthetic scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupSizeLayout {
    Even,
    /// The first half of the groups share 75% of the population, the rest 25%.
    Skewed,
}

impl GroupSizeLayout {
    pub fn sizes(&self, total: usize, groups: usize) -> Result<Vec<usize>, NullModelError> {
        if groups == 0 {
            return Err(NullModelError::InvalidConfiguration(
                "group count must be positive".to_string(),
            ));
        }
        let sizes = match self {
            GroupSizeLayout::Even => spread(total, groups),
            GroupSizeLayout::Skewed => {
                let large_groups = (groups / 2).max(1);
                let small_groups = groups - large_groups;
                if small_groups == 0 {
                    spread(total, large_groups)
                } else {
                    let large_share = (total as f64 * 0.75).round() as usize;
                    let mut sizes = spread(large_share, large_groups);
                    sizes.extend(spread(total - large_share, small_groups));
                    sizes
                }
            }
        };
        if sizes.iter().any(|&size| size == 0) {
            return Err(NullModelError::InvalidConfiguration(format!(
                "{} layout of {} items into {} groups leaves an empty group",
                self, total, groups
            )));
        }
        Ok(sizes)
    }
}

// Equal shares with the remainder on the leading groups.
fn spread(total: usize, groups: usize) -> Vec<usize> {
    let base = total / groups;
    let remainder = total % groups;
    (0..groups)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

impl fmt::Display for GroupSizeLayout {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GroupSizeLayout::Even => write!(f, "even"),
            GroupSizeLayout::Skewed => write!(f, "skewed"),
        }
    }
}

impl FromStr for GroupSizeLayout {
    type Err = NullModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "even" => Ok(GroupSizeLayout::Even),
            "skewed" | "uneven" | "75/25" => Ok(GroupSizeLayout::Skewed),
            other => Err(NullModelError::Parse(format!(
                "unknown group size layout '{}', expected 'even' or 'skewed'",
                other
            ))),
        }
    }
}
