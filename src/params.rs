//! Parameter sweep enumeration.
//!
//! A [`SweepPlan`] is resolved once per harness invocation: every axis's
//! random value is drawn at that point, so all targets in one run see the
//! same sizes. Tuples come out in nested order, first axis outermost and
//! process count innermost.

use rand::Rng;

use crate::config::{AxisConfig, SweepConfig};

/// One problem-size value and the option letter that introduces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeParam {
    pub flag: char,
    pub value: u32,
}

impl SizeParam {
    /// Formats the parameter as a single argument, e.g. `-x17`.
    pub fn to_arg(self) -> String {
        format!("-{}{}", self.flag, self.value)
    }
}

/// One point of the sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterTuple {
    sizes: Vec<SizeParam>,
    processes: u32,
    flags: Vec<String>,
}

impl ParameterTuple {
    pub fn new(sizes: Vec<SizeParam>, processes: u32, flags: Vec<String>) -> Self {
        Self {
            sizes,
            processes,
            flags,
        }
    }

    /// Problem sizes, in axis order.
    pub fn sizes(&self) -> &[SizeParam] {
        &self.sizes
    }

    /// Value of the axis introduced by `flag`, if present.
    pub fn size(&self, flag: char) -> Option<u32> {
        self.sizes.iter().find(|s| s.flag == flag).map(|s| s.value)
    }

    /// Number of parallel workers.
    pub fn processes(&self) -> u32 {
        self.processes
    }

    /// Extra flags passed through unchanged.
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Size arguments in axis order.
    pub fn size_args(&self) -> Vec<String> {
        self.sizes.iter().map(|s| s.to_arg()).collect()
    }
}

/// An axis with its random value already drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAxis {
    pub flag: char,
    pub values: Vec<u32>,
}

impl ResolvedAxis {
    pub fn new(flag: char, values: impl Into<Vec<u32>>) -> Self {
        Self {
            flag,
            values: values.into(),
        }
    }

    /// Resolves an axis config, drawing its random value from `rng`.
    pub fn resolve<R: Rng + ?Sized>(axis: &AxisConfig, rng: &mut R) -> Self {
        let mut values = axis.values.clone();
        if let Some(range) = axis.random {
            values.push(rng.gen_range(range.min..=range.max));
        }
        Self {
            flag: axis.flag,
            values,
        }
    }
}

/// The full cross product to run against each target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepPlan {
    axes: Vec<ResolvedAxis>,
    processes: Vec<u32>,
    flags: Vec<String>,
}

impl SweepPlan {
    pub fn new(axes: Vec<ResolvedAxis>, processes: Vec<u32>, flags: Vec<String>) -> Self {
        Self {
            axes,
            processes,
            flags,
        }
    }

    /// Builds a plan from configuration, drawing all random values now.
    pub fn resolve<R: Rng + ?Sized>(config: &SweepConfig, rng: &mut R) -> Self {
        let axes: Vec<ResolvedAxis> = config
            .axes
            .iter()
            .map(|axis| ResolvedAxis::resolve(axis, &mut *rng))
            .collect();

        for axis in &axes {
            tracing::info!(axis = %axis.flag, values = ?axis.values, "resolved sweep axis");
        }

        Self::new(axes, config.processes.clone(), config.flags.clone())
    }

    pub fn axes(&self) -> &[ResolvedAxis] {
        &self.axes
    }

    pub fn processes(&self) -> &[u32] {
        &self.processes
    }

    /// Number of tuples the plan yields.
    pub fn len(&self) -> usize {
        self.axes
            .iter()
            .map(|a| a.values.len())
            .product::<usize>()
            * self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over every tuple in nested order.
    pub fn tuples(&self) -> Tuples<'_> {
        Tuples {
            plan: self,
            indices: vec![0; self.axes.len() + 1],
            remaining: self.len(),
        }
    }
}

/// Iterator over a plan's tuples.
///
/// `indices` is an odometer: one digit per axis plus a final digit for the
/// process count, which turns fastest.
pub struct Tuples<'a> {
    plan: &'a SweepPlan,
    indices: Vec<usize>,
    remaining: usize,
}

impl Tuples<'_> {
    fn current(&self) -> ParameterTuple {
        let sizes = self
            .plan
            .axes
            .iter()
            .zip(&self.indices)
            .map(|(axis, &i)| SizeParam {
                flag: axis.flag,
                value: axis.values[i],
            })
            .collect();
        let processes = self.plan.processes[self.indices[self.plan.axes.len()]];
        ParameterTuple::new(sizes, processes, self.plan.flags.clone())
    }

    fn advance(&mut self) {
        for pos in (0..self.indices.len()).rev() {
            let len = if pos == self.plan.axes.len() {
                self.plan.processes.len()
            } else {
                self.plan.axes[pos].values.len()
            };
            self.indices[pos] += 1;
            if self.indices[pos] < len {
                return;
            }
            self.indices[pos] = 0;
        }
    }
}

impl Iterator for Tuples<'_> {
    type Item = ParameterTuple;

    fn next(&mut self) -> Option<ParameterTuple> {
        if self.remaining == 0 {
            return None;
        }
        let tuple = self.current();
        self.remaining -= 1;
        self.advance();
        Some(tuple)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Tuples<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn example_plan() -> SweepPlan {
        SweepPlan::new(
            vec![
                ResolvedAxis::new('x', [1, 2, 3, 4, 5, 17]),
                ResolvedAxis::new('y', [1, 2, 3, 4, 5, 23]),
                ResolvedAxis::new('z', [1, 2, 9]),
            ],
            vec![1, 2, 3, 4, 5],
            vec!["-q".to_string()],
        )
    }

    #[test]
    fn plan_yields_full_cross_product() {
        let plan = example_plan();
        assert_eq!(plan.len(), 540);
        assert_eq!(plan.tuples().count(), 540);
        assert_eq!(plan.tuples().len(), 540);
    }

    #[test]
    fn tuples_are_unique() {
        let plan = example_plan();
        let mut seen = std::collections::HashSet::new();
        for tuple in plan.tuples() {
            let key = (tuple.size_args(), tuple.processes());
            assert!(seen.insert(key), "duplicate tuple {:?}", tuple);
        }
    }

    #[test]
    fn process_count_varies_fastest() {
        let plan = example_plan();
        let first: Vec<ParameterTuple> = plan.tuples().take(6).collect();

        let procs: Vec<u32> = first.iter().map(|t| t.processes()).collect();
        assert_eq!(procs, vec![1, 2, 3, 4, 5, 1]);

        assert_eq!(first[0].size('z'), Some(1));
        assert_eq!(first[5].size('z'), Some(2));
        assert_eq!(first[5].size('x'), Some(1));
    }

    #[test]
    fn first_axis_varies_slowest() {
        let plan = example_plan();
        let tuples: Vec<ParameterTuple> = plan.tuples().collect();

        // 6 * 3 * 5 tuples per x value
        assert_eq!(tuples[89].size('x'), Some(1));
        assert_eq!(tuples[90].size('x'), Some(2));
        let last = tuples.last().unwrap();
        assert_eq!(last.size_args(), vec!["-x17", "-y23", "-z9"]);
        assert_eq!(last.processes(), 5);
    }

    #[test]
    fn tuples_carry_extra_flags() {
        let plan = example_plan();
        assert!(plan.tuples().all(|t| t.flags() == ["-q".to_string()]));
    }

    #[test]
    fn empty_axis_yields_nothing() {
        let plan = SweepPlan::new(
            vec![ResolvedAxis::new('x', Vec::<u32>::new())],
            vec![1, 2],
            Vec::new(),
        );
        assert!(plan.is_empty());
        assert_eq!(plan.tuples().next(), None);
    }

    #[test]
    fn single_axis_plan() {
        let plan = SweepPlan::new(vec![ResolvedAxis::new('n', [4])], vec![2], Vec::new());
        let tuples: Vec<ParameterTuple> = plan.tuples().collect();
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].size_args(), vec!["-n4"]);
    }

    #[test]
    fn random_values_drawn_within_range() {
        let config = SweepConfig::default();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let plan = SweepPlan::resolve(&config, &mut rng);
            let x = plan.axes()[0].values.last().copied().unwrap();
            let z = plan.axes()[2].values.last().copied().unwrap();
            assert!((10..=64).contains(&x));
            assert!((3..=64).contains(&z));
        }
    }

    #[test]
    fn resolve_is_reproducible_for_a_seed() {
        let config = SweepConfig::default();
        let a = SweepPlan::resolve(&config, &mut StdRng::seed_from_u64(42));
        let b = SweepPlan::resolve(&config, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn resolved_default_plan_has_540_tuples() {
        let plan = SweepPlan::resolve(&SweepConfig::default(), &mut StdRng::seed_from_u64(1));
        assert_eq!(plan.len(), 6 * 6 * 3 * 5);
    }

    #[test]
    fn random_value_is_fixed_across_iterations() {
        let plan = SweepPlan::resolve(&SweepConfig::default(), &mut StdRng::seed_from_u64(3));
        let first: Vec<u32> = plan.tuples().filter_map(|t| t.size('z')).collect();
        let second: Vec<u32> = plan.tuples().filter_map(|t| t.size('z')).collect();
        assert_eq!(first, second);
    }
}
