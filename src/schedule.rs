//! The schedule hierarchy: an arena-based tree of pulses and sub-schedules,
//! the "collapse" pass that removes superfluous single-item levels, and the
//! transfer-matrix solve, per spec sections 4.6 and 4.7.
//!
//! Ported from `original_source/src/Calc/calcSchedule.{h,C}`,
//! `calcScheduleT.{h,C}`, `topSchedule.{h,C}` and `topScheduleT.{h,C}`.
//! Unlike the original's pointer hierarchy of `calcSchedule`/`topSchedule`
//! (a derived class that skips the base's own delay block), this uses a
//! single arena of nodes plus a `top` flag so there is exactly one type to
//! reason about; `TopSchedule`'s distinct behavior (no own delay/decay
//! block, cooling times) is captured by never giving the top node a delay
//! and by the dedicated cooling-time fields below.
//!
//! Unsafe: no

use alloc::vec::Vec;

use crate::{
    chain::Chain,
    config::{Config, Mode},
    generation,
    kza::FluxId,
    matrix::Matrix,
    pulse_history::PulseHistory,
};

/// Index into a [`CalcSchedule`]'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum Kind {
    /// TYPE B-0: a single pulse.
    Pulse { flux_id: FluxId, op_time: f64 },
    /// TYPE A / TYPE B-1: `items.len()` sub-schedules applied in order.
    Composite { items: Vec<NodeId> },
}

#[derive(Debug, Clone)]
struct Node {
    kind: Kind,
    history: PulseHistory,
    delay: f64,
    decay: Matrix,
    set_code: Option<u64>,
}

/// An arena-based schedule hierarchy (spec section 4.6).
#[derive(Debug, Clone)]
pub struct CalcSchedule {
    nodes: Vec<Node>,
}

impl CalcSchedule {
    /// An empty arena; build it up with [`Self::push_pulse`] and
    /// [`Self::push_composite`].
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// TYPE B-0: a leaf node representing a single constant-flux pulse.
    pub fn push_pulse(&mut self, history: PulseHistory, delay: f64, op_time: f64, flux_id: FluxId) -> NodeId {
        self.nodes.push(Node {
            kind: Kind::Pulse { flux_id, op_time },
            history,
            delay,
            decay: Matrix::empty(),
            set_code: None,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// TYPE A/B-1: a node applying its `items` (in order) before its own
    /// pulsing history and delay.
    pub fn push_composite(&mut self, history: PulseHistory, delay: f64, items: Vec<NodeId>) -> NodeId {
        self.nodes.push(Node {
            kind: Kind::Composite { items },
            history,
            delay,
            decay: Matrix::empty(),
            set_code: None,
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Depth-first collapse pass (spec section 4.6): any node with exactly
    /// one item is replaced by that item's own shape, merging histories and
    /// keeping this node's delay (and the sub-item's, via the merge).
    pub fn collapse(&mut self, node: NodeId) {
        loop {
            let single_child = match &self.nodes[node.0].kind {
                Kind::Composite { items } if items.len() == 1 => Some(items[0]),
                _ => None,
            };
            let Some(child) = single_child else { break };

            tracing::trace!(node = node.0, child = child.0, "collapsing single-item schedule");

            let child_kind = self.nodes[child.0].kind.clone();
            let child_history = self.nodes[child.0].history.clone();
            let child_delay = self.nodes[child.0].delay;
            let own_history = self.nodes[node.0].history.clone();

            self.nodes[node.0].kind = child_kind;
            self.nodes[node.0].history = PulseHistory::merge(Some(&child_history), child_delay, Some(&own_history));
        }

        if let Kind::Composite { items } = &self.nodes[node.0].kind {
            let items = items.clone();
            for item in items {
                self.collapse(item);
            }
        }
    }

    /// Recursively sets this node's decay matrix (and its pulsing
    /// history's) for the current chain generation, skipping nodes already
    /// processed this generation (spec section 4.6).
    pub fn set_decay(&mut self, node: NodeId, chain: &Chain) {
        let current = generation::current();
        if self.nodes[node.0].set_code == Some(current) {
            return;
        }

        chain.set_decay(&mut self.nodes[node.0].decay, self.nodes[node.0].delay);
        let mut history = core::mem::replace(&mut self.nodes[node.0].history, PulseHistory::none(""));
        history.set_decay(chain);

        let items = match &self.nodes[node.0].kind {
            Kind::Composite { items } => items.clone(),
            Kind::Pulse { .. } => Vec::new(),
        };
        for item in items {
            self.set_decay(item, chain);
        }

        self.nodes[node.0].history = history;
        self.nodes[node.0].set_code = Some(current);
    }

    /// Solves the transfer matrices for `node` against `chain`, returning
    /// `(total, hist, op_block)`, per spec section 4.6.
    fn set_t(&self, node: NodeId, chain: &Chain) -> (Matrix, Matrix, Matrix) {
        let n = &self.nodes[node.0];
        let op_block = match &n.kind {
            Kind::Pulse { flux_id, op_time } => {
                let mut m = Matrix::identity(chain.chain_length());
                chain.fill_t_mat(&mut m, *op_time, *flux_id);
                m
            }
            Kind::Composite { items } => self.set_sub_ts(items, chain),
        };

        let hist = n.history.do_history(op_block.clone());
        let mut total = Matrix::empty();
        chain.mult(&mut total, &n.decay, &hist);
        (total, hist, op_block)
    }

    /// `opBlock = items[last].total * ... * items[0].total`, per spec
    /// section 4.6.
    fn set_sub_ts(&self, items: &[NodeId], chain: &Chain) -> Matrix {
        let mut op_block = Matrix::identity(chain.chain_length());
        for &item in items {
            let (item_total, _, _) = self.set_t(item, chain);
            op_block = item_total.multiply(&op_block);
        }
        op_block
    }
}

impl Default for CalcSchedule {
    fn default() -> Self {
        Self::new()
    }
}

/// The root of the schedule hierarchy: no own delay/decay block, optionally
/// no pulsing history, and a set of after-shutdown cooling times (spec
/// section 4.7).
#[derive(Debug, Clone)]
pub struct TopSchedule {
    schedule: CalcSchedule,
    root: NodeId,
    history: Option<PulseHistory>,
    cooling_times: Vec<f64>,
    cool_decay: Vec<Matrix>,
}

/// One solved result set for a single chain: the total transfer matrix at
/// the end of the operational schedule, plus one per cooling time.
#[derive(Debug, Clone)]
pub struct TopScheduleResult {
    total: Matrix,
    cooling: Vec<Matrix>,
}

impl TopSchedule {
    /// Wraps `schedule`'s `root` node as the top of the hierarchy, with the
    /// given after-shutdown cooling times and an optional pulsing history
    /// of its own (spec section 4.7: "Only a topSchedule can be without a
    /// pulsing history").
    #[must_use]
    pub fn new(
        schedule: CalcSchedule,
        root: NodeId,
        history: Option<PulseHistory>,
        cooling_times: Vec<f64>,
    ) -> Self {
        let n = cooling_times.len();
        Self {
            schedule,
            root,
            history,
            cooling_times,
            cool_decay: alloc::vec![Matrix::empty(); n],
        }
    }

    /// Runs the collapse pass on the whole hierarchy rooted here.
    pub fn collapse(&mut self) {
        self.schedule.collapse(self.root);
    }

    /// Sets decay matrices for the root's own items, its history (if any),
    /// and every cooling-time matrix: the root never checks its own
    /// generation cache, since [`Self::set_decay`] is called exactly once
    /// per chain (spec section 4.7).
    pub fn set_decay(&mut self, chain: &Chain) {
        let items = match &self.schedule_node().kind {
            Kind::Composite { items } => items.clone(),
            Kind::Pulse { .. } => Vec::new(),
        };
        for item in items {
            self.schedule.set_decay(item, chain);
        }
        if let Some(history) = &mut self.history {
            history.set_decay(chain);
        }
        for (cool_d, &cool_t) in self.cool_decay.iter_mut().zip(&self.cooling_times) {
            chain.set_decay(cool_d, cool_t);
        }
    }

    fn schedule_node(&self) -> &Node {
        &self.schedule.nodes[self.root.0]
    }

    /// Solves the whole hierarchy for `chain`, applying the root's history
    /// (if any) and every cooling time, but no final decay block of its
    /// own (spec section 4.7).
    #[must_use]
    pub fn set_t(&self, chain: &Chain) -> TopScheduleResult {
        let root_node = self.schedule_node();
        let op_block = match &root_node.kind {
            Kind::Pulse { flux_id, op_time } => {
                let mut m = Matrix::identity(chain.chain_length());
                chain.fill_t_mat(&mut m, *op_time, *flux_id);
                m
            }
            Kind::Composite { items } => self.schedule.set_sub_ts(items, chain),
        };

        let total = match &self.history {
            Some(history) => history.do_history(op_block.clone()),
            None => op_block,
        };

        let cooling = self
            .cool_decay
            .iter()
            .map(|cool_d| {
                let mut cooled = Matrix::empty();
                chain.mult(&mut cooled, cool_d, &total);
                cooled
            })
            .collect();

        TopScheduleResult { total, cooling }
    }
}

impl TopScheduleResult {
    /// Extracts `nCoolingTimes + 1` results for one rank of the solved
    /// chain: the shutdown-time value followed by one per cooling time.
    ///
    /// The diagonal index used depends on [`Mode`] (spec section 4.7):
    /// forward mode reads `rank*(rank+1)/2` (`T[rank, 0]`, the transfer
    /// from the chain's root); reverse mode reads the complementary index
    /// `tri_len(n) - 1 - rank`.
    #[must_use]
    pub fn results(&self, rank: usize, mode: Mode) -> Vec<f64> {
        let index = |m: &Matrix| match mode {
            Mode::Forward => m.element_at(rank * (rank + 1) / 2),
            Mode::Reverse => m.element_at(Matrix::tri_len(m.size()) - 1 - rank),
        };

        let mut data = alloc::vec![index(&self.total)];
        data.extend(self.cooling.iter().map(index));
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_service::DataService;
    use crate::kza::{FissionType, Kza, PathId};
    use crate::rates::RateVector;

    struct Stable;
    impl DataService for Stable {
        fn ngroups(&self) -> usize {
            1
        }
        fn daughters(&self, _parent: Kza) -> Vec<(Kza, PathId)> {
            Vec::new()
        }
        fn production_rate(&self, _p: Kza, _d: Kza, _path: PathId) -> Option<RateVector> {
            None
        }
        fn destruction_rate(&self, _parent: Kza) -> Option<RateVector> {
            Some(RateVector::new(alloc::vec![2e-24]))
        }
        fn decay_constant(&self, _parent: Kza) -> f64 {
            0.0
        }
        fn branch_ratio(&self, _p: Kza, _d: Kza) -> f64 {
            0.0
        }
        fn fission_yield(&self, _p: Kza, _d: Kza, _f: FissionType) -> f64 {
            0.0
        }
        fn spontaneous_fission_branch(&self, _parent: Kza) -> f64 {
            0.0
        }
    }

    #[test]
    fn single_pulse_top_has_no_final_delay() {
        let data = Stable;
        let config = Config::default();
        let flux = [5e14];
        let mut chain = Chain::new(Kza::new(26, 56, 0), 1);
        chain.build(&data, &config, &flux);
        chain.collapse_rates(&data, &[alloc::vec![5e14]]).unwrap();

        let mut sched = CalcSchedule::new();
        let pulse = sched.push_pulse(PulseHistory::none("single"), 0.0, 3.154e7, FluxId(0));
        let mut top = TopSchedule::new(sched, pulse, None, Vec::new());
        top.collapse();
        top.set_decay(&chain);

        let result = top.set_t(&chain);
        let data = result.results(0, Mode::Forward);
        approx::assert_relative_eq!(data[0], 0.968_95, max_relative = 1e-4);
    }

    #[test]
    fn collapse_merges_single_item_composite() {
        let mut sched = CalcSchedule::new();
        let pulse = sched.push_pulse(PulseHistory::none("p"), 5.0, 100.0, FluxId(0));
        let wrapper = sched.push_composite(PulseHistory::none("w"), 1.0, alloc::vec![pulse]);
        sched.collapse(wrapper);
        match &sched.nodes[wrapper.0].kind {
            Kind::Pulse { op_time, .. } => assert_eq!(*op_time, 100.0),
            Kind::Composite { .. } => panic!("expected collapse to adopt the pulse shape"),
        }
    }

    #[test]
    fn reverse_and_forward_index_complementary_corners() {
        let m = Matrix::identity(3);
        assert_eq!(Matrix::tri_len(3), 6);
        // forward rank 0 and reverse rank 2 both land on index 0 for a
        // triangular matrix of size 3.
        assert_eq!(0 * (0 + 1) / 2, 0);
        assert_eq!(Matrix::tri_len(m.size()) - 1 - 2, 3);
    }
}
