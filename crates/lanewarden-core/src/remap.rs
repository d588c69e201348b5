//! # Lane Remapping Engine
//!
//! Sole owner of the physical<->logical mapping tables and of the spare pool.
//! Every other component only reads them.
//!
//! ## Invariants
//!
//! - `physical_to_logical` and `logical_to_physical` are mutual inverses over
//!   `0..N` at every tick boundary.
//! - A remap is always one atomic two-lane swap that updates both directions.
//! - Spare search scans ascending physical index, so the lowest free spare is
//!   always chosen and outcomes are reproducible.
//!
//! ## Spares
//!
//! A physical lane is a free spare when its logical index is at or beyond the
//! requested width, it is usable (not Failed, not parked), and no repair has
//! claimed it in the current episode. Claims are released when the link
//! returns to a fully active, non-repairing state.
//!
//! ## Compaction
//!
//! Parked lanes keep their logical slot. After every commit the controller
//! swaps each parked lane inside the current width with the lowest live lane
//! beyond it, so the active set always spans the committed width when enough
//! live lanes exist. Compactions are ledgered like remaps.
//!
//! ## Reversal
//!
//! Lane-order reversal is corrected on the rising edge of the external
//! detection flag. Holding the flag asserted never reverses again.

/// Number of remap records retained.
pub const LEDGER_LEN: usize = 8;

/// Bijective physical<->logical lane mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LaneMap {
    physical_to_logical: Vec<usize>,
    logical_to_physical: Vec<usize>,
}

impl LaneMap {
    /// Identity mapping over `n` lanes.
    #[must_use]
    pub fn identity(n: usize) -> Self {
        Self {
            physical_to_logical: (0..n).collect(),
            logical_to_physical: (0..n).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.physical_to_logical.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.physical_to_logical.is_empty()
    }

    /// Logical slot of a physical lane.
    #[must_use]
    pub fn logical_of(&self, physical: usize) -> usize {
        self.physical_to_logical[physical]
    }

    /// Physical lane carrying a logical slot.
    #[must_use]
    pub fn physical_of(&self, logical: usize) -> usize {
        self.logical_to_physical[logical]
    }

    #[must_use]
    pub fn physical_to_logical(&self) -> &[usize] {
        &self.physical_to_logical
    }

    #[must_use]
    pub fn logical_to_physical(&self) -> &[usize] {
        &self.logical_to_physical
    }

    /// Exchange the logical slots of two physical lanes, both directions.
    pub fn swap_physical(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let la = self.physical_to_logical[a];
        let lb = self.physical_to_logical[b];
        self.physical_to_logical[a] = lb;
        self.physical_to_logical[b] = la;
        self.logical_to_physical[la] = b;
        self.logical_to_physical[lb] = a;
    }

    /// Reverse the mapping end to end: logical `l` becomes `n - 1 - l`.
    pub fn reverse(&mut self) {
        let n = self.len();
        for logical in &mut self.physical_to_logical {
            *logical = n - 1 - *logical;
        }
        self.logical_to_physical.reverse();
    }

    /// Both tables are permutations of `0..n` and inverse to each other.
    #[must_use]
    pub fn is_bijection(&self) -> bool {
        let n = self.len();
        if self.logical_to_physical.len() != n {
            return false;
        }
        let mut seen = vec![false; n];
        for (physical, &logical) in self.physical_to_logical.iter().enumerate() {
            if logical >= n || seen[logical] {
                return false;
            }
            seen[logical] = true;
            if self.logical_to_physical[logical] != physical {
                return false;
            }
        }
        true
    }
}

/// One planned remap: the failing lane's slot moves onto the spare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapOp {
    pub failing: usize,
    pub spare: usize,
    /// Logical slot the spare takes over.
    pub logical: usize,
}

/// Ledger entry for a committed remap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemapRecord {
    /// Monotonic ledger sequence number.
    pub seqno: u64,
    pub tick: u64,
    pub failing: usize,
    pub spare: usize,
    pub logical: usize,
}

/// Mapping tables, spare claims and reversal latch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapEngine {
    map: LaneMap,
    /// Spares claimed by the current repair episode, by physical index.
    claimed: Vec<bool>,
    /// Reversal flag was asserted at the previous commit.
    reversal_latched: bool,
    /// Reversal has been corrected this session.
    reversal_corrected: bool,
    reversals: u32,
    ledger: [Option<RemapRecord>; LEDGER_LEN],
    ledger_write_idx: usize,
    ledger_seqno: u64,
}

impl RemapEngine {
    /// Identity mapping, empty claims.
    #[must_use]
    pub fn new(num_lanes: usize) -> Self {
        Self {
            map: LaneMap::identity(num_lanes),
            claimed: vec![false; num_lanes],
            reversal_latched: false,
            reversal_corrected: false,
            reversals: 0,
            ledger: [None; LEDGER_LEN],
            ledger_write_idx: 0,
            ledger_seqno: 0,
        }
    }

    /// Restore identity mapping and drop claims and the reversal latch.
    /// The ledger and its sequence survive.
    pub fn reset(&mut self) {
        let n = self.map.len();
        self.map = LaneMap::identity(n);
        self.claimed.iter_mut().for_each(|c| *c = false);
        self.reversal_latched = false;
        self.reversal_corrected = false;
    }

    #[must_use]
    pub fn map(&self) -> &LaneMap {
        &self.map
    }

    #[must_use]
    pub fn is_claimed(&self, physical: usize) -> bool {
        self.claimed[physical]
    }

    #[must_use]
    pub fn claimed_count(&self) -> usize {
        self.claimed.iter().filter(|c| **c).count()
    }

    #[must_use]
    pub fn reversal_corrected(&self) -> bool {
        self.reversal_corrected
    }

    #[must_use]
    pub fn reversals(&self) -> u32 {
        self.reversals
    }

    /// Whether the given detection input would reverse the mapping now.
    #[must_use]
    pub fn reversal_pending(&self, detected: bool) -> bool {
        detected && !self.reversal_latched
    }

    /// Commit the reversal input: reverse on the rising edge only.
    /// Returns `true` when the mapping was reversed.
    pub fn apply_reversal_input(&mut self, detected: bool) -> bool {
        let fire = self.reversal_pending(detected);
        if fire {
            self.map.reverse();
            self.reversal_corrected = true;
            self.reversals = self.reversals.saturating_add(1);
        }
        self.reversal_latched = detected;
        fire
    }

    /// Free spare test for one physical lane.
    #[must_use]
    pub fn is_free_spare(&self, physical: usize, requested_width: usize, usable: bool) -> bool {
        usable && !self.claimed[physical] && self.map.logical_of(physical) >= requested_width
    }

    /// Count free spares. `usable(p)` reports whether lane `p` can carry traffic.
    #[must_use]
    pub fn free_spares<F>(&self, requested_width: usize, usable: F) -> usize
    where
        F: Fn(usize) -> bool,
    {
        (0..self.map.len())
            .filter(|&p| self.is_free_spare(p, requested_width, usable(p)))
            .count()
    }

    /// Pair each failing lane (in the given order) with the lowest free spare.
    ///
    /// Lanes beyond the spare supply are left unplanned; they stay unrepaired
    /// this tick.
    #[must_use]
    pub fn plan<I, F>(&self, failing: I, requested_width: usize, usable: F) -> Vec<RemapOp>
    where
        I: IntoIterator<Item = usize>,
        F: Fn(usize) -> bool,
    {
        let mut spares = (0..self.map.len())
            .filter(|&p| self.is_free_spare(p, requested_width, usable(p)));
        let mut ops = Vec::new();
        for lane in failing {
            let logical = self.map.logical_of(lane);
            if logical >= requested_width {
                continue;
            }
            let Some(spare) = spares.next() else {
                break;
            };
            ops.push(RemapOp {
                failing: lane,
                spare,
                logical,
            });
        }
        ops
    }

    /// Apply planned remaps as atomic swaps, claiming each spare.
    pub fn commit(&mut self, ops: &[RemapOp], tick: u64) {
        for op in ops {
            self.map.swap_physical(op.failing, op.spare);
            self.claimed[op.spare] = true;
            self.record(op, tick);
        }
    }

    /// Pull live lanes into width slots held by dead lanes.
    ///
    /// Each slot in `0..width` whose lane is `dead` swaps with the lowest
    /// physical lane that is `live` and sits at or beyond `width`. Slots are
    /// visited in logical order; the pass stops when no replacement is left.
    /// Replacements are not claimed, so a compaction never spends a repair
    /// spare's claim.
    pub fn compact<D, L>(&mut self, width: usize, dead: D, live: L, tick: u64) -> Vec<RemapOp>
    where
        D: Fn(usize) -> bool,
        L: Fn(usize) -> bool,
    {
        let width = width.min(self.map.len());
        let mut ops = Vec::new();
        let mut next_live = 0;
        for logical in 0..width {
            let lane = self.map.physical_of(logical);
            if !dead(lane) {
                continue;
            }
            let Some(replacement) = (next_live..self.map.len())
                .find(|&p| live(p) && self.map.logical_of(p) >= width)
            else {
                break;
            };
            next_live = replacement + 1;
            let op = RemapOp {
                failing: lane,
                spare: replacement,
                logical,
            };
            self.map.swap_physical(lane, replacement);
            self.record(&op, tick);
            ops.push(op);
        }
        ops
    }

    /// Return every claimed spare to the pool.
    pub fn release_claims(&mut self) {
        self.claimed.iter_mut().for_each(|c| *c = false);
    }

    fn record(&mut self, op: &RemapOp, tick: u64) {
        self.ledger_seqno += 1;
        self.ledger[self.ledger_write_idx] = Some(RemapRecord {
            seqno: self.ledger_seqno,
            tick,
            failing: op.failing,
            spare: op.spare,
            logical: op.logical,
        });
        self.ledger_write_idx = (self.ledger_write_idx + 1) % LEDGER_LEN;
    }

    /// Retained ledger entries, oldest first.
    #[must_use]
    pub fn ledger(&self) -> Vec<RemapRecord> {
        (0..LEDGER_LEN)
            .filter_map(|i| self.ledger[(self.ledger_write_idx + i) % LEDGER_LEN])
            .collect()
    }
}
