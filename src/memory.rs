// Copyright 2026 The Task Shuffle Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Memory accountant collaborator contract.
//!
//! The core only depends on this trait; reading real OS-level RSS is a
//! process-level concern delegated to an external collaborator installed by
//! the worker at startup. `SimpleMemoryAccountant` is a deterministic
//! in-process stand-in used by tests and by embedders that don't need real
//! RSS sampling.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Process-wide, single-writer memory accounting handle.
pub trait MemoryAccountant: Send + Sync {
    fn start(&self, ttid: &str, budget_bytes: u64);
    fn stop(&self);

    /// Current resident-set size, in bytes.
    fn rss(&self) -> u64;
    /// Current soft spill threshold, in bytes.
    fn mem_limit_soft(&self) -> u64;
    /// Hard budget for this task, in bytes.
    fn mem_limit(&self) -> u64;
    /// Set when the accountant believes the process is at risk of an
    /// out-of-memory kill.
    fn oom(&self) -> bool;

    /// Recomputes the soft limit after a spill rotation freed memory,
    /// based on current headroom.
    fn after_rotate(&self);

    /// Enables/disables eager checking. The combine loop's caller disables
    /// this when multi-segment-dump mode is on.
    fn set_check(&self, check: bool);

    /// `min(n/(n+1), current_ratio)` policy input, where `n` is the number
    /// of active reducers. Returns the ratio actually in effect after the
    /// set.
    fn set_ratio(&self, ratio: f64);
    fn ratio(&self) -> f64;
}

/// A simple accountant whose "rss" is whatever the embedder pokes into it;
/// suitable for deterministic tests of the spill-triggering logic and as a
/// default when no real RSS sampler is wired in.
pub struct SimpleMemoryAccountant {
    budget: AtomicU64,
    rss: AtomicU64,
    soft_limit: AtomicU64,
    oom: AtomicBool,
    check: AtomicBool,
    ratio_bits: AtomicU64,
}

impl SimpleMemoryAccountant {
    pub fn new(budget_bytes: u64) -> Self {
        SimpleMemoryAccountant {
            budget: AtomicU64::new(budget_bytes),
            rss: AtomicU64::new(0),
            soft_limit: AtomicU64::new(budget_bytes),
            oom: AtomicBool::new(false),
            check: AtomicBool::new(true),
            ratio_bits: AtomicU64::new(1f64.to_bits()),
        }
    }

    /// Test/embedder hook: pretend the process RSS just changed.
    pub fn set_rss(&self, rss: u64) {
        self.rss.store(rss, Ordering::SeqCst);
    }

    pub fn set_oom(&self, oom: bool) {
        self.oom.store(oom, Ordering::SeqCst);
    }

    pub fn checking(&self) -> bool {
        self.check.load(Ordering::SeqCst)
    }
}

impl MemoryAccountant for SimpleMemoryAccountant {
    fn start(&self, _ttid: &str, budget_bytes: u64) {
        self.budget.store(budget_bytes, Ordering::SeqCst);
        self.soft_limit.store(budget_bytes, Ordering::SeqCst);
        self.rss.store(0, Ordering::SeqCst);
        self.oom.store(false, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.rss.store(0, Ordering::SeqCst);
    }

    fn rss(&self) -> u64 {
        self.rss.load(Ordering::SeqCst)
    }

    fn mem_limit_soft(&self) -> u64 {
        self.soft_limit.load(Ordering::SeqCst)
    }

    fn mem_limit(&self) -> u64 {
        self.budget.load(Ordering::SeqCst)
    }

    fn oom(&self) -> bool {
        self.oom.load(Ordering::SeqCst)
    }

    fn after_rotate(&self) {
        // Headroom-based recompute: soft limit becomes ratio * (budget - current rss).
        let budget = self.budget.load(Ordering::SeqCst) as f64;
        let rss = self.rss.load(Ordering::SeqCst) as f64;
        let ratio = self.ratio();
        let headroom = (budget - rss).max(0.0);
        let new_soft = (ratio * headroom) as u64;
        self.soft_limit.store(new_soft.max(1), Ordering::SeqCst);
    }

    fn set_check(&self, check: bool) {
        self.check.store(check, Ordering::SeqCst);
    }

    fn set_ratio(&self, ratio: f64) {
        self.ratio_bits.store(ratio.to_bits(), Ordering::SeqCst);
        let budget = self.budget.load(Ordering::SeqCst) as f64;
        self.soft_limit.store((ratio * budget) as u64, Ordering::SeqCst);
    }

    fn ratio(&self) -> f64 {
        f64::from_bits(self.ratio_bits.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_ratio_rescales_soft_limit_from_budget() {
        let acc = SimpleMemoryAccountant::new(1000);
        acc.set_ratio(0.75);
        assert_eq!(acc.mem_limit_soft(), 750);
    }

    #[test]
    fn after_rotate_uses_headroom_not_budget() {
        let acc = SimpleMemoryAccountant::new(1000);
        acc.set_ratio(0.5);
        acc.set_rss(400);
        acc.after_rotate();
        // headroom = 1000 - 400 = 600; soft = 0.5 * 600 = 300
        assert_eq!(acc.mem_limit_soft(), 300);
    }
}
