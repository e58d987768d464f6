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

//! Shuffle-map task: the adaptive combine loop that builds per-reducer
//! buckets in memory, spills them to a bucket dumper under memory
//! pressure, and commits the final on-disk shuffle output.

use std::time::Instant;

use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::config::RddConf;
use crate::dumper::BucketDumper;
use crate::error::TaskError;
use crate::memory::MemoryAccountant;
use crate::partition::Partitioner;
use crate::stats::TaskStats;
use crate::task::DagTask;

/// One input record, as seen by the combine loop. `Malformed` carries a
/// record that failed to destructure into a `(k, v)` pair, with a message
/// describing what was found instead.
pub enum Record<K, V> {
    Pair(K, V),
    Malformed(String),
}

/// `ShuffleMapTask` pairs a `DagTask` header with a shuffle id, a
/// partitioner, an aggregator, and the rddconf selecting the on-disk
/// bucket layout.
pub struct ShuffleMapTask<K, V, C> {
    pub header: DagTask,
    pub shuffle_id: u64,
    pub partitioner: Box<dyn Partitioner<K>>,
    pub aggregator: Aggregator<V, C>,
    pub rddconf: RddConf,
    pub preferred_locations: Vec<String>,
}

impl<K, V, C> ShuffleMapTask<K, V, C>
where
    K: std::hash::Hash + Eq,
{
    pub fn new(
        header: DagTask,
        shuffle_id: u64,
        partitioner: Box<dyn Partitioner<K>>,
        aggregator: Aggregator<V, C>,
        rddconf: RddConf,
        preferred_locations: Vec<String>,
    ) -> Self {
        ShuffleMapTask {
            header,
            shuffle_id,
            partitioner,
            aggregator,
            rddconf,
            preferred_locations,
        }
    }

    /// The adaptive combine loop. Returns the worker's advertised server
    /// URI on success, for reducers to locate the committed files by.
    pub fn run<D: BucketDumper<K, C>>(
        &self,
        task_try_id: &str,
        input: impl Iterator<Item = Record<K, V>>,
        meminfo: &dyn MemoryAccountant,
        config: &Config,
        dumper: &mut D,
        server_uri: &str,
        stats: &mut TaskStats,
    ) -> Result<String, TaskError> {
        log::debug!("run task {}: shuffle map task, sort_merge={}", task_try_id, self.rddconf.sort_merge);
        let t0 = Instant::now();

        let n = self.partitioner.num_partitions();
        let mut mem_limit = meminfo.mem_limit_soft();
        let mut buckets: Vec<IndexMap<K, Option<C>>> = (0..n).map(|_| IndexMap::new()).collect();

        // the bucket array is expected to consume roughly n/(n+1) of the
        // task budget.
        let ratio = (n as f64 / (n + 1) as f64).min(meminfo.ratio());
        meminfo.set_ratio(ratio);

        let mut last_i = 0usize;
        for (i, item) in input.enumerate() {
            let (k, v) = match item {
                Record::Pair(k, v) => (k, v),
                Record::Malformed(detail) => {
                    return Err(TaskError::MalformedRecord {
                        scope: self.header.task_id.clone(),
                        detail,
                    });
                }
            };

            let j = self.partitioner.partition(&k);
            match buckets[j].entry(k) {
                Entry::Occupied(mut occ) => {
                    let existing = occ.get_mut().take().expect("combiner slot always populated between updates");
                    *occ.get_mut() = Some(self.aggregator.merge_value(existing, v));
                }
                Entry::Vacant(vac) => {
                    vac.insert(Some(self.aggregator.create_combiner(v)));
                }
            }

            if config.multi_segment_dump && meminfo.rss() > mem_limit {
                let level = if config.log_rotate { log::Level::Info } else { log::Level::Debug };
                log::log!(
                    level,
                    "dump rotate {} with {} kv: mem {} MB, soft limit {} MB, limit {} MB",
                    stats.num_dump_rotate + 1,
                    i - last_i,
                    meminfo.rss() >> 20,
                    mem_limit >> 20,
                    meminfo.mem_limit() >> 20,
                );
                let dump_start = Instant::now();
                let mut dump_buckets = drain_to_dump_buckets(&mut buckets);
                dumper.dump(&mut dump_buckets, false)?;
                stats.secs_dump += dump_start.elapsed();
                stats.num_dump_rotate += 1;

                meminfo.after_rotate();
                mem_limit = meminfo.mem_limit_soft();
                last_i = i;
            }
        }

        let dump_start = Instant::now();
        let mut dump_buckets = drain_to_dump_buckets(&mut buckets);
        dumper.dump(&mut dump_buckets, true)?;
        stats.secs_dump += dump_start.elapsed();
        stats.num_dump_rotate += 1;

        let merge_combiners = |a: C, b: C| self.aggregator.merge_combiners(a, b);
        dumper.commit(&merge_combiners)?;

        stats.bytes_dump += dumper.bytes_dumped();
        stats.secs_all = t0.elapsed();

        Ok(server_uri.to_string())
    }
}

/// Drains every working bucket into a fresh, dumper-shaped snapshot,
/// unwrapping the `Option` combiner slots left by the entry-API combine
/// step above. Draining also implements the "clear all buckets" half of a
/// rotation for free.
fn drain_to_dump_buckets<K, C>(buckets: &mut [IndexMap<K, Option<C>>]) -> Vec<IndexMap<K, C>>
where
    K: std::hash::Hash + Eq,
{
    buckets
        .iter_mut()
        .map(|b| {
            b.drain(..)
                .map(|(k, v)| (k, v.expect("combiner slot always populated at dump time")))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Aggregator;
    use crate::config::Config;
    use crate::dumper::append::AppendBucketDumper;
    use crate::memory::SimpleMemoryAccountant;
    use crate::partition::HashPartitioner;
    use crate::ttid::make_taskset_id;

    fn task(num_reduce: usize) -> ShuffleMapTask<i32, i64, i64> {
        let header = DagTask::new(1, make_taskset_id(1, 1), 0);
        ShuffleMapTask::new(
            header,
            1,
            Box::new(HashPartitioner::new(num_reduce)),
            Aggregator::associative(|a: i64, b: i64| a + b),
            RddConf::new(false),
            vec![],
        )
    }

    fn decode_published(path: &std::path::Path) -> Vec<(i32, i64)> {
        use crate::frame::read_frame;
        use crate::serialize::decode_items;
        let mut file = std::fs::File::open(path).unwrap();
        let mut all = Vec::new();
        while let Some((header, payload)) = read_frame(&mut file).unwrap() {
            let items: Vec<(i32, i64)> = decode_items(&payload, header.is_marshal).unwrap();
            all.extend(items);
        }
        all
    }

    #[test]
    fn three_reducer_combine_no_spill() {
        let task = task(3);
        let dir = tempfile::tempdir().unwrap();
        let mut dumper: AppendBucketDumper<i32, i64> = AppendBucketDumper::new(task.shuffle_id, 0, 3, dir.path());
        let meminfo = SimpleMemoryAccountant::new(1 << 30);
        let config = Config { multi_segment_dump: true, ..Config::default() };
        let mut stats = TaskStats::default();

        let input = vec![
            Record::Pair(0i32, 1i64),
            Record::Pair(1, 2),
            Record::Pair(0, 3),
            Record::Pair(2, 4),
            Record::Pair(1, 5),
        ];

        let uri = task
            .run("1.1_0.0", input.into_iter(), &meminfo, &config, &mut dumper, "http://worker", &mut stats)
            .unwrap();
        assert_eq!(uri, "http://worker");

        let final_paths: Vec<_> = (0..3).map(|r| dir.path().join(format!("shuffle_{}_0_{}.data", task.shuffle_id, r))).collect();
        assert_eq!(decode_published(&final_paths[0]), vec![(0, 4)]);
        assert_eq!(decode_published(&final_paths[1]), vec![(1, 7)]);
        assert_eq!(decode_published(&final_paths[2]), vec![(2, 4)]);
    }

    #[test]
    fn spill_preserves_sum_across_forced_rotations() {
        // rss held permanently above the soft limit so every record after
        // the first forces a rotation.
        let task = task(3);
        let dir = tempfile::tempdir().unwrap();
        let mut dumper: AppendBucketDumper<i32, i64> = AppendBucketDumper::new(task.shuffle_id, 0, 3, dir.path());
        let meminfo = SimpleMemoryAccountant::new(1000);
        let config = Config { multi_segment_dump: true, ..Config::default() };
        let mut stats = TaskStats::default();

        meminfo.set_rss(2000);

        let input = vec![
            Record::Pair(0i32, 1i64),
            Record::Pair(1, 2),
            Record::Pair(0, 3),
            Record::Pair(2, 4),
            Record::Pair(1, 5),
        ];

        task.run("1.1_0.0", input.into_iter(), &meminfo, &config, &mut dumper, "http://worker", &mut stats)
            .unwrap();

        let final_paths: Vec<_> = (0..3).map(|r| dir.path().join(format!("shuffle_{}_0_{}.data", task.shuffle_id, r))).collect();
        let sum = |p: &std::path::Path| decode_published(p).iter().map(|(_, v)| *v).sum::<i64>();
        assert_eq!(sum(&final_paths[0]), 4);
        assert_eq!(sum(&final_paths[1]), 7);
        assert_eq!(sum(&final_paths[2]), 4);
    }

    #[test]
    fn malformed_record_fails_fatally_before_any_commit() {
        let task = task(2);
        let dir = tempfile::tempdir().unwrap();
        let mut dumper: AppendBucketDumper<i32, i64> = AppendBucketDumper::new(task.shuffle_id, 0, 2, dir.path());
        let meminfo = SimpleMemoryAccountant::new(1 << 30);
        let config = Config::default();
        let mut stats = TaskStats::default();

        let input = vec![Record::Pair(0i32, 1i64), Record::Malformed("42".to_string()), Record::Pair(1, 2)];

        let result = task.run("1.1_0.0", input.into_iter(), &meminfo, &config, &mut dumper, "http://worker", &mut stats);
        assert!(matches!(result, Err(TaskError::MalformedRecord { .. })));
        assert!(!dir.path().join(format!("shuffle_{}_0_0.data", task.shuffle_id)).exists());
    }
}
