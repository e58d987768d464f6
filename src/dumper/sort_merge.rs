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

//! Sort-merge bucket dumper.
//!
//! Every dump writes a fresh, already-sorted per-reducer temporary; commit
//! either publishes the lone survivor directly or k-way merges every
//! spill for a reducer into one globally sorted, combined stream.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::RddConf;
use crate::dumper::{make_reducer_slots, BucketDumper, ReducerSlot};
use crate::error::TaskError;
use crate::serialize::{dump_stream, load_stream};

/// Bounds the number of spill files merged at once per reducer, merging in
/// batches when there are more.
const MAX_OPEN_SPILLS_PER_MERGE: usize = 16;

pub struct SortMergeBucketDumper<K, C> {
    slots: Vec<ReducerSlot>,
    rddconf: RddConf,
    _marker: std::marker::PhantomData<(K, C)>,
}

impl<K, C> SortMergeBucketDumper<K, C>
where
    K: Serialize + DeserializeOwned + Ord + Clone,
    C: Serialize + DeserializeOwned + Clone,
{
    pub fn new(shuffle_id: u64, map_id: usize, num_reduce: usize, disk_dir: &Path, rddconf: RddConf) -> Self {
        SortMergeBucketDumper {
            slots: make_reducer_slots(shuffle_id, map_id, num_reduce, disk_dir),
            rddconf,
            _marker: std::marker::PhantomData,
        }
    }

    fn write_sorted_stream(&self, reduce_id: usize, mut items: Vec<(K, C)>) -> Result<(PathBuf, u64), TaskError> {
        items.sort_by(|a, b| a.0.cmp(&b.0));
        let path = self.slots[reduce_id].workdir.alloc_tmp(false, None)?;
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        dump_stream(items.into_iter(), &mut writer)?;
        let bytes = fs::metadata(&path)?.len();
        Ok((path, bytes))
    }

    /// Merges `paths` (each already sorted and frame-less) into one new
    /// sorted, combined temporary, folding equal keys via `merge_combiners`.
    fn merge_into_one(&self, reduce_id: usize, paths: &[PathBuf], merge_combiners: &dyn Fn(C, C) -> C) -> Result<PathBuf, TaskError> {
        let readers: Vec<_> = paths
            .iter()
            .map(|p| File::open(p).map(BufReader::new))
            .collect::<Result<_, _>>()?;
        let merged = KWayMerge::new(readers.into_iter().map(load_stream).collect(), merge_combiners);

        let out_path = self.slots[reduce_id].workdir.alloc_tmp(false, None)?;
        let file = File::create(&out_path)?;
        let mut writer = BufWriter::new(file);
        for item in merged {
            dump_stream(std::iter::once(item?), &mut writer)?;
        }
        Ok(out_path)
    }
}

impl<K, C> BucketDumper<K, C> for SortMergeBucketDumper<K, C>
where
    K: Serialize + DeserializeOwned + Ord + Clone,
    C: Serialize + DeserializeOwned + Clone,
{
    fn dump(&mut self, buckets: &mut [IndexMap<K, C>], _is_final: bool) -> Result<(), TaskError> {
        for reduce_id in 0..buckets.len() {
            if buckets[reduce_id].is_empty() {
                continue;
            }
            let items: Vec<(K, C)> = buckets[reduce_id].drain(..).collect();
            let (path, bytes) = self.write_sorted_stream(reduce_id, items)?;
            log::debug!("dump {}", path.display());
            self.slots[reduce_id].tmp_paths.push(path);
            self.slots[reduce_id].bytes += bytes;
        }
        Ok(())
    }

    fn commit(&mut self, merge_combiners: &dyn Fn(C, C) -> C) -> Result<Vec<PathBuf>, TaskError> {
        let mut published = Vec::with_capacity(self.slots.len());
        for reduce_id in 0..self.slots.len() {
            let mut paths = std::mem::take(&mut self.slots[reduce_id].tmp_paths);
            let final_tmp = match paths.len() {
                0 => {
                    let (path, _bytes) = self.write_sorted_stream(reduce_id, Vec::new())?;
                    path
                }
                1 => paths.pop().unwrap(),
                _ => {
                    // re-derive a groupBy-tagged rddconf for this merge pass,
                    // mirroring how a plain groupBy shuffle would be merged
                    let merge_conf = self.rddconf.dup_for_groupby();
                    log::debug!("merging reducer {} spills under op {:?}", reduce_id, merge_conf.op);
                    // merge in bounded batches so a reducer with many
                    // spills never holds them all open at once
                    while paths.len() > 1 {
                        let mut next_round = Vec::new();
                        for chunk in paths.chunks(MAX_OPEN_SPILLS_PER_MERGE) {
                            if chunk.len() == 1 {
                                next_round.push(chunk[0].clone());
                            } else {
                                next_round.push(self.merge_into_one(reduce_id, chunk, merge_combiners)?);
                            }
                        }
                        paths = next_round;
                    }
                    paths.pop().unwrap()
                }
            };
            published.push(self.slots[reduce_id].workdir.export(&final_tmp)?);
        }
        Ok(published)
    }

    fn bytes_dumped(&self) -> u64 {
        self.slots.iter().map(|s| s.bytes).sum()
    }
}

/// Merges several sorted `(K, C)` streams into one sorted stream, folding
/// equal keys with `merge_combiners`. Guarantees global sort order, one
/// combined value per key, and streaming memory use independent of total
/// input size.
struct KWayMerge<'a, R, K, C> {
    heap: BinaryHeap<Cursor<R, K, C>>,
    merge_combiners: &'a dyn Fn(C, C) -> C,
}

struct Cursor<R, K, C> {
    key: K,
    value: C,
    reader: crate::serialize::StreamReader<R, K, C>,
}

impl<R, K: Ord, C> PartialEq for Cursor<R, K, C> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl<R, K: Ord, C> Eq for Cursor<R, K, C> {}
impl<R, K: Ord, C> PartialOrd for Cursor<R, K, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<R, K: Ord, C> Ord for Cursor<R, K, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap, we want the smallest key on top
        other.key.cmp(&self.key)
    }
}

impl<'a, R, K, C> KWayMerge<'a, R, K, C>
where
    R: std::io::Read,
    K: Ord + DeserializeOwned,
    C: DeserializeOwned,
{
    fn new(readers: Vec<crate::serialize::StreamReader<R, K, C>>, merge_combiners: &'a dyn Fn(C, C) -> C) -> Self {
        let mut heap = BinaryHeap::with_capacity(readers.len());
        for mut reader in readers {
            if let Some(first) = reader.next() {
                // propagate read errors lazily through `next()` instead of
                // here; a malformed spill surfaces on first pop.
                if let Ok((key, value)) = first {
                    heap.push(Cursor { key, value, reader });
                }
            }
        }
        KWayMerge { heap, merge_combiners }
    }
}

impl<'a, R, K, C> Iterator for KWayMerge<'a, R, K, C>
where
    R: std::io::Read,
    K: Ord + DeserializeOwned,
    C: DeserializeOwned,
{
    type Item = std::io::Result<(K, C)>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut top = self.heap.pop()?;
        let mut combined_value = top.value;
        let key = top.key;

        // advance the cursor that just contributed
        let advance = |cursor: &mut Cursor<R, K, C>| -> Option<std::io::Result<(K, C)>> {
            cursor.reader.next()
        };
        let next_from_top = advance(&mut top);

        // fold in every other cursor currently sitting on the same key
        loop {
            match self.heap.peek() {
                Some(peeked) if peeked.key == key => {
                    let mut next_top = self.heap.pop().unwrap();
                    combined_value = (self.merge_combiners)(combined_value, next_top.value);
                    if let Some(advanced) = next_top.reader.next() {
                        match advanced {
                            Ok((k, v)) => {
                                next_top.key = k;
                                next_top.value = v;
                                self.heap.push(next_top);
                            }
                            Err(e) => return Some(Err(e)),
                        }
                    }
                }
                _ => break,
            }
        }

        if let Some(advanced) = next_from_top {
            match advanced {
                Ok((k, v)) => {
                    top.key = k;
                    top.value = v;
                    self.heap.push(top);
                }
                Err(e) => return Some(Err(e)),
            }
        }

        Some(Ok((key, combined_value)))
    }
}
