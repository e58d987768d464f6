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

//! Append-mode bucket dumper.
//!
//! One final file per reducer, built from one or more appended framed
//! segments.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::dumper::{make_reducer_slots, BucketDumper, ReducerSlot};
use crate::error::TaskError;
use crate::frame::write_frame;
use crate::serialize::{encode_items, Marshalable};

pub struct AppendBucketDumper<K, C> {
    slots: Vec<ReducerSlot>,
    num_dump: u64,
    _marker: std::marker::PhantomData<(K, C)>,
}

impl<K, C> AppendBucketDumper<K, C>
where
    K: Serialize + Marshalable,
    C: Serialize + Marshalable,
{
    pub fn new(shuffle_id: u64, map_id: usize, num_reduce: usize, disk_dir: &Path) -> Self {
        AppendBucketDumper {
            slots: make_reducer_slots(shuffle_id, map_id, num_reduce, disk_dir),
            num_dump: 0,
            _marker: std::marker::PhantomData,
        }
    }

    /// Returns the single, reused temporary for this reducer, allocating
    /// (and registering) it on first use.
    fn tmp_for(&mut self, reduce_id: usize, is_final: bool, exp_size: usize) -> PathBuf {
        if let Some(path) = self.slots[reduce_id].tmp_paths.first() {
            return path.clone();
        }
        // mem_first only ever requested for a small bucket dumped exactly once.
        let mem_first = is_final && self.num_dump == 0;
        let path = self.slots[reduce_id].workdir.deterministic_tmp_path(mem_first);
        let _ = exp_size; // advisory only; the path choice above is all the hint affects here
        self.slots[reduce_id].tmp_paths.push(path.clone());
        path
    }

    fn dump_bucket(&mut self, reduce_id: usize, payload: &[u8], is_marshal: bool, path: &Path) -> Result<u64, TaskError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if self.num_dump == 0 && path.exists() {
            log::warn!("removing stray dump from a previous attempt: {}", path.display());
            fs::remove_file(path)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        write_frame(&mut file, payload, is_marshal, false)?;
        let written = (crate::frame::HEADER_LEN + payload.len()) as u64;
        self.slots[reduce_id].bytes += written;
        Ok(written)
    }
}

impl<K, C> BucketDumper<K, C> for AppendBucketDumper<K, C>
where
    K: Serialize + DeserializeOwned + Marshalable,
    C: Serialize + DeserializeOwned + Marshalable,
{
    fn dump(&mut self, buckets: &mut [IndexMap<K, C>], is_final: bool) -> Result<(), TaskError> {
        for reduce_id in 0..buckets.len() {
            if buckets[reduce_id].is_empty() {
                continue;
            }
            let items: Vec<(K, C)> = buckets[reduce_id].drain(..).collect();
            let (payload, is_marshal) = encode_items(&items)?;
            let path = self.tmp_for(reduce_id, is_final, payload.len());
            log::debug!("dump {}", path.display());
            self.dump_bucket(reduce_id, &payload, is_marshal, &path)?;
        }
        self.num_dump += 1;
        Ok(())
    }

    fn commit(&mut self, _merge_combiners: &dyn Fn(C, C) -> C) -> Result<Vec<PathBuf>, TaskError> {
        let mut published = Vec::with_capacity(self.slots.len());
        for reduce_id in 0..self.slots.len() {
            if let Some(tmp) = self.slots[reduce_id].tmp_paths.last().cloned() {
                published.push(self.slots[reduce_id].workdir.export(&tmp)?);
            } else {
                // every reducer sees exactly one published file, including
                // reducers that got no input.
                let empty: Vec<(K, C)> = Vec::new();
                let (payload, is_marshal) = encode_items(&empty)?;
                let path = self.tmp_for(reduce_id, true, payload.len());
                self.dump_bucket(reduce_id, &payload, is_marshal, &path)?;
                published.push(self.slots[reduce_id].workdir.export(&path)?);
            }
        }
        Ok(published)
    }

    fn bytes_dumped(&self) -> u64 {
        self.slots.iter().map(|s| s.bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::read_frame;
    use crate::serialize::decode_items;
    use std::fs::File;

    fn bucket(items: &[(i32, i64)]) -> IndexMap<i32, i64> {
        items.iter().cloned().collect()
    }

    fn decode_published(path: &Path) -> Vec<(i32, i64)> {
        let mut file = File::open(path).unwrap();
        let mut all = Vec::new();
        while let Some((header, payload)) = read_frame(&mut file).unwrap() {
            let items: Vec<(i32, i64)> = decode_items(&payload, header.is_marshal).unwrap();
            all.extend(items);
        }
        all
    }

    #[test]
    fn three_reducer_combine_no_spill() {
        let dir = tempfile::tempdir().unwrap();
        let mut dumper: AppendBucketDumper<i32, i64> = AppendBucketDumper::new(1, 0, 3, dir.path());

        let mut buckets = vec![bucket(&[(0, 4)]), bucket(&[(1, 7)]), bucket(&[(2, 4)])];
        dumper.dump(&mut buckets, true).unwrap();
        let published = dumper.commit(&|a, b| a + b).unwrap();

        assert_eq!(decode_published(&published[0]), vec![(0, 4)]);
        assert_eq!(decode_published(&published[1]), vec![(1, 7)]);
        assert_eq!(decode_published(&published[2]), vec![(2, 4)]);
    }

    #[test]
    fn spill_preserves_sum_across_rotations() {
        // dump twice, then a final dump, all to the same reducer's file;
        // frames concatenate and the sum survives.
        let dir = tempfile::tempdir().unwrap();
        let mut dumper: AppendBucketDumper<i32, i64> = AppendBucketDumper::new(1, 0, 1, dir.path());

        let mut first = vec![bucket(&[(0, 1)])];
        dumper.dump(&mut first, false).unwrap();
        let mut second = vec![bucket(&[(0, 3)])];
        dumper.dump(&mut second, true).unwrap();

        let published = dumper.commit(&|a, b| a + b).unwrap();
        let decoded = decode_published(&published[0]);
        let total: i64 = decoded.iter().map(|(_, v)| *v).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn empty_reducer_gets_a_published_empty_bucket_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut dumper: AppendBucketDumper<i32, i64> = AppendBucketDumper::new(1, 0, 4, dir.path());

        let mut buckets = vec![bucket(&[(0, 3)]), bucket(&[]), bucket(&[]), bucket(&[])];
        dumper.dump(&mut buckets, true).unwrap();
        let published = dumper.commit(&|a, b| a + b).unwrap();

        assert_eq!(published.len(), 4);
        assert_eq!(decode_published(&published[0]), vec![(0, 3)]);
        for p in &published[1..] {
            assert!(decode_published(p).is_empty());
        }
    }

    #[test]
    fn stray_file_from_a_previous_attempt_is_removed_on_first_dump() {
        let dir = tempfile::tempdir().unwrap();
        let mut dumper: AppendBucketDumper<i32, i64> = AppendBucketDumper::new(1, 0, 1, dir.path());
        let stray_path = dumper.tmp_for(0, true, 0);
        fs::create_dir_all(stray_path.parent().unwrap()).unwrap();
        fs::write(&stray_path, b"garbage-from-a-dead-attempt").unwrap();

        let mut buckets = vec![bucket(&[(5, 9)])];
        dumper.dump(&mut buckets, true).unwrap();
        let published = dumper.commit(&|a, b| a + b).unwrap();
        assert_eq!(decode_published(&published[0]), vec![(5, 9)]);
    }
}
