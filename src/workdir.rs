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

//! Work-dir allocator.
//!
//! An addressable slot on local disk for one `(shuffle_id, map_id,
//! reduce_id)` output. Mints unique temporaries and atomically publishes
//! one into the slot's final location.
//!
//! `mem_first`/`datasize` are treated as advisory only: try the
//! memory-backed directory if one was configured and the hint looks small
//! enough to fit a single page-cache-friendly file, otherwise (or on any
//! I/O failure) fall back to the disk directory. No further policy is
//! invented beyond that.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

/// Above this many bytes we never try the memory-backed directory, even if
/// one is configured — an advisory cutoff, not a protocol-mandated one.
const MEM_BACKED_HINT_CEILING: u64 = 8 * 1024 * 1024;

pub struct ShuffleWorkDir {
    shuffle_id: u64,
    map_id: usize,
    reduce_id: usize,
    disk_dir: PathBuf,
    mem_dir: Option<PathBuf>,
}

impl ShuffleWorkDir {
    pub fn new(shuffle_id: u64, map_id: usize, reduce_id: usize, disk_dir: impl Into<PathBuf>) -> Self {
        ShuffleWorkDir {
            shuffle_id,
            map_id,
            reduce_id,
            disk_dir: disk_dir.into(),
            mem_dir: None,
        }
    }

    /// Configures a memory-backed directory (e.g. a tmpfs mount) that
    /// `alloc_tmp(mem_first = true, ..)` may use when the size hint is
    /// small.
    pub fn with_mem_dir(mut self, mem_dir: impl Into<PathBuf>) -> Self {
        self.mem_dir = Some(mem_dir.into());
        self
    }

    /// Allocates a fresh, uniquely-named temporary path. `mem_first`
    /// requests (but does not guarantee) a memory-backed location;
    /// `datasize` is an optional advisory size hint.
    pub fn alloc_tmp(&self, mem_first: bool, datasize: Option<u64>) -> io::Result<PathBuf> {
        if mem_first {
            if let Some(mem_dir) = &self.mem_dir {
                let fits = datasize.map(|n| n <= MEM_BACKED_HINT_CEILING).unwrap_or(true);
                if fits {
                    if let Ok(path) = self.alloc_in(mem_dir) {
                        return Ok(path);
                    }
                    // fall through to disk on any failure (ambiguity note above)
                }
            }
        }
        self.alloc_in(&self.disk_dir)
    }

    /// A deterministic, reducer-scoped path that the append-mode dumper
    /// opens in append mode and reuses across rotations instead of minting
    /// a new name each time. Because the name is deterministic rather than
    /// randomly generated, a stray file can genuinely be left behind by a
    /// previous attempt of the same task; append mode is responsible for
    /// detecting and removing it on the first dump.
    pub fn deterministic_tmp_path(&self, mem_first: bool) -> PathBuf {
        let dir = match (mem_first, &self.mem_dir) {
            (true, Some(mem_dir)) => mem_dir.as_path(),
            _ => self.disk_dir.as_path(),
        };
        dir.join(format!("shuffle_{}_{}_{}.tmp", self.shuffle_id, self.map_id, self.reduce_id))
    }

    fn alloc_in(&self, dir: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let file = NamedTempFile::new_in(dir)?;
        // keep_preserves the path on disk (not auto-deleted on drop) so the
        // dumper can close and reopen it across rotations.
        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(path)
    }

    /// Atomically publishes `tmp` as this slot's final file, overwriting
    /// any previous output.
    pub fn export(&self, tmp: &Path) -> io::Result<PathBuf> {
        let dest = self.final_path();
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(tmp, &dest)?;
        Ok(dest)
    }

    pub fn final_path(&self) -> PathBuf {
        self.disk_dir.join(format!(
            "shuffle_{}_{}_{}.data",
            self.shuffle_id, self.map_id, self.reduce_id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_publishes_tmp_to_the_final_slot() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = ShuffleWorkDir::new(1, 0, 3, dir.path());
        let tmp = workdir.alloc_tmp(false, None).unwrap();
        fs::write(&tmp, b"hello").unwrap();

        let published = workdir.export(&tmp).unwrap();
        assert_eq!(published, workdir.final_path());
        assert_eq!(fs::read(&published).unwrap(), b"hello");
    }

    #[test]
    fn falls_back_to_disk_when_no_mem_dir_configured() {
        let dir = tempfile::tempdir().unwrap();
        let workdir = ShuffleWorkDir::new(1, 0, 0, dir.path());
        let tmp = workdir.alloc_tmp(true, Some(10)).unwrap();
        assert!(tmp.starts_with(dir.path()));
    }
}
