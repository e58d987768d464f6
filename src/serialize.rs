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

//! Serialization backends.
//!
//! Two concerns live here:
//!
//! - **Bucket payload codec** used by append mode: a compact, fast encoding
//!   for "marshalable" value graphs (self-describing primitives and their
//!   containers), falling back to a general encoding for everything else.
//!   `bincode` covers the marshalable path (schema-less, fixed layout,
//!   fast) and `rmp-serde` (MessagePack) covers the general path
//!   (self-describing, handles anything `Serialize` produces).
//! - **Stream serializer** used by sort-merge mode: a self-delimiting
//!   length-prefixed stream of `(k, v)` pairs, read incrementally so a
//!   k-way merge never has to materialize a whole spill file.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Marker trait: types whose encoding is "self-describing primitives and
/// their containers". No blanket impl is provided on purpose — a generic
/// `K`/`C` used with `ShuffleMapTask` must opt in (`impl Marshalable for
/// MyType {}` is enough to take the default `false`, or override
/// `IS_MARSHALABLE` to `true`) rather than have the choice inferred from
/// runtime structure.
pub trait Marshalable {
    const IS_MARSHALABLE: bool = false;
}

macro_rules! impl_marshalable_primitive {
    ($($t:ty),* $(,)?) => {
        $(impl Marshalable for $t { const IS_MARSHALABLE: bool = true; })*
    };
}
impl_marshalable_primitive!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char, String);

impl<T: Marshalable> Marshalable for Vec<T> {
    const IS_MARSHALABLE: bool = T::IS_MARSHALABLE;
}
impl<T: Marshalable> Marshalable for Option<T> {
    const IS_MARSHALABLE: bool = T::IS_MARSHALABLE;
}
impl<A: Marshalable, B: Marshalable> Marshalable for (A, B) {
    const IS_MARSHALABLE: bool = A::IS_MARSHALABLE && B::IS_MARSHALABLE;
}

/// Encodes a bucket's `(k, combined_v)` pairs, choosing the codec
/// according to `K`/`C`'s `Marshalable` bit, then compresses the result
/// with a single symmetric codec.
pub fn encode_items<K, C>(items: &[(K, C)]) -> io::Result<(Vec<u8>, bool)>
where
    K: Serialize + Marshalable,
    C: Serialize + Marshalable,
{
    let is_marshal = K::IS_MARSHALABLE && C::IS_MARSHALABLE;
    let encoded = if is_marshal {
        bincode::serialize(items).map_err(to_io_err)?
    } else {
        rmp_serde::to_vec(items).map_err(to_io_err)?
    };
    let compressed = zstd::stream::encode_all(&encoded[..], 1)?;
    Ok((compressed, is_marshal))
}

/// Inverse of `encode_items`, dispatching on the header's `is_marshal` bit
/// the way a reader must: each frame decodes independently, so a reader
/// can concatenate frames and recover the original bucket contents.
pub fn decode_items<K, C>(compressed: &[u8], is_marshal: bool) -> io::Result<Vec<(K, C)>>
where
    K: DeserializeOwned,
    C: DeserializeOwned,
{
    let encoded = zstd::stream::decode_all(compressed)?;
    if is_marshal {
        bincode::deserialize(&encoded).map_err(to_io_err)
    } else {
        rmp_serde::from_slice(&encoded).map_err(to_io_err)
    }
}

fn to_io_err<E: std::fmt::Display>(e: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

/// Writes a self-delimiting stream of `(k, v)` pairs: each entry is a u32
/// length prefix followed by its bincode-encoded bytes. `dump_stream`
/// does not sort — callers (the sort-merge dumper) are expected to hand it
/// items already in the desired order.
pub fn dump_stream<W, K, V>(items: impl Iterator<Item = (K, V)>, mut sink: W) -> io::Result<()>
where
    W: Write,
    K: Serialize,
    V: Serialize,
{
    for item in items {
        let encoded = bincode::serialize(&item).map_err(to_io_err)?;
        sink.write_all(&(encoded.len() as u32).to_le_bytes())?;
        sink.write_all(&encoded)?;
    }
    Ok(())
}

/// Reads a stream written by `dump_stream`, yielding one `(k, v)` pair at a
/// time without buffering the whole stream in memory.
pub struct StreamReader<R, K, V> {
    source: R,
    _marker: std::marker::PhantomData<(K, V)>,
}

impl<R: Read, K: DeserializeOwned, V: DeserializeOwned> StreamReader<R, K, V> {
    pub fn new(source: R) -> Self {
        StreamReader { source, _marker: std::marker::PhantomData }
    }
}

impl<R: Read, K: DeserializeOwned, V: DeserializeOwned> Iterator for StreamReader<R, K, V> {
    type Item = io::Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut len_buf = [0u8; 4];
        match self.source.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => return None,
            Err(e) => return Some(Err(e)),
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        if let Err(e) = self.source.read_exact(&mut buf) {
            return Some(Err(e));
        }
        match bincode::deserialize::<(K, V)>(&buf) {
            Ok(item) => Some(Ok(item)),
            Err(e) => Some(Err(to_io_err(e))),
        }
    }
}

pub fn load_stream<R, K, V>(source: R) -> StreamReader<R, K, V>
where
    R: Read,
    K: DeserializeOwned,
    V: DeserializeOwned,
{
    StreamReader::new(source)
}
