// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./varint_test.rs"]
mod varint_test;

use bytes::BufMut;

/// Appends a base-128 varint in little-endian group order. Returns the number of bytes written
/// (1 to 10).
pub fn put_varint64<B: BufMut>(dst: &mut B, mut v: u64) -> usize {
  let mut written = 0;
  while v >= 0x80 {
    dst.put_u8((v & 0x7f) as u8 | 0x80);
    v >>= 7;
    written += 1;
  }
  dst.put_u8(v as u8);
  written + 1
}

/// Appends a 32-bit varint. Never sign-extends; use [`put_varint64`] with a sign-extended value
/// for negative int32.
pub fn put_varint32<B: BufMut>(dst: &mut B, v: u32) -> usize {
  put_varint64(dst, u64::from(v))
}

/// The number of bytes [`put_varint64`] would write for `v`.
#[must_use]
pub const fn varint64_len(v: u64) -> usize {
  // 64 bits pack into ceil(bits / 7) groups; zero still takes one byte.
  let bits = 64 - (v | 1).leading_zeros() as usize;
  bits.div_ceil(7)
}

/// Zig-zag maps signed to unsigned so that small magnitudes stay small on the wire.
#[must_use]
pub const fn zigzag32(v: i32) -> u32 {
  ((v << 1) ^ (v >> 31)) as u32
}

#[must_use]
pub const fn zigzag64(v: i64) -> u64 {
  ((v << 1) ^ (v >> 63)) as u64
}

/// Appends a fixed-width 32-bit little-endian value.
pub fn put_fixed32<B: BufMut>(dst: &mut B, v: u32) {
  dst.put_u32_le(v);
}

/// Appends a fixed-width 64-bit little-endian value.
pub fn put_fixed64<B: BufMut>(dst: &mut B, v: u64) {
  dst.put_u64_le(v);
}
