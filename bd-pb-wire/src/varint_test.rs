// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::varint::{put_varint64, varint64_len, zigzag32, zigzag64};
use pretty_assertions::assert_eq;

fn varint_bytes(v: u64) -> Vec<u8> {
  let mut buffer = Vec::new();
  let written = put_varint64(&mut buffer, v);
  assert_eq!(written, buffer.len());
  assert_eq!(written, varint64_len(v));
  buffer
}

#[test]
fn single_byte_varints() {
  assert_eq!(varint_bytes(0), vec![0x00]);
  assert_eq!(varint_bytes(1), vec![0x01]);
  assert_eq!(varint_bytes(127), vec![0x7f]);
}

#[test]
fn multi_byte_varints() {
  // The canonical example from the encoding docs: 150 -> 96 01.
  assert_eq!(varint_bytes(150), vec![0x96, 0x01]);
  assert_eq!(varint_bytes(300), vec![0xac, 0x02]);
  assert_eq!(varint_bytes(16_383), vec![0xff, 0x7f]);
  assert_eq!(varint_bytes(16_384), vec![0x80, 0x80, 0x01]);
}

#[test]
fn max_width_varints() {
  assert_eq!(
    varint_bytes(u64::MAX),
    vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]
  );
  // A sign-extended negative int32/int64 always takes the full ten bytes.
  assert_eq!(varint_bytes(-1_i64 as u64).len(), 10);
}

#[test]
fn varint_len_boundaries() {
  for width in 1 ..= 9 {
    let boundary = 1_u64 << (7 * width);
    assert_eq!(varint64_len(boundary - 1), width);
    assert_eq!(varint64_len(boundary), width + 1);
  }
}

#[test]
fn zigzag_maps_small_magnitudes_to_small_values() {
  assert_eq!(zigzag32(0), 0);
  assert_eq!(zigzag32(-1), 1);
  assert_eq!(zigzag32(1), 2);
  assert_eq!(zigzag32(-2), 3);
  assert_eq!(zigzag32(i32::MAX), u32::MAX - 1);
  assert_eq!(zigzag32(i32::MIN), u32::MAX);

  assert_eq!(zigzag64(0), 0);
  assert_eq!(zigzag64(-1), 1);
  assert_eq!(zigzag64(i64::MAX), u64::MAX - 1);
  assert_eq!(zigzag64(i64::MIN), u64::MAX);
}
