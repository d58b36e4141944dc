// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

use crate::wire_type::WireType;
use crate::writer::Writer;
use crate::Error;
use pretty_assertions::assert_eq;

fn finished(writer: Writer) -> Vec<u8> {
  writer.finish().unwrap().to_vec()
}

#[test]
fn scalar_primitives_are_canonical() {
  let mut writer = Writer::new();
  writer.uint32(150);
  assert_eq!(finished(writer), vec![0x96, 0x01]);

  let mut writer = Writer::new();
  writer.int32(-1);
  assert_eq!(
    finished(writer),
    vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]
  );

  let mut writer = Writer::new();
  writer.sint32(-1);
  assert_eq!(finished(writer), vec![0x01]);

  let mut writer = Writer::new();
  writer.bool(true);
  writer.bool(false);
  assert_eq!(finished(writer), vec![0x01, 0x00]);

  let mut writer = Writer::new();
  writer.fixed32(1);
  assert_eq!(finished(writer), vec![0x01, 0x00, 0x00, 0x00]);

  let mut writer = Writer::new();
  writer.double(1.0);
  assert_eq!(finished(writer), vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xf0, 0x3f]);

  let mut writer = Writer::new();
  writer.float(1.0);
  assert_eq!(finished(writer), vec![0x00, 0x00, 0x80, 0x3f]);
}

#[test]
fn strings_and_bytes_are_length_prefixed() {
  let mut writer = Writer::new();
  writer.string("hi");
  assert_eq!(finished(writer), vec![0x02, 0x68, 0x69]);

  let mut writer = Writer::new();
  writer.bytes(&[]);
  assert_eq!(finished(writer), vec![0x00]);
}

#[test]
fn tag_packs_id_and_wire_type() {
  let mut writer = Writer::new();
  writer.tag(1, WireType::Varint);
  writer.tag(2, WireType::LengthDelimited);
  writer.tag(3, WireType::Fixed32);
  assert_eq!(finished(writer), vec![0x08, 0x12, 0x1d]);

  // Field ids above 15 spill the tag into a second varint byte.
  let mut writer = Writer::new();
  writer.tag(16, WireType::Varint);
  assert_eq!(finished(writer), vec![0x80, 0x01]);
}

#[test]
fn fork_ldelim_prefixes_the_region_length() {
  let mut writer = Writer::new();
  writer.tag(1, WireType::LengthDelimited);
  writer.fork();
  writer.uint32(1);
  writer.uint32(2);
  writer.uint32(150);
  writer.ldelim().unwrap();
  assert_eq!(finished(writer), vec![0x0a, 0x04, 0x01, 0x02, 0x96, 0x01]);
}

#[test]
fn forks_nest() {
  let mut writer = Writer::new();
  writer.fork();
  writer.tag(1, WireType::LengthDelimited);
  writer.fork();
  writer.string("a");
  writer.ldelim().unwrap();
  writer.ldelim().unwrap();
  // Inner region: tag + len-prefixed "a" (4 bytes), outer prefixes the lot.
  assert_eq!(finished(writer), vec![0x05, 0x0a, 0x03, 0x01, 0x61]);
}

#[test]
fn empty_fork_writes_a_zero_length() {
  let mut writer = Writer::new();
  writer.fork();
  writer.ldelim().unwrap();
  assert_eq!(finished(writer), vec![0x00]);
}

#[test]
fn len_tracks_the_current_region() {
  let mut writer = Writer::new();
  writer.uint32(1);
  assert_eq!(writer.len(), 1);
  writer.fork();
  assert_eq!(writer.len(), 0);
  writer.uint32(150);
  assert_eq!(writer.len(), 2);
  writer.ldelim().unwrap();
  assert_eq!(writer.len(), 4);
}

#[test]
fn reset_clears_bytes_and_forks() {
  let mut writer = Writer::new();
  writer.fork();
  writer.uint32(1);
  writer.reset();
  assert!(writer.is_empty());
  assert_eq!(finished(writer), Vec::<u8>::new());
}

#[test]
fn unbalanced_brackets_are_errors() {
  let mut writer = Writer::new();
  assert!(matches!(writer.ldelim(), Err(Error::NoOpenFork)));

  let mut writer = Writer::new();
  writer.fork();
  assert!(matches!(writer.finish(), Err(Error::UnclosedForks(1))));
}
