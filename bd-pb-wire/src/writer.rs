// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

#[cfg(test)]
#[path = "./writer_test.rs"]
mod writer_test;

use crate::varint::{put_fixed32, put_fixed64, put_varint32, put_varint64, zigzag32, zigzag64};
use crate::wire_type::WireType;
use crate::{Error, Result};
use bytes::Bytes;

//
// Writer
//

/// An append-only wire-format byte buffer.
///
/// One method per scalar kind appends that kind's canonical bytes. Nested length-delimited
/// regions are written with [`Writer::fork`] / [`Writer::ldelim`]: fork marks the start of a
/// region, ldelim closes the most recent one by splicing in its length prefix. Every fork must be
/// closed before [`Writer::finish`].
#[derive(Debug, Default)]
pub struct Writer {
  buf: Vec<u8>,
  forks: Vec<usize>,
}

impl Writer {
  #[must_use]
  pub fn new() -> Self {
    Self::default()
  }

  /// Bytes written to the current region (the whole buffer when no fork is open).
  #[must_use]
  pub fn len(&self) -> usize {
    self.buf.len() - self.forks.last().copied().unwrap_or(0)
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Discards all written bytes and open forks.
  pub fn reset(&mut self) {
    self.buf.clear();
    self.forks.clear();
  }

  /// Appends a field tag: `(field_id << 3) | wire_type`.
  pub fn tag(&mut self, field_id: u32, wire_type: WireType) {
    put_varint32(&mut self.buf, (field_id << 3) | wire_type as u32);
  }

  pub fn int32(&mut self, v: i32) {
    // Negative int32 sign-extends to the full ten-byte varint.
    put_varint64(&mut self.buf, i64::from(v) as u64);
  }

  pub fn int64(&mut self, v: i64) {
    put_varint64(&mut self.buf, v as u64);
  }

  pub fn uint32(&mut self, v: u32) {
    put_varint32(&mut self.buf, v);
  }

  pub fn uint64(&mut self, v: u64) {
    put_varint64(&mut self.buf, v);
  }

  pub fn sint32(&mut self, v: i32) {
    put_varint32(&mut self.buf, zigzag32(v));
  }

  pub fn sint64(&mut self, v: i64) {
    put_varint64(&mut self.buf, zigzag64(v));
  }

  pub fn fixed32(&mut self, v: u32) {
    put_fixed32(&mut self.buf, v);
  }

  pub fn sfixed32(&mut self, v: i32) {
    put_fixed32(&mut self.buf, v as u32);
  }

  pub fn fixed64(&mut self, v: u64) {
    put_fixed64(&mut self.buf, v);
  }

  pub fn sfixed64(&mut self, v: i64) {
    put_fixed64(&mut self.buf, v as u64);
  }

  pub fn float(&mut self, v: f32) {
    put_fixed32(&mut self.buf, v.to_bits());
  }

  pub fn double(&mut self, v: f64) {
    put_fixed64(&mut self.buf, v.to_bits());
  }

  pub fn bool(&mut self, v: bool) {
    self.buf.push(u8::from(v));
  }

  pub fn string(&mut self, v: &str) {
    self.bytes(v.as_bytes());
  }

  pub fn bytes(&mut self, v: &[u8]) {
    put_varint64(&mut self.buf, v.len() as u64);
    self.buf.extend_from_slice(v);
  }

  /// Opens a nested length-delimited region. The region's bytes are captured until the matching
  /// [`Writer::ldelim`] prefixes them with their varint length.
  pub fn fork(&mut self) {
    self.forks.push(self.buf.len());
  }

  /// Closes the most recent fork.
  ///
  /// # Errors
  /// Returns `Error::NoOpenFork` if no fork is open.
  pub fn ldelim(&mut self) -> Result<()> {
    let start = self.forks.pop().ok_or(Error::NoOpenFork)?;
    let mut header = [0_u8; 10];
    let header_len = put_varint64(&mut header.as_mut_slice(), (self.buf.len() - start) as u64);
    // Splice the length prefix in front of the captured region.
    self.buf.extend_from_slice(&header[.. header_len]);
    self.buf[start ..].rotate_right(header_len);
    Ok(())
  }

  /// Returns the finished buffer.
  ///
  /// # Errors
  /// Returns `Error::UnclosedForks` if any fork is still open.
  pub fn finish(self) -> Result<Bytes> {
    if !self.forks.is_empty() {
      return Err(Error::UnclosedForks(self.forks.len()));
    }
    Ok(self.buf.into())
  }
}
