// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

pub mod varint;
pub mod wire_type;
pub mod writer;

pub use crate::wire_type::{ScalarKind, WireType};
pub use crate::writer::Writer;

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("ldelim called with no open fork")]
  NoOpenFork,

  #[error("finish called with {0} unclosed fork(s)")]
  UnclosedForks(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
