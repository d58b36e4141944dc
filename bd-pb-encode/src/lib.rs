// shared-core - bitdrift's common client/server libraries
// Copyright Bitdrift, Inc. All rights reserved.
//
// Use of this source code is governed by a source available license that can be found in the
// LICENSE file or at:
// https://polyformproject.org/wp-content/uploads/2020/06/PolyForm-Shield-1.0.0.txt

pub mod encoder;
pub mod plan;

#[cfg(test)]
pub(crate) mod test;

pub use crate::encoder::encode;
pub use crate::plan::CompiledEncoders;

#[derive(thiserror::Error, Debug)]
pub enum Error {
  #[error("value of field '{0}' is not encodable: {1}")]
  Encode(String, String),

  #[error("schema is not resolved; call resolve_all first")]
  Unresolved,

  #[error("A wire writer error occurred: {0}")]
  Wire(#[from] bd_pb_wire::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
