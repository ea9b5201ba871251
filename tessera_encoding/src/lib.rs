// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Path contours, transforms and tessellation patch encoding.
//!
//! This crate holds everything Tessera needs to turn path geometry into fixed-topology GPU
//! patches without knowing anything about pipelines or command lists.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![allow(missing_docs, reason = "We have many as-yet undocumented items.")]
#![allow(
    missing_debug_implementations,
    clippy::cast_possible_truncation,
    clippy::missing_assert_message,
    reason = "Deferred"
)]

mod contour;
mod fixed_count;
pub mod math;
mod patch;
mod path;
pub mod wangs_formula;

pub use contour::{ContourIter, MidpointContourParser};
pub use fixed_count::FixedCountWedges;
pub use math::{Transform, TransformType};
pub use patch::{patch_stride, PatchAttribs, PatchWriter};
pub use path::{Path, PathIter, Verb};
pub use wangs_formula::VectorXform;

/// Re-export of the geometry crate used in the public API.
pub use peniko::kurbo;
