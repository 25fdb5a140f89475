// Copyright 2026 the Glifo Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integration test suite for `glifo`.
//!
//! The default per-file harness is replaced by this single entry point so
//! the topic modules can share the utilities in [`util`]: a deterministic
//! test font, a handle registry that plays both transport roles and a
//! small software compositor for comparing rendered output.
//!
//! Cache-only behavior lives in [`cache`]; everything that crosses the
//! process boundary lives in [`remote`].

#![allow(missing_docs, reason = "we don't need docs for testing")]
#![allow(
    clippy::cast_possible_truncation,
    reason = "not critical for testing"
)]

mod util;
