// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines
//!
//! - [`photo`]: snapshot burn-in and encoding

pub mod photo;
