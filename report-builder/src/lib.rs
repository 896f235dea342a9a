// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconstruct structured test reports from a stream of test events.
//!
//! A [`ReportBuilder`] is driven by calling one method per event, in the order the events
//! occurred. Tests and benchmarks accumulate in a window until a package boundary is reached,
//! at which point the window is flushed into an immutable [`Package`]. Output lines that are not
//! addressed to a test are attributed to the most recently created or ended test.
//!
//! Events can also be replayed from their JSON-lines form through [`ReportEvent`].

mod builder;
pub mod config;
mod diagnostics;
pub mod errors;
mod events;
mod report;

pub use builder::*;
pub use config::{BenchmarkOutput, BuilderConfig};
pub use diagnostics::*;
pub use events::*;
pub use report::*;
