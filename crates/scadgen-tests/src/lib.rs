//! scadgen End-to-End Test Infrastructure
//!
//! This crate drives the generation pipeline against in-process fakes:
//!
//! - a renderer that writes placeholder artifacts (and real 3MF packages)
//!   and tracks how many calls overlap,
//! - a command executor that records command lines and fails on request.
//!
//! No OpenSCAD or ImageMagick installation is needed.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p scadgen-tests
//! ```

pub mod harness;
