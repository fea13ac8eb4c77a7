//! `dyetrace`: probabilistic identification of which peptide produced an
//! observed fluorosequencing trace.
//!
//! The core is a forward-algorithm HMM evaluator, a weighted-approximate-kNN
//! pre-classifier, a hybrid of the two, a simulator, and an EM parameter
//! fitter, operating over the domain types in [`model`]. File I/O and CLI
//! dispatch live in [`io`] and the sibling `dyetrace-cli` crate, respectively.

pub mod classify;
pub mod error;
pub mod fit;
pub mod fitter;
pub mod hmm;
pub mod io;
pub mod kdtree;
pub mod model;
pub mod ops;
pub mod precompute;
pub mod rng;
pub mod simulate;
pub mod tensor;
pub mod utils;

pub use error::{Error, Result};
