//! Classification engines for assigning an observed radiometry to the most
//! likely candidate peptide.
//!
//! Grounded in `original_source/cc_code/src/classifiers/{hmm-classifier,
//! nn-classifier,hybrid-classifier}.{h,cc}`.

pub mod hmm;
pub mod hybrid;
pub mod nn;

pub use hmm::HmmClassifier;
pub use hybrid::HybridClassifier;
pub use nn::NnClassifier;
