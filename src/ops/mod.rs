//! The closed `Step` sum type and its forward/backward/fit dispatch.
//!
//! Replaces the original's virtual `Step` base class
//! (`original_source/cc_code/src/hmm/step.h` and its five subclasses) with an
//! enum over borrowed operator references: the
//! operators themselves (below) own no per-call state, so an `Hmm` can build
//! a pipeline of `Step`s that borrow shared precomputations for the span of
//! one `classify` call instead of each allocating its own copy.

pub mod binomial;
pub mod detach;
pub mod edman;
pub mod emission;
pub mod start_finish;

pub use binomial::Binomial;
pub use detach::Detach;
pub use edman::Edman;
pub use emission::{DistributionKind, Emission};
pub use start_finish::{Finish, Start};

use crate::model::{DyeSeq, DyeTrack, Radiometry};
use crate::tensor::Tensor;

/// One stage of an HMM pipeline. `Start` and `Finish` are the forward/
/// backward boundary initializers and carry no per-call fit; the remaining
/// variants are the transition operators.
pub enum Step<'a> {
    Start,
    Dud(&'a Binomial),
    Bleach(&'a Binomial),
    Edman {
        edman: &'a Edman,
        dye_seq: &'a DyeSeq,
        dye_track: &'a DyeTrack,
    },
    Detach(&'a Detach),
    Emission {
        emission: &'a Emission,
        t: usize,
        radiometry: &'a Radiometry,
    },
    Finish,
}

impl<'a> Step<'a> {
    /// Runs this step's forward transform. `edmans` is the number of Edman
    /// cycles completed so far, i.e. the live-plane bound *before* this step
    /// runs (an `Edman` step itself writes one plane further than it reads).
    pub fn forward(&self, edmans: usize, input: &Tensor, output: &mut Tensor) {
        match self {
            Step::Start => Start.forward(output),
            Step::Dud(b) | Step::Bleach(b) => b.forward(edmans, input, output),
            Step::Edman {
                edman,
                dye_seq,
                dye_track,
            } => edman.forward(dye_seq, dye_track, edmans, input, output),
            Step::Detach(d) => d.forward(edmans, input, output),
            Step::Emission { emission, t, .. } => emission.forward(*t, edmans, input, output),
            Step::Finish => output.values.copy_from_slice(&input.values),
        }
    }

    /// Runs this step's backward transform, reading `next_backward` (the
    /// backward tensor computed one stage later in the pipeline) and writing
    /// this stage's backward tensor.
    pub fn backward(&self, edmans: usize, next_backward: &Tensor, output: &mut Tensor) {
        match self {
            Step::Start => output.values.copy_from_slice(&next_backward.values),
            Step::Dud(b) | Step::Bleach(b) => b.backward(edmans, next_backward, output),
            Step::Edman {
                edman,
                dye_seq,
                dye_track,
            } => edman.backward(dye_seq, dye_track, edmans, next_backward, output),
            Step::Detach(d) => d.backward(edmans, next_backward, output),
            Step::Emission { emission, t, .. } => emission.backward(*t, edmans, next_backward, output),
            Step::Finish => Finish.backward(output),
        }
    }
}
