//! Edman degradation transition.
//!
//! `original_source/cc_code/src/hmm/edman-transition.{h,cc}` indexes its
//! plane shift differently from the layout used here, so only its general
//! shape is followed (plane-to-plane shift gated by a per-dye-sequence-
//! position channel lookup); the forward recursion below is verified by hand
//! against a worked failure/success example (see the unit tests). Backward
//! is the transpose of the forward redistribution, the same convention
//! `binomial.rs` uses.

use crate::fit::ParameterFitter;
use crate::model::{DyeSeq, DyeTrack};
use crate::tensor::Tensor;

/// Attempts one cleavage cycle: with probability `p_edman_failure` the
/// attempt fails (state stays on plane `e` forever after); otherwise the
/// N-terminal residue's channel (if any) loses one dye and mass moves to
/// plane `e + 1`.
#[derive(Debug, Clone, Copy)]
pub struct Edman {
    pub p_edman_failure: f64,
}

impl Edman {
    pub fn new(p_edman_failure: f64) -> Self {
        Edman { p_edman_failure }
    }

    pub fn forward(
        &self,
        dye_seq: &DyeSeq,
        dye_track: &DyeTrack,
        edmans: usize,
        input: &Tensor,
        output: &mut Tensor,
    ) {
        let e = edmans;
        let stride0 = input.strides[0];
        let plane_e = e * stride0;
        let plane_e1 = (e + 1) * stride0;
        let p_fail = self.p_edman_failure;
        let p_pop = 1.0 - p_fail;

        for i in 0..stride0 {
            output.values[plane_e + i] = p_fail * input.values[plane_e + i];
        }

        let channel = dye_seq.get(e);
        let dye_count = if channel >= 0 {
            dye_track.get(e, channel as usize)
        } else {
            0
        };

        if channel < 0 || dye_count == 0 {
            for i in 0..stride0 {
                output.values[plane_e1 + i] = p_pop * input.values[plane_e + i];
            }
            return;
        }

        let c = channel as usize;
        let d = dye_count as f64;
        let axis = 1 + c;
        let stride = input.strides[axis];
        let length = input.shape[axis];
        let outer_stride = stride * length;
        let mut outer = 0;
        while outer < stride0 {
            for inner in 0..stride {
                let base = plane_e + outer + inner;
                let base_out = plane_e1 + outer + inner;
                for j in 0..length {
                    let in_j = input.values[base + j * stride];
                    let mut v = (d - j as f64) / d * in_j;
                    if j + 1 < length {
                        let in_j1 = input.values[base + (j + 1) * stride];
                        v += (j as f64 + 1.0) / d * in_j1;
                    }
                    output.values[base_out + j * stride] = p_pop * v;
                }
            }
            outer += outer_stride;
        }
    }

    pub fn backward(
        &self,
        dye_seq: &DyeSeq,
        dye_track: &DyeTrack,
        edmans: usize,
        next_backward: &Tensor,
        output: &mut Tensor,
    ) {
        let e = edmans;
        let stride0 = next_backward.strides[0];
        let plane_e = e * stride0;
        let plane_e1 = (e + 1) * stride0;
        let p_fail = self.p_edman_failure;
        let p_pop = 1.0 - p_fail;

        let channel = dye_seq.get(e);
        let dye_count = if channel >= 0 {
            dye_track.get(e, channel as usize)
        } else {
            0
        };

        if channel < 0 || dye_count == 0 {
            for i in 0..stride0 {
                output.values[plane_e + i] =
                    p_fail * next_backward.values[plane_e + i] + p_pop * next_backward.values[plane_e1 + i];
            }
            return;
        }

        let c = channel as usize;
        let d = dye_count as f64;
        let axis = 1 + c;
        let stride = next_backward.strides[axis];
        let length = next_backward.shape[axis];
        let outer_stride = stride * length;
        let mut outer = 0;
        while outer < stride0 {
            for inner in 0..stride {
                let base = plane_e + outer + inner;
                let base_next = plane_e1 + outer + inner;
                for i in 0..length {
                    let bw_i = next_backward.values[base_next + i * stride];
                    let mut v = (d - i as f64) / d * bw_i;
                    if i > 0 {
                        let bw_im1 = next_backward.values[base_next + (i - 1) * stride];
                        v += (i as f64) / d * bw_im1;
                    }
                    output.values[base + i * stride] =
                        p_fail * next_backward.values[base + i * stride] + p_pop * v;
                }
            }
            outer += outer_stride;
        }
    }

    /// Expected-failure accumulation, same single-opportunity-per-cycle
    /// convention as [`crate::ops::detach::Detach::improve_fit`].
    pub fn improve_fit(
        &self,
        edmans: usize,
        forward: &Tensor,
        next_backward: &Tensor,
        probability: f64,
        fit: &mut ParameterFitter,
    ) {
        let stride0 = forward.strides[0];
        let plane_e = edmans * stride0;
        let mut events = 0.0;
        for i in 0..stride0 {
            events += forward.values[plane_e + i] * self.p_edman_failure * next_backward.values[plane_e + i];
        }
        fit.add(events / probability, 1.0);
    }
}
