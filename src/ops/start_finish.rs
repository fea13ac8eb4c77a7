//! Boundary operators for the forward/backward recursions.

use crate::tensor::Tensor;

/// Forward initialization: the whole peptide is intact before cycle 0, so
/// all probability mass starts at the corner cell `[0, max_0, ..., max_C]`
/// (every dye still attached, zero Edman cycles completed).
pub struct Start;

impl Start {
    pub fn forward(&self, tensor: &mut Tensor) {
        tensor.fill(0.0);
        let corner: Vec<usize> = tensor
            .shape
            .iter()
            .enumerate()
            .map(|(axis, &len)| if axis == 0 { 0 } else { len - 1 })
            .collect();
        *tensor.get_mut(&corner) = 1.0;
    }
}

/// Backward initialization: every terminal state is an accepting state, so
/// the final backward tensor is uniformly 1.
pub struct Finish;

impl Finish {
    pub fn backward(&self, tensor: &mut Tensor) {
        tensor.fill(1.0);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn start_places_unit_mass_at_corner() {
        let mut t = Tensor::new(vec![3, 2, 4]);
        Start.forward(&mut t);
        assert_eq!(t.get(&[0, 1, 3]), 1.0);
        assert_eq!(t.sum(), 1.0);
    }

    #[test]
    fn finish_is_uniformly_one() {
        let mut t = Tensor::new(vec![2, 2]);
        Finish.backward(&mut t);
        assert!(t.values.iter().all(|&v| v == 1.0));
    }
}
