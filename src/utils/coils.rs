//! Random coil selections for exercising a device

use rand::{seq::index::sample, Rng};

/// Pick between 1 and `max_coils` distinct coil addresses below `max_coils`.
pub fn gen_coillist<R: Rng>(rng: &mut R, max_coils: u16) -> Vec<u16> {
    if max_coils == 0 {
        return Vec::new();
    }
    let amount = rng.random_range(1..=max_coils as usize);
    sample(rng, max_coils as usize, amount)
        .into_iter()
        .map(|coil| coil as u16)
        .collect()
}

/// Every coil address of a bank, `[0, 1, .., num_coils - 1]`.
pub fn all_coils(num_coils: u16) -> Vec<u16> {
    (0..num_coils).collect()
}
