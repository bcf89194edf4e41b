//! Weighted caching-router designation.
//!
//! Every router an Interest passes through competes for being the place the
//! answer gets cached. A router's bid is a name-dependent hash scaled by its
//! weight relative to the best bid carried so far.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_ccnsim_common::ndn::Name;
use rust_ccnsim_common::types::NodeId;

const ALPHABET: &[u8] = b"1234567890qwertyuioplkjhgfdsazxcvbnmQWERTYUIOPLKJHGFDSAZXCVBNM";

/// Length of the per-node salt mixed into the hash.
pub const SALT_LENGTH: usize = 10;

/// Deterministic alphanumeric string of `len` characters for `seed`.
pub fn generate_random_string(seed: u64, len: usize) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn hash_string_to_num(s: &str) -> f64 {
    let mut ret: u32 = 31;
    for &c in s.as_bytes() {
        ret = ret.wrapping_mul(54059) ^ (c as u32).wrapping_mul(76963);
    }
    ret as f64
}

/// Salt for `node`, computed once at registration.
pub fn node_salt(node: NodeId) -> String {
    generate_random_string(node.0 as u64, SALT_LENGTH)
}

/// Hash of a router for a given chunk name.
pub fn router_hash(salt: &str, name: &Name) -> f64 {
    let mut input = String::with_capacity(salt.len() + 32);
    input.push_str(salt);
    input.push_str(&name.trim_last().to_path());
    hash_string_to_num(&input)
}

/// `capacity / (ln(links) + 0.5)`; zero for an unconnected node.
pub fn node_weight(capacity: i64, links: usize) -> f64 {
    if links == 0 {
        return 0.0;
    }
    capacity as f64 / ((links as f64).ln() + 0.5)
}

/// True when the challenger (`hash2`, `weight2`) outbids the carried
/// candidate (`hash1`, `weight1`).
pub fn outbids(hash1: f64, weight1: f64, hash2: f64, weight2: f64) -> bool {
    let (alpha1, alpha2) = if weight1 < weight2 {
        (2.0 * weight1 / (weight1 + weight2), 1.0)
    } else {
        (1.0, 2.0 * weight2 / (weight1 + weight2))
    };
    alpha2 * hash2 > alpha1 * hash1
}
