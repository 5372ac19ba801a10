use std::{collections::HashMap, hash::BuildHasherDefault};

use hashers::fnv::FNV1aHasher64;

pub(crate) fn hash_map<K, V>() -> HashMap<K, V, BuildHasherDefault<FNV1aHasher64>> {
	HashMap::default()
}

pub(crate) type HashM<K, V> = HashMap<K, V, BuildHasherDefault<FNV1aHasher64>>;

/// Parse a synthesizer binary-digit parameter string ("00101") into a value.
/// Undefined digits count as zero.
pub(crate) fn from_bin_str(s: &str) -> u64 {
	let mut acc = 0u64;
	for c in s.chars() {
		acc <<= 1;
		if c == '1' {
			acc |= 1;
		}
	}
	acc
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bin_str() {
		assert_eq!(from_bin_str("0"), 0);
		assert_eq!(from_bin_str("1"), 1);
		assert_eq!(from_bin_str("00001010"), 10);
		assert_eq!(from_bin_str("x1x1"), 5);
		assert_eq!(from_bin_str(""), 0);
	}
}
