//! Conversion between bytes and the bit sequences the bus master works on.
//!
//! Bits are always ordered MSB first: the first bit of a group of 8 is the
//! most significant bit of the byte.

/// bits of `byte`, starting with the highest bit
pub fn from_byte(byte: u8) -> [bool; 8] {
	let mut result = [false; 8];
	for (i, bit) in result.iter_mut().enumerate() {
		*bit = 0 != byte & (0x80 >> i);
	}
	result
}

pub fn from_bytes(bytes: &[u8]) -> Vec<bool> {
	let mut result = Vec::with_capacity(bytes.len() * 8);
	for &byte in bytes {
		result.extend_from_slice(&from_byte(byte));
	}
	result
}

/// `bits` must not be longer than 8; missing low bits are zero.
pub fn to_byte(bits: &[bool]) -> u8 {
	assert!(bits.len() <= 8);
	let mut result = 0u8;
	for (i, &bit) in bits.iter().enumerate() {
		if bit {
			result |= 0x80 >> i;
		}
	}
	result
}

// a trailing group shorter than 8 bits becomes the high bits of the last byte
pub fn to_bytes(bits: &[bool]) -> Vec<u8> {
	bits.chunks(8).map(to_byte).collect()
}

/// `num` lowest bits from `word`, starting with highest bit
pub fn from_word(word: u32, num: usize) -> Vec<bool> {
	assert!(num <= 32);
	(0..num).rev().map(|bit| 0 != word & (1u32 << bit)).collect()
}

#[cfg(test)]
mod test {
	use super::*;

	const READ: [bool; 8] = [false, false, false, false, false, false, true, true];

	#[test]
	fn msb_first() {
		assert_eq!(from_byte(0x03), READ);
		assert_eq!(to_byte(&READ), 0x03);
		assert_eq!(to_byte(&[true]), 0x80);
		assert_eq!(to_byte(&[true, false, true, false, false, false, false, false]), 0xa0);
	}

	#[test]
	fn unpack_pack_is_identity() {
		for byte in 0..=255u8 {
			let bits = from_byte(byte);
			assert_eq!(to_byte(&bits), byte);
			assert_eq!(from_byte(to_byte(&bits)), bits);
		}
	}

	#[test]
	fn pack_sequences() {
		assert_eq!(to_bytes(&[]), Vec::<u8>::new());
		assert_eq!(to_bytes(&from_bytes(&[0xde, 0xad, 0xbe, 0xef])), vec![0xde, 0xad, 0xbe, 0xef]);
		// trailing partial group
		let mut bits = from_byte(0x12).to_vec();
		bits.extend_from_slice(&[true, true]);
		assert_eq!(to_bytes(&bits), vec![0x12, 0xc0]);
	}

	#[test]
	fn word_bits() {
		assert_eq!(from_word(0x0102, 16), from_bytes(&[0x01, 0x02]));
		assert_eq!(from_word(0b101, 3), vec![true, false, true]);
		assert!(from_word(0xffff, 0).is_empty());
	}
}
