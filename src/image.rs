//! Whole-device images on top of the (open-loop) EEPROM operations.
//!
//! Image files are raw words, each stored big-endian in as many bytes as the
//! page size needs (two bytes for 16-bit words).

use std::fs;
use std::path::Path;

use crate::gpio::Gpio;
use crate::microwire::{
	Eeprom,
	Geometry,
};

fn bytes_per_word(geometry: Geometry) -> usize {
	((geometry.page_size() + 7) / 8) as usize
}

pub fn words_from_bytes(data: &[u8], geometry: Geometry) -> crate::AResult<Vec<u16>> {
	let width = bytes_per_word(geometry);
	ensure!(0 == data.len() % width,
		"Image size {} is not a multiple of the word size ({} bytes)", data.len(), width
	);
	let words = data.len() / width;
	ensure!(words <= geometry.words(),
		"Image has {} words, device only {}", words, geometry.words()
	);

	let mut result = Vec::with_capacity(words);
	for (address, chunk) in data.chunks(width).enumerate() {
		let word = chunk.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
		ensure!(word & !geometry.word_mask() == 0,
			"Word 0x{:04x} at {:02x} doesn't fit into {} bits", word, address, geometry.page_size()
		);
		result.push(word as u16);
	}
	Ok(result)
}

pub fn words_to_bytes(words: &[u16], geometry: Geometry) -> Vec<u8> {
	let width = bytes_per_word(geometry);
	let mut result = Vec::with_capacity(words.len() * width);
	for word in words {
		for i in (0..width).rev() {
			result.push((word >> (8 * i)) as u8);
		}
	}
	result
}

pub fn read_image_file<P: AsRef<Path>>(path: P, geometry: Geometry) -> crate::AResult<Vec<u16>> {
	let path = path.as_ref();
	with_context!(("reading image {}", path.display()), {
		let data = fs::read(path)?;
		words_from_bytes(&data, geometry)
	})
}

pub fn dump<G: Gpio>(eeprom: &mut Eeprom<G>) -> Vec<u16> {
	eeprom.read_all().collect()
}

/// Compare the start of the device with `image`.
pub fn verify<G: Gpio>(eeprom: &mut Eeprom<G>, image: &[u16]) -> crate::AResult<()> {
	ensure!(image.len() <= eeprom.geometry().words(),
		"Image has {} words, device only {}", image.len(), eeprom.geometry().words()
	);
	for (address, (expected, word)) in image.iter().zip(eeprom.read_all()).enumerate() {
		ensure!(*expected == word,
			"Verify failed at {:02x}: expected {:04x}, eeprom is {:04x}", address, expected, word
		);
	}
	Ok(())
}

/// Write `image` starting at address 0 and read it back.
///
/// With `erase_all` the remaining words get erased too; otherwise they keep
/// their content.
pub fn program<G: Gpio>(eeprom: &mut Eeprom<G>, image: &[u16], erase_all: bool) -> crate::AResult<()> {
	ensure!(image.len() <= eeprom.geometry().words(),
		"Image has {} words, device only {}", image.len(), eeprom.geometry().words()
	);
	{
		let mut prog = eeprom.programming();
		if erase_all {
			prog.erase_all();
		}
		for (address, word) in image.iter().enumerate() {
			prog.write(address as u16, *word);
		}
	}
	info!("Wrote {} words, verifying", image.len());
	verify(eeprom, image)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gpio::sim::Simulator;
	use crate::microwire::{
		PinBinding,
		Timing,
	};

	const PINS: PinBinding<u32> = PinBinding {
		chip_select: 8,
		clock: 11,
		data_in: 10,
		data_out: 9,
		program_enable: 25,
	};

	#[test]
	fn words_from_big_endian_bytes() {
		let words = words_from_bytes(&[0x95, 0x05, 0x84, 0xff], Geometry::C46_X16).unwrap();
		assert_eq!(words, vec![0x9505, 0x84ff]);
		assert_eq!(words_to_bytes(&words, Geometry::C46_X16), vec![0x95, 0x05, 0x84, 0xff]);

		let words = words_from_bytes(&[0x12, 0x34], Geometry::C46_X8).unwrap();
		assert_eq!(words, vec![0x12, 0x34]);
	}

	#[test]
	fn words_from_bytes_rejects_bad_sizes() {
		assert!(words_from_bytes(&[0x01, 0x02, 0x03], Geometry::C46_X16).is_err());
		assert!(words_from_bytes(&[0u8; 130], Geometry::C46_X16).is_err());
		assert!(words_from_bytes(&[0u8; 128], Geometry::C46_X16).is_ok());
		// 12-bit words still take two bytes each
		assert!(words_from_bytes(&[0x10, 0x00], Geometry::new(12, 6)).is_err());
	}

	#[test]
	fn program_and_verify() {
		let image: [u16; 8] = [0x9505, 0x84ff, 0x85ff, 0x86ff, 0x9e0f, 0x1f00, 0x8001, 0x0000];
		let mut sim = Simulator::new(PINS, Geometry::C46_X16);
		sim.chip_mut().set_word(20, 0x1234);
		{
			let mut ee = Eeprom::open(&mut sim, PINS, Geometry::C46_X16, Timing::default());
			program(&mut ee, &image, false).unwrap();
			let words = dump(&mut ee);
			assert_eq!(&words[..image.len()], &image[..]);
			assert_eq!(words[20], 0x1234);
		}
		assert!(!sim.chip().is_write_enabled());

		{
			let mut ee = Eeprom::open(&mut sim, PINS, Geometry::C46_X16, Timing::default());
			program(&mut ee, &image[..2], true).unwrap();
		}
		assert_eq!(&sim.chip().memory()[..2], &image[..2]);
		assert!(sim.chip().memory()[2..].iter().all(|w| *w == 0xffff));
	}

	#[test]
	fn verify_reports_mismatch() {
		let mut sim = Simulator::new(PINS, Geometry::C46_X16);
		sim.chip_mut().set_word(1, 0xdead);
		let mut ee = Eeprom::open(&mut sim, PINS, Geometry::C46_X16, Timing::default());
		let err = verify(&mut ee, &[0xffff, 0xbeef]).unwrap_err();
		assert!(err.to_string().contains("Verify failed at 01"));
	}
}
