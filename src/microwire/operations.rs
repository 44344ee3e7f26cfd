use std::ops::{
	Deref,
	DerefMut,
};

use crate::gpio::Gpio;

use super::{
	Eeprom,
	Transaction,
	consts::*,
};

/// Sequential read; the device keeps incrementing the address as long as we
/// keep clocking.
pub struct Reader<'a, G: Gpio + 'a> {
	remaining: usize,
	// the first word is prefixed by the dummy zero bit
	bits: u32,
	page_size: u32,
	word_mask: u32,
	transaction: Transaction<'a, G>,
}

impl<'a, G: Gpio> Iterator for Reader<'a, G> {
	type Item = u16;

	fn next(&mut self) -> Option<Self::Item> {
		if 0 == self.remaining {
			return None;
		}
		self.remaining -= 1;
		let word = self.transaction.transfer(0, self.bits) & self.word_mask;
		self.bits = self.page_size;
		Some(word as u16)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		(self.remaining, Some(self.remaining))
	}
}

impl<'a, G: Gpio> ExactSizeIterator for Reader<'a, G> {
}

impl<G: Gpio> Eeprom<G> {
	/// Read one word.
	///
	/// The device answers with a dummy "0" bit before the data; it is clocked
	/// in together with the data and masked away.
	pub fn read(&mut self, address: u16) -> u16 {
		let geometry = self.geometry;
		let mut tx = self.lines.begin_transaction(OPCODE_READ);
		tx.transfer(address.into(), geometry.address_width());
		let raw = tx.transfer(0, geometry.page_size() + 1);
		drop(tx);

		let word = (raw & geometry.word_mask()) as u16;
		debug!("read @{:02x}: {:04x}", address, word);
		word
	}

	/// Read all words, starting at address 0.
	pub fn read_all(&mut self) -> Reader<G> {
		let geometry = self.geometry;
		debug!("read all {} words", geometry.words());
		let mut transaction = self.lines.begin_transaction(OPCODE_READ);
		transaction.transfer(0, geometry.address_width());

		Reader {
			remaining: geometry.words(),
			bits: geometry.page_size() + 1,
			page_size: geometry.page_size(),
			word_mask: geometry.word_mask(),
			transaction,
		}
	}

	/// EWEN: address bits all ones
	pub fn write_enable(&mut self) {
		debug!("erase/write enable");
		let geometry = self.geometry;
		let mut tx = self.lines.begin_transaction(OPCODE_CONTROL);
		tx.transfer(geometry.control_address(CONTROL_ERASE_WRITE_ENABLE), geometry.address_width());
	}

	/// EWDS: address bits all zeroes
	pub fn write_disable(&mut self) {
		debug!("erase/write disable");
		let geometry = self.geometry;
		let mut tx = self.lines.begin_transaction(OPCODE_CONTROL);
		tx.transfer(geometry.control_address(CONTROL_ERASE_WRITE_DISABLE), geometry.address_width());
	}

	/// Needs a previous `write_enable`; nothing tells whether the device
	/// accepted the data, read it back if that matters.
	pub fn write(&mut self, address: u16, word: u16) {
		debug!("write @{:02x}: {:04x}", address, word);
		let geometry = self.geometry;
		let mut tx = self.lines.begin_program_transaction(OPCODE_WRITE);
		tx.transfer(address.into(), geometry.address_width());
		tx.transfer(word.into(), geometry.page_size());
	}

	/// Set all bits of the word at `address` to "1".
	pub fn erase(&mut self, address: u16) {
		debug!("erase @{:02x}", address);
		let geometry = self.geometry;
		let mut tx = self.lines.begin_program_transaction(OPCODE_ERASE);
		tx.transfer(address.into(), geometry.address_width());
	}

	pub fn erase_all(&mut self) {
		debug!("erase all");
		let geometry = self.geometry;
		let mut tx = self.lines.begin_program_transaction(OPCODE_CONTROL);
		tx.transfer(geometry.control_address(CONTROL_ERASE_ALL), geometry.address_width());
	}

	// write one word into all addresses
	pub fn write_all(&mut self, word: u16) {
		debug!("write all: {:04x}", word);
		let geometry = self.geometry;
		let mut tx = self.lines.begin_program_transaction(OPCODE_CONTROL);
		tx.transfer(geometry.control_address(CONTROL_WRITE_ALL), geometry.address_width());
		tx.transfer(word.into(), geometry.page_size());
	}

	/// Enable erase/write until the returned guard is dropped.
	pub fn programming(&mut self) -> Programming<G> {
		self.write_enable();
		Programming(self)
	}
}

pub struct Programming<'a, G: Gpio + 'a>(&'a mut Eeprom<G>);

impl<'a, G: Gpio> Drop for Programming<'a, G> {
	fn drop(&mut self) {
		self.0.write_disable();
	}
}

impl<'a, G: Gpio> Deref for Programming<'a, G> {
	type Target = Eeprom<G>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a, G: Gpio> DerefMut for Programming<'a, G> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}
