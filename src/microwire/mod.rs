/// Microwire protocol for 93Cx6 serial EEPROMs (e.g. Microchip 93C46B, a
/// 1-kbit EEPROM organized as 64 x 16bit), bit-banged over GPIO lines.
///
/// There are separate pins for data IN and OUT (named from the EEPROM's point
/// of view: we drive DI and sample DO), a CLOCK and a CHIP SELECT pin. A fifth
/// line keeps the board carrying the EEPROM in programming mode while we own
/// the bus.
///
/// Instructions:
/// - Startbit: "1"
/// - 2-bit Opcode
/// - Address (6 bits for 93C46 in x16 organization)
///
/// Some instructions have a DATA phase following (either send or recv) with
/// one word ("page") of data.
///
/// Opcodes: (@ address)
/// - 0b11: ERASE at address (set all bits to "1")
/// - 0b00 @ 0b00????: EWDS (erase/write disable), no DATA
/// - 0b00 @ 0b01????: WRAL (write all), DATA
/// - 0b00 @ 0b10????: ERAL (erase all), no DATA
/// - 0b00 @ 0b11????: EWEN (erase/write enable), no DATA
/// - 0b10: READ word from address, recv DATA (prefixed by a dummy "0" bit)
/// - 0b01: WRITE word to address, send DATA
///
/// There is no acknowledge in this protocol: programming instructions are
/// followed by a fixed wait instead of polling the READY/BUSY status.

mod low_level;
mod operations;
mod session;

pub use self::low_level::{
	Lines,
	ProgramTransaction,
	Transaction,
};

pub use self::operations::{
	Programming,
	Reader,
};

pub use self::session::{
	Eeprom,
	with_eeprom,
};

pub(crate) mod consts {
	pub const START_BIT: u32 = 0b100;

	pub const OPCODE_CONTROL: u8 = 0b00;
	pub const OPCODE_WRITE: u8 = 0b01;
	pub const OPCODE_READ: u8 = 0b10;
	pub const OPCODE_ERASE: u8 = 0b11;

	// top two address bits for OPCODE_CONTROL
	pub const CONTROL_ERASE_WRITE_DISABLE: u32 = 0b00;
	pub const CONTROL_WRITE_ALL: u32 = 0b01;
	pub const CONTROL_ERASE_ALL: u32 = 0b10;
	pub const CONTROL_ERASE_WRITE_ENABLE: u32 = 0b11;
}

/// Roles of the lines, bound to backend specific pin identifiers.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct PinBinding<P> {
	pub chip_select: P,
	pub clock: P,
	/// EEPROM data input, driven by us
	pub data_in: P,
	/// EEPROM data output, sampled by us
	pub data_out: P,
	/// held low while the driver is open
	pub program_enable: P,
}

impl<P: Copy> PinBinding<P> {
	pub fn all(&self) -> [P; 5] {
		[self.chip_select, self.clock, self.data_in, self.data_out, self.program_enable]
	}
}

/// Word size and address width; has to match the physical device, nothing
/// checks it does.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Geometry {
	page_size: u8,
	address_width: u8,
}

impl Geometry {
	/// 93C46 in x16 organization (ORG high): 64 words of 16 bits
	pub const C46_X16: Geometry = Geometry { page_size: 16, address_width: 6 };
	/// 93C46 in x8 organization (ORG low): 128 words of 8 bits
	pub const C46_X8: Geometry = Geometry { page_size: 8, address_width: 7 };
	/// 93C66 in x16 organization: 256 words of 16 bits
	pub const C66_X16: Geometry = Geometry { page_size: 16, address_width: 8 };
	/// 93C86 in x16 organization: 1024 words of 16 bits
	pub const C86_X16: Geometry = Geometry { page_size: 16, address_width: 10 };

	pub fn new(page_size: u8, address_width: u8) -> Self {
		// words are handled as u16; control instructions need two address bits
		assert!(page_size >= 1 && page_size <= 16, "page size must be 1..=16 bits");
		assert!(address_width >= 2 && address_width <= 16, "address width must be 2..=16 bits");
		Geometry { page_size, address_width }
	}

	pub fn page_size(&self) -> u32 {
		self.page_size.into()
	}

	pub fn address_width(&self) -> u32 {
		self.address_width.into()
	}

	pub fn word_mask(&self) -> u32 {
		(1u32 << self.page_size) - 1
	}

	pub fn address_mask(&self) -> u32 {
		(1u32 << self.address_width) - 1
	}

	/// number of words in the device
	pub fn words(&self) -> usize {
		1usize << self.address_width
	}

	// control instructions put their sub-code into the top two address bits
	pub(crate) fn control_address(&self, code: u32) -> u32 {
		code << (self.address_width - 2)
	}
}

impl Default for Geometry {
	fn default() -> Self {
		Geometry::C46_X16
	}
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Timing {
	/// half of the clock period in microseconds
	pub half_clock_us: u32,
	/// wait after programming instructions (write, erase, ...) in milliseconds
	pub write_cycle_ms: u32,
}

impl Default for Timing {
	fn default() -> Self {
		Timing {
			half_clock_us: 20,
			write_cycle_ms: 250,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn geometry_presets() {
		let g = Geometry::C46_X16;
		assert_eq!(g, Geometry::new(16, 6));
		assert_eq!(g.words(), 64);
		assert_eq!(g.word_mask(), 0xffff);
		assert_eq!(g.address_mask(), 0x3f);

		let g = Geometry::C46_X8;
		assert_eq!(g.words(), 128);
		assert_eq!(g.word_mask(), 0xff);
	}

	#[test]
	fn control_address_uses_top_bits() {
		use super::consts::*;

		let g = Geometry::C46_X16;
		assert_eq!(g.control_address(CONTROL_ERASE_WRITE_ENABLE), 0b11_0000);
		assert_eq!(g.control_address(CONTROL_ERASE_ALL), 0b10_0000);
		assert_eq!(g.control_address(CONTROL_WRITE_ALL), 0b01_0000);
		assert_eq!(g.control_address(CONTROL_ERASE_WRITE_DISABLE), 0);

		let g = Geometry::C86_X16;
		assert_eq!(g.control_address(CONTROL_ERASE_WRITE_ENABLE), 0b11_0000_0000);
	}

	#[test]
	#[should_panic]
	fn geometry_rejects_wide_pages() {
		Geometry::new(17, 6);
	}

	#[test]
	fn default_timing() {
		let t = Timing::default();
		assert_eq!(t.half_clock_us, 20);
		assert_eq!(t.write_cycle_ms, 250);
	}
}
