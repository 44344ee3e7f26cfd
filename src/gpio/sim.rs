//! Simulated GPIO lines with a 93Cx6 device model attached.
//!
//! Every call is recorded as an `Event`; delays are recorded but don't sleep.
//! Reads of the DO line are answered from a script first (if one was pushed)
//! and from the device model afterwards.

use std::collections::{
	HashMap,
	VecDeque,
};

use super::{
	Direction,
	Gpio,
	Level,
};

use crate::microwire::{
	Geometry,
	PinBinding,
	consts::*,
};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Event {
	Direction(u32, Direction),
	Write(u32, Level),
	Read(u32, Level),
	DelayUs(u32),
	DelayMs(u32),
}

/// Line state at a rising clock edge.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ClockedBit {
	pub chip_select: Level,
	pub data_in: Level,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum ChipState {
	// waiting for the start bit
	Idle,
	Opcode { opcode: u8, count: u32 },
	Address { opcode: u8, address: u32, count: u32 },
	Data { opcode: u8, address: u32, data: u32, count: u32 },
	Output { address: u32, bit: u32 },
	// instruction complete, ignoring clocks until CS drops
	Complete,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Pending {
	None,
	Enable,
	Disable,
	Write { address: u32, data: u32 },
	Erase { address: u32 },
	EraseAll,
	WriteAll { data: u32 },
}

/// Behavioral model of a Microwire EEPROM; programming instructions take
/// effect when CS drops, and only while erase/write is enabled (which it isn't
/// after power up).
#[derive(Clone, Debug)]
pub struct SimulatedChip {
	geometry: Geometry,
	memory: Vec<u16>,
	write_enabled: bool,
	selected: bool,
	state: ChipState,
	pending: Pending,
	output: Level,
}

impl SimulatedChip {
	pub fn new(geometry: Geometry) -> Self {
		SimulatedChip {
			geometry,
			memory: vec![geometry.word_mask() as u16; geometry.words()],
			write_enabled: false,
			selected: false,
			state: ChipState::Idle,
			pending: Pending::None,
			output: Level::High,
		}
	}

	pub fn memory(&self) -> &[u16] {
		&self.memory
	}

	pub fn word(&self, address: u16) -> u16 {
		self.memory[usize::from(address)]
	}

	pub fn set_word(&mut self, address: u16, word: u16) {
		self.memory[usize::from(address)] = word & self.geometry.word_mask() as u16;
	}

	pub fn is_write_enabled(&self) -> bool {
		self.write_enabled
	}

	/// Level the device drives on DO; "high" when it doesn't drive it (pull-up).
	pub fn output(&self) -> Level {
		self.output
	}

	pub fn select(&mut self, level: Level) {
		let selected = level.is_high();
		if self.selected && !selected {
			self.commit();
		}
		if !self.selected && selected {
			self.state = ChipState::Idle;
			self.pending = Pending::None;
		}
		self.selected = selected;
		self.output = Level::High;
	}

	/// Rising clock edge with `data_in` on DI.
	pub fn clock(&mut self, data_in: Level) {
		if !self.selected {
			return;
		}
		let bit = data_in.is_high() as u32;
		let address_width = self.geometry.address_width();
		let page_size = self.geometry.page_size();

		self.state = match self.state {
			ChipState::Idle => {
				if 0 != bit {
					ChipState::Opcode { opcode: 0, count: 0 }
				} else {
					ChipState::Idle
				}
			},
			ChipState::Opcode { opcode, count } => {
				let opcode = (opcode << 1) | bit as u8;
				if count + 1 == 2 {
					ChipState::Address { opcode, address: 0, count: 0 }
				} else {
					ChipState::Opcode { opcode, count: count + 1 }
				}
			},
			ChipState::Address { opcode, address, count } => {
				let address = (address << 1) | bit;
				if count + 1 == address_width {
					self.decode(opcode, address)
				} else {
					ChipState::Address { opcode, address, count: count + 1 }
				}
			},
			ChipState::Data { opcode, address, data, count } => {
				let data = (data << 1) | bit;
				if count + 1 == page_size {
					self.pending = if opcode == OPCODE_WRITE {
						Pending::Write { address, data }
					} else {
						Pending::WriteAll { data }
					};
					ChipState::Complete
				} else {
					ChipState::Data { opcode, address, data, count: count + 1 }
				}
			},
			ChipState::Output { address, bit: index } => {
				// DI is "don't care" while reading
				let word = u32::from(self.memory[address as usize]);
				self.output = Level::from(0 != word & (1 << index));
				if 0 == index {
					let next = (address + 1) % self.geometry.words() as u32;
					ChipState::Output { address: next, bit: page_size - 1 }
				} else {
					ChipState::Output { address, bit: index - 1 }
				}
			},
			ChipState::Complete => ChipState::Complete,
		};
	}

	// address phase complete
	fn decode(&mut self, opcode: u8, address: u32) -> ChipState {
		match opcode {
			OPCODE_READ => {
				// dummy zero, data follows with the next clock
				self.output = Level::Low;
				ChipState::Output { address, bit: self.geometry.page_size() - 1 }
			},
			OPCODE_WRITE => ChipState::Data { opcode, address, data: 0, count: 0 },
			OPCODE_ERASE => {
				self.pending = Pending::Erase { address };
				ChipState::Complete
			},
			_ => {
				let code = address >> (self.geometry.address_width() - 2);
				match code {
					CONTROL_ERASE_WRITE_ENABLE => self.pending = Pending::Enable,
					CONTROL_ERASE_WRITE_DISABLE => self.pending = Pending::Disable,
					CONTROL_ERASE_ALL => self.pending = Pending::EraseAll,
					_ => return ChipState::Data { opcode, address, data: 0, count: 0 },
				}
				ChipState::Complete
			},
		}
	}

	fn commit(&mut self) {
		let pending = self.pending;
		self.pending = Pending::None;
		let erased = self.geometry.word_mask() as u16;
		match pending {
			Pending::None => (),
			Pending::Enable => self.write_enabled = true,
			Pending::Disable => self.write_enabled = false,
			_ if !self.write_enabled => (),
			Pending::Write { address, data } => self.memory[address as usize] = data as u16,
			Pending::Erase { address } => self.memory[address as usize] = erased,
			Pending::EraseAll => {
				for w in self.memory.iter_mut() {
					*w = erased;
				}
			},
			Pending::WriteAll { data } => {
				for w in self.memory.iter_mut() {
					*w = data as u16;
				}
			},
		}
	}
}

pub struct Simulator {
	pins: PinBinding<u32>,
	levels: HashMap<u32, Level>,
	directions: HashMap<u32, Direction>,
	events: Vec<Event>,
	clocked: Vec<ClockedBit>,
	script: VecDeque<Level>,
	chip: SimulatedChip,
}

impl Simulator {
	pub fn new(pins: PinBinding<u32>, geometry: Geometry) -> Self {
		Simulator {
			pins,
			levels: HashMap::new(),
			directions: HashMap::new(),
			events: Vec::new(),
			clocked: Vec::new(),
			script: VecDeque::new(),
			chip: SimulatedChip::new(geometry),
		}
	}

	pub fn events(&self) -> &[Event] {
		&self.events
	}

	pub fn clocked(&self) -> &[ClockedBit] {
		&self.clocked
	}

	/// last level written to `pin`
	pub fn level(&self, pin: u32) -> Option<Level> {
		self.levels.get(&pin).cloned()
	}

	pub fn direction(&self, pin: u32) -> Option<Direction> {
		self.directions.get(&pin).cloned()
	}

	/// Levels to return for the next DO reads, instead of the device output.
	pub fn push_script<I: IntoIterator<Item = Level>>(&mut self, levels: I) {
		self.script.extend(levels);
	}

	pub fn chip(&self) -> &SimulatedChip {
		&self.chip
	}

	pub fn chip_mut(&mut self) -> &mut SimulatedChip {
		&mut self.chip
	}

	fn current(&self, pin: u32) -> Level {
		self.level(pin).unwrap_or(Level::Low)
	}
}

impl Gpio for Simulator {
	type Pin = u32;

	fn set_direction(&mut self, pin: u32, direction: Direction) {
		self.events.push(Event::Direction(pin, direction));
		self.directions.insert(pin, direction);
	}

	fn write_level(&mut self, pin: u32, level: Level) {
		self.events.push(Event::Write(pin, level));
		let previous = self.levels.insert(pin, level);

		if pin == self.pins.chip_select {
			self.chip.select(level);
		} else if pin == self.pins.clock && level == Level::High && previous != Some(Level::High) {
			let bit = ClockedBit {
				chip_select: self.current(self.pins.chip_select),
				data_in: self.current(self.pins.data_in),
			};
			self.clocked.push(bit);
			self.chip.clock(bit.data_in);
		}
	}

	fn read_level(&mut self, pin: u32) -> Level {
		let level = if pin == self.pins.data_out {
			match self.script.pop_front() {
				Some(level) => level,
				None => self.chip.output(),
			}
		} else {
			self.current(pin)
		};
		self.events.push(Event::Read(pin, level));
		level
	}

	fn delay_us(&mut self, us: u32) {
		self.events.push(Event::DelayUs(us));
	}

	fn delay_ms(&mut self, ms: u32) {
		self.events.push(Event::DelayMs(ms));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn clock_in(chip: &mut SimulatedChip, bits: &str) -> Vec<Level> {
		let mut out = Vec::new();
		for c in bits.chars().filter(|c| *c != '_') {
			out.push(chip.output());
			chip.clock(Level::from(c == '1'));
		}
		out
	}

	#[test]
	fn chip_ignores_clock_without_select() {
		let mut chip = SimulatedChip::new(Geometry::C46_X16);
		clock_in(&mut chip, "1_00_111111");
		chip.select(Level::Low);
		assert!(!chip.is_write_enabled());
	}

	#[test]
	fn chip_enable_write_read() {
		let mut chip = SimulatedChip::new(Geometry::C46_X16);
		chip.select(Level::High);
		clock_in(&mut chip, "1_00_110000");
		chip.select(Level::Low);
		assert!(chip.is_write_enabled());

		chip.select(Level::High);
		clock_in(&mut chip, "1_01_000011_1010101111001101");
		chip.select(Level::Low);
		assert_eq!(chip.word(3), 0xabcd);

		chip.select(Level::High);
		clock_in(&mut chip, "1_10_000011");
		let out = clock_in(&mut chip, "00000000000000000");
		chip.select(Level::Low);
		let value = out.iter().fold(0u32, |acc, l| (acc << 1) | l.is_high() as u32);
		assert_eq!(value, 0xabcd);
		assert_eq!(chip.output(), Level::High);
	}

	#[test]
	fn chip_leading_zeros_before_start_bit() {
		let mut chip = SimulatedChip::new(Geometry::C46_X16);
		chip.select(Level::High);
		clock_in(&mut chip, "000_1_00_111111");
		chip.select(Level::Low);
		assert!(chip.is_write_enabled());
	}

	#[test]
	fn simulator_records_clock_edges_once() {
		let pins = PinBinding { chip_select: 0, clock: 1, data_in: 2, data_out: 3, program_enable: 4 };
		let mut sim = Simulator::new(pins, Geometry::C46_X16);
		sim.write_level(1, Level::High);
		sim.write_level(1, Level::High);
		sim.write_level(1, Level::Low);
		sim.write_level(1, Level::High);
		assert_eq!(sim.clocked().len(), 2);
		assert_eq!(sim.events().len(), 4);
	}
}
