use std::ops::{
	Deref,
	DerefMut,
};

use crate::gpio::{
	Direction,
	Gpio,
	Level,
};

use super::{
	PinBinding,
	Timing,
	consts::START_BIT,
};

/// The five lines of one device, plus the timing to drive them with.
pub struct Lines<G: Gpio> {
	gpio: G,
	pins: PinBinding<G::Pin>,
	timing: Timing,
}

impl<G: Gpio> Lines<G> {
	pub(super) fn new(gpio: G, pins: PinBinding<G::Pin>, timing: Timing) -> Self {
		Lines {
			gpio,
			pins,
			timing,
		}
	}

	pub fn pins(&self) -> &PinBinding<G::Pin> {
		&self.pins
	}

	pub fn timing(&self) -> Timing {
		self.timing
	}

	pub fn gpio(&self) -> &G {
		&self.gpio
	}

	fn set(&mut self, pin: G::Pin, level: Level) {
		self.gpio.write_level(pin, level);
	}

	fn half_clock(&mut self) {
		let us = self.timing.half_clock_us;
		self.gpio.delay_us(us);
	}

	// CLK up, wait half a cycle, CLK down
	fn pulse_clock(&mut self) {
		let clock = self.pins.clock;
		self.set(clock, Level::High);
		self.half_clock();
		self.set(clock, Level::Low);
	}

	// outputs are driven low before they get switched to output; the
	// program enable line too, which puts the board into programming mode.
	pub(super) fn claim(&mut self) {
		let pins = self.pins;
		for &pin in &[pins.chip_select, pins.clock, pins.data_in] {
			self.set(pin, Level::Low);
			self.gpio.set_direction(pin, Direction::Output);
		}
		self.gpio.set_direction(pins.data_out, Direction::Input);

		self.set(pins.program_enable, Level::Low);
		self.gpio.set_direction(pins.program_enable, Direction::Output);
	}

	// turn everything into inputs; the board leaves programming mode
	pub(super) fn release(&mut self) {
		let pins = self.pins;
		for &pin in &pins.all() {
			self.gpio.set_direction(pin, Direction::Input);
		}
	}

	/// Send the `bits` lowest bits of `value`, starting with the highest bit,
	/// and return the bits sampled from DO meanwhile.
	///
	/// DO is sampled before each rising CLK edge, i.e. the bit the device put
	/// out after the previous edge. DI is left low afterwards.
	pub fn transfer(&mut self, value: u32, bits: u32) -> u32 {
		let pins = self.pins;
		let mut result = 0u32;
		for bit in (0..bits).rev() {
			let bit_mask = 1u32 << bit;
			if self.gpio.read_level(pins.data_out).is_high() {
				result |= bit_mask;
			}
			self.set(pins.data_in, Level::from(0 != value & bit_mask));
			self.half_clock();
			self.pulse_clock();
		}
		self.set(pins.data_in, Level::Low);
		result
	}

	// the device wants a single clock pulse with CS low before CS goes up.
	// CS is raised afterwards and start bit + opcode are sent.
	fn start_instruction(&mut self, opcode: u8) {
		let pins = self.pins;
		self.pulse_clock();
		self.set(pins.chip_select, Level::High);
		self.set(pins.data_in, Level::High);
		trace!("Microwire instruction: opcode {:02b}", opcode);
		self.transfer(START_BIT | u32::from(opcode), 3);
	}

	// CS down ends the instruction
	fn finish_instruction(&mut self) {
		let chip_select = self.pins.chip_select;
		self.set(chip_select, Level::Low);
	}

	pub fn begin_transaction(&mut self, opcode: u8) -> Transaction<G> {
		self.start_instruction(opcode);

		Transaction(self)
	}

	/// Like `begin_transaction`, but waits for the write cycle after CS
	/// dropped.
	pub fn begin_program_transaction(&mut self, opcode: u8) -> ProgramTransaction<G> {
		self.start_instruction(opcode);

		ProgramTransaction(self)
	}
}

/// One instruction with CS held high; CS drops when this goes out of scope.
pub struct Transaction<'a, G: Gpio + 'a>(&'a mut Lines<G>);

impl<'a, G: Gpio> Drop for Transaction<'a, G> {
	fn drop(&mut self) {
		self.0.finish_instruction();
	}
}

impl<'a, G: Gpio> Deref for Transaction<'a, G> {
	type Target = Lines<G>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a, G: Gpio> DerefMut for Transaction<'a, G> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

/// Instruction which makes the device program its cells after CS dropped; we
/// can't see when it's done, so wait the fixed write cycle time.
pub struct ProgramTransaction<'a, G: Gpio + 'a>(&'a mut Lines<G>);

impl<'a, G: Gpio> Drop for ProgramTransaction<'a, G> {
	fn drop(&mut self) {
		self.0.finish_instruction();
		let ms = self.0.timing.write_cycle_ms;
		self.0.gpio.delay_ms(ms);
	}
}

impl<'a, G: Gpio> Deref for ProgramTransaction<'a, G> {
	type Target = Lines<G>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a, G: Gpio> DerefMut for ProgramTransaction<'a, G> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gpio::sim::{
		Event,
		Simulator,
	};
	use crate::microwire::Geometry;

	const PINS: PinBinding<u32> = PinBinding {
		chip_select: 1,
		clock: 2,
		data_in: 3,
		data_out: 4,
		program_enable: 5,
	};

	fn lines(sim: &mut Simulator) -> Lines<&mut Simulator> {
		Lines::new(sim, PINS, Timing::default())
	}

	#[test]
	fn transfer_msb_first() {
		let mut sim = Simulator::new(PINS, Geometry::C46_X16);
		sim.push_script(vec![Level::Low; 3]);
		lines(&mut sim).transfer(0b101, 3);

		assert_eq!(sim.clocked().len(), 3);
		let bits: Vec<Level> = sim.clocked().iter().map(|c| c.data_in).collect();
		assert_eq!(bits, vec![Level::High, Level::Low, Level::High]);
		assert_eq!(sim.level(PINS.data_in), Some(Level::Low));
	}

	#[test]
	fn transfer_samples_before_clock() {
		let mut sim = Simulator::new(PINS, Geometry::C46_X16);
		sim.push_script(vec![Level::High, Level::Low, Level::High, Level::High]);
		let result = lines(&mut sim).transfer(0, 4);
		assert_eq!(result, 0b1011);

		// each read happens before the rising edge of its bit
		let events = sim.events();
		let first_read = events.iter().position(|e| match e {
			Event::Read(pin, _) => *pin == PINS.data_out,
			_ => false,
		});
		let first_rise = events.iter().position(|e| *e == Event::Write(PINS.clock, Level::High));
		assert!(first_read.unwrap() < first_rise.unwrap());
	}

	#[test]
	fn transaction_drops_chip_select() {
		let mut sim = Simulator::new(PINS, Geometry::C46_X16);
		{
			let mut l = lines(&mut sim);
			let tx = l.begin_transaction(0b10);
			drop(tx);
		}
		assert_eq!(sim.level(PINS.chip_select), Some(Level::Low));
		assert!(!sim.events().contains(&Event::DelayMs(250)));
	}

	#[test]
	fn program_transaction_waits_write_cycle() {
		let mut sim = Simulator::new(PINS, Geometry::C46_X16);
		{
			let mut l = lines(&mut sim);
			let _tx = l.begin_program_transaction(0b01);
		}
		let events = sim.events();
		let cs_low = events.iter().rposition(|e| *e == Event::Write(PINS.chip_select, Level::Low)).unwrap();
		assert_eq!(events[cs_low + 1], Event::DelayMs(250));
	}
}
