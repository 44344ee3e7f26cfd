use crate::gpio::Gpio;

use super::{
	Geometry,
	Lines,
	PinBinding,
	Timing,
};

/// Exclusive handle on one Microwire EEPROM.
///
/// Opening claims the lines and puts the board into programming mode; closing
/// (or dropping) the handle releases the lines again. Not `Clone`: there must
/// only be one handle per set of lines.
pub struct Eeprom<G: Gpio> {
	pub(super) lines: Lines<G>,
	pub(super) geometry: Geometry,
	claimed: bool,
}

impl<G: Gpio> Eeprom<G> {
	pub fn open(gpio: G, pins: PinBinding<G::Pin>, geometry: Geometry, timing: Timing) -> Self {
		let mut lines = Lines::new(gpio, pins, timing);
		info!("Entering programming mode.");
		lines.claim();
		debug!("Microwire lines: {:?}, {:?}, {:?}", pins, geometry, timing);

		Eeprom {
			lines,
			geometry,
			claimed: true,
		}
	}

	/// Release all lines (switching them to input) and leave programming mode.
	pub fn close(mut self) {
		self.release();
	}

	fn release(&mut self) {
		if self.claimed {
			info!("Exiting programming mode.");
			self.lines.release();
			self.claimed = false;
		}
	}

	pub fn geometry(&self) -> Geometry {
		self.geometry
	}

	pub fn timing(&self) -> Timing {
		self.lines.timing()
	}

	pub fn pins(&self) -> &PinBinding<G::Pin> {
		self.lines.pins()
	}

	pub fn gpio(&self) -> &G {
		self.lines.gpio()
	}
}

impl<G: Gpio> Drop for Eeprom<G> {
	fn drop(&mut self) {
		self.release();
	}
}

/// Open the EEPROM for the duration of `f`; the lines are released on every
/// way out, including panics.
pub fn with_eeprom<G, F, R>(gpio: G, pins: PinBinding<G::Pin>, geometry: Geometry, timing: Timing, f: F) -> R
where
	G: Gpio,
	F: FnOnce(&mut Eeprom<G>) -> R,
{
	let mut eeprom = Eeprom::open(gpio, pins, geometry, timing);
	let result = f(&mut eeprom);
	eeprom.close();
	result
}
