use std::fmt;
use std::thread;
use std::time::{
	Duration,
	Instant,
};

pub mod linux;
pub mod sim;

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Level {
	Low,
	High,
}

impl Level {
	pub fn is_high(self) -> bool {
		self == Level::High
	}
}

impl From<bool> for Level {
	fn from(v: bool) -> Self {
		match v {
			false => Level::Low,
			true => Level::High,
		}
	}
}

impl fmt::Display for Level {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Level::Low => write!(f, "0"),
			Level::High => write!(f, "1"),
		}
	}
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Direction {
	Input,
	Output,
}

/// Digital lines plus a clock to wait on.
///
/// Implementations are expected to succeed once they are constructed; a
/// backend that hits an OS error while toggling a line should log it and carry
/// on, the Microwire protocol has no way to report it anyway.
pub trait Gpio {
	type Pin: Copy + fmt::Debug;

	fn set_direction(&mut self, pin: Self::Pin, direction: Direction);
	fn write_level(&mut self, pin: Self::Pin, level: Level);
	fn read_level(&mut self, pin: Self::Pin) -> Level;

	fn delay_us(&mut self, us: u32) {
		reliable_sleep(Duration::from_micros(us.into()));
	}

	fn delay_ms(&mut self, ms: u32) {
		reliable_sleep(Duration::from_millis(ms.into()));
	}
}

impl<'a, G: ?Sized + Gpio> Gpio for &'a mut G {
	type Pin = G::Pin;

	fn set_direction(&mut self, pin: Self::Pin, direction: Direction) {
		G::set_direction(*self, pin, direction)
	}
	fn write_level(&mut self, pin: Self::Pin, level: Level) {
		G::write_level(*self, pin, level)
	}
	fn read_level(&mut self, pin: Self::Pin) -> Level {
		G::read_level(*self, pin)
	}
	fn delay_us(&mut self, us: u32) {
		G::delay_us(*self, us)
	}
	fn delay_ms(&mut self, ms: u32) {
		G::delay_ms(*self, ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn level_from_bool() {
		assert_eq!(Level::from(true), Level::High);
		assert_eq!(Level::from(false), Level::Low);
		assert!(Level::High.is_high());
		assert!(!Level::Low.is_high());
	}

	#[test]
	fn reliable_sleep_waits_at_least_duration() {
		let start = Instant::now();
		reliable_sleep(Duration::from_millis(2));
		assert!(start.elapsed() >= Duration::from_millis(2));
	}
}
