/* BCM2835 style GPIO register block (Raspberry Pi), mapped from /dev/gpiomem */

use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::io::{
	FromRawFd,
};
use std::ptr;

use libc::{
	MAP_SHARED,
	O_CLOEXEC,
	O_RDWR,
	O_SYNC,
	PROT_READ,
	PROT_WRITE,
	c_void,
	mmap,
	munmap,
	open,
};

use crate::gpio::{
	Direction,
	Gpio,
	Level,
};

const GPIOMEM_PATH: &str = "/dev/gpiomem";
const BLOCK_SIZE: usize = 4096;

const PIN_COUNT: u32 = 54;

// register offsets
const GPFSEL0: usize = 0x00; // function select, 3 bits per pin, 10 pins per register
const GPSET0: usize = 0x1c; // output set, 1 bit per pin
const GPCLR0: usize = 0x28; // output clear
const GPLEV0: usize = 0x34; // pin level

const FSEL_INPUT: u32 = 0b000;
const FSEL_OUTPUT: u32 = 0b001;

#[derive(Debug)]
pub struct GpioMem {
	ptr: ptr::NonNull<u32>,
	len: usize,
}

impl Drop for GpioMem {
	fn drop(&mut self) {
		unsafe {
			let res = munmap(
				self.ptr.as_ptr() as *mut c_void,
				self.len,
			);
			if 0 != res {
				panic!("munmap failed: {}", io::Error::last_os_error());
			}
		}
	}
}

impl GpioMem {
	fn read_register(&self, offset: usize) -> u32 {
		assert!(offset & 3 == 0);
		assert!(offset + 3 < self.len);
		unsafe { ptr::read_volatile(self.ptr.as_ptr().add(offset / 4)) }
	}

	fn write_register(&mut self, offset: usize, data: u32) {
		assert!(offset & 3 == 0);
		assert!(offset + 3 < self.len);
		unsafe { ptr::write_volatile(self.ptr.as_ptr().add(offset / 4), data) }
	}

	fn check_pin(pin: u32) -> bool {
		if pin >= PIN_COUNT {
			error!("GPIO {} out of range (only {} pins)", pin, PIN_COUNT);
			return false;
		}
		true
	}

	// (register offset, bit) for the one-bit-per-pin banks
	fn bank(base: usize, pin: u32) -> (usize, u32) {
		(base + 4 * (pin / 32) as usize, 1u32 << (pin % 32))
	}
}

impl Gpio for GpioMem {
	type Pin = u32;

	fn set_direction(&mut self, pin: u32, direction: Direction) {
		if !Self::check_pin(pin) { return; }
		let offset = GPFSEL0 + 4 * (pin / 10) as usize;
		let shift = 3 * (pin % 10);
		let mode = match direction {
			Direction::Input => FSEL_INPUT,
			Direction::Output => FSEL_OUTPUT,
		};
		let fsel = self.read_register(offset);
		self.write_register(offset, (fsel & !(0b111 << shift)) | (mode << shift));
	}

	fn write_level(&mut self, pin: u32, level: Level) {
		if !Self::check_pin(pin) { return; }
		let base = match level {
			Level::Low => GPCLR0,
			Level::High => GPSET0,
		};
		let (offset, bit) = Self::bank(base, pin);
		self.write_register(offset, bit);
	}

	fn read_level(&mut self, pin: u32) -> Level {
		if !Self::check_pin(pin) { return Level::Low; }
		let (offset, bit) = Self::bank(GPLEV0, pin);
		Level::from(0 != self.read_register(offset) & bit)
	}
}

// TODO: flock() /dev/gpiomem so a second process cannot drive the same lines
pub fn open_gpiomem() -> io::Result<GpioMem> {
	let path = CString::new(GPIOMEM_PATH)?;

	let fd = unsafe { open(path.as_ptr(), O_RDWR | O_CLOEXEC | O_SYNC) };
	if -1 == fd {
		return Err(io::Error::last_os_error());
	}
	// now get fd managed to prevent resource leak
	let _f = unsafe { fs::File::from_raw_fd(fd) };

	let area = unsafe {
		mmap(
			ptr::null_mut(),
			BLOCK_SIZE,
			PROT_READ | PROT_WRITE,
			MAP_SHARED,
			fd,
			0,
		)
	};

	if area as usize == !0usize {
		return Err(io::Error::last_os_error());
	}
	match ptr::NonNull::new(area as *mut u32) {
		None => panic!("mmap shouldn't return NULL ever"),
		Some(area) => Ok(GpioMem {
			ptr: area,
			len: BLOCK_SIZE,
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bank_offsets() {
		assert_eq!(GpioMem::bank(GPSET0, 4), (GPSET0, 1 << 4));
		assert_eq!(GpioMem::bank(GPLEV0, 33), (GPLEV0 + 4, 1 << 1));
	}
}
