use std::collections::HashMap;
use std::fs;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{
	Path,
	PathBuf,
};

use crate::gpio::{
	Direction,
	Gpio,
	Level,
};

const SYSFS_GPIO: &str = "/sys/class/gpio";

struct Line {
	path: PathBuf,
	value: fs::File,
	// unexport on drop
	exported: bool,
	// `value` is read-only while the line is an input
	output: bool,
	// level to apply when the line becomes an output
	level: Level,
}

impl Line {
	fn write_exact_at(&self, buf: &[u8], offset: u64) -> io::Result<()> {
		// sysfs attributes take the whole value in one write
		let l = self.value.write_at(buf, offset)?;
		if l != buf.len() {
			Err(io::Error::new(io::ErrorKind::Other, "failed to write whole buffer"))
		} else {
			Ok(())
		}
	}

	fn read_value(&self) -> io::Result<Level> {
		let mut buf = [0u8; 1];
		let l = self.value.read_at(&mut buf, 0)?;
		if l != 1 {
			return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "empty gpio value"));
		}
		Ok(Level::from(buf[0] == b'1'))
	}

	fn set_direction(&mut self, direction: Direction) -> io::Result<()> {
		let attribute = direction_attribute(direction, self.level);
		fs::OpenOptions::new().write(true).truncate(true).open(self.path.join("direction"))?.write_all_at(attribute, 0)?;
		self.output = direction == Direction::Output;
		Ok(())
	}

	fn write_level(&mut self, level: Level) -> io::Result<()> {
		self.level = level;
		if !self.output {
			return Ok(());
		}
		let value: &[u8] = match level {
			Level::Low => b"0",
			Level::High => b"1",
		};
		self.write_exact_at(value, 0)
	}
}

// "low"/"high" switch to output with the initial level in one step
fn direction_attribute(direction: Direction, level: Level) -> &'static [u8] {
	match (direction, level) {
		(Direction::Input, _) => b"in",
		(Direction::Output, Level::Low) => b"low",
		(Direction::Output, Level::High) => b"high",
	}
}

/// GPIO lines through `/sys/class/gpio`; the lines get exported when opening
/// and unexported again on drop (unless they were exported already).
pub struct Sysfs {
	lines: HashMap<u32, Line>,
}

impl Sysfs {
	fn line(&mut self, pin: u32) -> Option<&mut Line> {
		let line = self.lines.get_mut(&pin);
		if line.is_none() {
			error!("GPIO {} was not opened", pin);
		}
		line
	}
}

impl Drop for Sysfs {
	fn drop(&mut self) {
		for (pin, line) in self.lines.drain() {
			if !line.exported {
				continue;
			}
			drop(line.value);
			if let Err(e) = write_attribute(&Path::new(SYSFS_GPIO).join("unexport"), pin) {
				warn!("Failed to unexport GPIO {}: {}", pin, e);
			}
		}
	}
}

fn write_attribute(path: &Path, pin: u32) -> io::Result<()> {
	// needs to be written in one syscall
	fs::OpenOptions::new().write(true).open(path)?.write_all_at(pin.to_string().as_bytes(), 0)
}

impl Gpio for Sysfs {
	type Pin = u32;

	fn set_direction(&mut self, pin: u32, direction: Direction) {
		if let Some(line) = self.line(pin) {
			if let Err(e) = line.set_direction(direction) {
				error!("Failed to set GPIO {} direction to {:?}: {}", pin, direction, e);
			}
		}
	}

	fn write_level(&mut self, pin: u32, level: Level) {
		if let Some(line) = self.line(pin) {
			if let Err(e) = line.write_level(level) {
				error!("Failed to set GPIO {} value: {}", pin, e);
			}
		}
	}

	fn read_level(&mut self, pin: u32) -> Level {
		match self.line(pin).map(|line| line.read_value()) {
			Some(Ok(level)) => level,
			Some(Err(e)) => {
				error!("Failed to get GPIO {} value: {}", pin, e);
				Level::Low
			},
			None => Level::Low,
		}
	}
}

pub fn open_sysfs(pins: &[u32]) -> io::Result<Sysfs> {
	let base = Path::new(SYSFS_GPIO);
	let mut sysfs = Sysfs {
		lines: HashMap::new(),
	};

	for &pin in pins {
		if sysfs.lines.contains_key(&pin) {
			continue;
		}
		let path = base.join(format!("gpio{}", pin));
		let exported = if path.exists() {
			false
		} else {
			debug!("Exporting GPIO {}", pin);
			write_attribute(&base.join("export"), pin)?;
			true
		};
		// on error the already opened lines get unexported by `Sysfs::drop`
		let value = match fs::OpenOptions::new().read(true).write(true).open(path.join("value")) {
			Ok(value) => value,
			Err(e) => {
				if exported {
					let _ = write_attribute(&base.join("unexport"), pin);
				}
				return Err(e);
			},
		};
		let output = match fs::read_to_string(path.join("direction")) {
			Ok(direction) => direction.trim() == "out",
			Err(e) => {
				if exported {
					let _ = write_attribute(&base.join("unexport"), pin);
				}
				return Err(e);
			},
		};
		sysfs.lines.insert(pin, Line {
			path,
			value,
			exported,
			output,
			level: Level::Low,
		});
	}

	Ok(sysfs)
}
