#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate microwire_eeprom;
use microwire_eeprom::*;

use std::io::{
	self,
	Write,
};
use std::process::exit;

use microwire_eeprom::gpio::Gpio;
use microwire_eeprom::microwire::{
	Eeprom,
	Geometry,
	PinBinding,
	Timing,
};

enum Command {
	Read(u16),
	Write(u16, u16),
	Erase(u16),
	EraseAll,
	WriteAll(u16),
	Dump { binary: bool },
	Program { image: Vec<u16>, erase_all: bool },
	Verify(Vec<u16>),
}

fn parse_number(value: &str) -> AResult<u32> {
	let result = if value.starts_with("0x") || value.starts_with("0X") {
		u32::from_str_radix(&value[2..], 16)
	} else {
		value.parse::<u32>()
	};
	Ok(result?)
}

fn get_number(matches: &clap::ArgMatches, name: &str) -> AResult<Option<u32>> {
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => return Ok(None),
	};
	parse_number(param).map(Some).map_err(|e| {
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn get_required<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::convert::TryFrom<u32>,
{
	let value = match get_number(matches, name)? {
		Some(v) => v,
		None => bail!("missing parameter {}", name),
	};
	match T::try_from(value) {
		Ok(v) => Ok(v),
		Err(_) => bail!("invalid parameter {}: {} out of range", name, value),
	}
}

fn get_pins(matches: &clap::ArgMatches, simulate: bool) -> AResult<PinBinding<u32>> {
	let mut pins = [0u32; 5];
	let names = [("cs", "cs"), ("clk", "clk"), ("data_in", "di"), ("data_out", "do"), ("prog", "prog")];
	for (i, &(name, flag)) in names.iter().enumerate() {
		pins[i] = match get_number(matches, name)? {
			Some(pin) => pin,
			None if simulate => i as u32,
			None => bail!("missing GPIO line --{}", flag),
		};
	}
	Ok(PinBinding {
		chip_select: pins[0],
		clock: pins[1],
		data_in: pins[2],
		data_out: pins[3],
		program_enable: pins[4],
	})
}

fn get_geometry(matches: &clap::ArgMatches) -> AResult<Geometry> {
	let default = Geometry::default();
	let page_size = get_number(matches, "page_size")?.unwrap_or(default.page_size());
	let address_width = get_number(matches, "address_width")?.unwrap_or(default.address_width());
	ensure!(page_size >= 1 && page_size <= 16, "page size must be 1..=16 bits, got {}", page_size);
	ensure!(address_width >= 2 && address_width <= 16, "address width must be 2..=16 bits, got {}", address_width);
	Ok(Geometry::new(page_size as u8, address_width as u8))
}

fn get_timing(matches: &clap::ArgMatches) -> AResult<Timing> {
	let default = Timing::default();
	Ok(Timing {
		half_clock_us: get_number(matches, "half_clock_us")?.unwrap_or(default.half_clock_us),
		write_cycle_ms: get_number(matches, "write_cycle_ms")?.unwrap_or(default.write_cycle_ms),
	})
}

// the driver truncates to the field width, which would hit another word
fn get_address(matches: &clap::ArgMatches, geometry: Geometry) -> AResult<u16> {
	let address: u16 = get_required(matches, "ADDRESS")?;
	ensure!(usize::from(address) < geometry.words(),
		"address 0x{:x} out of range, device has {} words", address, geometry.words()
	);
	Ok(address)
}

fn get_word(matches: &clap::ArgMatches, geometry: Geometry) -> AResult<u16> {
	let value: u16 = get_required(matches, "VALUE")?;
	ensure!(u32::from(value) <= geometry.word_mask(),
		"value 0x{:x} doesn't fit into {} bits", value, geometry.page_size()
	);
	Ok(value)
}

fn get_command(matches: &clap::ArgMatches, geometry: Geometry) -> AResult<Command> {
	Ok(match matches.subcommand() {
		("read", Some(sub_m)) => Command::Read(get_address(sub_m, geometry)?),
		("write", Some(sub_m)) => Command::Write(get_address(sub_m, geometry)?, get_word(sub_m, geometry)?),
		("erase", Some(sub_m)) => Command::Erase(get_address(sub_m, geometry)?),
		("erase_all", _) => Command::EraseAll,
		("write_all", Some(sub_m)) => Command::WriteAll(get_word(sub_m, geometry)?),
		("dump", Some(sub_m)) => Command::Dump { binary: sub_m.is_present("binary") },
		("program", Some(sub_m)) => Command::Program {
			image: image::read_image_file(sub_m.value_of("FILE").unwrap_or_default(), geometry)?,
			erase_all: sub_m.is_present("erase"),
		},
		("verify", Some(sub_m)) => Command::Verify(
			image::read_image_file(sub_m.value_of("FILE").unwrap_or_default(), geometry)?,
		),
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	})
}

fn run<G: Gpio>(eeprom: &mut Eeprom<G>, command: Command) -> AResult<()> {
	let geometry = eeprom.geometry();
	match command {
		Command::Read(address) => {
			println!("@{:02x}: {:04x}", address, eeprom.read(address));
		},
		Command::Write(address, value) => {
			eeprom.programming().write(address, value);
			let flash = eeprom.read(address);
			ensure!(flash == value, "Verify failed at {:02x}: expected {:04x}, eeprom is {:04x}", address, value, flash);
		},
		Command::Erase(address) => {
			eeprom.programming().erase(address);
		},
		Command::EraseAll => {
			eeprom.programming().erase_all();
		},
		Command::WriteAll(value) => {
			eeprom.programming().write_all(value);
		},
		Command::Dump { binary } => {
			let words = image::dump(eeprom);
			if binary {
				io::stdout().write_all(&image::words_to_bytes(&words, geometry))?;
			} else {
				for (address, word) in words.iter().enumerate() {
					println!("@{:02x}: {:04x}", address, word);
				}
			}
		},
		Command::Program { image: words, erase_all } => {
			image::program(eeprom, &words, erase_all)?;
			println!("Image written and verified successfully");
		},
		Command::Verify(words) => {
			image::verify(eeprom, &words)?;
			println!("Image verified successfully");
		},
	}
	Ok(())
}

fn app() -> clap::App<'static, 'static> {
	clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg backend: -b --backend +takes_value "GPIO backend: sysfs (default) or gpiomem")
		(@arg simulate: --simulate "use a simulated EEPROM instead of real GPIO lines")
		(@arg cs: --cs +takes_value "GPIO line for chip select (CS)")
		(@arg clk: --clk +takes_value "GPIO line for the clock (CLK)")
		(@arg data_in: --di +takes_value "GPIO line connected to the EEPROM data input (DI)")
		(@arg data_out: --("do") +takes_value "GPIO line connected to the EEPROM data output (DO)")
		(@arg prog: --prog +takes_value "GPIO line held low for programming mode")
		(@arg page_size: --("page-size") +takes_value "bits per word (default 16)")
		(@arg address_width: --("address-width") +takes_value "address bits (default 6)")
		(@arg half_clock_us: --("half-clock-us") +takes_value "half clock period in us (default 20)")
		(@arg write_cycle_ms: --("write-cycle-ms") +takes_value "wait after programming in ms (default 250)")
		(@subcommand read =>
			(about: "read one word")
			(@arg ADDRESS: +required "word address")
		)
		(@subcommand write =>
			(about: "write one word and read it back")
			(@arg ADDRESS: +required "word address")
			(@arg VALUE: +required "word to write")
		)
		(@subcommand erase =>
			(about: "erase one word (all bits \"1\")")
			(@arg ADDRESS: +required "word address")
		)
		(@subcommand erase_all =>
			(about: "erase all words")
		)
		(@subcommand write_all =>
			(about: "write one word into all addresses")
			(@arg VALUE: +required "word to write")
		)
		(@subcommand dump =>
			(about: "dump all words")
			(@arg binary: --binary "write raw image to stdout")
		)
		(@subcommand program =>
			(about: "write image file (big-endian words) and verify it")
			(@arg erase: -e --erase "erase the remaining words too")
			(@arg FILE: +required "image file")
		)
		(@subcommand verify =>
			(about: "verify EEPROM content against image file")
			(@arg FILE: +required "image file")
		)
	)
}

fn main_app() -> AResult<()> {
	let matches = app().get_matches();

	let simulate = matches.is_present("simulate");
	let pins = get_pins(&matches, simulate)?;
	let geometry = get_geometry(&matches)?;
	let timing = get_timing(&matches)?;
	let command = get_command(&matches, geometry)?;

	if simulate {
		info!("Using simulated EEPROM");
		let sim = gpio::sim::Simulator::new(pins, geometry);
		let mut ee = Eeprom::open(sim, pins, geometry, timing);
		return run(&mut ee, command);
	}

	match matches.value_of("backend").unwrap_or("sysfs") {
		"sysfs" => {
			let gpio = gpio::linux::open_sysfs(&pins.all())?;
			let mut ee = Eeprom::open(gpio, pins, geometry, timing);
			run(&mut ee, command)
		},
		"gpiomem" => {
			let gpio = gpio::linux::open_gpiomem()?;
			let mut ee = Eeprom::open(gpio, pins, geometry, timing);
			run(&mut ee, command)
		},
		backend => bail!("unknown GPIO backend {:?}", backend),
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
