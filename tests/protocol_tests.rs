//! Microwire protocol tests against the simulated lines and device model

use microwire_eeprom::gpio::sim::{
	ClockedBit,
	Event,
	Simulator,
};
use microwire_eeprom::gpio::{
	Direction,
	Level,
};
use microwire_eeprom::microwire::{
	Eeprom,
	Geometry,
	PinBinding,
	Timing,
	with_eeprom,
};

const PINS: PinBinding<u32> = PinBinding {
	chip_select: 7,
	clock: 6,
	data_in: 5,
	data_out: 4,
	program_enable: 3,
};

fn selected_bits(clocked: &[ClockedBit]) -> String {
	clocked.iter()
		.filter(|c| c.chip_select == Level::High)
		.map(|c| if c.data_in.is_high() { '1' } else { '0' })
		.collect()
}

#[test]
fn test_write_frame() {
	let mut sim = Simulator::new(PINS, Geometry::C46_X16);
	{
		let mut ee = Eeprom::open(&mut sim, PINS, Geometry::C46_X16, Timing::default());
		ee.write(0x15, 0xc3a5);
	}
	assert_eq!(selected_bits(sim.clocked()), concat!("1", "01", "010101", "1100001110100101"));
	// the pre-pulse comes with CS low
	assert_eq!(sim.clocked()[0].chip_select, Level::Low);
	assert_eq!(sim.clocked().len(), 1 + 3 + 6 + 16);
}

#[test]
fn test_read_clock_count_per_geometry() {
	for &geometry in &[Geometry::C46_X16, Geometry::C46_X8, Geometry::C66_X16, Geometry::C86_X16] {
		let mut sim = Simulator::new(PINS, geometry);
		{
			let mut ee = Eeprom::open(&mut sim, PINS, geometry, Timing::default());
			ee.read(1);
		}
		let expected = 1 + 3 + geometry.address_width() + geometry.page_size() + 1;
		assert_eq!(sim.clocked().len(), expected as usize, "{:?}", geometry);
		assert!(selected_bits(sim.clocked()).starts_with("110"));
	}
}

#[test]
fn test_round_trip_all_geometries() {
	for &geometry in &[Geometry::C46_X16, Geometry::C46_X8, Geometry::C66_X16, Geometry::C86_X16] {
		let mut sim = Simulator::new(PINS, geometry);
		let last = (geometry.words() - 1) as u16;
		let value = (0xa5c3 & geometry.word_mask()) as u16;
		let read = with_eeprom(&mut sim, PINS, geometry, Timing::default(), |ee| {
			ee.write_enable();
			ee.write(last, value);
			ee.write(0, !value & geometry.word_mask() as u16);
			ee.write_disable();
			(ee.read(last), ee.read(0))
		});
		assert_eq!(read, (value, !value & geometry.word_mask() as u16), "{:?}", geometry);
	}
}

#[test]
fn test_lines_released_after_scope() {
	let mut sim = Simulator::new(PINS, Geometry::C46_X16);
	with_eeprom(&mut sim, PINS, Geometry::C46_X16, Timing::default(), |ee| {
		assert_eq!(ee.gpio().direction(PINS.program_enable), Some(Direction::Output));
		assert_eq!(ee.gpio().level(PINS.program_enable), Some(Level::Low));
	});
	for &pin in &PINS.all() {
		assert_eq!(sim.direction(pin), Some(Direction::Input), "pin {}", pin);
	}
}

#[test]
fn test_custom_timing() {
	let timing = Timing {
		half_clock_us: 5,
		write_cycle_ms: 10,
	};
	let mut sim = Simulator::new(PINS, Geometry::C46_X16);
	{
		let mut ee = Eeprom::open(&mut sim, PINS, Geometry::C46_X16, timing);
		ee.programming().write(0, 0);
	}
	let events = sim.events();
	assert!(events.contains(&Event::DelayMs(10)));
	assert!(!events.contains(&Event::DelayMs(250)));
	assert!(events.iter().all(|e| match e {
		Event::DelayUs(us) => *us == 5,
		_ => true,
	}));
	assert_eq!(sim.chip().word(0), 0);
}

#[test]
fn test_scripted_read() {
	let mut sim = Simulator::new(PINS, Geometry::C46_X8);
	// 3 frame bits, 7 address bits, dummy, then 0x5a
	let mut script = vec![Level::High; 3 + 7];
	script.push(Level::Low);
	for bit in (0..8).rev() {
		script.push(Level::from(0 != 0x5a & (1 << bit)));
	}
	sim.push_script(script);

	let mut ee = Eeprom::open(&mut sim, PINS, Geometry::C46_X8, Timing::default());
	assert_eq!(ee.read(0x42), 0x5a);
}
