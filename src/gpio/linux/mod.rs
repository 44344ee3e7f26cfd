// OS-specific backends. for now linux only.
mod gpiomem;
mod sysfs;

pub use self::gpiomem::{
	GpioMem,
	open_gpiomem,
};

pub use self::sysfs::{
	Sysfs,
	open_sysfs,
};
