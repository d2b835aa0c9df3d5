use std::thread;
use std::time::{
	Duration,
	Instant,
};

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

pub fn sleep_until(deadline: Instant) {
	let now = Instant::now();
	if deadline > now {
		reliable_sleep(deadline - now);
	}
}

/// Half of the serial clock period; both clock phases are held this long.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ClockInterval(Duration);

impl ClockInterval {
	pub fn new(half_period: Duration) -> Self {
		ClockInterval(half_period)
	}

	pub fn from_micros(micros: u64) -> Self {
		ClockInterval(Duration::from_micros(micros))
	}

	pub fn duration(&self) -> Duration {
		self.0
	}

	/// full clock cycle
	pub fn period(&self) -> Duration {
		self.0 * 2
	}

	// delay for (at least) one clock phase
	pub fn hold(&self) {
		reliable_sleep(self.0);
	}
}

impl Default for ClockInterval {
	fn default() -> Self {
		ClockInterval(Duration::from_millis(1))
	}
}

/// Output pins the bus master drives; data-in is handled separately as it is
/// never written.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Pin {
	Clock,
	DataOut,
	/// active low
	ChipSelect,
}

/// Single-bit masks of the bus lines within the 8-bit port word.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct PinAssignment {
	clock: u8,
	data_out: u8,
	data_in: u8,
	chip_select: u8,
}

impl PinAssignment {
	pub fn new(clock: u8, data_out: u8, data_in: u8, chip_select: u8) -> crate::AResult<Self> {
		let masks = [
			("clock", clock),
			("data-out", data_out),
			("data-in", data_in),
			("chip-select", chip_select),
		];
		for &(name, mask) in &masks {
			ensure!(mask.count_ones() == 1, "{} pin mask 0x{:02x} must have exactly one bit set", name, mask);
		}
		ensure!((clock | data_out | data_in | chip_select).count_ones() == 4,
			"pin masks must not overlap (clock 0x{:02x}, data-out 0x{:02x}, data-in 0x{:02x}, chip-select 0x{:02x})",
			clock, data_out, data_in, chip_select
		);

		Ok(PinAssignment {
			clock,
			data_out,
			data_in,
			chip_select,
		})
	}

	pub fn clock(&self) -> u8 {
		self.clock
	}

	pub fn data_out(&self) -> u8 {
		self.data_out
	}

	pub fn data_in(&self) -> u8 {
		self.data_in
	}

	pub fn chip_select(&self) -> u8 {
		self.chip_select
	}

	pub fn mask(&self, pin: Pin) -> u8 {
		match pin {
			Pin::Clock => self.clock,
			Pin::DataOut => self.data_out,
			Pin::ChipSelect => self.chip_select,
		}
	}

	/// everything but data-in is an output
	pub fn output_mask(&self) -> u8 {
		!self.data_in
	}
}

impl Default for PinAssignment {
	fn default() -> Self {
		PinAssignment {
			clock: 0x01,
			data_out: 0x02,
			data_in: 0x04,
			chip_select: 0x08,
		}
	}
}
