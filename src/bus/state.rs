use failure::ResultExt;

use super::{
	ClockInterval,
	Pin,
	PinAssignment,
};
use crate::port::Port;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Fail)]
pub enum HardwareFault {
	#[fail(display = "GPIO configure (outputs 0x{:02x}) failed", _0)]
	Configure(u8),
	#[fail(display = "GPIO write of 0x{:02x} failed", _0)]
	Write(u8),
	#[fail(display = "GPIO read failed")]
	Read,
}

/// Current output value of the port; every change is written through
/// immediately.
///
/// Bits outside the assigned pins keep the value they were initialized with.
pub struct BusState<P: Port> {
	port: P,
	pins: PinAssignment,
	interval: ClockInterval,
	value: u8,
}

impl<P: Port> BusState<P> {
	/// Configures the pin directions and writes the idle level: clock and
	/// data-out low, chip select released (high).
	pub fn new(mut port: P, pins: PinAssignment, interval: ClockInterval, initial: u8) -> crate::AResult<Self> {
		let output_mask = pins.output_mask();
		debug!("Setting up GPIO directions ({:08b})", output_mask);
		port.configure(output_mask).context(HardwareFault::Configure(output_mask))?;

		let value = (initial & !(pins.clock() | pins.data_out())) | pins.chip_select();
		let mut state = BusState {
			port,
			pins,
			interval,
			value,
		};
		debug!("Setting the initial GPIO state to {:08b}", value);
		state.flush()?;

		Ok(state)
	}

	pub fn pins(&self) -> PinAssignment {
		self.pins
	}

	pub fn interval(&self) -> ClockInterval {
		self.interval
	}

	pub fn value(&self) -> u8 {
		self.value
	}

	pub fn is_selected(&self) -> bool {
		0 == self.value & self.pins.chip_select()
	}

	pub fn into_port(self) -> P {
		self.port
	}

	pub fn set(&mut self, pin: Pin) -> crate::AResult<()> {
		self.change(self.pins.mask(pin), 0)
	}

	pub fn clear(&mut self, pin: Pin) -> crate::AResult<()> {
		self.change(0, self.pins.mask(pin))
	}

	/// raise and lower pins in a single port write
	pub(super) fn change(&mut self, high: u8, low: u8) -> crate::AResult<()> {
		debug_assert_eq!(high & low, 0);
		self.value = (self.value | high) & !low;
		self.flush()
	}

	pub fn read(&mut self) -> crate::AResult<u8> {
		Ok(self.port.read().context(HardwareFault::Read)?)
	}

	fn flush(&mut self) -> crate::AResult<()> {
		let value = self.value;
		self.port.write(value).context(HardwareFault::Write(value))?;
		Ok(())
	}
}
