use std::time::Instant;

use super::{
	BusState,
	Pin,
	sleep_until,
};
use crate::port::Port;

impl<P: Port> BusState<P> {
	/// Transmit bits on data-out; the device captures them on the falling
	/// clock edge.
	///
	/// With `select` chip select gets pulled low together with the first
	/// clock edge and stays low afterwards; releasing it is up to the caller.
	pub fn write_bits(&mut self, bits: &[bool], select: bool) -> crate::AResult<()> {
		trace!("Starting banging bits ({:?})", bits);
		let pins = self.pins();
		let interval = self.interval();

		for &bit in bits {
			if select {
				self.change(pins.clock(), pins.chip_select())?;
			} else {
				self.set(Pin::Clock)?;
			}
			interval.hold();

			if bit {
				self.set(Pin::DataOut)?;
			} else {
				self.clear(Pin::DataOut)?;
			}
			self.clear(Pin::Clock)?;
			interval.hold();
		}

		trace!("Finished banging bits");
		Ok(())
	}

	/// Clock in `count` bits; the device drives data-in on the rising edge,
	/// which gets sampled right after raising the clock.
	pub fn read_bits(&mut self, count: usize) -> crate::AResult<Vec<bool>> {
		trace!("Reading {} bits", count);
		let data_in = self.pins().data_in();
		let interval = self.interval();

		let mut result = Vec::with_capacity(count);
		for _ in 0..count {
			self.set(Pin::Clock)?;
			result.push(0 != self.read()? & data_in);
			interval.hold();

			self.clear(Pin::Clock)?;
			interval.hold();
		}

		trace!("Read {:?}", result);
		Ok(result)
	}

	/// One clock cycle without touching data-out or chip select.
	pub fn idle_clock(&mut self) -> crate::AResult<()> {
		self.idle_clock_waiting(|_| ())
	}

	/// Like `idle_clock`, but spends the low phase in `wait`, which gets the
	/// end of the phase as deadline. If `wait` returns early the rest of the
	/// phase is still held, so the clock period doesn't change.
	pub fn idle_clock_waiting<F, R>(&mut self, wait: F) -> crate::AResult<R>
	where
		F: FnOnce(Instant) -> R,
	{
		let interval = self.interval();

		self.set(Pin::Clock)?;
		interval.hold();

		self.clear(Pin::Clock)?;
		let deadline = Instant::now() + interval.duration();
		let result = wait(deadline);
		sleep_until(deadline);

		Ok(result)
	}
}

#[cfg(test)]
mod test {
	use std::time::{
		Duration,
		Instant,
	};

	use crate::bits;
	use crate::bus::{
		BusState,
		ClockInterval,
		PinAssignment,
	};
	use crate::port::SimulatedEeprom;

	const CLK: u8 = 0x01;
	const MOSI: u8 = 0x02;
	const CS: u8 = 0x08;

	fn bus(memory: Vec<u8>) -> (BusState<SimulatedEeprom>, crate::port::Trace) {
		let dev = SimulatedEeprom::new(PinAssignment::default(), memory);
		let trace = dev.trace();
		let state = BusState::new(dev, PinAssignment::default(), ClockInterval::from_micros(1), 0).unwrap();
		trace.clear();
		(state, trace)
	}

	#[test]
	fn write_waveform() {
		let (mut state, trace) = bus(vec![0]);
		state.write_bits(&[true, false], false).unwrap();
		assert_eq!(trace.writes(), vec![
			CS | CLK, CS | CLK | MOSI, CS | MOSI,
			CS | MOSI | CLK, CS | CLK, CS,
		]);

		trace.clear();
		state.write_bits(&[true], true).unwrap();
		assert_eq!(trace.writes(), vec![CLK, CLK | MOSI, MOSI]);
		// still selected
		assert!(state.is_selected());
	}

	#[test]
	fn read_after_command() {
		let (mut state, trace) = bus(vec![0xa5, 0x3c]);
		let mut command = bits::from_byte(0x03).to_vec();
		command.extend(bits::from_word(0x0001, 16));
		state.write_bits(&command, true).unwrap();

		let data = state.read_bits(16).unwrap();
		assert_eq!(bits::to_bytes(&data), vec![0x3c, 0xa5]);
		assert!(trace.writes().iter().all(|w| 0 == w & CS));
	}

	#[test]
	fn read_nothing() {
		let (mut state, trace) = bus(vec![0]);
		assert!(state.read_bits(0).unwrap().is_empty());
		assert!(trace.is_empty());
		// not selected: line stays pulled up
		assert_eq!(state.read_bits(3).unwrap(), vec![true; 3]);
	}

	#[test]
	fn idle_clock_keeps_period() {
		let (state, trace) = bus(vec![0]);
		let interval = ClockInterval::from_micros(500);
		let mut state = BusState::new(state.into_port(), PinAssignment::default(), interval, 0).unwrap();
		trace.clear();

		let start = Instant::now();
		state.idle_clock().unwrap();
		let waited = state.idle_clock_waiting(|deadline| deadline).unwrap();
		assert!(Instant::now() >= waited);
		assert!(start.elapsed() >= Duration::from_millis(2));
		assert_eq!(trace.writes(), vec![CS | CLK, CS, CS | CLK, CS]);
	}
}
