//! Runs the bus master in its own thread, fed through request/response
//! channels so the caller's I/O and logging don't disturb the bus timing.

use std::thread;

use crossbeam_channel::{
	Receiver,
	Sender,
	unbounded,
};

use crate::bits;
use crate::bus::{
	BusState,
	ClockInterval,
	PinAssignment,
};
use crate::port::Port;

mod dispatcher;
mod isolation;

pub use self::dispatcher::{
	Dispatcher,
	State,
};
pub use self::isolation::Isolation;

/// Bits to transmit (MSB first), optionally followed by bits to receive.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Request {
	pub bits: Vec<bool>,
	/// hold chip select low across the whole transfer
	pub assert_select: bool,
	/// bits to receive after transmitting
	pub read_count: usize,
}

impl Request {
	pub fn new(bits: Vec<bool>) -> Self {
		Request {
			bits,
			assert_select: false,
			read_count: 0,
		}
	}

	pub fn from_bytes(bytes: &[u8]) -> Self {
		Self::new(bits::from_bytes(bytes))
	}

	pub fn select(mut self) -> Self {
		self.assert_select = true;
		self
	}

	pub fn read(mut self, count: usize) -> Self {
		self.read_count = count;
		self
	}
}

/// Received bits; exactly `read_count` of the request.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Response {
	bits: Vec<bool>,
}

impl Response {
	pub fn new(bits: Vec<bool>) -> Self {
		Response { bits }
	}

	pub fn bits(&self) -> &[bool] {
		&self.bits
	}

	pub fn into_bits(self) -> Vec<bool> {
		self.bits
	}

	pub fn len(&self) -> usize {
		self.bits.len()
	}

	pub fn is_empty(&self) -> bool {
		self.bits.is_empty()
	}

	/// packed MSB first
	pub fn to_bytes(&self) -> Vec<u8> {
		bits::to_bytes(&self.bits)
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Config {
	pub pins: PinAssignment,
	pub interval: ClockInterval,
	/// port value for pins not used by the bus
	pub initial: u8,
	pub isolation: Isolation,
}

/// Handle to a bus master thread.
///
/// Dropping it (or `shutdown`) closes the request channel; the thread
/// finishes pending requests and stops.
pub struct Executor {
	requests: Option<Sender<Request>>,
	responses: Receiver<Response>,
	thread: Option<thread::JoinHandle<crate::AResult<()>>>,
}

impl Executor {
	pub fn spawn<P>(port: P, config: Config) -> crate::AResult<Self>
	where
		P: Port + Send + 'static,
	{
		let (req_tx, req_rx) = unbounded();
		let (res_tx, res_rx) = unbounded();

		let thread = with_context!("couldn't start bus master thread", {
			Ok(thread::Builder::new()
				.name("bus-master".into())
				.spawn(move || {
					config.isolation.apply()?;
					let bus = BusState::new(port, config.pins, config.interval, config.initial)?;
					Dispatcher::new(bus, req_rx, res_tx).run()
				})?)
		})?;

		Ok(Executor {
			requests: Some(req_tx),
			responses: res_rx,
			thread: Some(thread),
		})
	}

	pub fn submit(&mut self, request: Request) -> crate::AResult<()> {
		let sent = match self.requests {
			Some(ref requests) => requests.send(request).is_ok(),
			None => false,
		};
		if !sent {
			return Err(self.stopped());
		}
		Ok(())
	}

	/// next response, in request order
	pub fn receive(&mut self) -> crate::AResult<Response> {
		match self.responses.recv() {
			Ok(response) => Ok(response),
			Err(_) => Err(self.stopped()),
		}
	}

	pub fn transfer(&mut self, request: Request) -> crate::AResult<Response> {
		self.submit(request)?;
		self.receive()
	}

	/// stop after pending requests; returns the fault that ended the thread,
	/// if any
	pub fn shutdown(mut self) -> crate::AResult<()> {
		self.requests = None;
		self.join()
	}

	fn join(&mut self) -> crate::AResult<()> {
		match self.thread.take() {
			None => Ok(()),
			Some(thread) => match thread.join() {
				Ok(result) => result,
				Err(_) => bail!("bus master thread panicked"),
			},
		}
	}

	// the thread is gone (or going); collect why
	fn stopped(&mut self) -> failure::Error {
		self.requests = None;
		match self.join() {
			Err(e) => e,
			Ok(()) => format_err!("bus master stopped"),
		}
	}
}

impl Drop for Executor {
	fn drop(&mut self) {
		self.requests = None;
		if let Err(e) = self.join() {
			error!("Bus master failed: {}", e);
		}
	}
}

#[cfg(test)]
mod test {
	use std::io;

	use super::*;
	use crate::eeprom;
	use crate::port::SimulatedEeprom;

	const CLK: u8 = 0x01;
	const CS: u8 = 0x08;

	fn config() -> Config {
		Config {
			interval: ClockInterval::from_micros(1),
			..Config::default()
		}
	}

	#[test]
	fn response_length_matches_read_count() {
		let dev = SimulatedEeprom::with_address_pattern(PinAssignment::default());
		let mut ex = Executor::spawn(dev, config()).unwrap();
		for &count in &[0usize, 1, 7, 8, 33] {
			let response = ex.transfer(Request::from_bytes(&[0x03, 0x00, 0x00]).select().read(count)).unwrap();
			assert_eq!(response.len(), count);
		}
		ex.shutdown().unwrap();
	}

	#[test]
	fn responses_in_request_order() {
		let dev = SimulatedEeprom::with_address_pattern(PinAssignment::default());
		let mut ex = Executor::spawn(dev, config()).unwrap();
		for &address in &[0x0123u16, 0x0042, 0x07ff] {
			ex.submit(eeprom::read_request(address, 1)).unwrap();
		}
		let got: Vec<Vec<u8>> = (0..3).map(|_| ex.receive().unwrap().to_bytes()).collect();
		assert_eq!(got, vec![vec![0x23], vec![0x42], vec![0xff]]);
		ex.shutdown().unwrap();
	}

	#[test]
	fn full_dump_keeps_chip_selected() {
		let dev = SimulatedEeprom::with_address_pattern(PinAssignment::default());
		let trace = dev.trace();
		let mut ex = Executor::spawn(dev, config()).unwrap();

		let request = eeprom::read_request(0x0000, 256);
		assert_eq!(request.bits.len(), 24);
		assert_eq!(request.read_count, 2048);
		let response = ex.transfer(request).unwrap();
		ex.shutdown().unwrap();

		assert_eq!(response.len(), 2048);
		let bytes = response.to_bytes();
		assert_eq!(bytes, (0..=255u8).collect::<Vec<u8>>());

		let writes = trace.writes();
		let first = writes.iter().position(|w| 0 == w & CS).unwrap();
		let last = writes.iter().rposition(|w| 0 == w & CS).unwrap();
		let selected = &writes[first..=last];
		assert!(selected.iter().all(|w| 0 == w & CS));
		// chip select only released after the transfer
		assert_eq!(writes[last + 1] & CS, CS);
		let rising = selected.windows(2).filter(|w| 0 == w[0] & CLK && 0 != w[1] & CLK).count();
		// the first selected write raises the clock too
		assert_eq!(rising + 1, 24 + 2048);
	}

	#[test]
	fn bare_read_opcode() {
		let dev = SimulatedEeprom::with_address_pattern(PinAssignment::default());
		let trace = dev.trace();
		let mut ex = Executor::spawn(dev, config()).unwrap();
		let request = Request::new(bits::from_byte(eeprom::READ).to_vec()).select().read(2048);
		let response = ex.transfer(request).unwrap();
		assert_eq!(response.len(), 2048);
		ex.shutdown().unwrap();

		let writes = trace.writes();
		let first = writes.iter().position(|w| 0 == w & CS).unwrap();
		let last = writes.iter().rposition(|w| 0 == w & CS).unwrap();
		let selected = &writes[first..=last];
		assert!(selected.iter().all(|w| 0 == w & CS));
		// selected with the first clock edge, released after the last bit
		assert_eq!(selected[0] & CLK, CLK);
		assert_eq!(writes[last + 1] & (CS | CLK), CS);
		let rising = selected.windows(2).filter(|w| 0 == w[0] & CLK && 0 != w[1] & CLK).count();
		assert_eq!(rising + 1, 8 + 2048);
	}

	#[test]
	fn write_only_returns_empty_response() {
		let dev = SimulatedEeprom::with_address_pattern(PinAssignment::default());
		let mut ex = Executor::spawn(dev, config()).unwrap();
		let response = ex.transfer(Request::from_bytes(&[eeprom::WREN]).select()).unwrap();
		assert!(response.is_empty());
		ex.shutdown().unwrap();
	}

	struct FailAfter(usize);

	impl Port for FailAfter {
		fn configure(&mut self, _output_mask: u8) -> io::Result<()> {
			Ok(())
		}
		fn write(&mut self, _value: u8) -> io::Result<()> {
			if 0 == self.0 {
				return Err(io::Error::new(io::ErrorKind::Other, "USB disconnected"));
			}
			self.0 -= 1;
			Ok(())
		}
		fn read(&mut self) -> io::Result<u8> {
			Ok(0xff)
		}
	}

	#[test]
	fn hardware_fault_stops_executor() {
		let mut ex = Executor::spawn(FailAfter(50), config()).unwrap();
		let err = ex.transfer(Request::new(Vec::new()).read(100)).unwrap_err();
		assert!(err.to_string().starts_with("GPIO write of"), "unexpected error: {}", err);
		assert!(ex.submit(Request::default()).is_err());
		assert!(ex.shutdown().is_ok());
	}

	#[test]
	fn fault_reported_by_shutdown() {
		let ex = Executor::spawn(FailAfter(0), config()).unwrap();
		let err = ex.shutdown().unwrap_err();
		assert_eq!(err.to_string(), "GPIO write of 0x08 failed");
	}
}
