use crossbeam_channel::{
	Receiver,
	RecvTimeoutError,
	Sender,
	TryRecvError,
};

use super::{
	Request,
	Response,
};
use crate::bus::{
	BusState,
	Pin,
};
use crate::port::Port;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum State {
	Idle,
	Transmitting,
	Receiving,
	IdleClocking,
}

/// Services requests one after another; keeps the clock running while there
/// is nothing to do.
///
/// Must be the only consumer of its request channel.
pub struct Dispatcher<P: Port> {
	bus: BusState<P>,
	requests: Receiver<Request>,
	responses: Sender<Response>,
	state: State,
}

impl<P: Port> Dispatcher<P> {
	pub fn new(bus: BusState<P>, requests: Receiver<Request>, responses: Sender<Response>) -> Self {
		Dispatcher {
			bus,
			requests,
			responses,
			state: State::Idle,
		}
	}

	pub fn state(&self) -> State {
		self.state
	}

	pub fn bus(&self) -> &BusState<P> {
		&self.bus
	}

	pub fn into_bus(self) -> BusState<P> {
		self.bus
	}

	/// Runs until the request channel is closed (or nobody listens for
	/// responses anymore); returns on the first hardware fault.
	pub fn run(mut self) -> crate::AResult<()> {
		info!("Bit banger clock and monitor started");
		while self.step()? {}
		info!("Bit banger stopped");
		Ok(())
	}

	/// Either services the next pending request, or runs one idle clock
	/// cycle. A request arriving during the idle cycle is serviced once the
	/// cycle is complete.
	///
	/// Returns false when the dispatcher should stop.
	pub fn step(&mut self) -> crate::AResult<bool> {
		let next = match self.requests.try_recv() {
			Ok(request) => Ok(request),
			Err(TryRecvError::Empty) => {
				self.state = State::IdleClocking;
				let requests = &self.requests;
				let next = self.bus.idle_clock_waiting(|deadline| requests.recv_deadline(deadline))?;
				self.state = State::Idle;
				next
			},
			Err(TryRecvError::Disconnected) => Err(RecvTimeoutError::Disconnected),
		};

		match next {
			Ok(request) => self.service(request),
			Err(RecvTimeoutError::Timeout) => Ok(true),
			Err(RecvTimeoutError::Disconnected) => {
				debug!("Request channel closed");
				Ok(false)
			},
		}
	}

	fn service(&mut self, request: Request) -> crate::AResult<bool> {
		debug!(
			"Servicing request: {} bits out, {} bits in{}",
			request.bits.len(),
			request.read_count,
			if request.assert_select { ", chip selected" } else { "" },
		);

		self.state = State::Transmitting;
		self.bus.write_bits(&request.bits, request.assert_select)?;

		let bits = if request.read_count > 0 {
			self.state = State::Receiving;
			if request.assert_select && !self.bus.is_selected() {
				// nothing was transmitted, select for the read alone
				self.bus.clear(Pin::ChipSelect)?;
			}
			self.bus.read_bits(request.read_count)?
		} else {
			Vec::new()
		};

		if self.bus.is_selected() {
			// deselect time before the next instruction
			self.bus.set(Pin::ChipSelect)?;
			self.bus.interval().hold();
		}
		self.state = State::Idle;

		if self.responses.send(Response::new(bits)).is_err() {
			debug!("Response channel closed");
			return Ok(false);
		}
		Ok(true)
	}
}
