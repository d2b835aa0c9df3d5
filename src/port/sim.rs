use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Port;
use crate::bus::PinAssignment;
use crate::eeprom::{
	RDSR,
	READ,
};

/// Shared record of every value written to a simulated port.
#[derive(Clone, Default, Debug)]
pub struct Trace(Arc<Mutex<Vec<u8>>>);

impl Trace {
	pub fn writes(&self) -> Vec<u8> {
		self.0.lock().clone()
	}

	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}

	pub fn clear(&self) {
		self.0.lock().clear();
	}

	fn push(&self, value: u8) {
		self.0.lock().push(value);
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
	Deselected,
	Instruction { opcode: u8, count: u8 },
	Address { address: u16, count: u8 },
	Reading { address: usize, bit: u8 },
	Status { bit: u8 },
	// unsupported instruction; wait for chip select release
	Ignored,
}

/// Model of an M95xxx SPI EEPROM wired to the four bus pins.
///
/// Instruction and address bits are captured on the falling clock edge, data
/// is driven on the rising edge. While chip select stays low a READ keeps
/// streaming bytes with an auto-incrementing address (wrapping at the end of
/// memory). When the chip doesn't drive its output, data-in reads high.
#[derive(Debug)]
pub struct SimulatedEeprom {
	pins: PinAssignment,
	memory: Vec<u8>,
	status: u8,
	output_mask: Option<u8>,
	last: u8,
	phase: Phase,
	out: Option<bool>,
	trace: Trace,
}

impl SimulatedEeprom {
	pub fn new(pins: PinAssignment, memory: Vec<u8>) -> Self {
		assert!(!memory.is_empty(), "simulated EEPROM needs memory");
		SimulatedEeprom {
			pins,
			memory,
			status: 0x00,
			output_mask: None,
			last: pins.chip_select(),
			phase: Phase::Deselected,
			out: None,
			trace: Trace::default(),
		}
	}

	/// M95160 sized (2 KiB) device where each byte holds its own (truncated)
	/// address
	pub fn with_address_pattern(pins: PinAssignment) -> Self {
		Self::new(pins, (0..2048usize).map(|a| a as u8).collect())
	}

	pub fn memory(&self) -> &[u8] {
		&self.memory
	}

	pub fn set_status(&mut self, status: u8) {
		self.status = status;
	}

	pub fn trace(&self) -> Trace {
		self.trace.clone()
	}

	fn shift_in(&mut self, bit: bool) {
		let bit = bit as u8;
		self.phase = match self.phase {
			Phase::Instruction { opcode, count } => {
				let opcode = opcode << 1 | bit;
				if count + 1 < 8 {
					Phase::Instruction { opcode, count: count + 1 }
				} else {
					match opcode {
						READ => Phase::Address { address: 0, count: 0 },
						RDSR => Phase::Status { bit: 0 },
						_ => {
							debug!("simulated EEPROM: ignoring instruction 0x{:02x}", opcode);
							Phase::Ignored
						}
					}
				}
			},
			Phase::Address { address, count } => {
				let address = address << 1 | bit as u16;
				if count + 1 < 16 {
					Phase::Address { address, count: count + 1 }
				} else {
					Phase::Reading { address: address as usize % self.memory.len(), bit: 0 }
				}
			},
			other => other,
		};
	}

	fn shift_out(&mut self) {
		match self.phase {
			Phase::Reading { address, bit } => {
				self.out = Some(0 != self.memory[address] & (0x80 >> bit));
				self.phase = if bit + 1 < 8 {
					Phase::Reading { address, bit: bit + 1 }
				} else {
					Phase::Reading { address: (address + 1) % self.memory.len(), bit: 0 }
				};
			},
			Phase::Status { bit } => {
				self.out = Some(0 != self.status & (0x80 >> bit));
				self.phase = Phase::Status { bit: (bit + 1) % 8 };
			},
			_ => (),
		}
	}
}

impl Port for SimulatedEeprom {
	fn configure(&mut self, output_mask: u8) -> io::Result<()> {
		if 0 != output_mask & self.pins.data_in() {
			return Err(io::Error::new(io::ErrorKind::InvalidInput, "data-in pin configured as output"));
		}
		self.output_mask = Some(output_mask);
		Ok(())
	}

	fn write(&mut self, value: u8) -> io::Result<()> {
		if self.output_mask.is_none() {
			return Err(io::Error::new(io::ErrorKind::Other, "port written before configuring it"));
		}
		self.trace.push(value);

		let pins = self.pins;
		let previous = self.last;
		self.last = value;

		if 0 != value & pins.chip_select() {
			self.phase = Phase::Deselected;
			self.out = None;
			return Ok(());
		}
		if 0 != previous & pins.chip_select() {
			self.phase = Phase::Instruction { opcode: 0, count: 0 };
			self.out = None;
		}

		let was_high = 0 != previous & pins.clock();
		let is_high = 0 != value & pins.clock();
		if !was_high && is_high {
			self.shift_out();
		} else if was_high && !is_high {
			self.shift_in(0 != value & pins.data_out());
		}
		Ok(())
	}

	fn read(&mut self) -> io::Result<u8> {
		let data_in = self.pins.data_in();
		// pulled up unless driven
		let level = if self.out.unwrap_or(true) { data_in } else { 0 };
		Ok((self.last & !data_in) | level)
	}
}

#[cfg(test)]
mod test {
	use super::SimulatedEeprom;
	use crate::bus::PinAssignment;
	use crate::port::Port;

	const CLK: u8 = 0x01;
	const MOSI: u8 = 0x02;
	const MISO: u8 = 0x04;
	const CS: u8 = 0x08;

	fn clock_in(dev: &mut SimulatedEeprom, byte: u8) {
		for i in 0..8 {
			let data = if 0 != byte & (0x80 >> i) { MOSI } else { 0 };
			dev.write(CLK | data).unwrap();
			dev.write(data).unwrap();
		}
	}

	fn clock_out(dev: &mut SimulatedEeprom) -> u8 {
		let mut result = 0;
		for _ in 0..8 {
			dev.write(CLK).unwrap();
			result = result << 1 | (0 != dev.read().unwrap() & MISO) as u8;
			dev.write(0).unwrap();
		}
		result
	}

	#[test]
	fn read_auto_increments() {
		let mut dev = SimulatedEeprom::new(PinAssignment::default(), vec![0x11, 0x22, 0x33]);
		dev.configure(!MISO).unwrap();
		dev.write(CS).unwrap();
		dev.write(0).unwrap();
		clock_in(&mut dev, 0x03);
		clock_in(&mut dev, 0x00);
		clock_in(&mut dev, 0x01);
		assert_eq!(clock_out(&mut dev), 0x22);
		assert_eq!(clock_out(&mut dev), 0x33);
		assert_eq!(clock_out(&mut dev), 0x11);

		// deselecting releases the data line
		dev.write(CS).unwrap();
		assert_eq!(dev.read().unwrap(), CS | MISO);
	}

	#[test]
	fn read_status() {
		let mut dev = SimulatedEeprom::with_address_pattern(PinAssignment::default());
		dev.set_status(0x82);
		dev.configure(!MISO).unwrap();
		dev.write(0).unwrap();
		clock_in(&mut dev, 0x05);
		assert_eq!(clock_out(&mut dev), 0x82);
		assert_eq!(clock_out(&mut dev), 0x82);
	}

	#[test]
	fn unknown_instruction_keeps_line_released() {
		let mut dev = SimulatedEeprom::with_address_pattern(PinAssignment::default());
		dev.configure(!MISO).unwrap();
		dev.write(0).unwrap();
		clock_in(&mut dev, 0x06);
		assert_eq!(clock_out(&mut dev), 0xff);
		assert_eq!(dev.trace().len(), 1 + 16 + 16);
	}

	#[test]
	fn rejects_misconfiguration() {
		let mut dev = SimulatedEeprom::with_address_pattern(PinAssignment::default());
		assert!(dev.write(0).is_err());
		assert!(dev.configure(0xff).is_err());
		assert!(dev.trace().is_empty());
	}
}
