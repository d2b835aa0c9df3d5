//! GPIO port primitives the bus master drives.
//!
//! A port is one 8-bit word of pins: writing sets all output pins at once,
//! reading returns the current level of all pins (outputs included).

use std::io;
use std::path::Path;

mod file;
mod ftdi;
mod mapped;
mod sim;

pub use self::file::FilePort;
pub use self::ftdi::FtdiTarget;
#[cfg(feature = "ftdi")]
pub use self::ftdi::FtdiPort;
pub use self::mapped::MappedPort;
pub use self::sim::{
	SimulatedEeprom,
	Trace,
};

pub trait Port {
	/// set pin directions; bits set in `output_mask` are driven by us
	fn configure(&mut self, output_mask: u8) -> io::Result<()>;
	fn write(&mut self, value: u8) -> io::Result<()>;
	fn read(&mut self) -> io::Result<u8>;
}

impl<'a, P: ?Sized + Port> Port for &'a mut P {
	fn configure(&mut self, output_mask: u8) -> io::Result<()> {
		P::configure(&mut **self, output_mask)
	}
	fn write(&mut self, value: u8) -> io::Result<()> {
		P::write(&mut **self, value)
	}
	fn read(&mut self) -> io::Result<u8> {
		P::read(&mut **self)
	}
}

impl<P: ?Sized + Port> Port for Box<P> {
	fn configure(&mut self, output_mask: u8) -> io::Result<()> {
		P::configure(&mut **self, output_mask)
	}
	fn write(&mut self, value: u8) -> io::Result<()> {
		P::write(&mut **self, value)
	}
	fn read(&mut self) -> io::Result<u8> {
		P::read(&mut **self)
	}
}

/// Byte offsets of the GPIO registers within a register window.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Registers {
	pub output: usize,
	pub input: usize,
	/// bit set = output; without direction register the pins are fixed
	pub direction: Option<usize>,
}

impl Registers {
	fn check_within(&self, len: usize) -> io::Result<()> {
		let mut offsets = vec![self.output, self.input];
		offsets.extend(self.direction);
		for offset in offsets {
			if offset >= len {
				return Err(io::Error::new(
					io::ErrorKind::InvalidInput,
					format!("register offset 0x{:x} outside of window (length 0x{:x})", offset, len),
				));
			}
		}
		Ok(())
	}
}

impl Default for Registers {
	fn default() -> Self {
		Registers {
			output: 0,
			input: 0,
			direction: None,
		}
	}
}

pub fn open_mapped<P: AsRef<Path>>(path: P, registers: Registers) -> crate::AResult<MappedPort> {
	let path = path.as_ref();
	with_context!(("couldn't map GPIO registers from {}", path.display()), {
		Ok(mapped::inner_open(path, registers)?)
	})
}

pub fn open_file<P: AsRef<Path>>(path: P, registers: Registers) -> crate::AResult<FilePort> {
	let path = path.as_ref();
	with_context!(("couldn't open GPIO registers in {}", path.display()), {
		Ok(file::inner_open(path, registers)?)
	})
}

#[cfg(feature = "ftdi")]
pub fn open_ftdi(target: FtdiTarget) -> crate::AResult<FtdiPort> {
	with_context!(("couldn't open FTDI device {}", target), {
		Ok(FtdiPort::inner_open(target)?)
	})
}

#[cfg(test)]
mod test {
	use super::Registers;

	#[test]
	fn registers_within_window() {
		let regs = Registers { output: 3, input: 3, direction: Some(1) };
		assert!(regs.check_within(4).is_ok());
		assert!(regs.check_within(3).is_err());
		let regs = Registers { direction: Some(8), ..Registers::default() };
		assert!(regs.check_within(8).is_err());
	}
}
