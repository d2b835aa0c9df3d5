//! FTDI multi-purpose ports (FT2232H, FT232H, ...) in asynchronous bit-bang
//! mode: every write sets the eight pins of one channel, reads sample them.
//!
//! Device access needs libftdi1 and the `ftdi` feature; the address parsing
//! below is always available.

use std::fmt;
use std::str::FromStr;

/// USB ids plus channel (1 = A, 2 = B, ...), written as `0403:6010/1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct FtdiTarget {
	pub vendor: u16,
	pub product: u16,
	pub interface: u8,
}

impl Default for FtdiTarget {
	/// FT2232H, channel A
	fn default() -> Self {
		FtdiTarget {
			vendor: 0x0403,
			product: 0x6010,
			interface: 1,
		}
	}
}

impl fmt::Display for FtdiTarget {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{:04x}:{:04x}/{}", self.vendor, self.product, self.interface)
	}
}

fn parse_id(s: &str) -> crate::AResult<u16> {
	let digits = if s.starts_with("0x") || s.starts_with("0X") { &s[2..] } else { s };
	ensure!(!digits.is_empty(), "empty USB id");
	Ok(u16::from_str_radix(digits, 16)?)
}

impl FromStr for FtdiTarget {
	type Err = failure::Error;

	/// `VID:PID[/CHANNEL]`, ids in hex; a bare `/CHANNEL` (or empty string)
	/// keeps the FT2232H ids
	fn from_str(s: &str) -> crate::AResult<Self> {
		let mut target = FtdiTarget::default();
		let ids = match s.find('/') {
			Some(pos) => {
				target.interface = s[pos + 1..].parse()?;
				&s[..pos]
			},
			None => s,
		};
		ensure!(
			target.interface >= 1 && target.interface <= 4,
			"FTDI channel must be between 1 and 4 (got {})", target.interface
		);

		if !ids.is_empty() {
			let colon = match ids.find(':') {
				Some(pos) => pos,
				None => bail!("expected VID:PID, got {:?}", ids),
			};
			target.vendor = parse_id(&ids[..colon])?;
			target.product = parse_id(&ids[colon + 1..])?;
		}
		Ok(target)
	}
}

#[cfg(feature = "ftdi")]
pub use self::device::FtdiPort;

#[cfg(feature = "ftdi")]
mod device {
	use std::io::{
		self,
		Write,
	};

	use super::FtdiTarget;
	use crate::port::Port;

	fn to_io(e: ftdi::Error) -> io::Error {
		io::Error::new(io::ErrorKind::Other, e.to_string())
	}

	/// One FTDI channel driven in bit-bang mode.
	pub struct FtdiPort {
		device: ftdi::Device,
		target: FtdiTarget,
	}

	// libftdi contexts may move between threads; we never share them
	unsafe impl Send for FtdiPort {}

	impl FtdiPort {
		pub(in crate::port) fn inner_open(target: FtdiTarget) -> io::Result<Self> {
			let interface = match target.interface {
				1 => ftdi::Interface::A,
				2 => ftdi::Interface::B,
				3 => ftdi::Interface::C,
				_ => ftdi::Interface::D,
			};
			let mut device = ftdi::find_by_vid_pid(target.vendor, target.product)
				.interface(interface)
				.open()
				.map_err(to_io)?;
			device.usb_reset().map_err(to_io)?;
			debug!("Opened FTDI device {}", target);
			Ok(FtdiPort { device, target })
		}

		pub fn target(&self) -> FtdiTarget {
			self.target
		}
	}

	impl Port for FtdiPort {
		fn configure(&mut self, output_mask: u8) -> io::Result<()> {
			self.device.set_bitmode(output_mask, ftdi::BitMode::Bitbang).map_err(to_io)
		}

		fn write(&mut self, value: u8) -> io::Result<()> {
			self.device.write_all(&[value])
		}

		fn read(&mut self) -> io::Result<u8> {
			self.device.read_pins().map_err(to_io)
		}
	}

	impl Drop for FtdiPort {
		fn drop(&mut self) {
			if let Err(e) = self.device.set_bitmode(0, ftdi::BitMode::Reset) {
				error!("Couldn't leave bit-bang mode on {}: {}", self.target, e);
			}
		}
	}
}
