use std::fs;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{
	Path,
	PathBuf,
};

use super::{
	Port,
	Registers,
};

/// GPIO registers accessed with positional reads and writes (`/dev/port`,
/// I/O space PCI resources)
#[derive(Debug)]
pub struct FilePort {
	file: fs::File,
	registers: Registers,
	path: PathBuf,
}

impl FilePort {
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn read_byte(&self, offset: usize) -> io::Result<u8> {
		let mut buf = [0u8];
		// reading should get all data in one step (in this case)
		let l = self.file.read_at(&mut buf, offset as u64)?;
		if l != buf.len() {
			Err(io::Error::new(io::ErrorKind::UnexpectedEof, "failed to read register"))
		} else {
			Ok(buf[0])
		}
	}

	fn write_byte(&self, offset: usize, data: u8) -> io::Result<()> {
		// writing should push all data in one step (in this case)
		let l = self.file.write_at(&[data], offset as u64)?;
		if l != 1 {
			Err(io::Error::new(io::ErrorKind::Other, "failed to write register"))
		} else {
			Ok(())
		}
	}
}

impl Port for FilePort {
	fn configure(&mut self, output_mask: u8) -> io::Result<()> {
		match self.registers.direction {
			Some(offset) => self.write_byte(offset, output_mask),
			None => {
				debug!("{}: no direction register, pin directions fixed", self.path.display());
				Ok(())
			}
		}
	}

	fn write(&mut self, value: u8) -> io::Result<()> {
		self.write_byte(self.registers.output, value)
	}

	fn read(&mut self) -> io::Result<u8> {
		self.read_byte(self.registers.input)
	}
}

pub fn inner_open(path: &Path, registers: Registers) -> io::Result<FilePort> {
	let file = fs::OpenOptions::new()
		.read(true)
		.write(true)
		.open(path)?;

	// character devices like /dev/port report no size
	let size = file.metadata()?.len();
	if 0 != size {
		assert!(size < !0usize as u64);
		registers.check_within(size as usize)?;
	}

	Ok(FilePort {
		file,
		registers,
		path: path.to_owned(),
	})
}

#[cfg(test)]
mod test {
	use std::fs;
	use std::io::Write;

	use super::inner_open;
	use crate::port::{
		Port,
		Registers,
	};

	#[test]
	fn registers_in_plain_file() {
		let path = std::env::temp_dir().join(format!("spi-eeprom-dump-port-{}", std::process::id()));
		fs::File::create(&path).unwrap().write_all(&[0u8; 4]).unwrap();

		let regs = Registers { output: 1, input: 1, direction: Some(3) };
		{
			let mut port = inner_open(&path, regs).unwrap();
			port.configure(0xfb).unwrap();
			port.write(0x0a).unwrap();
			assert_eq!(port.read().unwrap(), 0x0a);
		}
		assert_eq!(fs::read(&path).unwrap(), vec![0x00, 0x0a, 0x00, 0xfb]);

		let out_of_range = Registers { output: 4, ..Registers::default() };
		assert!(inner_open(&path, out_of_range).is_err());

		fs::remove_file(&path).unwrap();
	}
}
