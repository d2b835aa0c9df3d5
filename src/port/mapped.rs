use std::ffi::CString;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{
	FromRawFd,
};
use std::path::{
	Path,
	PathBuf,
};
use std::ptr;

use libc::{
	MAP_SHARED,
	O_CLOEXEC,
	O_RDWR,
	O_SYNC,
	PROT_READ,
	PROT_WRITE,
	c_void,
	mmap,
	munmap,
	open,
};

use super::{
	Port,
	Registers,
};

/// GPIO registers in a memory mapped window (sysfs PCI resource, UIO, ...)
#[derive(Debug)]
pub struct MappedPort {
	ptr: ptr::NonNull<u8>, // u8 instead of void for easier offset operations
	len: usize,
	registers: Registers,
	path: PathBuf,
	// keeps the fd open as long as the mapping lives
	_file: fs::File,
}

// the mapping is only ever accessed through `&mut self`
unsafe impl Send for MappedPort {}

impl Drop for MappedPort {
	fn drop(&mut self) {
		unsafe {
			let res = munmap(
				self.ptr.as_ptr() as *mut c_void,
				self.len,
			);
			if 0 != res {
				error!("munmap of {} failed: {}", self.path.display(), io::Error::last_os_error());
			}
		}
	}
}

impl MappedPort {
	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn len(&self) -> usize {
		self.len
	}

	fn read_byte(&self, offset: usize) -> u8 {
		assert!(offset < self.len);
		unsafe { ptr::read_volatile(self.ptr.as_ptr().add(offset)) }
	}

	fn write_byte(&mut self, offset: usize, data: u8) {
		assert!(offset < self.len);
		unsafe { ptr::write_volatile(self.ptr.as_ptr().add(offset), data) }
	}
}

impl Port for MappedPort {
	fn configure(&mut self, output_mask: u8) -> io::Result<()> {
		match self.registers.direction {
			Some(offset) => self.write_byte(offset, output_mask),
			None => debug!("{}: no direction register, pin directions fixed", self.path.display()),
		}
		Ok(())
	}

	fn write(&mut self, value: u8) -> io::Result<()> {
		let offset = self.registers.output;
		self.write_byte(offset, value);
		Ok(())
	}

	fn read(&mut self) -> io::Result<u8> {
		Ok(self.read_byte(self.registers.input))
	}
}

// TODO: exclusive open / file locking?
pub fn inner_open(path: &Path, registers: Registers) -> io::Result<MappedPort> {
	let c_path = CString::new(path.as_os_str().as_bytes())?;

	let fd = unsafe { open(c_path.as_ptr(), O_RDWR | O_CLOEXEC | O_SYNC) };
	if -1 == fd {
		return Err(io::Error::last_os_error());
	}
	// now get fd managed to prevent resource leak
	let f = unsafe { fs::File::from_raw_fd(fd) };

	let size = f.metadata()?.len();
	assert!(size < !0usize as u64);
	let size = size as usize;
	if 0 == size {
		return Err(io::Error::new(io::ErrorKind::InvalidInput, "register window has no size"));
	}
	registers.check_within(size)?;

	let area = unsafe {
		mmap(
			ptr::null_mut(),
			size,
			PROT_READ | PROT_WRITE,
			MAP_SHARED,
			fd,
			0,
		)
	};

	if area as usize == !0usize {
		return Err(io::Error::last_os_error());
	}
	match ptr::NonNull::new(area as *mut u8) {
		None => Err(io::Error::new(io::ErrorKind::Other, "mmap returned NULL")),
		Some(area) => Ok(MappedPort {
			ptr: area,
			len: size,
			registers,
			path: path.to_owned(),
			_file: f,
		}),
	}
}
