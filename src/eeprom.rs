//! Instructions of ST M95xxx SPI EEPROMs (M95160: 16 Kbit, 2048 x 8bit)
//!
//! Every instruction starts with chip select going low, followed by an 8-bit
//! opcode (MSB first). READ and WRITE take a 16-bit address; while chip select
//! stays low after a READ the address register auto-increments, so one READ
//! can stream the whole memory.

use crate::bits;
use crate::executor::{
	Executor,
	Request,
};

pub const WRSR: u8 = 0x01; // write status register
pub const WRITE: u8 = 0x02; // write data; needs WREN first
pub const READ: u8 = 0x03; // read data
pub const WRDI: u8 = 0x04; // write disable (clears WEL)
pub const RDSR: u8 = 0x05; // read status register
pub const WREN: u8 = 0x06; // write enable (sets WEL)

pub const ADDRESS_WIDTH: usize = 16;

// status register bits
pub const STATUS_WIP: u8 = 0x01; // write in progress
pub const STATUS_WEL: u8 = 0x02; // write enable latch

pub fn read_request(address: u16, byte_count: usize) -> Request {
	let mut command = bits::from_byte(READ).to_vec();
	command.extend(bits::from_word(address as u32, ADDRESS_WIDTH));

	Request::new(command).select().read(byte_count * 8)
}

pub fn status_request() -> Request {
	Request::from_bytes(&[RDSR]).select().read(8)
}

pub fn read_status(executor: &mut Executor) -> crate::AResult<u8> {
	let response = executor.transfer(status_request())?;
	ensure!(response.len() == 8, "status read returned {} bits", response.len());
	Ok(response.to_bytes()[0])
}

/// Read `byte_count` bytes starting at `address` with a single READ.
pub fn dump(executor: &mut Executor, address: u16, byte_count: usize) -> crate::AResult<Vec<u8>> {
	info!("Sending READ starting from address 0x{:04x}", address);
	let response = executor.transfer(read_request(address, byte_count))?;
	ensure!(response.len() == byte_count * 8,
		"Unexpected response length: {} bits (expected {})", response.len(), byte_count * 8
	);

	Ok(response.to_bytes())
}
