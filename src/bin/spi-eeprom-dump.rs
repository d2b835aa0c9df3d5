#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate spi_eeprom_dump;
use spi_eeprom_dump::*;

use std::convert::TryFrom;
use std::fs;
use std::process::exit;

use failure::ResultExt;

use spi_eeprom_dump::bus::{
	ClockInterval,
	PinAssignment,
};
use spi_eeprom_dump::executor::{
	Config,
	Executor,
	Isolation,
};
use spi_eeprom_dump::port::{
	FtdiTarget,
	Port,
	Registers,
	SimulatedEeprom,
};

fn parse_number(s: &str) -> AResult<u64> {
	if s.starts_with("0x") || s.starts_with("0X") {
		Ok(u64::from_str_radix(&s[2..], 16)?)
	} else {
		Ok(s.parse::<u64>()?)
	}
}

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: TryFrom<u64>,
	<T as TryFrom<u64>>::Error: failure::Fail,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	let value = parse_number(param)
		.with_context(|e| format!("invalid parameter {} {:?}: {}", name, param, e))?;
	let value = T::try_from(value)
		.with_context(|e| format!("parameter {} out of range ({}): {}", name, value, e))?;
	Ok(value)
}

fn get_optional_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<Option<T>>
where
	T: TryFrom<u64>,
	<T as TryFrom<u64>>::Error: failure::Fail,
{
	if matches.is_present(name) {
		Ok(Some(get_param(matches, name)?))
	} else {
		Ok(None)
	}
}

#[cfg(feature = "ftdi")]
fn open_ftdi(target: FtdiTarget) -> AResult<Box<dyn Port + Send>> {
	Ok(Box::new(port::open_ftdi(target)?))
}

#[cfg(not(feature = "ftdi"))]
fn open_ftdi(target: FtdiTarget) -> AResult<Box<dyn Port + Send>> {
	bail!("can't open FTDI device {}: built without the \"ftdi\" feature", target)
}

fn open_port(matches: &clap::ArgMatches, pins: PinAssignment) -> AResult<Box<dyn Port + Send>> {
	if matches.is_present("simulate") {
		let dev = match matches.value_of("image") {
			Some(image) => {
				let memory = fs::read(image).with_context(|e| format!("couldn't read image {}: {}", image, e))?;
				ensure!(!memory.is_empty(), "image {} is empty", image);
				SimulatedEeprom::new(pins, memory)
			},
			None => SimulatedEeprom::with_address_pattern(pins),
		};
		warn!("Using simulated EEPROM ({} bytes)", dev.memory().len());
		return Ok(Box::new(dev));
	}

	if let Some(target) = matches.value_of("ftdi") {
		let target: FtdiTarget = target.parse::<FtdiTarget>()
			.with_context(|e| format!("invalid FTDI device {:?}: {}", target, e))?;
		return open_ftdi(target);
	}

	let device = match matches.value_of("DEVICE") {
		Some(d) => d,
		None => bail!("need a GPIO device (or --ftdi / --simulate)"),
	};
	let output: usize = get_param(matches, "output-offset")?;
	let registers = Registers {
		output,
		input: get_optional_param(matches, "input-offset")?.unwrap_or(output),
		direction: get_optional_param(matches, "direction-offset")?,
	};
	debug!("GPIO registers of {}: {:?}", device, registers);

	if matches.is_present("mmap") {
		Ok(Box::new(port::open_mapped(device, registers)?))
	} else {
		Ok(Box::new(port::open_file(device, registers)?))
	}
}

fn hexdump(image: &[u8]) {
	for i in 0..image.len() {
		if 0 == i % 16 {
			print!("{:08x} ", i);
		} else if 0 == i % 8 {
			print!(" ");
		}
		print!(" {:02x}", image[i]);
		if 15 == i % 16 {
			println!("");
		}
	}
	if 0 != image.len() % 16 {
		println!("");
	}
	println!("{:08x}", image.len());
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@arg OUTPUT: default_value("eeprom.bin") "file to write the EEPROM contents to")
		(@arg DEVICE: -d --device +takes_value "GPIO register window (sysfs PCI resource, UIO device, /dev/port)")
		(@arg mmap: -m --mmap "map the register window instead of positional reads/writes")
		(@arg simulate: --simulate conflicts_with[DEVICE] "talk to a simulated EEPROM instead of hardware")
		(@arg image: --image +takes_value requires[simulate] "contents for the simulated EEPROM")
		(@arg clock: --clock +takes_value default_value("0x01") "clock pin mask")
		(@arg mosi: --mosi +takes_value default_value("0x02") "data-out pin mask")
		(@arg miso: --miso +takes_value default_value("0x04") "data-in pin mask")
		(@arg cs: --cs +takes_value default_value("0x08") "chip select pin mask")
		(@arg initial: --initial +takes_value default_value("0x00") "initial value of the other port pins")
		(@arg interval: -i --interval +takes_value default_value("1000") "half clock period in microseconds")
		(@arg realtime: --realtime +takes_value "run the bus master with SCHED_FIFO at this priority")
		(@arg cpu: --cpu +takes_value requires[realtime] "pin the bus master to this CPU")
		(@arg address: -a --address +takes_value default_value("0x0000") "EEPROM address to start reading at")
		(@arg bits: -b --bits +takes_value default_value("2048") "number of bits to read")
		(@arg hex: -x --hex "print a hexdump of the contents")
	)
	.arg(clap::Arg::with_name("ftdi")
		.long("ftdi")
		.takes_value(true)
		.value_name("VID:PID/CHANNEL")
		.conflicts_with_all(&["DEVICE", "simulate"])
		.help("bit-bang an FTDI channel, e.g. 0403:6010/1 (FT2232H, channel A)"))
	.arg(clap::Arg::with_name("output-offset")
		.long("output-offset")
		.takes_value(true)
		.default_value("0")
		.help("offset of the GPIO output register"))
	.arg(clap::Arg::with_name("input-offset")
		.long("input-offset")
		.takes_value(true)
		.help("offset of the GPIO input register (default: output register)"))
	.arg(clap::Arg::with_name("direction-offset")
		.long("direction-offset")
		.takes_value(true)
		.help("offset of the GPIO direction register (bit set = output)"))
	.get_matches();

	let pins = PinAssignment::new(
		get_param(&matches, "clock")?,
		get_param(&matches, "mosi")?,
		get_param(&matches, "miso")?,
		get_param(&matches, "cs")?,
	)?;
	let isolation = match get_optional_param(&matches, "realtime")? {
		Some(priority) => Isolation::Realtime {
			priority,
			cpu: get_optional_param(&matches, "cpu")?,
		},
		None => Isolation::Thread,
	};
	let config = Config {
		pins,
		interval: ClockInterval::from_micros(get_param(&matches, "interval")?),
		initial: get_param(&matches, "initial")?,
		isolation,
	};

	let address: u16 = get_param(&matches, "address")?;
	let bits: usize = get_param(&matches, "bits")?;
	ensure!(0 == bits % 8, "number of bits to read must be a multiple of 8 (got {})", bits);
	let output = matches.value_of("OUTPUT").unwrap_or("eeprom.bin");

	let port = open_port(&matches, pins)?;
	debug!("Setting up bit banger: {:?}", config);
	let mut executor = Executor::spawn(port, config)?;

	info!("Starting read, will output to {}", output);
	let image = eeprom::dump(&mut executor, address, bits / 8)?;
	executor.shutdown()?;

	fs::write(output, &image).with_context(|e| format!("couldn't write {}: {}", output, e))?;
	if matches.is_present("hex") {
		hexdump(&image);
	}
	info!("Read all {} bits of EEPROM!", bits);

	Ok(())
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		for cause in e.iter_causes() {
			error!("Caused by: {}", cause);
		}
		exit(1);
	}
}
