/// Software timed master for a 4-wire synchronous serial bus (SPI mode 0
/// style EEPROMs like the ST M95160)
///
/// Lines:
/// - CLOCK (out): symmetric, each phase held for one `ClockInterval`
/// - DATA OUT (out): set while CLOCK is high, captured by the device on the
///   falling CLOCK edge
/// - DATA IN (in): driven by the device on the rising CLOCK edge, sampled
///   right after raising CLOCK
/// - CHIP SELECT (out, active low): held low for a whole transfer; the
///   device auto-increments its address as long as it stays low
///
/// All pins live in a single 8-bit GPIO port word; every pin change is a
/// full port write.

mod hardware;
mod low_level;
mod state;

pub use self::hardware::{
	ClockInterval,
	Pin,
	PinAssignment,
	reliable_sleep,
	sleep_until,
};

pub use self::state::{
	BusState,
	HardwareFault,
};
