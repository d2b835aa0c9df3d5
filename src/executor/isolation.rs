use std::io;
use std::mem;

/// How the dispatcher thread is shielded from the rest of the process.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Isolation {
	/// plain thread with default scheduling
	Thread,
	/// `SCHED_FIFO` thread, optionally pinned to a single CPU
	Realtime {
		priority: i32,
		cpu: Option<usize>,
	},
}

impl Default for Isolation {
	fn default() -> Self {
		Isolation::Thread
	}
}

impl Isolation {
	/// apply to the calling thread
	pub fn apply(&self) -> crate::AResult<()> {
		match *self {
			Isolation::Thread => Ok(()),
			Isolation::Realtime { priority, cpu } => {
				if let Some(cpu) = cpu {
					pin_to_cpu(cpu)?;
				}
				set_fifo_priority(priority)
			},
		}
	}
}

// OS-specific. for now linux only.
fn pin_to_cpu(cpu: usize) -> crate::AResult<()> {
	ensure!(cpu < libc::CPU_SETSIZE as usize, "CPU {} out of range", cpu);
	with_context!(("couldn't pin bus master to CPU {}", cpu), {
		let res = unsafe {
			let mut set: libc::cpu_set_t = mem::zeroed();
			libc::CPU_ZERO(&mut set);
			libc::CPU_SET(cpu, &mut set);
			libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &set)
		};
		if 0 != res {
			return Err(io::Error::last_os_error().into());
		}
		debug!("Bus master pinned to CPU {}", cpu);
		Ok(())
	})
}

fn set_fifo_priority(priority: i32) -> crate::AResult<()> {
	with_context!(("couldn't switch bus master to SCHED_FIFO priority {}", priority), {
		let (min, max) = unsafe {
			(libc::sched_get_priority_min(libc::SCHED_FIFO), libc::sched_get_priority_max(libc::SCHED_FIFO))
		};
		ensure!(min <= priority && priority <= max, "priority not within {}..={}", min, max);

		let param = libc::sched_param { sched_priority: priority };
		let res = unsafe { libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &param) };
		if 0 != res {
			return Err(io::Error::from_raw_os_error(res).into());
		}
		debug!("Bus master running with SCHED_FIFO priority {}", priority);
		Ok(())
	})
}
