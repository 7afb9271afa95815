//! CPU affinity for single-core operation
//!
//! When the link runs with a single PHY worker, both processes must
//! contend for the *same* logical core or there is no channel at all.
//! Pinning both sides to core 0 arranges that. With multiple workers
//! every core is loaded anyway and affinity is left unconstrained.

use std::io;

/// Pin the calling thread to one logical core
///
/// Linux only; elsewhere this is a no-op that reports success. Errors
/// are reported so the caller can log them, but a failed pin merely
/// degrades the link; it does not prevent operation.
#[cfg(target_os = "linux")]
pub fn pin_to_core(core: usize) -> io::Result<()> {
    // SAFETY: cpu_set_t is plain-old-data; zeroed is a valid empty set.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);
        if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn pin_to_core(_core: usize) -> io::Result<()> {
    Ok(())
}

/// Number of logical cores usable for PHY workers
pub fn hardware_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
