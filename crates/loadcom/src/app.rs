//! Subcommand bodies for the transmit and receive sides

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context;
use log::{info, warn};

use loadlink::{affinity, LinkConfig, LinkEvent, LinkReceiver, PhyDriver, PhySampler, Transmitter};

/// Transmit `file` as a single packet
///
/// Reads the whole file into memory, occupies the PHY for the duration
/// of one packet, and returns when the final chip's deadline has
/// passed.
pub fn run_tx(config: &LinkConfig, file: &Path) -> Result<(), anyhow::Error> {
    let payload = fs::read(file)
        .with_context(|| format!("unable to read payload file \"{}\"", file.display()))?;

    banner(config);
    pin_if_single_core(config);

    info!(
        "transmitting {} bytes (~{} s on the air)",
        payload.len(),
        airtime_secs(config, payload.len())
    );

    let mut tx = Transmitter::new(PhyDriver::new(config), config);
    tx.send_packet(&payload);

    info!("transmission complete");
    Ok(())
}

/// Receive packets until interrupted
///
/// Runs the sampler and receive chain forever. Every CRC-verified
/// payload becomes a new `<epoch-nanoseconds>.bin` file in the current
/// directory; a failure to create that file is fatal.
pub fn run_rx(config: &LinkConfig) -> Result<(), anyhow::Error> {
    banner(config);
    pin_if_single_core(config);

    let sampler = PhySampler::new(config);
    let mut rx = LinkReceiver::new(config);

    for event in rx.iter_events(sampler) {
        match event {
            LinkEvent::Packet(Ok(payload)) => {
                let filename = output_filename()?;
                fs::write(&filename, &payload)
                    .with_context(|| format!("unable to write \"{}\"", filename))?;
                println!("received {} bytes -> {}", payload.len(), filename);
            }
            // already logged by the receive chain
            LinkEvent::Packet(Err(_)) => {}
            LinkEvent::Lock(_) | LinkEvent::Symbol(_) => {}
        }
    }

    Ok(())
}

/// Print the shared link parameters both sides must agree on
fn banner(config: &LinkConfig) {
    println!(
        "code: {} chips, chip period: {} ms, {} PHY worker(s)",
        config.code().len(),
        config.chip_period().as_millis(),
        config.effective_threads()
    );
}

// With one worker the two processes must meet on the same core.
fn pin_if_single_core(config: &LinkConfig) {
    if config.effective_threads() == 1 {
        if let Err(err) = affinity::pin_to_core(0) {
            warn!("could not pin to core 0: {}", err);
        }
    }
}

fn output_filename() -> Result<String, anyhow::Error> {
    let epoch_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the epoch")?
        .as_nanos();
    Ok(format!("{}.bin", epoch_ns))
}

// Rough air time: delimiters plus 9 bits per byte (payload + CRC),
// one code period per bit.
fn airtime_secs(config: &LinkConfig, payload_len: usize) -> u64 {
    let bits = 2 * config.delimiter_bits() + 9 * (payload_len + 2);
    let bit_period = config.chip_period() * config.code().len() as u32;
    (bit_period * bits as u32).as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_airtime_estimate() {
        let mut config = LinkConfig::default();
        config.with_delimiter_bits(20);
        // 2 bytes -> 40 + 36 bits at ~16.4 s per bit
        let secs = airtime_secs(&config, 2);
        assert!(secs > 1000 && secs < 1400, "airtime {} s", secs);
    }

    #[test]
    fn test_output_filename_is_epoch_ns() {
        let name = output_filename().unwrap();
        let stem = name.strip_suffix(".bin").unwrap();
        assert!(stem.parse::<u128>().unwrap() > 1_500_000_000 * 1_000_000_000);
    }
}
