use std::env;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use env_logger::{Builder, Env};
use linux_embedded_hal::I2cdev;
use log::{info, warn};
use mlx9064x_i2c::hal::{linux_fault_kind, HalController};
use mlx9064x_i2c::{
    BusPins, BusSession, SessionConfig, EEPROM_START, EEPROM_WORDS, FAST_MODE_HZ, FRAME_START,
    FRAME_WORDS, STANDARD_MODE_HZ,
};

/// Delay between frame reads.
const FRAME_PERIOD: Duration = Duration::from_millis(125);

/// Delay after a failed frame read, before trying again.
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

fn main() -> anyhow::Result<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        bail!("Two arguments required: <I2C bus> <camera address> [num_frames]");
    }
    let address: u8 = if let Some(hex_digits) = args[2].strip_prefix("0x") {
        u8::from_str_radix(hex_digits, 16)?
    } else {
        args[2].parse()?
    };
    let num_frames: Option<usize> = args.get(3).map(|count| count.parse()).transpose()?;
    let bus = I2cdev::new(Path::new(&args[1]))
        .with_context(|| format!("opening I2C bus {}", args[1]))?;

    // Linux sets up the pins (and the clock) for the bus, so the pins are only placeholders.
    let config = SessionConfig::new(BusPins::new(0, 0)).address(address);
    let controller = HalController::new(bus).with_classifier(linux_fault_kind);
    let mut session = BusSession::open(controller, config, STANDARD_MODE_HZ)?;
    info!("Bound camera at {:#04X}", address);

    let mut eeprom = vec![0u16; EEPROM_WORDS];
    session
        .read_words(EEPROM_START, &mut eeprom)
        .context("reading calibration EEPROM")?;
    for (index, row) in eeprom.chunks(16).enumerate() {
        let words: Vec<String> = row.iter().map(|word| format!("{:04X}", word)).collect();
        println!("{}: {}", EEPROM_START.offset(index * 16), words.join(" "));
    }

    session.reconfigure(FAST_MODE_HZ)?;
    let clock_hz = session
        .clock_hz()
        .ok_or_else(|| anyhow!("session closed after reconfiguring"))?;
    info!("Reading frames at {} Hz", clock_hz);

    let mut frame = vec![0u16; FRAME_WORDS];
    let mut frames_read = 0;
    while num_frames.map_or(true, |limit| frames_read < limit) {
        match session.read_words(FRAME_START, &mut frame) {
            Ok(()) => {
                frames_read += 1;
                // The last two words are the control and status registers at capture time.
                info!(
                    "Frame {}: first pixel {:#06X}, trailer {:04X?}",
                    frames_read,
                    frame[0],
                    &frame[FRAME_WORDS - 2..]
                );
            }
            Err(err) => {
                warn!("Frame read failed ({:?}): {}", err.fault_kind(), err);
                sleep(ERROR_BACKOFF);
                continue;
            }
        }
        sleep(FRAME_PERIOD);
    }
    session.close()?;
    Ok(())
}
