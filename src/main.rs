//! fectrl-sync: software model of a radio front-end controller's
//! clock-domain synchronization core.
//!
//! Runs the end-to-end bring-up and epoch distribution scenario:
//! release resets, bring the link up, enable epoch distribution and
//! the offset measurement, feed periodic reference epochs, and print
//! the resulting status.

use std::env;

use fectrl_sync::bus::map::{link as lreg, timing as treg, LINK_SYNC_BASE, TIMING_BASE};
use fectrl_sync::config::Config;
use fectrl_sync::system::SyncSystem;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut periods = 5usize;
    let mut args_iter = args[1..].iter();
    while let Some(arg) = args_iter.next() {
        match arg.as_str() {
            "--periods" | "-n" => {
                periods = args_iter
                    .next()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(periods);
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_usage();
                return Ok(());
            }
        }
    }

    let config = Config::get();
    let mut sys = SyncSystem::new(config)?;

    println!("Releasing domain resets...");
    sys.power_on();
    if !sys.settle(10_000) {
        anyhow::bail!("domains failed to come out of reset");
    }
    println!("All domains ready at t={}", sys.time);
    println!();

    // Bring the link up: the transceiver reports sync in both
    // directions once its reference clocks are stable.
    sys.set_link_sync(true, true);
    sys.register_write(LINK_SYNC_BASE + lreg::CONTROL, 0);
    for _ in 0..200 {
        sys.inject_sysref();
        sys.step();
    }
    let status = sys.register_read(LINK_SYNC_BASE + lreg::STATUS);
    println!("Link status: {:#x}", status);

    // Enable epoch distribution and the offset measurement.
    sys.register_write(
        TIMING_BASE + treg::EPOCH_CONTROL,
        treg::EPOCH_CONTROL_IN_ENABLE | treg::EPOCH_CONTROL_OUT_ENABLE,
    );
    sys.register_write(TIMING_BASE + treg::TDC_CONTROL, treg::TDC_CONTROL_ENABLE);
    sys.run(50);

    println!("Feeding {} reference epoch pulses...", periods);
    for _ in 0..periods {
        sys.inject_reference_epoch();
        sys.run(200);
    }
    println!();

    let tdc_status = sys.register_read(TIMING_BASE + treg::TDC_STATUS);
    if tdc_status & treg::TDC_STATUS_VALID != 0 {
        let r = sys.register_read(TIMING_BASE + treg::TDC_REF_OFFSET) as i32;
        let s = sys.register_read(TIMING_BASE + treg::TDC_SAMPLE_OFFSET) as i32;
        println!("Offset measurement: reference {} sample {} (delta {})", r, s, s - r);
    } else if tdc_status & treg::TDC_STATUS_TIMEOUT != 0 {
        println!("Offset measurement timed out");
    }
    println!();

    sys.print_summary();
    Ok(())
}

fn print_usage() {
    println!("Usage: fectrl-sync [--periods N]");
    println!();
    println!("Options:");
    println!("  -n, --periods N   Number of reference epoch pulses to feed (default 5)");
    println!("  -h, --help        Show this help");
}
