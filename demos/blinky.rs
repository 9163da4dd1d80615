// Copyright (c) 2018 The rust-gpio-sysfs Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use gpio_sysfs::pin::options::Direction;
use gpio_sysfs::pin::values::Level;
use gpio_sysfs::Sysfs;
use quicli::prelude::*;
use std::path::PathBuf;
use std::thread::sleep;
use std::time::{Duration, Instant};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// The GPIO number to blink
    line: u32,
    /// Time between level changes in milliseconds
    period_ms: u64,
    /// Duration over which to blink in milliseconds
    duration_ms: u64,
    /// Root of the sysfs GPIO tree
    #[structopt(long, default_value = "/sys/class/gpio", parse(from_os_str))]
    sysfs: PathBuf,
}

fn do_main(args: Cli) -> anyhow::Result<()> {
    let sysfs = Sysfs::with_root(&args.sysfs);
    let mut pin = sysfs.open_with_direction(args.line, Direction::Out)?;

    let half_period = Duration::from_millis(args.period_ms);
    let duration = Duration::from_millis(args.duration_ms);
    let start_time = Instant::now();
    let mut level = Level::Low;
    let mut mismatches = 0usize;
    while start_time.elapsed() < duration {
        level = Level::new(!level.is_high());
        pin.set_value(level)?;
        // Something else driving the line shows up as a read-back mismatch.
        let seen = pin.get_value()?;
        if seen != level {
            warn!("gpio{}: wrote {level:?}, read back {seen:?}", pin.number());
            mismatches += 1;
        }
        sleep(half_period);
    }

    pin.set_value(Level::Low)?;
    pin.close()?;
    if mismatches > 0 {
        anyhow::bail!("{mismatches} read-back mismatches on gpio{}", args.line);
    }
    Ok(())
}

fn main() -> CliResult {
    env_logger::init();
    let args = Cli::from_args();
    do_main(args).or_else(|e| {
        error!("{:?}", e);
        Ok(())
    })
}
