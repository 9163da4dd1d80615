// Copyright (c) 2018 The rust-gpio-sysfs Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Print every edge seen on a set of named input lines.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use gpio_sysfs::irq::{IrqMux, SharedPin};
use gpio_sysfs::pin::options::{Direction, Edge};
use gpio_sysfs::{PinMap, Sysfs};
use parking_lot::Mutex;
use quicli::prelude::*;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Cli {
    /// JSON file mapping line names to GPIO numbers
    #[structopt(parse(from_os_str))]
    pin_map: PathBuf,
    /// Names of the lines to watch
    names: Vec<String>,
    /// How long to watch, in seconds
    #[structopt(long, default_value = "10")]
    seconds: u64,
}

fn do_main(args: Cli) -> anyhow::Result<()> {
    let pin_map = PinMap::load_from_file(&args.pin_map)?;
    let sysfs = Sysfs::new();

    let mut pins: Vec<SharedPin> = Vec::new();
    let mut mux = IrqMux::new(args.names.len());
    for name in &args.names {
        let pin = sysfs.open_by_name_with_direction(&pin_map, name, Direction::In)?;
        let pin = Arc::new(Mutex::new(pin));
        let label = name.clone();
        mux.enable_callback(&pin, Edge::Both, move |pin, level| {
            println!("{label} (gpio{}): {level:?}", pin.number());
            Ok(())
        })?;
        mux.add(&pin)?;
        pins.push(pin);
    }

    mux.start()?;
    sleep(Duration::from_secs(args.seconds));
    if let Some(e) = mux.destroy() {
        error!("worker stopped early: {}", e);
    }

    for pin in pins {
        pin.lock().close()?;
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
