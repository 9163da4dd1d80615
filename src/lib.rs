// Copyright (c) 2018 The rust-gpio-sysfs Project Developers.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The `gpio-sysfs` crate provides access to GPIO lines through the legacy
//! [sysfs interface](https://www.kernel.org/doc/Documentation/gpio/sysfs.txt)
//! at `/sys/class/gpio`, including edge interrupts.
//!
//! A [`Pin`] is one exported line. It is configured with
//! [`Pin::set_direction`] and [`Pin::enable_irq`], read and written with
//! [`Pin::get_value`] and [`Pin::set_value`], and released with
//! [`Pin::close`]. Interrupts are consumed either one pin at a time with
//! [`Pin::timed_wait`], or for many pins at once from a background thread
//! with an [`IrqMux`](irq::IrqMux).
//!
//! # Examples
//!
//! Mirror an input line onto an output line, waking only on edges:
//!
//! ```no_run
//! use gpio_sysfs::pin::options::{Direction, Edge};
//! use gpio_sysfs::irq::WaitOutcome;
//! use gpio_sysfs::Sysfs;
//!
//! fn mirror_gpio(inputline: u32, outputline: u32) -> Result<(), gpio_sysfs::Error> {
//!     let sysfs = Sysfs::new();
//!     let mut input = sysfs.open_with_direction(inputline, Direction::In)?;
//!     let mut output = sysfs.open_with_direction(outputline, Direction::Out)?;
//!     input.enable_irq(Edge::Both)?;
//!
//!     loop {
//!         if let WaitOutcome::Edge(level) = input.wait()? {
//!             println!("{:?}", level);
//!             output.set_value(level)?;
//!         }
//!     }
//! }
//!
//! # fn main() -> Result<(), gpio_sysfs::Error> {
//! #     mirror_gpio(0, 1)
//! # }
//! ```
//!
//! Lines can also be opened by name through an explicit [`PinMap`]:
//!
//! ```no_run
//! use gpio_sysfs::{PinMap, Sysfs};
//!
//! # fn main() -> Result<(), gpio_sysfs::Error> {
//! let pins = PinMap::load_from_file("/etc/gpio-pins.json")?;
//! let mut led = Sysfs::new().open_by_name(&pins, "led")?;
//! println!("Value: {:?}", led.get_value()?);
//! led.close()?;
//! # Ok(()) }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod errors;

pub mod sysfs;

pub mod pin;

pub mod irq;

pub mod pin_map;

pub use errors::{Error, ErrorKind, Result};
pub use pin::Pin;
pub use pin_map::PinMap;
pub use sysfs::Sysfs;
