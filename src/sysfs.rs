//! The sysfs GPIO register interface.
//!
//! Each exported line `N` appears as a directory `gpioN` under the root with
//! `direction`, `value` and `edge` attribute files. Lines are exported and
//! unexported by writing `N` to the `export` and `unexport` control files.

use std::{
    fs::{File, OpenOptions},
    io::{Read, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use log::debug;

use crate::{
    errors::Result,
    pin::{options::Direction, Pin},
    pin_map::PinMap,
};

/// Default location of the GPIO register files.
pub const SYSFS_GPIO_PATH: &str = "/sys/class/gpio";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attr {
    Direction,
    Value,
    Edge,
}

impl Attr {
    const fn file_name(self) -> &'static str {
        match self {
            Attr::Direction => "direction",
            Attr::Value => "value",
            Attr::Edge => "edge",
        }
    }
}

/// Handle onto a sysfs GPIO register tree.
///
/// Cloning is cheap; every [`Pin`] keeps a clone of the tree it was opened
/// from.
#[derive(Debug, Clone)]
pub struct Sysfs {
    root: Arc<Path>,
}

impl Default for Sysfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Sysfs {
    /// The system register tree at [`SYSFS_GPIO_PATH`].
    pub fn new() -> Self {
        Self::with_root(SYSFS_GPIO_PATH)
    }

    /// A register tree rooted somewhere other than `/sys/class/gpio`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: Arc::from(root.as_ref()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Export line `number` and read its current direction.
    pub fn open(&self, number: u32) -> Result<Pin> {
        Pin::open(self, number)
    }

    /// Export line `number` and configure its direction.
    pub fn open_with_direction(&self, number: u32, direction: Direction) -> Result<Pin> {
        Pin::open_with_direction(self, number, direction)
    }

    /// Resolve `name` through `pins` and open the line it maps to.
    pub fn open_by_name(&self, pins: &PinMap, name: &str) -> Result<Pin> {
        self.open(pins.lookup(name)?)
    }

    /// Resolve `name` through `pins` and open the line with a direction.
    pub fn open_by_name_with_direction(
        &self,
        pins: &PinMap,
        name: &str,
        direction: Direction,
    ) -> Result<Pin> {
        self.open_with_direction(pins.lookup(name)?, direction)
    }

    pub(crate) fn export(&self, number: u32) -> std::io::Result<()> {
        debug!("export gpio{number}");
        write_file(&self.root.join("export"), number.to_string().as_bytes())
    }

    pub(crate) fn unexport(&self, number: u32) -> std::io::Result<()> {
        debug!("unexport gpio{number}");
        write_file(&self.root.join("unexport"), number.to_string().as_bytes())
    }

    pub(crate) fn attr_path(&self, number: u32, attr: Attr) -> PathBuf {
        self.root
            .join(format!("gpio{number}"))
            .join(attr.file_name())
    }

    pub(crate) fn write_attr(&self, number: u32, attr: Attr, value: &str) -> std::io::Result<()> {
        debug!("gpio{number}: {} <- {value}", attr.file_name());
        write_file(&self.attr_path(number, attr), value.as_bytes())
    }

    /// Read the first byte of an attribute file.
    pub(crate) fn read_attr_byte(&self, number: u32, attr: Attr) -> std::io::Result<u8> {
        let mut buf = [0u8; 1];
        File::open(self.attr_path(number, attr))?.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Open the value file; outputs need write access, inputs only read.
    pub(crate) fn open_value(&self, number: u32, direction: Direction) -> std::io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(direction == Direction::Out)
            .open(self.attr_path(number, Attr::Value))
    }
}

/// Single write to an existing register file. A short write is an error.
fn write_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
    let written = file.write(contents)?;
    if written != contents.len() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            format!("short write to {}", path.display()),
        ));
    }
    Ok(())
}
