use std::{
    fs::File,
    os::fd::{AsFd, BorrowedFd},
};

use log::{debug, warn};

use crate::{
    errors::{ErrorKind, Result},
    sysfs::{Attr, Sysfs},
    Error,
};

pub mod options;
pub mod values;

use options::{Direction, Edge};
use values::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Validity {
    Valid,
    Invalid,
}

/// One exported GPIO line.
///
/// The value file is opened on first access and kept open. An I/O failure on
/// it drops only the descriptor; the next access reopens it. A failed
/// export or direction write invalidates the whole pin, after which only
/// [`Pin::close`] and [`Pin::reopen`] are accepted.
#[derive(Debug)]
pub struct Pin {
    sysfs: Sysfs,
    number: u32,
    direction: Direction,
    irq_mode: Edge,
    validity: Validity,
    value_fd: Option<File>,
}

impl Pin {
    pub(crate) fn open(sysfs: &Sysfs, number: u32) -> Result<Self> {
        let mut pin = Self {
            sysfs: sysfs.clone(),
            number,
            direction: Direction::In,
            irq_mode: Edge::None,
            validity: Validity::Invalid,
            value_fd: None,
        };
        pin.reopen()?;
        Ok(pin)
    }

    pub(crate) fn open_with_direction(
        sysfs: &Sysfs,
        number: u32,
        direction: Direction,
    ) -> Result<Self> {
        let mut pin = Self::open(sysfs, number)?;
        if let Err(e) = pin.set_direction(direction) {
            if let Err(unexport) = pin.sysfs.unexport(number) {
                warn!("gpio{number}: unexport after failed open: {unexport}");
            }
            return Err(e);
        }
        Ok(pin)
    }

    /// Export the line again and re-read its direction.
    ///
    /// This is the way back from an invalid or closed pin.
    pub fn reopen(&mut self) -> Result<()> {
        debug!("open gpio{}", self.number);
        self.value_fd = None;
        self.validity = Validity::Invalid;

        self.sysfs
            .export(self.number)
            .map_err(|e| self.register_error("export", e))?;

        let byte = self
            .sysfs
            .read_attr_byte(self.number, Attr::Direction)
            .map_err(|e| self.register_error("read direction", e))?;
        self.direction = Direction::from_register(byte).ok_or_else(|| {
            let e = std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unexpected direction byte {byte:#04x}"),
            );
            self.register_error("read direction", e)
        })?;

        self.validity = Validity::Valid;
        Ok(())
    }

    /// Release the value descriptor and unexport the line.
    ///
    /// The pin is unusable afterwards, even if unexporting fails.
    pub fn close(&mut self) -> Result<()> {
        debug!("close gpio{}", self.number);
        self.value_fd = None;
        self.validity = Validity::Invalid;
        self.sysfs
            .unexport(self.number)
            .map_err(|e| self.register_error("unexport", e))
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Edge mode last written successfully with [`Pin::enable_irq`].
    pub fn irq_mode(&self) -> Edge {
        self.irq_mode
    }

    pub fn is_valid(&self) -> bool {
        self.validity == Validity::Valid
    }

    pub fn set_direction(&mut self, direction: Direction) -> Result<()> {
        debug!("gpio{}: direction {}", self.number, direction.as_str());
        self.ensure_valid()?;

        if let Err(e) = self
            .sysfs
            .write_attr(self.number, Attr::Direction, direction.as_str())
        {
            return Err(self.register_error("write direction", e));
        }

        self.direction = direction;
        // Reopened on demand with the access mode of the new direction.
        self.value_fd = None;
        Ok(())
    }

    /// Arm the line to report `mode` transitions. Outputs cannot be armed.
    ///
    /// A failed edge write is reported but leaves the pin usable.
    pub fn enable_irq(&mut self, mode: Edge) -> Result<()> {
        debug!("gpio{}: edge {}", self.number, mode.as_str());
        if self.direction == Direction::Out {
            return Err(Error::invalid_operation(
                self.number,
                "output pins cannot be armed for interrupts",
            ));
        }
        self.ensure_valid()?;

        self.sysfs
            .write_attr(self.number, Attr::Edge, mode.as_str())
            .map_err(|e| {
                warn!("gpio{}: set edge failed: {e}", self.number);
                Error::io(self.number, "write edge", e)
            })?;

        self.irq_mode = mode;
        Ok(())
    }

    pub fn set_value(&mut self, level: Level) -> Result<()> {
        debug!("gpio{}: set {level:?}", self.number);
        if self.direction != Direction::Out {
            return Err(Error::invalid_operation(
                self.number,
                "input pins cannot be written",
            ));
        }
        self.ensure_valid()?;

        self.with_value_fd("write value", |file| values::write_level(file, level))
    }

    /// Read the current level. Works for inputs and outputs alike.
    pub fn get_value(&mut self) -> Result<Level> {
        self.ensure_valid()?;
        self.with_value_fd("read value", |file| values::read_level(file))
    }

    /// Borrow the value descriptor, opening it if needed, for callers that
    /// poll the line themselves.
    pub fn value_fd(&mut self) -> Result<BorrowedFd<'_>> {
        self.ensure_valid()?;
        let file: &File = self.value_file()?;
        Ok(file.as_fd())
    }

    /// A second handle onto the same open value file, for the interrupt
    /// multiplexer's polling set.
    pub(crate) fn try_clone_value_fd(&mut self) -> Result<File> {
        self.ensure_valid()?;
        self.with_value_fd("duplicate value descriptor", |file| file.try_clone())
    }

    /// Drop the value descriptor after a failed poll on it.
    pub(crate) fn discard_value_fd(&mut self) {
        self.value_fd = None;
    }

    pub(crate) fn ensure_valid(&self) -> Result<()> {
        match self.validity {
            Validity::Valid => Ok(()),
            Validity::Invalid => Err(ErrorKind::InvalidPin(self.number).into()),
        }
    }

    fn value_file(&mut self) -> Result<&mut File> {
        let file = match self.value_fd.take() {
            Some(file) => file,
            None => self
                .sysfs
                .open_value(self.number, self.direction)
                .map_err(|e| {
                    warn!("gpio{}: can't open value file: {e}", self.number);
                    Error::io(self.number, "open value", e)
                })?,
        };
        Ok(self.value_fd.insert(file))
    }

    /// Run `f` on the value descriptor; on failure the descriptor is closed.
    fn with_value_fd<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut File) -> std::io::Result<T>,
    ) -> Result<T> {
        match f(self.value_file()?) {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!("gpio{}: {op} failed: {e}", self.number);
                self.value_fd = None;
                Err(Error::io(self.number, op, e))
            }
        }
    }

    /// A failed register write: the pin is invalid from here on.
    fn register_error(&mut self, op: &'static str, e: std::io::Error) -> Error {
        warn!("gpio{}: {op} failed: {e}", self.number);
        self.validity = Validity::Invalid;
        self.value_fd = None;
        Error::io(self.number, op, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sysfs::testing::FakeSysfs;

    #[test]
    fn open_reads_direction() {
        let fake = FakeSysfs::new();
        fake.add_line(17, "out");
        let pin = fake.sysfs.open(17).unwrap();
        assert_eq!(pin.number(), 17);
        assert_eq!(pin.direction(), Direction::Out);
        assert_eq!(pin.irq_mode(), Edge::None);
        assert!(pin.is_valid());
        assert!(pin.value_fd.is_none());
        assert_eq!(fake.read("export"), "17");
    }

    #[test]
    fn open_close_round_trip() {
        let fake = FakeSysfs::new();
        fake.add_line(17, "in");
        let mut pin = fake.sysfs.open(17).unwrap();
        pin.get_value().unwrap();
        pin.close().unwrap();
        assert_eq!(fake.read("unexport"), "17");
        assert!(!pin.is_valid());
        assert!(pin.value_fd.is_none());
        assert!(matches!(pin.get_value().unwrap_err().kind(), ErrorKind::InvalidPin(17)));
    }

    #[test]
    fn open_fails_when_export_fails() {
        let fake = FakeSysfs::new();
        std::fs::remove_file(fake.sysfs.root().join("export")).unwrap();
        let err = fake.sysfs.open(3).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io { pin: 3, .. }));
        assert!(err.raw_os_error().is_some());
    }

    #[test]
    fn open_fails_for_line_without_registers() {
        let fake = FakeSysfs::new();
        let err = fake.sysfs.open(5).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io { op: "read direction", .. }));
    }

    #[test]
    fn open_with_direction_writes_direction() {
        let fake = FakeSysfs::new();
        fake.add_line(8, "in");
        let pin = fake.sysfs.open_with_direction(8, Direction::Out).unwrap();
        assert_eq!(pin.direction(), Direction::Out);
        assert_eq!(fake.read("gpio8/direction"), "out");
    }

    #[test]
    fn direction_failure_invalidates_pin() {
        let fake = FakeSysfs::new();
        fake.add_line(4, "in");
        let mut pin = fake.sysfs.open(4).unwrap();
        pin.get_value().unwrap();
        fake.remove_attr(4, Attr::Direction);

        assert!(pin.set_direction(Direction::Out).is_err());
        assert!(!pin.is_valid());
        assert!(pin.value_fd.is_none());
        assert_eq!(pin.direction(), Direction::In);
        assert!(matches!(pin.get_value().unwrap_err().kind(), ErrorKind::InvalidPin(4)));
        let err = pin.set_direction(Direction::In).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidPin(4)));
    }

    #[test]
    fn reopen_recovers_invalid_pin() {
        let fake = FakeSysfs::new();
        fake.add_line(4, "in");
        let mut pin = fake.sysfs.open(4).unwrap();
        fake.remove_attr(4, Attr::Direction);
        assert!(pin.set_direction(Direction::Out).is_err());

        fake.add_line(4, "out");
        pin.reopen().unwrap();
        assert!(pin.is_valid());
        assert_eq!(pin.direction(), Direction::Out);
    }

    #[test]
    fn set_then_get_round_trip() {
        let fake = FakeSysfs::new();
        fake.add_line(21, "in");
        let mut pin = fake.sysfs.open_with_direction(21, Direction::Out).unwrap();

        pin.set_value(Level::High).unwrap();
        assert_eq!(pin.get_value().unwrap(), Level::High);
        pin.set_value(Level::Low).unwrap();
        assert_eq!(pin.get_value().unwrap(), Level::Low);
        assert_eq!(&fake.read("gpio21/value")[..1], "0");
    }

    #[test]
    fn set_value_on_input_is_rejected_without_side_effects() {
        let fake = FakeSysfs::new();
        fake.add_line(2, "in");
        let mut pin = fake.sysfs.open(2).unwrap();

        let err = pin.set_value(Level::High).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidOperation { pin: 2, .. }));
        assert!(pin.value_fd.is_none());
        assert!(pin.is_valid());
        assert_eq!(fake.read("gpio2/value"), "0\n");
    }

    #[test]
    fn enable_irq_on_output_is_rejected_without_side_effects() {
        let fake = FakeSysfs::new();
        fake.add_line(2, "out");
        let mut pin = fake.sysfs.open(2).unwrap();

        let err = pin.enable_irq(Edge::Rising).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidOperation { pin: 2, .. }));
        assert_eq!(pin.irq_mode(), Edge::None);
        assert_eq!(fake.read("gpio2/edge"), "none\n");
    }

    #[test]
    fn enable_irq_writes_edge() {
        let fake = FakeSysfs::new();
        fake.add_line(6, "in");
        let mut pin = fake.sysfs.open(6).unwrap();
        pin.enable_irq(Edge::Both).unwrap();
        assert_eq!(pin.irq_mode(), Edge::Both);
        assert_eq!(fake.read("gpio6/edge"), "both");
    }

    #[test]
    fn edge_failure_keeps_pin_valid() {
        let fake = FakeSysfs::new();
        fake.add_line(6, "in");
        let mut pin = fake.sysfs.open(6).unwrap();
        pin.enable_irq(Edge::Falling).unwrap();
        fake.remove_attr(6, Attr::Edge);

        let err = pin.enable_irq(Edge::Rising).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io { op: "write edge", .. }));
        assert!(pin.is_valid());
        assert_eq!(pin.irq_mode(), Edge::Falling);
    }

    #[test]
    fn bad_value_byte_drops_descriptor_only() {
        let fake = FakeSysfs::new();
        fake.add_line(12, "in");
        let mut pin = fake.sysfs.open(12).unwrap();
        fake.write("gpio12/value", "x\n");

        let err = pin.get_value().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io { op: "read value", .. }));
        assert!(pin.value_fd.is_none());
        assert!(pin.is_valid());

        fake.write("gpio12/value", "1\n");
        assert_eq!(pin.get_value().unwrap(), Level::High);
        assert!(pin.value_fd.is_some());
    }

    #[test]
    fn missing_value_file_is_an_io_error() {
        let fake = FakeSysfs::new();
        fake.add_line(12, "in");
        let mut pin = fake.sysfs.open(12).unwrap();
        fake.remove_attr(12, Attr::Value);

        let err = pin.get_value().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io { op: "open value", .. }));
        assert!(pin.is_valid());
    }

    #[test]
    fn set_direction_reopens_value_with_new_mode() {
        let fake = FakeSysfs::new();
        fake.add_line(13, "in");
        let mut pin = fake.sysfs.open(13).unwrap();
        pin.get_value().unwrap();
        assert!(pin.value_fd.is_some());

        pin.set_direction(Direction::Out).unwrap();
        assert!(pin.value_fd.is_none());
        pin.set_value(Level::High).unwrap();
        assert_eq!(pin.get_value().unwrap(), Level::High);
    }

    #[test]
    fn value_fd_is_opened_lazily() {
        let fake = FakeSysfs::new();
        fake.add_line(14, "in");
        let mut pin = fake.sysfs.open(14).unwrap();
        assert!(pin.value_fd.is_none());
        pin.value_fd().unwrap();
        assert!(pin.value_fd.is_some());
    }
}
