use std::{fs::File, os::unix::fs::FileExt};

/// Logic level of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub const fn new(is_high: bool) -> Self {
        if is_high {
            Self::High
        } else {
            Self::Low
        }
    }

    pub const fn is_high(&self) -> bool {
        matches!(self, Level::High)
    }

    const fn as_byte(self) -> u8 {
        match self {
            Level::Low => b'0',
            Level::High => b'1',
        }
    }
}

impl From<bool> for Level {
    fn from(is_high: bool) -> Self {
        Self::new(is_high)
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level.is_high()
    }
}

/// Read the level from the first byte of the value file.
///
/// The read is positioned, so duplicated descriptors sharing one file offset
/// can read concurrently. On sysfs it also acknowledges a pending edge.
pub(crate) fn read_level(file: &File) -> std::io::Result<Level> {
    let mut buf = [0u8; 1];
    if file.read_at(&mut buf, 0)? != 1 {
        return Err(std::io::ErrorKind::UnexpectedEof.into());
    }

    match buf[0] {
        b'0' => Ok(Level::Low),
        b'1' => Ok(Level::High),
        other => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unexpected value byte {other:#04x}"),
        )),
    }
}

/// Write the level as a single byte at the start of the value file.
pub(crate) fn write_level(file: &File, level: Level) -> std::io::Result<()> {
    if file.write_at(&[level.as_byte()], 0)? != 1 {
        return Err(std::io::ErrorKind::WriteZero.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom, Write};

    use super::*;

    fn value_file(contents: &str) -> File {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_first_byte_whatever_the_offset() {
        let mut file = value_file("1\n");
        assert_eq!(file.stream_position().unwrap(), 2);
        assert_eq!(read_level(&file).unwrap(), Level::High);
        assert_eq!(read_level(&file).unwrap(), Level::High);
    }

    #[test]
    fn leaves_the_shared_offset_alone() {
        let mut file = value_file("0\n");
        let dup = file.try_clone().unwrap();
        file.seek(SeekFrom::Start(1)).unwrap();

        assert_eq!(read_level(&dup).unwrap(), Level::Low);
        write_level(&dup, Level::High).unwrap();
        assert_eq!(file.stream_position().unwrap(), 1);

        let mut rest = String::new();
        file.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "\n");
    }

    #[test]
    fn rejects_unexpected_bytes() {
        let file = value_file("z");
        let err = read_level(&file).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);

        let empty = value_file("");
        let err = read_level(&empty).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn write_overwrites_in_place() {
        let file = value_file("0\n");
        write_level(&file, Level::High).unwrap();
        assert_eq!(read_level(&file).unwrap(), Level::High);
        write_level(&file, Level::Low).unwrap();
        assert_eq!(read_level(&file).unwrap(), Level::Low);
    }

    #[test]
    fn bool_conversions() {
        assert_eq!(Level::from(true), Level::High);
        assert!(!bool::from(Level::Low));
    }
}
