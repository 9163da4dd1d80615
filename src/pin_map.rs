use std::{collections::HashMap, fs, path::Path};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorKind, Result};

/// Board-specific names for GPIO line numbers.
///
/// Loaded from a JSON object such as `{ "zoomi": 17, "zoomo": 18 }` and
/// passed to [`Sysfs::open_by_name`](crate::Sysfs::open_by_name).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PinMap {
    pins: HashMap<String, u32>,
}

impl PinMap {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ErrorKind::PinMap {
            path: path.to_owned(),
            source,
        })?;
        let map = Self::from_json(&contents)?;
        debug!("loaded {} pin names from {}", map.len(), path.display());
        Ok(map)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn insert(&mut self, name: impl Into<String>, number: u32) -> Option<u32> {
        self.pins.insert(name.into(), number)
    }

    pub fn lookup(&self, name: &str) -> Result<u32> {
        self.pins
            .get(name)
            .copied()
            .ok_or_else(|| ErrorKind::UnknownName(name.to_owned()).into())
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for PinMap {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        Self {
            pins: iter.into_iter().map(|(name, n)| (name.into(), n)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pin::options::Direction, sysfs::testing::FakeSysfs};

    #[test]
    fn parses_json_object() {
        let map = PinMap::from_json(r#"{ "zoomi": 17, "zoomo": 18 }"#).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.lookup("zoomi").unwrap(), 17);
        assert_eq!(map.lookup("zoomo").unwrap(), 18);
    }

    #[test]
    fn unknown_name() {
        let map: PinMap = [("led", 4)].into_iter().collect();
        let err = map.lookup("button").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownName(name) if name == "button"));
    }

    #[test]
    fn rejects_malformed_files() {
        let err = PinMap::from_json(r#"{ "zoomi": -1 }"#).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::PinMapFormat(_)));

        let err = PinMap::load_from_file("/nonexistent/pins.json").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::PinMap { .. }));
        assert!(err.raw_os_error().is_none());
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pins.json");
        std::fs::write(&path, r#"{ "zoomi": 17 }"#).unwrap();
        let map = PinMap::load_from_file(&path).unwrap();
        assert_eq!(map.lookup("zoomi").unwrap(), 17);
    }

    #[test]
    fn open_by_name_resolves_through_map() {
        let fake = FakeSysfs::new();
        fake.add_line(17, "out");
        let mut map = PinMap::default();
        map.insert("zoomi", 17);

        let pin = fake
            .sysfs
            .open_by_name_with_direction(&map, "zoomi", Direction::In)
            .unwrap();
        assert_eq!(pin.number(), 17);
        assert_eq!(pin.direction(), Direction::In);

        let err = fake.sysfs.open_by_name(&map, "zoomo").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownName(_)));
    }
}
