use plotters::style::RGBColor;

/// Storage engines compared by the benchmark harness.
///
/// The declaration order is the draw order: InnoDB is always rendered before
/// TidesDB when both appear in a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Engine {
    InnoDb,
    TidesDb,
}

impl Engine {
    pub fn all() -> &'static [Engine] {
        &[Engine::InnoDb, Engine::TidesDb]
    }

    /// Name as written in the CSV `engine` column and in legends
    pub fn name(&self) -> &'static str {
        match self {
            Engine::InnoDb => "InnoDB",
            Engine::TidesDb => "TidesDB",
        }
    }

    pub fn from_name(name: &str) -> Option<Engine> {
        Engine::all().iter().copied().find(|e| e.name() == name)
    }

    pub fn color(&self) -> RGBColor {
        match self {
            Engine::InnoDb => RGBColor(0xE8, 0x78, 0x11),
            Engine::TidesDb => RGBColor(0x00, 0x3E, 0xDC),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_order() {
        let mut engines = vec![Engine::TidesDb, Engine::InnoDb];
        engines.sort();
        assert_eq!(engines, Engine::all());
    }

    #[test]
    fn test_engine_names_roundtrip() {
        for engine in Engine::all() {
            assert_eq!(Engine::from_name(engine.name()), Some(*engine));
        }
        assert_eq!(Engine::from_name("innodb"), None);
        assert_eq!(Engine::from_name("RocksDB"), None);
    }

    #[test]
    fn test_engine_colors() {
        assert_eq!(Engine::TidesDb.color(), RGBColor(0, 62, 220));
        assert_eq!(Engine::InnoDb.color(), RGBColor(232, 120, 17));
        assert_ne!(Engine::InnoDb.color(), Engine::TidesDb.color());
    }
}
