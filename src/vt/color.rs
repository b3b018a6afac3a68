//! The tagged color model `SnapshotSpan` requires: default, 256-entry
//! palette index, or explicit 24-bit RGB. Matches the three color forms
//! SGR sequences can set (`30-37`/`90-97`, `38;5;n`, `38;2;r;g;b`) and
//! the serialized form (`null` / integer / `"#RRGGBB"`).

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Color {
    #[default]
    Default,
    Palette(u8),
    Rgb(u8, u8, u8),
}

impl Color {
    /// Maps a standard ANSI foreground/background code (30-37, 90-97 for
    /// fg; 40-47, 100-107 for bg) to its palette index.
    pub fn from_standard_code(code: u16) -> Option<Self> {
        match code {
            30..=37 => Some(Color::Palette((code - 30) as u8)),
            90..=97 => Some(Color::Palette((code - 90 + 8) as u8)),
            40..=47 => Some(Color::Palette((code - 40) as u8)),
            100..=107 => Some(Color::Palette((code - 100 + 8) as u8)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_code_mapping() {
        assert_eq!(Color::from_standard_code(31), Some(Color::Palette(1)));
        assert_eq!(Color::from_standard_code(97), Some(Color::Palette(15)));
        assert_eq!(Color::from_standard_code(40), Some(Color::Palette(0)));
        assert_eq!(Color::from_standard_code(106), Some(Color::Palette(14)));
        assert_eq!(Color::from_standard_code(200), None);
    }

    #[test]
    fn default_is_default_variant() {
        assert_eq!(Color::default(), Color::Default);
    }
}
