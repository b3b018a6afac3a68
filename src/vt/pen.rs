//! The current drawing attributes (SGR state): a packed flag set plus fg/bg
//! colors. `PenFlags` is a bitfield rather than individual bools, keeping a
//! cell's attribute set compact and cheap to compare when merging runs into
//! spans.

use bitflags::bitflags;

use super::color::Color;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PenFlags: u16 {
        const BOLD          = 0b0000_0001;
        const FAINT         = 0b0000_0010;
        const ITALIC        = 0b0000_0100;
        const UNDERLINE     = 0b0000_1000;
        const BLINK         = 0b0001_0000;
        const INVERSE       = 0b0010_0000;
        const STRIKETHROUGH = 0b0100_0000;
    }
}

/// The full set of SGR attributes in effect at a point in the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pen {
    pub fg: Color,
    pub bg: Color,
    pub flags: PenFlags,
}

impl Pen {
    /// Applies `ESC[0m` (reset all attributes).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_independent_bits() {
        let mut flags = PenFlags::empty();
        flags.insert(PenFlags::BOLD);
        flags.insert(PenFlags::ITALIC);
        assert!(flags.contains(PenFlags::BOLD));
        assert!(flags.contains(PenFlags::ITALIC));
        assert!(!flags.contains(PenFlags::FAINT));
        flags.remove(PenFlags::BOLD);
        assert!(!flags.contains(PenFlags::BOLD));
        assert!(flags.contains(PenFlags::ITALIC));
    }

    #[test]
    fn reset_clears_everything() {
        let mut pen = Pen {
            fg: Color::Palette(1),
            bg: Color::Rgb(1, 2, 3),
            flags: PenFlags::BOLD | PenFlags::UNDERLINE,
        };
        pen.reset();
        assert_eq!(pen, Pen::default());
    }
}
