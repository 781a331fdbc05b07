//! Colour objects behind the ColorSpace suite.
//!
//! A colour is four 8-bit components tagged with the space they are in.
//! Transforms between spaces are not provided: asking for a colour in a
//! different space than it was stored in reports
//! [`ColorError::Unimplemented`].

use std::error::Error;
use std::fmt;

use suitehost_arena::{ArenaError, FatalFault, HandleTable};
use suitehost_core::ColorId;

/// Colour spaces, numbered as plugins number them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum ColorSpace {
    /// Red, green, blue.
    Rgb = 0,
    /// Hue, saturation, brightness.
    Hsb = 1,
    /// Cyan, magenta, yellow, black.
    Cmyk = 2,
    /// CIE L*a*b*.
    Lab = 3,
    /// Single gray channel.
    Gray = 4,
    /// Hue, saturation, lightness.
    Hsl = 5,
    /// CIE XYZ.
    Xyz = 6,
}

impl TryFrom<i16> for ColorSpace {
    type Error = ColorError;

    fn try_from(code: i16) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::Rgb,
            1 => Self::Hsb,
            2 => Self::Cmyk,
            3 => Self::Lab,
            4 => Self::Gray,
            5 => Self::Hsl,
            6 => Self::Xyz,
            _ => return Err(ColorError::InvalidSpace { code }),
        })
    }
}

/// Errors from [`ColorSpaceTable`] operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColorError {
    /// The colour id is not live.
    UnknownColor {
        /// The stale or unknown id.
        id: ColorId,
    },
    /// Not a colour space code.
    InvalidSpace {
        /// The rejected code.
        code: i16,
    },
    /// Conversion between distinct spaces is not provided.
    Unimplemented {
        /// Space the colour is stored in.
        from: ColorSpace,
        /// Space that was asked for.
        to: ColorSpace,
    },
}

impl fmt::Display for ColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownColor { id } => write!(f, "{id} is not live"),
            Self::InvalidSpace { code } => write!(f, "invalid colour space code {code}"),
            Self::Unimplemented { from, to } => {
                write!(f, "conversion from {from:?} to {to:?} is not supported")
            }
        }
    }
}

impl Error for ColorError {}

impl FatalFault for ColorError {
    fn fatal_fault(&self) -> Option<&ArenaError> {
        None
    }
}

#[derive(Clone, Copy, Debug)]
struct Color {
    space: ColorSpace,
    components: [u8; 4],
}

/// Live colour objects for one session.
#[derive(Default)]
pub struct ColorSpaceTable {
    colors: HandleTable<Color>,
}

impl ColorSpaceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a colour, initially RGB black.
    pub fn make(&mut self) -> ColorId {
        ColorId::from_token(self.colors.insert(Color {
            space: ColorSpace::Rgb,
            components: [0; 4],
        }))
    }

    /// Destroy a colour. Returns `false` if it was not live.
    pub fn delete(&mut self, id: ColorId) -> bool {
        self.colors.remove(id).is_some()
    }

    fn color(&self, id: ColorId) -> Result<&Color, ColorError> {
        self.colors.get(id).ok_or(ColorError::UnknownColor { id })
    }

    /// Overwrite a colour's space and components.
    pub fn stuff(
        &mut self,
        id: ColorId,
        space: ColorSpace,
        components: [u8; 4],
    ) -> Result<(), ColorError> {
        let color = self
            .colors
            .get_mut(id)
            .ok_or(ColorError::UnknownColor { id })?;
        *color = Color { space, components };
        Ok(())
    }

    /// Read a colour's components in `space`.
    pub fn extract(&self, id: ColorId, space: ColorSpace) -> Result<[u8; 4], ColorError> {
        let color = self.color(id)?;
        if color.space != space {
            return Err(ColorError::Unimplemented {
                from: color.space,
                to: space,
            });
        }
        Ok(color.components)
    }

    /// The space a colour is stored in.
    pub fn space_of(&self, id: ColorId) -> Result<ColorSpace, ColorError> {
        self.color(id).map(|color| color.space)
    }

    /// Convert a colour to `target`. Only the identity conversion is
    /// supported.
    pub fn convert(&mut self, id: ColorId, target: ColorSpace) -> Result<(), ColorError> {
        let color = self.color(id)?;
        if color.space == target {
            Ok(())
        } else {
            Err(ColorError::Unimplemented {
                from: color.space,
                to: target,
            })
        }
    }

    /// Number of live colours.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Whether no colours are live.
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stuff_then_extract() {
        let mut table = ColorSpaceTable::new();
        let id = table.make();
        assert_eq!(table.space_of(id), Ok(ColorSpace::Rgb));
        table.stuff(id, ColorSpace::Cmyk, [1, 2, 3, 4]).unwrap();
        assert_eq!(table.extract(id, ColorSpace::Cmyk), Ok([1, 2, 3, 4]));
        assert_eq!(
            table.extract(id, ColorSpace::Rgb),
            Err(ColorError::Unimplemented {
                from: ColorSpace::Cmyk,
                to: ColorSpace::Rgb
            })
        );
    }

    #[test]
    fn convert_only_to_same_space() {
        let mut table = ColorSpaceTable::new();
        let id = table.make();
        assert_eq!(table.convert(id, ColorSpace::Rgb), Ok(()));
        assert!(table.convert(id, ColorSpace::Lab).is_err());
    }

    #[test]
    fn deleted_color_is_unknown() {
        let mut table = ColorSpaceTable::new();
        let id = table.make();
        assert!(table.delete(id));
        assert!(!table.delete(id));
        assert_eq!(table.space_of(id), Err(ColorError::UnknownColor { id }));
    }

    #[test]
    fn space_codes() {
        assert_eq!(ColorSpace::try_from(3), Ok(ColorSpace::Lab));
        assert_eq!(
            ColorSpace::try_from(42),
            Err(ColorError::InvalidSpace { code: 42 })
        );
        assert_eq!(ColorSpace::Xyz as i16, 6);
    }
}
