//! Hit-proxy ids and layers used for editor picking.

use lumen_core::Color;

/// Id written into the hit-proxy target for one pickable object.
///
/// The id is packed into the color channels as `r | g << 8 | b << 16`;
/// black (id 0) means "no hit".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct HitProxyId(u32);

impl HitProxyId {
    /// Largest id that fits the 24-bit color encoding.
    pub const MAX: u32 = 0x00ff_ffff;

    pub const NONE: Self = Self(0);

    /// Returns `None` for ids that do not fit 24 bits.
    pub fn new(index: u32) -> Option<Self> {
        (index <= Self::MAX).then_some(Self(index))
    }

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn to_color(self) -> Color {
        Color::new(
            (self.0 & 0xff) as u8,
            ((self.0 >> 8) & 0xff) as u8,
            ((self.0 >> 16) & 0xff) as u8,
            if self.is_none() { 0 } else { 255 },
        )
    }

    /// Decode a hit-proxy pixel. Alpha is ignored.
    pub fn from_color(color: Color) -> Self {
        Self(color.r as u32 | (color.g as u32) << 8 | (color.b as u32) << 16)
    }
}

/// Hit-proxy layer a primitive is picked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HitProxyLayer {
    #[default]
    World,
    Foreground,
}

impl HitProxyLayer {
    pub const COUNT: usize = 2;
    pub const ALL: [HitProxyLayer; Self::COUNT] = [Self::World, Self::Foreground];

    pub fn index(self) -> usize {
        self as usize
    }
}
