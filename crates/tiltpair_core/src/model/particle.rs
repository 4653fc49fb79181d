//! Particle picks on untilted and tilted micrographs.
//!
//! Matches are stored as indices into the owning micrograph's particle
//! lists. A particle never points outside its own micrograph pair.

/// A pick on the untilted micrograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UntiltedParticle {
    pub x: i32,
    pub y: i32,
    /// Index into the tilted micrograph's particle list.
    tilted: Option<usize>,
}

impl UntiltedParticle {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y, tilted: None }
    }

    pub fn tilted_index(&self) -> Option<usize> {
        self.tilted
    }

    pub fn is_matched(&self) -> bool {
        self.tilted.is_some()
    }

    pub(crate) fn set_tilted_index(&mut self, index: Option<usize>) {
        self.tilted = index;
    }
}

/// A pick on the tilted micrograph. Always matched to one untilted pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiltedParticle {
    pub x: i32,
    pub y: i32,
    untilted: usize,
}

impl TiltedParticle {
    pub(crate) fn new(x: i32, y: i32, untilted: usize) -> Self {
        Self { x, y, untilted }
    }

    /// Index into the untilted micrograph's particle list.
    pub fn untilted_index(&self) -> usize {
        self.untilted
    }

    pub(crate) fn set_untilted_index(&mut self, index: usize) {
        self.untilted = index;
    }
}
