//! # Block Version Strata
//!
//! Policy semantics changed twice over the chain's history. Every
//! verification entry point maps the caller's block version onto one of
//! three strata so blocks replay with the rules they were produced under.

/// Last block version with the single-map policy table.
pub const BLOCK_VERSION_220: u32 = 220;

/// Block version that introduced the exceptional policy map.
pub const BLOCK_VERSION_2320: u32 = 2320;

/// First block version with split tx/msg/sender/resource tables.
pub const BLOCK_VERSION_2330: u32 = 2330;

/// Policy table generation in force for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyStratum {
    /// `version <= 220`
    V220,
    /// `220 < version < 2330`
    V2320,
    /// `version >= 2330`
    Current,
}

impl PolicyStratum {
    #[must_use]
    pub fn from_block_version(version: u32) -> Self {
        if version <= BLOCK_VERSION_220 {
            Self::V220
        } else if version < BLOCK_VERSION_2330 {
            Self::V2320
        } else {
            Self::Current
        }
    }

    /// Historical strata evaluate `MAJORITY` strictly over the role list.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        !matches!(self, Self::Current)
    }
}
