use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;

/// Never a valid store prefix. Kept reserved through the [`DatabaseStorePrefixes`] enum
pub const SEPARATOR: u8 = u8::MAX;

#[derive(Primitive, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DatabaseStorePrefixes {
    // ---- Regions ----
    Regions = 1,
    ConflictSets = 2,
    BlockRegions = 3,
    BlockConflictSets = 4,
    RegionsDone = 5,

    // ---- Links ----
    Links = 16,
    BlockLinks = 17,
    LinksDone = 18,
    LinkCosts = 19,
    CostsDone = 20,
    BlockConstraints = 21,

    // ---- Solutions ----
    Solutions = 32,

    // ---- Separator ----
    /// Reserved as a separator
    Separator = SEPARATOR,
}

impl From<DatabaseStorePrefixes> for Vec<u8> {
    fn from(value: DatabaseStorePrefixes) -> Self {
        [value as u8].to_vec()
    }
}

impl From<DatabaseStorePrefixes> for u8 {
    fn from(value: DatabaseStorePrefixes) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for DatabaseStorePrefixes {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(value)
    }
}

impl AsRef<[u8]> for DatabaseStorePrefixes {
    fn as_ref(&self) -> &[u8] {
        // SAFETY: enum has repr(u8)
        std::slice::from_ref(unsafe { &*(self as *const Self as *const u8) })
    }
}
