// Helpers for reading the fixed headers of frontend frames.

// -----------------------------------------------------------------------------
// ----- TaggedHeader ----------------------------------------------------------

/// Header of a regular (post-startup) frame: `tag: u8, len: u32` where `len`
/// counts itself but not the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaggedHeader {
    pub tag: u8,
    pub len: usize,
}

impl TaggedHeader {
    /// Tag byte plus the declared length.
    #[inline]
    pub fn total_len(&self) -> usize {
        1 + self.len
    }
}

/// Reads the 5-byte header if it is present. Does not look at the body.
#[inline]
pub fn tagged_header(buf: &[u8]) -> Option<TaggedHeader> {
    if buf.len() < 5 {
        return None;
    }

    Some(TaggedHeader {
        tag: buf[0],
        len: be_u32(&buf[1..]) as usize,
    })
}

// -----------------------------------------------------------------------------
// ----- Integers --------------------------------------------------------------

#[inline]
pub fn be_u32(x: &[u8]) -> u32 {
    u32::from_be_bytes([x[0], x[1], x[2], x[3]])
}

#[inline]
pub fn be_i32(x: &[u8]) -> i32 {
    i32::from_be_bytes([x[0], x[1], x[2], x[3]])
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
