//! Call-site identity hashing
//!
//! Every profiled region is identified by a 32-bit key derived from its source
//! file, label and line. The hash is a `const fn` so macro call sites compute
//! their key at compile time, and the same call site yields the same key from
//! every compilation unit.

use serde::{Deserialize, Serialize};

const FNV_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

/// 32-bit FNV-1a hash of a string, forced odd so it is never 0
///
/// Reference: http://www.isthe.com/chongo/tech/comp/fnv/
pub const fn hash_str(s: &str) -> u32 {
    let bytes = s.as_bytes();
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash | 1
}

/// Stable identity of one call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(u32);

impl BlockId {
    /// Reserved key for the root of the call stack; never produced by hashing
    pub const ROOT: BlockId = BlockId(0);

    /// Combine file, label and line into a call-site key
    ///
    /// ```
    /// use cycleprof::block_id::BlockId;
    ///
    /// const ID: BlockId = BlockId::from_site("src/main.rs", "parse", 42);
    /// assert_eq!(ID, BlockId::from_site("src/main.rs", "parse", 42));
    /// assert!(!ID.is_root());
    /// ```
    pub const fn from_site(file: &str, label: &str, line: u32) -> BlockId {
        let key = hash_str(file) ^ hash_str(label) ^ line;
        // 0 is the root sentinel
        if key == 0 {
            BlockId(1)
        } else {
            BlockId(key)
        }
    }

    /// Wrap a raw key. 0 is remapped to 1 so the root sentinel cannot be forged.
    pub const fn from_raw(key: u32) -> BlockId {
        if key == 0 {
            BlockId(1)
        } else {
            BlockId(key)
        }
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Static descriptors of a profiled call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub id: BlockId,
    pub label: &'static str,
    pub function: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl CallSite {
    /// Describe a call site, hashing its identity from file, label and line
    pub const fn new(
        label: &'static str,
        function: &'static str,
        file: &'static str,
        line: u32,
    ) -> Self {
        CallSite {
            id: BlockId::from_site(file, label, line),
            label,
            function,
            file,
            line,
        }
    }

    /// Describe a call site with an explicit key
    ///
    /// Used when the label is only known at run time and the key was hashed
    /// from other static components.
    pub const fn with_id(
        id: BlockId,
        label: &'static str,
        function: &'static str,
        file: &'static str,
        line: u32,
    ) -> Self {
        CallSite {
            id,
            label,
            function,
            file,
            line,
        }
    }
}
