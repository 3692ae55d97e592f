/// vaultmem system version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum allowed importance value (clamped inclusive).
pub const MIN_IMPORTANCE: i32 = 1;

/// Maximum allowed importance value (clamped inclusive).
pub const MAX_IMPORTANCE: i32 = 10;

/// WAL/segment magic for a not-yet-rotated file.
pub const WAL_MAGIC: &[u8; 4] = b"MWAL";

/// Segment magic after rotation.
pub const SEGMENT_MAGIC: &[u8; 4] = b"MSEG";

/// Index snapshot format version. Bump and gate on load when the
/// serialization shape changes.
pub const INDEX_SNAPSHOT_VERSION: u32 = 1;

/// WAL/segment header format version.
pub const WAL_FORMAT_VERSION: u32 = 1;

/// Name of the always-present primary store.
pub const MAIN_STORE_ID: &str = "main";
