//! Single source of truth for all default values (spec §6 configuration table).

// --- Storage ---
pub const DEFAULT_DATA_DIR: &str = "./vaultmem-data";
pub const DEFAULT_SEGMENT_SIZE_BYTES: u64 = 16 * 1024 * 1024; // 16 MiB
pub const DEFAULT_PERSIST_EVERY_N_WRITES: u32 = 1;
pub const DEFAULT_WAL_MAX_AGE_MS: u64 = 24 * 60 * 60 * 1000; // 24h
pub const DEFAULT_MEMORY_BUDGET_BYTES: u64 = 512 * 1024 * 1024; // 512 MiB

pub const MIN_SEGMENT_SIZE_BYTES: u64 = 1024 * 1024; // 1 MiB
pub const MIN_MEMORY_BUDGET_BYTES: u64 = 128 * 1024 * 1024; // 128 MiB
pub const MAX_MEMORY_BUDGET_BYTES: u64 = 4 * 1024 * 1024 * 1024; // 4 GiB

// --- Vector index (HNSW) ---
pub const DEFAULT_HNSW_M: usize = 16;
pub const DEFAULT_HNSW_EF_CONSTRUCTION: usize = 200;
pub const DEFAULT_HNSW_EF_SEARCH: usize = 50;
pub const DEFAULT_HNSW_DIMENSIONS: usize = 384;

pub const MIN_HNSW_M: usize = 2;
pub const MAX_HNSW_M: usize = 100;
pub const MIN_HNSW_EF_CONSTRUCTION: usize = 10;
pub const MIN_HNSW_EF_SEARCH: usize = 10;

// --- Text index (BM25) ---
pub const DEFAULT_BM25_K1: f64 = 1.2;
pub const DEFAULT_BM25_B: f64 = 0.75;
pub const DEFAULT_TEXT_INDEX_MIN_TOKEN_LENGTH: usize = 2;

// --- Merkle ---
pub const DEFAULT_MERKLE_HASH_ALGORITHM: &str = "sha256";

// --- Hybrid search ---
pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.7;

// --- Observability ---
pub const DEFAULT_LOG_LEVEL: &str = "info";
