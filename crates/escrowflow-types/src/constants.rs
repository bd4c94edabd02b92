//! System-wide constants for EscrowFlow.

/// Seed prefix of every escrow record address.
pub const ESCROW_SEED: &[u8] = b"escrow";

/// Domain separator appended when hashing a derived address.
pub const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Maximum number of seeds in one derivation (bump included).
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Default decimals of a freshly created asset class.
pub const DEFAULT_ASSET_DECIMALS: u8 = 6;

/// Largest decimals value accepted in configuration.
pub const MAX_ASSET_DECIMALS: u8 = 9;

/// Raw units minted to each party's own account during provisioning.
pub const DEFAULT_INITIAL_SUPPLY: u64 = 100_000;

/// Default bounded wait for one confirmation, in milliseconds.
pub const DEFAULT_CONFIRM_TIMEOUT_MS: u64 = 30_000;

/// Size of an asset-class account.
pub const MINT_SIZE: usize = 82;

/// Size of a holding account.
pub const TOKEN_ACCOUNT_SIZE: usize = 165;

/// Size of an escrow record: discriminator + id + 4 addresses + 2 amounts + bump + state.
pub const ESCROW_RECORD_SIZE: usize = 8 + 8 + 32 * 4 + 8 + 8 + 1 + 1;

/// Fee charged to the fee payer per signature.
pub const LAMPORTS_PER_SIGNATURE: u64 = 5_000;

/// Blocks after which a blockhash can no longer be used.
pub const BLOCKHASH_VALIDITY_BLOCKS: u64 = 150;

/// Rent: lamports per byte-year.
pub const RENT_LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;

/// Rent: years of rent an account must hold to be exempt.
pub const RENT_EXEMPTION_THRESHOLD_YEARS: u64 = 2;

/// Rent: per-account storage overhead in bytes.
pub const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "EscrowFlow";
