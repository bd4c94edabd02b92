//! Program identities and instruction encodings.
//!
//! Each submodule owns both directions of one program's wire format: the
//! builders used by the orchestrator and the decoders used by a ledger that
//! executes them.

pub mod settlement;
pub mod system;
pub mod token;

use crate::Address;

/// The system program: creates accounts and moves lamports.
pub const SYSTEM_PROGRAM_ID: Address = Address::new([0u8; 32]);

/// The fungible-asset program.
pub const TOKEN_PROGRAM_ID: Address = Address::new([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133,
    237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

/// The associated-account program: derives and creates the canonical holding
/// account for an (owner, asset) pair.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Address = Address::new([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153, 218,
    255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

/// Default identity of the escrow settlement program.
pub const DEFAULT_SETTLEMENT_PROGRAM_ID: Address = Address::new([
    0xd8, 0x1f, 0x4e, 0x6a, 0x93, 0x2c, 0x05, 0xb7, 0x11, 0xe4, 0x7a, 0x38, 0xc2, 0x5d, 0x90,
    0x0b, 0x6f, 0xa1, 0x24, 0xdb, 0x37, 0x88, 0x4c, 0xe9, 0x52, 0x1b, 0x7e, 0xc0, 0x3a, 0x96,
    0x45, 0x02,
]);

fn read_u64(data: &[u8], offset: usize) -> Option<u64> {
    data.get(offset..offset + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
}

fn read_address(data: &[u8], offset: usize) -> Option<Address> {
    data.get(offset..offset + 32)
        .and_then(|b| <[u8; 32]>::try_from(b).ok())
        .map(Address::new)
}
