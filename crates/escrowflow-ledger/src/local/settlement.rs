//! The escrow settlement program.
//!
//! Owns escrow records and moves units between party accounts and the
//! escrow's custody accounts. Every instruction checks the record's state
//! against the step table before touching balances:
//!
//! ```text
//! initialize     Uninitialized -> Initialized
//! deposit_maker  Initialized   -> MakerDeposited   (maker_amount into maker custody)
//! deposit_taker  MakerDeposited -> BothDeposited   (taker_amount into taker custody)
//! execute        BothDeposited -> Settled          (both custodies paid out crosswise)
//! ```
//!
//! Nothing here is idempotent: repeating a step fails with `InvalidState`.

use escrowflow_address::{create_program_address, find_program_address};
use escrowflow_types::{
    Address, EscrowId, EscrowRecord, EscrowState, Instruction, InstructionError, constants,
    program::{
        ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID,
        settlement::{
            DepositAccounts, ExecuteAccounts, InitializeAccounts, SettlementErrorCode,
            SettlementInstruction,
        },
    },
};

use super::{
    bank::{Account, AccountData, rent_exempt_minimum},
    processor::{InvokeContext, create_associated_account},
};

fn fail(code: SettlementErrorCode) -> InstructionError {
    code.into()
}

pub(crate) fn process(
    ctx: &mut InvokeContext<'_>,
    ix: &Instruction,
) -> Result<(), InstructionError> {
    match SettlementInstruction::unpack(&ix.data)? {
        SettlementInstruction::Initialize {
            escrow_id,
            maker_amount,
            taker_amount,
        } => {
            ctx.log("Program log: Instruction: Initialize");
            initialize(
                ctx,
                &InitializeAccounts::from_instruction(ix)?,
                escrow_id,
                maker_amount,
                taker_amount,
            )
        }
        SettlementInstruction::DepositMaker => {
            ctx.log("Program log: Instruction: DepositMaker");
            deposit(ctx, &DepositAccounts::from_instruction(ix)?, Side::Maker)
        }
        SettlementInstruction::DepositTaker => {
            ctx.log("Program log: Instruction: DepositTaker");
            deposit(ctx, &DepositAccounts::from_instruction(ix)?, Side::Taker)
        }
        SettlementInstruction::Execute => {
            ctx.log("Program log: Instruction: Execute");
            execute(ctx, &ExecuteAccounts::from_instruction(ix)?)
        }
    }
}

fn custody_address(owner: &Address, mint: &Address) -> Result<Address, InstructionError> {
    find_program_address(
        &[owner.as_bytes(), TOKEN_PROGRAM_ID.as_bytes(), mint.as_bytes()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map(|(address, _)| address)
    .map_err(|_| InstructionError::InvalidSeeds)
}

/// Load a record owned by this program and verify it lives at its derived
/// address.
fn load_record(
    ctx: &InvokeContext<'_>,
    escrow: &Address,
) -> Result<EscrowRecord, InstructionError> {
    let account = ctx
        .bank
        .account(escrow)
        .ok_or(InstructionError::AccountNotFound(*escrow))?;
    if account.owner != ctx.settlement_program {
        return Err(InstructionError::InvalidAccountData(*escrow));
    }
    let record = ctx
        .bank
        .escrow(escrow)
        .ok_or(InstructionError::InvalidAccountData(*escrow))?
        .clone();
    let id = record.escrow_id.to_le_bytes();
    let expected = create_program_address(
        &[
            constants::ESCROW_SEED,
            record.maker.as_bytes(),
            record.maker_asset.as_bytes(),
            &id,
            &[record.bump],
        ],
        &ctx.settlement_program,
    )
    .map_err(|_| InstructionError::InvalidSeeds)?;
    if expected != *escrow {
        return Err(fail(SettlementErrorCode::InvalidEscrowAddress));
    }
    Ok(record)
}

fn store_record(
    ctx: &mut InvokeContext<'_>,
    escrow: &Address,
    record: EscrowRecord,
) -> Result<(), InstructionError> {
    let slot = ctx
        .bank
        .escrow_mut(escrow)
        .ok_or(InstructionError::InvalidAccountData(*escrow))?;
    *slot = record;
    Ok(())
}

fn advance(record: &mut EscrowRecord, target: EscrowState) -> Result<(), InstructionError> {
    record
        .advance(target)
        .map_err(|_| fail(SettlementErrorCode::InvalidState))
}

// ---------------------------------------------------------------------------
// initialize
// ---------------------------------------------------------------------------

fn initialize(
    ctx: &mut InvokeContext<'_>,
    accounts: &InitializeAccounts,
    escrow_id: EscrowId,
    maker_amount: u64,
    taker_amount: u64,
) -> Result<(), InstructionError> {
    ctx.require_signer(&accounts.maker)?;
    if maker_amount == 0 || taker_amount == 0 {
        return Err(fail(SettlementErrorCode::InvalidAmount));
    }
    if accounts.maker_asset == accounts.taker_asset {
        return Err(fail(SettlementErrorCode::AssetMismatch));
    }

    let id = escrow_id.to_le_bytes();
    let (expected, bump) = find_program_address(
        &[
            constants::ESCROW_SEED,
            accounts.maker.as_bytes(),
            accounts.maker_asset.as_bytes(),
            &id,
        ],
        &ctx.settlement_program,
    )
    .map_err(|_| InstructionError::InvalidSeeds)?;
    if expected != accounts.escrow {
        return Err(fail(SettlementErrorCode::InvalidEscrowAddress));
    }
    if ctx.bank.contains(&accounts.escrow) {
        return Err(InstructionError::AccountAlreadyInUse(accounts.escrow));
    }
    ctx.bank.mint(&accounts.maker_asset)?;
    ctx.bank.mint(&accounts.taker_asset)?;

    let rent = rent_exempt_minimum(constants::ESCROW_RECORD_SIZE as u64);
    ctx.bank.debit_lamports(&accounts.maker, rent)?;
    ctx.bank.create_account(
        accounts.escrow,
        Account {
            lamports: rent,
            owner: ctx.settlement_program,
            data: AccountData::Escrow(EscrowRecord {
                escrow_id,
                maker: accounts.maker,
                taker: accounts.taker,
                maker_asset: accounts.maker_asset,
                taker_asset: accounts.taker_asset,
                maker_amount,
                taker_amount,
                bump,
                state: EscrowState::Initialized,
            }),
        },
    )?;

    for (custody, mint) in [
        (accounts.escrow_maker_custody, accounts.maker_asset),
        (accounts.escrow_taker_custody, accounts.taker_asset),
    ] {
        create_associated_account(ctx, accounts.maker, custody, accounts.escrow, mint, false)?;
    }
    ctx.log(format!(
        "Program log: escrow {escrow_id} initialized at {} (bump {bump})",
        accounts.escrow.short()
    ));
    Ok(())
}

// ---------------------------------------------------------------------------
// deposit_maker / deposit_taker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Maker,
    Taker,
}

fn deposit(
    ctx: &mut InvokeContext<'_>,
    accounts: &DepositAccounts,
    side: Side,
) -> Result<(), InstructionError> {
    let mut record = load_record(ctx, &accounts.escrow)?;
    let (party, asset, amount, target) = match side {
        Side::Maker => (
            record.maker,
            record.maker_asset,
            record.maker_amount,
            EscrowState::MakerDeposited,
        ),
        Side::Taker => (
            record.taker,
            record.taker_asset,
            record.taker_amount,
            EscrowState::BothDeposited,
        ),
    };
    if !record.state.can_transition_to(target) {
        return Err(fail(SettlementErrorCode::InvalidState));
    }
    if accounts.depositor != party {
        return Err(fail(SettlementErrorCode::Unauthorized));
    }
    ctx.require_signer(&accounts.depositor)?;
    if accounts.asset != asset {
        return Err(fail(SettlementErrorCode::AssetMismatch));
    }
    if accounts.escrow_custody != custody_address(&accounts.escrow, &asset)? {
        return Err(fail(SettlementErrorCode::InvalidEscrowAddress));
    }
    let source = *ctx.bank.token_account(&accounts.source)?;
    if source.owner != party {
        return Err(fail(SettlementErrorCode::Unauthorized));
    }
    if source.mint != asset {
        return Err(fail(SettlementErrorCode::AssetMismatch));
    }

    ctx.bank
        .transfer_tokens(&accounts.source, &accounts.escrow_custody, amount)?;
    advance(&mut record, target)?;
    store_record(ctx, &accounts.escrow, record)?;
    ctx.log(format!("Program log: deposited {amount}, escrow now {target}"));
    Ok(())
}

// ---------------------------------------------------------------------------
// execute
// ---------------------------------------------------------------------------

fn execute(
    ctx: &mut InvokeContext<'_>,
    accounts: &ExecuteAccounts,
) -> Result<(), InstructionError> {
    let mut record = load_record(ctx, &accounts.escrow)?;
    if !record.state.can_transition_to(EscrowState::Settled) {
        return Err(fail(SettlementErrorCode::InvalidState));
    }
    if accounts.maker != record.maker {
        return Err(fail(SettlementErrorCode::Unauthorized));
    }
    ctx.require_signer(&accounts.maker)?;

    if accounts.escrow_maker_custody != custody_address(&accounts.escrow, &record.maker_asset)?
        || accounts.escrow_taker_custody != custody_address(&accounts.escrow, &record.taker_asset)?
    {
        return Err(fail(SettlementErrorCode::InvalidEscrowAddress));
    }

    let maker_receive = *ctx.bank.token_account(&accounts.maker_receive)?;
    let taker_receive = *ctx.bank.token_account(&accounts.taker_receive)?;
    if maker_receive.owner != record.maker || taker_receive.owner != record.taker {
        return Err(fail(SettlementErrorCode::Unauthorized));
    }
    if maker_receive.mint != record.taker_asset || taker_receive.mint != record.maker_asset {
        return Err(fail(SettlementErrorCode::AssetMismatch));
    }

    ctx.bank.transfer_tokens(
        &accounts.escrow_maker_custody,
        &accounts.taker_receive,
        record.maker_amount,
    )?;
    ctx.bank.transfer_tokens(
        &accounts.escrow_taker_custody,
        &accounts.maker_receive,
        record.taker_amount,
    )?;
    advance(&mut record, EscrowState::Settled)?;
    store_record(ctx, &accounts.escrow, record)?;
    ctx.log("Program log: escrow settled");
    Ok(())
}
