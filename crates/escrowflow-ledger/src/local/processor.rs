//! Instruction execution for the built-in programs.
//!
//! [`process_transaction`] runs every instruction of a transaction in order
//! against one [`Bank`]; the caller owns atomicity (it passes a clone and
//! commits only on success).

use escrowflow_address::find_program_address;
use escrowflow_types::{
    Address, Instruction, InstructionError, Transaction, TransactionError, constants,
    program::{
        ASSOCIATED_TOKEN_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID,
        system::SystemInstruction,
        token::{AssociatedAccountInstruction, TokenInstruction},
    },
};

use super::{
    bank::{Account, AccountData, Bank, MintState, TokenAccountState, rent_exempt_minimum},
    settlement,
};

/// Per-instruction execution context.
pub(crate) struct InvokeContext<'a> {
    pub bank: &'a mut Bank,
    pub signers: &'a [Address],
    pub settlement_program: Address,
    pub logs: &'a mut Vec<String>,
}

impl InvokeContext<'_> {
    pub fn require_signer(&self, address: &Address) -> Result<(), InstructionError> {
        if self.signers.contains(address) {
            Ok(())
        } else {
            Err(InstructionError::MissingRequiredSignature(*address))
        }
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }
}

fn account_at(ix: &Instruction, index: usize) -> Result<Address, InstructionError> {
    ix.account(index).ok_or(InstructionError::InvalidInstructionData)
}

/// Execute all instructions of `tx`. On error the bank may be partially
/// modified and must be discarded.
pub(crate) fn process_transaction(
    bank: &mut Bank,
    tx: &Transaction,
    settlement_program: Address,
    logs: &mut Vec<String>,
) -> Result<(), TransactionError> {
    let signers = tx.required_signers();
    for (index, ix) in tx.instructions.iter().enumerate() {
        let mut ctx = InvokeContext {
            bank: &mut *bank,
            signers: &signers,
            settlement_program,
            logs: &mut *logs,
        };
        ctx.log(format!("Program {} invoke [1]", ix.program_id.short()));
        let result = if ix.program_id == SYSTEM_PROGRAM_ID {
            process_system(&mut ctx, ix)
        } else if ix.program_id == TOKEN_PROGRAM_ID {
            process_token(&mut ctx, ix)
        } else if ix.program_id == ASSOCIATED_TOKEN_PROGRAM_ID {
            process_associated(&mut ctx, ix)
        } else if ix.program_id == settlement_program {
            settlement::process(&mut ctx, ix)
        } else {
            Err(InstructionError::UnknownProgram(ix.program_id))
        };
        match result {
            Ok(()) => ctx.log(format!("Program {} success", ix.program_id.short())),
            Err(error) => {
                ctx.log(format!("Program {} failed: {error}", ix.program_id.short()));
                return Err(TransactionError::InstructionError {
                    index: u8::try_from(index).unwrap_or(u8::MAX),
                    error,
                });
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// System program
// ---------------------------------------------------------------------------

fn process_system(ctx: &mut InvokeContext<'_>, ix: &Instruction) -> Result<(), InstructionError> {
    let SystemInstruction::CreateAccount {
        lamports,
        space,
        owner,
    } = SystemInstruction::unpack(&ix.data)?;
    let funder = account_at(ix, 0)?;
    let new_account = account_at(ix, 1)?;
    ctx.require_signer(&funder)?;
    ctx.require_signer(&new_account)?;

    if ctx.bank.contains(&new_account) {
        return Err(InstructionError::AccountAlreadyInUse(new_account));
    }
    ctx.bank.debit_lamports(&funder, lamports)?;
    ctx.bank.create_account(
        new_account,
        Account {
            lamports,
            owner,
            data: AccountData::Uninitialized { space },
        },
    )
}

// ---------------------------------------------------------------------------
// Token program
// ---------------------------------------------------------------------------

fn process_token(ctx: &mut InvokeContext<'_>, ix: &Instruction) -> Result<(), InstructionError> {
    match TokenInstruction::unpack(&ix.data)? {
        TokenInstruction::InitializeMint2 {
            decimals,
            mint_authority,
            freeze_authority: _,
        } => {
            let mint = account_at(ix, 0)?;
            let account = ctx
                .bank
                .account_mut(&mint)
                .ok_or(InstructionError::AccountNotFound(mint))?;
            let AccountData::Uninitialized { space } = account.data else {
                return Err(InstructionError::AccountAlreadyInUse(mint));
            };
            if account.owner != TOKEN_PROGRAM_ID || space < constants::MINT_SIZE as u64 {
                return Err(InstructionError::InvalidAccountData(mint));
            }
            if account.lamports < rent_exempt_minimum(space) {
                return Err(InstructionError::InsufficientFunds);
            }
            account.data = AccountData::Mint(MintState {
                decimals,
                mint_authority,
                supply: 0,
            });
            ctx.log("Program log: Instruction: InitializeMint2");
            Ok(())
        }
        TokenInstruction::MintTo { amount } => {
            let mint = account_at(ix, 0)?;
            let destination = account_at(ix, 1)?;
            let authority = account_at(ix, 2)?;
            ctx.require_signer(&authority)?;

            let state = *ctx.bank.mint(&mint)?;
            if state.mint_authority != authority {
                return Err(InstructionError::InvalidAccountData(authority));
            }
            let holder = *ctx.bank.token_account(&destination)?;
            if holder.mint != mint {
                return Err(InstructionError::InvalidAccountData(destination));
            }
            let supply = state
                .supply
                .checked_add(amount)
                .ok_or(InstructionError::InvalidAccountData(mint))?;
            let balance = holder
                .amount
                .checked_add(amount)
                .ok_or(InstructionError::InvalidAccountData(destination))?;
            ctx.bank.mint_mut(&mint)?.supply = supply;
            ctx.bank.token_account_mut(&destination)?.amount = balance;
            ctx.log("Program log: Instruction: MintTo");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Associated-account program
// ---------------------------------------------------------------------------

fn process_associated(
    ctx: &mut InvokeContext<'_>,
    ix: &Instruction,
) -> Result<(), InstructionError> {
    let idempotent = matches!(
        AssociatedAccountInstruction::unpack(&ix.data)?,
        AssociatedAccountInstruction::CreateIdempotent
    );
    let payer = account_at(ix, 0)?;
    let associated = account_at(ix, 1)?;
    let owner = account_at(ix, 2)?;
    let mint = account_at(ix, 3)?;
    ctx.require_signer(&payer)?;
    ctx.log(if idempotent {
        "Program log: Create idempotent"
    } else {
        "Program log: Create"
    });
    create_associated_account(ctx, payer, associated, owner, mint, idempotent)
}

/// Create the canonical custody account of `owner` for `mint`, funded by
/// `payer`. Shared with the settlement program, which creates the escrow's
/// custody accounts during `initialize`.
pub(crate) fn create_associated_account(
    ctx: &mut InvokeContext<'_>,
    payer: Address,
    associated: Address,
    owner: Address,
    mint: Address,
    idempotent: bool,
) -> Result<(), InstructionError> {
    let (expected, _) = find_program_address(
        &[owner.as_bytes(), TOKEN_PROGRAM_ID.as_bytes(), mint.as_bytes()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .map_err(|_| InstructionError::InvalidSeeds)?;
    if expected != associated {
        return Err(InstructionError::InvalidSeeds);
    }
    ctx.bank.mint(&mint)?;

    if ctx.bank.contains(&associated) {
        let existing = ctx.bank.token_account(&associated)?;
        return if idempotent && existing.owner == owner && existing.mint == mint {
            Ok(())
        } else if idempotent {
            Err(InstructionError::InvalidAccountData(associated))
        } else {
            Err(InstructionError::AccountAlreadyInUse(associated))
        };
    }

    let rent = rent_exempt_minimum(constants::TOKEN_ACCOUNT_SIZE as u64);
    ctx.bank.debit_lamports(&payer, rent)?;
    ctx.bank.create_account(
        associated,
        Account {
            lamports: rent,
            owner: TOKEN_PROGRAM_ID,
            data: AccountData::Token(TokenAccountState {
                mint,
                owner,
                amount: 0,
            }),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrowflow_types::{
        Blockhash, Keypair, TransactionSigner,
        program::{system, token},
    };

    const SETTLEMENT: Address = Address::new([9u8; 32]);

    fn run(
        bank: &mut Bank,
        payer: &Keypair,
        ixs: Vec<Instruction>,
        extra: &[&Keypair],
    ) -> Result<(), TransactionError> {
        let mut tx = Transaction::new_unsigned(payer.address(), ixs, Blockhash([0u8; 32]));
        let mut signers: Vec<&dyn TransactionSigner> = vec![payer as &dyn TransactionSigner];
        signers.extend(extra.iter().map(|k| *k as &dyn TransactionSigner));
        tx.sign(&signers).unwrap();
        let mut logs = Vec::new();
        process_transaction(bank, &tx, SETTLEMENT, &mut logs)
    }

    fn create_mint_ixs(payer: &Address, mint: &Address, authority: &Address) -> Vec<Instruction> {
        vec![
            system::create_account(
                *payer,
                *mint,
                rent_exempt_minimum(constants::MINT_SIZE as u64),
                constants::MINT_SIZE as u64,
                TOKEN_PROGRAM_ID,
            ),
            token::initialize_mint2(*mint, 6, *authority, None),
        ]
    }

    fn ata(owner: &Address, mint: &Address) -> Address {
        find_program_address(
            &[owner.as_bytes(), TOKEN_PROGRAM_ID.as_bytes(), mint.as_bytes()],
            &ASSOCIATED_TOKEN_PROGRAM_ID,
        )
        .unwrap()
        .0
    }

    fn funded_bank(payer: &Keypair) -> Bank {
        let mut bank = Bank::default();
        bank.credit_lamports(payer.address(), 10_000_000_000);
        bank
    }

    fn init_mint(bank: &mut Bank, payer: &Keypair, mint: &Keypair) {
        let ixs = create_mint_ixs(&payer.address(), &mint.address(), &payer.address());
        run(bank, payer, ixs, &[mint]).unwrap();
    }

    #[test]
    fn create_mint_and_mint_to_holder() {
        let payer = Keypair::generate();
        let mint = Keypair::generate();
        let mut bank = funded_bank(&payer);
        init_mint(&mut bank, &payer, &mint);

        let holder = ata(&payer.address(), &mint.address());
        run(
            &mut bank,
            &payer,
            vec![
                token::create_associated_account_idempotent(
                    payer.address(),
                    holder,
                    payer.address(),
                    mint.address(),
                ),
                token::mint_to(mint.address(), holder, payer.address(), 100_000),
            ],
            &[],
        )
        .unwrap();

        assert_eq!(bank.token_account(&holder).unwrap().amount, 100_000);
        assert_eq!(bank.mint(&mint.address()).unwrap().supply, 100_000);
    }

    #[test]
    fn mint_account_must_cosign_creation() {
        let payer = Keypair::generate();
        let mint = Address::new_unique();
        let mut bank = funded_bank(&payer);
        let ixs = create_mint_ixs(&payer.address(), &mint, &payer.address());
        // Signing without the mint's key is caught before execution.
        let mut tx = Transaction::new_unsigned(payer.address(), ixs.clone(), Blockhash([0u8; 32]));
        assert!(tx.sign(&[&payer]).is_err());

        // A forged signer list is caught by the program.
        let mut ctx = InvokeContext {
            bank: &mut bank,
            signers: &[payer.address()],
            settlement_program: SETTLEMENT,
            logs: &mut Vec::new(),
        };
        assert_eq!(
            process_system(&mut ctx, &ixs[0]),
            Err(InstructionError::MissingRequiredSignature(mint))
        );
    }

    #[test]
    fn idempotent_create_is_noop_when_present() {
        let payer = Keypair::generate();
        let mint = Keypair::generate();
        let mut bank = funded_bank(&payer);
        init_mint(&mut bank, &payer, &mint);
        let holder = ata(&payer.address(), &mint.address());
        let create = token::create_associated_account_idempotent(
            payer.address(),
            holder,
            payer.address(),
            mint.address(),
        );

        run(&mut bank, &payer, vec![create.clone()], &[]).unwrap();
        let lamports_after_first = bank.lamports(&payer.address());
        run(&mut bank, &payer, vec![create], &[]).unwrap();
        assert_eq!(bank.lamports(&payer.address()), lamports_after_first);
    }

    #[test]
    fn wrong_associated_address_rejected() {
        let payer = Keypair::generate();
        let mint = Keypair::generate();
        let mut bank = funded_bank(&payer);
        init_mint(&mut bank, &payer, &mint);
        let bogus = Address::new_unique();
        let err = run(
            &mut bank,
            &payer,
            vec![token::create_associated_account_idempotent(
                payer.address(),
                bogus,
                payer.address(),
                mint.address(),
            )],
            &[],
        )
        .unwrap_err();
        assert_eq!(
            err,
            TransactionError::InstructionError {
                index: 0,
                error: InstructionError::InvalidSeeds
            }
        );
    }

    #[test]
    fn mint_to_requires_authority() {
        let payer = Keypair::generate();
        let stranger = Keypair::generate();
        let mint = Keypair::generate();
        let mut bank = funded_bank(&payer);
        bank.credit_lamports(stranger.address(), 10_000_000_000);
        init_mint(&mut bank, &payer, &mint);
        let holder = ata(&stranger.address(), &mint.address());
        let err = run(
            &mut bank,
            &stranger,
            vec![
                token::create_associated_account_idempotent(
                    stranger.address(),
                    holder,
                    stranger.address(),
                    mint.address(),
                ),
                token::mint_to(mint.address(), holder, stranger.address(), 5),
            ],
            &[],
        )
        .unwrap_err();
        assert_eq!(
            err,
            TransactionError::InstructionError {
                index: 1,
                error: InstructionError::InvalidAccountData(stranger.address())
            }
        );
    }

    #[test]
    fn unknown_program_fails() {
        let payer = Keypair::generate();
        let mut bank = funded_bank(&payer);
        let ix = Instruction {
            program_id: Address::new([77u8; 32]),
            accounts: vec![],
            data: vec![],
        };
        let err = run(&mut bank, &payer, vec![ix], &[]).unwrap_err();
        assert!(matches!(
            err,
            TransactionError::InstructionError {
                error: InstructionError::UnknownProgram(_),
                ..
            }
        ));
    }
}
