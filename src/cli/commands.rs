//! CLI commands for the multisig engine
//!
//! Implements all command handlers for the CLI interface. Owner actions
//! are signed with keys from the local key store and submitted through the
//! instruction processor, the same path a remote caller would take.

use crate::config::EngineConfig;
use crate::crypto::Identity;
use crate::host::{encode_transfer, transfer_accounts, transfer_program_id, Ledger, LedgerState};
use crate::instruction::{Instruction, InstructionOutcome, Processor, ReplayGuard, Request};
use crate::keystore::KeyStore;
use crate::multisig::{MultisigGroup, MultisigProgram, PendingTransaction, TransactionAccount};
use crate::storage::{MemoryStore, Snapshot, Storage, StorageConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Everything persisted between CLI runs
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateFile {
    pub store: Snapshot,
    pub ledger: LedgerState,
    /// Accepted (signer, nonce) pairs
    #[serde(default)]
    pub used_nonces: Vec<(Identity, u64)>,
}

/// Application state
pub struct AppState {
    pub program: MultisigProgram<MemoryStore, Ledger>,
    pub replay: Arc<ReplayGuard>,
    pub storage: Storage,
    pub keystore: KeyStore,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load state from `data_dir`, starting empty if none exists
    pub fn new(data_dir: PathBuf, config: EngineConfig) -> CliResult<Self> {
        let storage_config = StorageConfig {
            data_dir: data_dir.clone(),
            ..Default::default()
        };

        let storage = Storage::new(storage_config)?;
        let keystore = KeyStore::new(&data_dir.join("keys"))?;

        let state: StateFile = if storage.exists() {
            log::debug!("Loading state from {:?}", storage.state_path());
            storage.load()?
        } else {
            StateFile::default()
        };

        Ok(Self {
            program: MultisigProgram::new(
                MemoryStore::from_snapshot(state.store),
                Ledger::from_state(state.ledger),
                config,
            ),
            replay: Arc::new(ReplayGuard::from_entries(state.used_nonces)),
            storage,
            keystore,
            data_dir,
        })
    }

    /// Current state as written to disk
    pub fn state_file(&self) -> CliResult<StateFile> {
        Ok(StateFile {
            store: self.program.store().snapshot()?,
            ledger: self.program.host().state()?,
            used_nonces: self.replay.entries()?,
        })
    }

    /// Save the current state
    pub fn save(&self) -> CliResult<()> {
        self.storage.save(&self.state_file()?)?;
        Ok(())
    }

    /// Run one request and save the result
    pub fn process(&self, request: &Request) -> CliResult<InstructionOutcome> {
        let outcome = Processor::new(&self.program)
            .with_replay_guard(self.replay.clone())
            .process(request)?;
        self.save()?;
        Ok(outcome)
    }

    /// Sign `instruction` as `signer` and run it
    fn submit(&self, signer: &Identity, instruction: Instruction) -> CliResult<InstructionOutcome> {
        let key = self.keystore.load(signer)?;
        let request = Request::signed(instruction, &key.keypair)?;
        self.process(&request)
    }
}

/// Parse an identity argument
pub fn parse_identity(text: &str) -> CliResult<Identity> {
    text.parse::<Identity>()
        .map_err(|e| format!("invalid identity '{}': {}", text, e).into())
}

/// Parse `ID[:flags]` where flags are `s` (signer) and `w` (writable)
pub fn parse_account_arg(arg: &str) -> CliResult<TransactionAccount> {
    let (id, flags) = arg.split_once(':').unwrap_or((arg, ""));
    let pubkey = parse_identity(id)?;

    let mut account = TransactionAccount::readonly(pubkey);
    for flag in flags.chars() {
        match flag {
            's' => account.is_signer = true,
            'w' => account.is_writable = true,
            other => return Err(format!("unknown account flag '{}' in '{}'", other, arg).into()),
        }
    }
    Ok(account)
}

fn print_group(group: &MultisigGroup) {
    println!("🔐 Multisig {}", group.id());
    println!("   ├─ Policy: {}", group.description());
    println!("   ├─ Authority: {}", group.authority());
    println!("   ├─ Owners version: {}", group.owners_version());
    println!("   ├─ Created: {}", group.created_at().format("%Y-%m-%d %H:%M:%S"));
    println!("   └─ Owners:");
    for (i, owner) in group.owners().iter().enumerate() {
        println!("      {}. {}", i + 1, owner);
    }
}

fn print_transaction(tx: &PendingTransaction, group: Option<&MultisigGroup>) {
    println!("📝 Transaction {}", tx.id());
    println!("   ├─ Multisig: {}", tx.multisig());
    println!("   ├─ Program: {}", tx.program_id());
    println!("   ├─ Proposer: {}", tx.proposer());
    println!("   ├─ Data: {}", hex::encode(tx.data()));
    match tx.executed_at() {
        Some(at) => println!("   ├─ Status: executed at {}", at.format("%Y-%m-%d %H:%M:%S")),
        None => println!("   ├─ Status: pending"),
    }
    if let Some(group) = group {
        if tx.is_stale(group) {
            println!("   ├─ ⚠️  Stale: owner set changed since proposal");
        }
        println!(
            "   ├─ Approvals: {}/{}",
            tx.approval_count(),
            group.threshold()
        );
    }
    println!("   └─ Accounts:");
    for account in tx.accounts() {
        println!(
            "      {} [{}{}]",
            account.pubkey,
            if account.is_signer { "s" } else { "-" },
            if account.is_writable { "w" } else { "-" }
        );
    }
}

/// Generate a new owner key
pub fn cmd_keygen(state: &AppState, label: Option<&str>) -> CliResult<Identity> {
    let key = state.keystore.generate(label)?;

    println!("🔑 New key created!");
    println!("   📍 Identity: {}", key.identity());
    println!("   🔑 Public Key: {}", key.keypair.public_key_hex());
    if let Some(l) = &key.label {
        println!("   🏷️  Label: {}", l);
    }

    Ok(key.identity())
}

/// Import an owner key from its hex private key
pub fn cmd_import_key(state: &AppState, private_key_hex: &str, label: Option<&str>) -> CliResult<Identity> {
    let key = state.keystore.import(private_key_hex, label)?;

    println!("📥 Key imported!");
    println!("   📍 Identity: {}", key.identity());
    if let Some(l) = &key.label {
        println!("   🏷️  Label: {}", l);
    }

    Ok(key.identity())
}

/// List stored keys
pub fn cmd_keys(state: &AppState) -> CliResult<()> {
    let keys = state.keystore.list()?;

    if keys.is_empty() {
        println!("📭 No keys found. Create one with: multisig keygen");
        return Ok(());
    }

    println!("📋 Keys:");
    for key in &keys {
        let label = key.label.as_deref().unwrap_or("-");
        println!("   {} ({})", key.identity(), label);
    }
    Ok(())
}

/// Credit a ledger account
pub fn cmd_fund(state: &AppState, account: &str, amount: u64) -> CliResult<u64> {
    let account = parse_identity(account)?;
    let balance = state.program.host().fund(&account, amount)?;
    state.save()?;

    println!("💰 Funded {} with {} (balance {})", account, amount, balance);
    Ok(balance)
}

/// Show a ledger balance
pub fn cmd_balance(state: &AppState, account: &str) -> CliResult<u64> {
    let account = parse_identity(account)?;
    let balance = state.program.host().balance(&account)?;

    println!("💰 Balance for {}: {}", account, balance);
    Ok(balance)
}

/// Create a new multisig group
pub fn cmd_init(
    state: &AppState,
    payer: &str,
    owners: &[String],
    threshold: u64,
    nonce: u8,
) -> CliResult<Identity> {
    let payer = parse_identity(payer)?;
    let owners = owners
        .iter()
        .map(|o| parse_identity(o))
        .collect::<CliResult<Vec<_>>>()?;

    let instruction = Instruction::Initialize {
        owners,
        threshold,
        nonce,
    };
    let InstructionOutcome::Initialized(group) = state.submit(&payer, instruction)? else {
        return Err("unexpected outcome for initialize".into());
    };

    println!("✅ Multisig created!");
    print_group(&group);
    Ok(*group.id())
}

/// Propose an arbitrary target action
pub fn cmd_propose(
    state: &AppState,
    proposer: &str,
    multisig: &str,
    program_id: &str,
    accounts: &[String],
    data_hex: &str,
) -> CliResult<Identity> {
    let accounts = accounts
        .iter()
        .map(|a| parse_account_arg(a))
        .collect::<CliResult<Vec<_>>>()?;
    let data = hex::decode(data_hex).map_err(|e| format!("invalid payload hex: {}", e))?;

    let instruction = Instruction::CreateTransaction {
        multisig: parse_identity(multisig)?,
        program_id: parse_identity(program_id)?,
        accounts,
        data,
    };
    propose(state, proposer, instruction)
}

/// Propose a ledger transfer out of the group's authority
pub fn cmd_transfer(
    state: &AppState,
    proposer: &str,
    multisig: &str,
    to: &str,
    amount: u64,
) -> CliResult<Identity> {
    let group = state.program.group(&parse_identity(multisig)?)?;

    let instruction = Instruction::CreateTransaction {
        multisig: *group.id(),
        program_id: transfer_program_id(),
        accounts: transfer_accounts(*group.authority(), parse_identity(to)?),
        data: encode_transfer(amount),
    };
    propose(state, proposer, instruction)
}

fn propose(state: &AppState, proposer: &str, instruction: Instruction) -> CliResult<Identity> {
    let proposer = parse_identity(proposer)?;
    let InstructionOutcome::TransactionCreated(tx) = state.submit(&proposer, instruction)? else {
        return Err("unexpected outcome for create_transaction".into());
    };

    println!("📤 Transaction proposed!");
    print_transaction(&tx, None);
    Ok(*tx.id())
}

/// Approve a pending transaction
pub fn cmd_approve(state: &AppState, owner: &str, multisig: &str, transaction: &str) -> CliResult<()> {
    let owner = parse_identity(owner)?;
    let instruction = Instruction::Approve {
        multisig: parse_identity(multisig)?,
        transaction: parse_identity(transaction)?,
    };
    let InstructionOutcome::Approved(tx) = state.submit(&owner, instruction)? else {
        return Err("unexpected outcome for approve".into());
    };

    let group = state.program.group(tx.multisig())?;
    println!(
        "✍️  Approved by {} ({}/{} approvals)",
        owner,
        tx.approval_count(),
        group.threshold()
    );
    Ok(())
}

/// Execute an approved transaction
///
/// Without explicit accounts, the stored account list is supplied.
pub fn cmd_execute(
    state: &AppState,
    multisig: &str,
    transaction: &str,
    accounts: Option<&[String]>,
) -> CliResult<()> {
    let multisig = parse_identity(multisig)?;
    let transaction = parse_identity(transaction)?;

    let accounts = match accounts {
        Some(args) => args
            .iter()
            .map(|a| parse_account_arg(a))
            .collect::<CliResult<Vec<_>>>()?,
        None => state.program.transaction(&transaction)?.accounts().to_vec(),
    };

    let instruction = Instruction::ExecuteTransaction {
        multisig,
        transaction,
        accounts,
    };
    let outcome = state.process(&Request::unsigned(instruction))?;

    if let InstructionOutcome::Executed { executed_at, .. } = outcome {
        println!("🚀 Transaction {} executed", transaction);
        println!("   at {}", executed_at.format("%Y-%m-%d %H:%M:%S"));
    }
    Ok(())
}

/// Show a group and its transactions
pub fn cmd_show(state: &AppState, multisig: &str) -> CliResult<()> {
    let group = state.program.group(&parse_identity(multisig)?)?;
    print_group(&group);

    let balance = state.program.host().balance(group.authority())?;
    println!("   💰 Authority balance: {}", balance);

    let transactions = state.program.transactions_for(group.id())?;
    if transactions.is_empty() {
        println!("\n📭 No transactions");
        return Ok(());
    }

    println!("\n📋 Transactions:");
    for tx in &transactions {
        println!(
            "   {} | {}/{} | {:?}{}",
            tx.id(),
            tx.approval_count(),
            group.threshold(),
            tx.status(),
            if tx.is_stale(&group) { " (stale)" } else { "" }
        );
    }
    Ok(())
}

/// List all groups
pub fn cmd_list(state: &AppState) -> CliResult<()> {
    let groups = state.program.groups()?;

    if groups.is_empty() {
        println!("📭 No multisig groups. Create one with: multisig init");
        return Ok(());
    }

    println!("📋 Multisig groups:");
    for group in &groups {
        println!("   {} ({})", group.id(), group.description());
    }
    Ok(())
}

/// Show one transaction
pub fn cmd_show_tx(state: &AppState, transaction: &str) -> CliResult<()> {
    let tx = state.program.transaction(&parse_identity(transaction)?)?;
    let group = state.program.group(tx.multisig())?;
    print_transaction(&tx, Some(&group));

    let approvers = tx.approvers(&group);
    if !tx.is_stale(&group) && !approvers.is_empty() {
        println!("   Approved by:");
        for owner in approvers {
            println!("      {}", owner);
        }
    }
    Ok(())
}

/// Export the state file
pub fn cmd_export(state: &AppState, path: &Path) -> CliResult<()> {
    crate::storage::save_to_file(&state.state_file()?, path)?;
    println!("📦 State exported to {:?}", path);
    Ok(())
}

/// List saved state backups, newest first
pub fn cmd_backups(state: &AppState) -> CliResult<Vec<usize>> {
    let backups = state.storage.list_backups();

    if backups.is_empty() {
        println!("📭 No backups");
        return Ok(backups);
    }

    println!("📋 Backups (0 is newest):");
    for index in &backups {
        println!("   {}", index);
    }
    Ok(backups)
}

/// Replace the current state with a backup
///
/// Nonces accepted since the backup stay spent.
pub fn cmd_restore(state: &mut AppState, index: usize) -> CliResult<()> {
    let backup: StateFile = state.storage.restore_backup(index)?;
    let spent = state.replay.entries()?;

    state.program = MultisigProgram::new(
        MemoryStore::from_snapshot(backup.store),
        Ledger::from_state(backup.ledger),
        *state.program.config(),
    );
    state.replay = Arc::new(ReplayGuard::from_entries(
        backup.used_nonces.into_iter().chain(spent),
    ));
    state.save()?;

    log::info!("Restored state from backup {}", index);
    println!("♻️  Restored backup {}", index);
    Ok(())
}

/// Delete the saved state; keys and backups are kept
pub fn cmd_reset(state: &AppState) -> CliResult<()> {
    state.storage.delete()?;
    println!("🗑️  State file removed from {:?}", state.data_dir);
    Ok(())
}
