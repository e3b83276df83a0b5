//! Multisig CLI Application
//!
//! A command-line interface for creating multisig groups, proposing,
//! approving and executing transactions against a local ledger.

use clap::{Parser, Subcommand};
use multisig_engine::cli::{self, AppState};
use multisig_engine::config::EngineConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "multisig")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "A threshold multi-signature authorization engine", long_about = None)]
struct Cli {
    /// Data directory for state and keys
    #[arg(short, long, default_value = ".multisig_data")]
    data_dir: PathBuf,

    /// Engine limits (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new owner key
    Keygen {
        /// Optional label for the key
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Import an owner key
    ImportKey {
        /// Private key (hex)
        #[arg(short, long)]
        private_key: String,

        /// Optional label for the key
        #[arg(short, long)]
        label: Option<String>,
    },

    /// List stored keys
    Keys,

    /// Credit a ledger account
    Fund {
        /// Account identity
        #[arg(short, long)]
        account: String,

        /// Amount to credit
        #[arg(short = 'n', long)]
        amount: u64,
    },

    /// Show a ledger balance
    Balance {
        /// Account identity
        #[arg(short, long)]
        account: String,
    },

    /// Create a multisig group
    Init {
        /// Identity of the paying key
        #[arg(short, long)]
        payer: String,

        /// Owner identities (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        owners: Vec<String>,

        /// Approvals required to execute
        #[arg(short, long)]
        threshold: u64,

        /// Authority nonce
        #[arg(long, default_value = "0")]
        nonce: u8,
    },

    /// Propose an arbitrary target action
    Propose {
        /// Proposing owner
        #[arg(short, long)]
        proposer: String,

        /// Multisig group
        #[arg(short, long)]
        multisig: String,

        /// Target program identity
        #[arg(long)]
        program: String,

        /// Accounts as ID[:sw] (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        accounts: Vec<String>,

        /// Payload (hex)
        #[arg(long, default_value = "")]
        data: String,
    },

    /// Propose a ledger transfer from the group's authority
    Transfer {
        /// Proposing owner
        #[arg(short, long)]
        proposer: String,

        /// Multisig group
        #[arg(short, long)]
        multisig: String,

        /// Recipient identity
        #[arg(short, long)]
        to: String,

        /// Amount to send
        #[arg(short = 'n', long)]
        amount: u64,
    },

    /// Approve a pending transaction
    Approve {
        /// Approving owner
        #[arg(short, long)]
        owner: String,

        /// Multisig group
        #[arg(short, long)]
        multisig: String,

        /// Transaction id
        #[arg(short = 'x', long)]
        transaction: String,
    },

    /// Execute an approved transaction
    Execute {
        /// Multisig group
        #[arg(short, long)]
        multisig: String,

        /// Transaction id
        #[arg(short = 'x', long)]
        transaction: String,

        /// Override supplied accounts as ID[:sw] (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        accounts: Option<Vec<String>>,
    },

    /// List multisig groups
    List,

    /// Show a group and its transactions
    Show {
        /// Multisig group
        #[arg(short, long)]
        multisig: String,
    },

    /// Show one transaction
    ShowTx {
        /// Transaction id
        #[arg(short = 'x', long)]
        transaction: String,
    },

    /// Export state to a file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List state backups
    Backups,

    /// Restore state from a backup
    Restore {
        /// Backup index (0 is newest)
        #[arg(short, long, default_value = "0")]
        index: usize,
    },

    /// Delete the saved state (keys and backups are kept)
    Reset,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let mut state = AppState::new(cli.data_dir.clone(), config)?;

    match cli.command {
        Commands::Keygen { label } => {
            cli::cmd_keygen(&state, label.as_deref())?;
        }
        Commands::ImportKey { private_key, label } => {
            cli::cmd_import_key(&state, &private_key, label.as_deref())?;
        }
        Commands::Keys => cli::cmd_keys(&state)?,
        Commands::Fund { account, amount } => {
            cli::cmd_fund(&state, &account, amount)?;
        }
        Commands::Balance { account } => {
            cli::cmd_balance(&state, &account)?;
        }
        Commands::Init {
            payer,
            owners,
            threshold,
            nonce,
        } => {
            cli::cmd_init(&state, &payer, &owners, threshold, nonce)?;
        }
        Commands::Propose {
            proposer,
            multisig,
            program,
            accounts,
            data,
        } => {
            cli::cmd_propose(&state, &proposer, &multisig, &program, &accounts, &data)?;
        }
        Commands::Transfer {
            proposer,
            multisig,
            to,
            amount,
        } => {
            cli::cmd_transfer(&state, &proposer, &multisig, &to, amount)?;
        }
        Commands::Approve {
            owner,
            multisig,
            transaction,
        } => cli::cmd_approve(&state, &owner, &multisig, &transaction)?,
        Commands::Execute {
            multisig,
            transaction,
            accounts,
        } => cli::cmd_execute(&state, &multisig, &transaction, accounts.as_deref())?,
        Commands::List => cli::cmd_list(&state)?,
        Commands::Show { multisig } => cli::cmd_show(&state, &multisig)?,
        Commands::ShowTx { transaction } => cli::cmd_show_tx(&state, &transaction)?,
        Commands::Export { output } => cli::cmd_export(&state, &output)?,
        Commands::Backups => {
            cli::cmd_backups(&state)?;
        }
        Commands::Restore { index } => cli::cmd_restore(&mut state, index)?,
        Commands::Reset => cli::cmd_reset(&state)?,
    }

    Ok(())
}
