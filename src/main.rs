//! member_transfer CLI
//!
//! ```bash
//! member_transfer seed memberA 10000
//! member_transfer seed memberB 10000
//! member_transfer transfer memberA memberB 2000
//! member_transfer --env prod transfer memberA memberB 2000 --manual
//! member_transfer show memberA
//! ```
//!
//! Exit codes: 0 on success, 1 on any error (the error code is printed).

use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};

use member_transfer::config::AppConfig;
use member_transfer::db::Database;
use member_transfer::logging::init_logging;
use member_transfer::member::{
    ManualTransactionManager, Member, MemberError, MemberStore, PoolTransactionManager,
    TransferService,
};

#[derive(Parser, Debug)]
#[command(name = "member_transfer")]
#[command(about = "Member store and transactional account transfer", long_about = None)]
struct CliArgs {
    /// Config environment, loads config/<ENV>.yaml
    #[arg(short, long, default_value = "dev")]
    env: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert a new member
    Seed { member_id: String, money: i64 },
    /// Print a member as JSON
    Show { member_id: String },
    /// Move money between two members in one transaction
    Transfer {
        from_id: String,
        to_id: String,
        amount: i64,
        /// Drive BEGIN/COMMIT/ROLLBACK by hand instead of through the pool
        #[arg(long)]
        manual: bool,
    },
    /// Delete a member
    Delete { member_id: String },
    /// Delete every member
    Reset,
}

async fn run(command: Command, db: Database) -> Result<(), MemberError> {
    let store = MemberStore::new(db.clone());

    match command {
        Command::Seed { member_id, money } => {
            let member = store.save(None, Member::new(member_id, money)).await?;
            print_member(&member);
        }
        Command::Show { member_id } => {
            let member = store.find_by_id(None, &member_id).await?;
            print_member(&member);
        }
        Command::Transfer {
            from_id,
            to_id,
            amount,
            manual,
        } => {
            if manual {
                let service = TransferService::new(store, ManualTransactionManager::new(db));
                service.account_transfer(&from_id, &to_id, amount).await?;
            } else {
                let service = TransferService::new(store, PoolTransactionManager::new(db));
                service.account_transfer(&from_id, &to_id, amount).await?;
            }
            println!("transferred {} from {} to {}", amount, from_id, to_id);
        }
        Command::Delete { member_id } => {
            let deleted = store.delete(None, &member_id).await?;
            println!("deleted {} row(s)", deleted);
        }
        Command::Reset => {
            let deleted = store.delete_all(None).await?;
            println!("deleted {} row(s)", deleted);
        }
    }
    Ok(())
}

fn print_member(member: &Member) {
    match serde_json::to_string(member) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: failed to encode member: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let config = AppConfig::load(&args.env)?;
    let guard = init_logging(&config);
    tracing::info!(env = %args.env, "member_transfer starting");

    let db = Database::connect(&config.database).await?;
    db.ensure_schema().await?;

    let outcome = run(args.command, db.clone()).await;
    db.close().await;

    if let Err(e) = outcome {
        eprintln!("Error [{}]: {}", e.code(), e);
        if e.is_retryable() {
            eprintln!("The database was temporarily unavailable; the command may be retried.");
        }
        // flush buffered log lines before exiting
        drop(guard);
        process::exit(1);
    }
    Ok(())
}
