use std::{
    error::Error,
    process::exit,
    sync::{Arc, Mutex},
};

use clap::{Parser, Subcommand};
use rusqlite::Connection;
use serde::Serialize;
use time::Duration;

use splitteur_rs::{
    Currency, GroupId, GroupMetadata, Ledger, MemberId, SplitRequest, create_group, create_member,
    initialize_db, parse_member_shares, setup_logging,
};

/// Record shared expenses and see who owes whom.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "SPLITTEUR_DB_PATH")]
    db_path: String,

    /// The session token returned by `log-in`.
    #[arg(long, env = "SPLITTEUR_SESSION", hide_env_values = true)]
    session: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database tables if they do not exist yet.
    Init,

    /// Create a group with no members.
    CreateGroup {
        /// The currency used when an expense does not name one.
        #[arg(long, default_value = "USD")]
        currency: Currency,

        /// A category name the group may use. May be repeated.
        #[arg(long = "category")]
        categories: Vec<String>,
    },

    /// Add a member to a group.
    AddMember {
        /// The group to add the member to.
        #[arg(long)]
        group_id: i64,

        /// The name shown to the other members.
        #[arg(long)]
        name: String,
    },

    /// Start a session for a member and print its token.
    LogIn {
        /// The member to log in as.
        #[arg(long)]
        member_id: i64,

        /// How many hours the session lasts.
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },

    /// End the current session.
    LogOut,

    /// Record an expense split across the whole group.
    Split {
        /// The total cost.
        #[arg(long)]
        amount: f64,

        /// What the expense was for.
        #[arg(long)]
        description: String,

        /// The currency code. Defaults to the group's currency.
        #[arg(long, default_value = "")]
        currency: String,

        /// Who paid how much, as MEMBER_ID=AMOUNT. May be repeated.
        #[arg(long = "paid", value_parser = parse_key_value, required = true)]
        paid_shares: Vec<(String, f64)>,

        /// The percentage each member owes, as MEMBER_ID=PERCENT. May be repeated.
        /// Defaults to the group's default shares.
        #[arg(long = "owed", value_parser = parse_key_value)]
        owed_percentages: Vec<(String, f64)>,
    },

    /// Delete an expense and all of its transfers.
    Delete {
        /// The ID of the expense to delete.
        #[arg(long)]
        expense_id: i64,
    },

    /// Show your net balance with each member of your group.
    Balances,

    /// List the live expenses in your group, newest first.
    List {
        /// The number of expenses to skip.
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
}

fn parse_key_value(s: &str) -> Result<(String, f64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got \"{s}\""))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|error| format!("invalid number \"{value}\": {error}"))?;

    Ok((key.to_owned(), value))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    setup_logging();

    let args = Args::parse();
    let connection = Connection::open(&args.db_path)?;
    initialize_db(&connection)?;

    let session = || -> Result<String, Box<dyn Error>> {
        args.session
            .clone()
            .ok_or_else(|| "a session token is required, set --session or SPLITTEUR_SESSION".into())
    };

    match args.command {
        Command::Init => {
            println!("Initialized database at {}", args.db_path);
        }
        Command::CreateGroup {
            currency,
            ref categories,
        } => {
            let categories: Vec<&str> = categories.iter().map(String::as_str).collect();
            let group = create_group(&categories, &GroupMetadata::new(currency), &connection)?;
            println!("{}", group.id);
        }
        Command::AddMember { group_id, ref name } => {
            let member = create_member(name, GroupId::new(group_id), &connection)?;
            print_json(&member)?;
        }
        Command::LogIn { member_id, hours } => {
            let ledger = Ledger::open(Arc::new(Mutex::new(connection)));
            let token = ledger.log_in(MemberId::new(member_id), Duration::hours(hours))?;
            println!("{token}");
        }
        Command::LogOut => {
            let ledger = Ledger::open(Arc::new(Mutex::new(connection)));
            ledger.log_out(&session()?)?;
        }
        Command::Split {
            amount,
            ref description,
            ref currency,
            ref paid_shares,
            ref owed_percentages,
        } => {
            let request = SplitRequest {
                amount,
                description: description.clone(),
                currency: currency.clone(),
                paid_shares: parse_member_shares(
                    paid_shares.iter().map(|(id, share)| (id.as_str(), *share)),
                )?,
                owed_percentages: parse_member_shares(
                    owed_percentages.iter().map(|(id, pct)| (id.as_str(), *pct)),
                )?,
            };

            let ledger = Ledger::open(Arc::new(Mutex::new(connection)));
            match ledger.record_expense(&session()?, request) {
                Ok(entry) => print_json(&entry)?,
                Err(error) => {
                    eprintln!("{error}");
                    exit(if error.is_retryable() { 75 } else { 1 });
                }
            }
        }
        Command::Delete { expense_id } => {
            let ledger = Ledger::open(Arc::new(Mutex::new(connection)));
            ledger.delete_expense(&session()?, expense_id)?;
        }
        Command::Balances => {
            let ledger = Ledger::open(Arc::new(Mutex::new(connection)));
            print_json(&ledger.balances(&session()?)?)?;
        }
        Command::List { offset } => {
            let ledger = Ledger::open(Arc::new(Mutex::new(connection)));
            print_json(&ledger.list_expenses(&session()?, offset)?)?;
        }
    }

    Ok(())
}
