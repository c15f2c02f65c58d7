use std::error::Error;
use std::path::Path;
use std::process::exit;
use std::sync::{Arc, Mutex};

use clap::Parser;
use rusqlite::Connection;

use splitteur_rs::{
    Currency, DEFAULT_SESSION_DURATION, GroupMetadata, Ledger, create_group, create_member,
    initialize_db, update_group_metadata,
};

/// A utility for creating a test database for splitteur.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test group...");

    let mut metadata = GroupMetadata::new(Currency::USD);
    let group = create_group(&["Groceries", "Rent", "Utilities"], &metadata, &conn)?;
    let alice = create_member("Alice", group.id, &conn)?;
    let bob = create_member("Bob", group.id, &conn)?;

    metadata.default_share_percentages = [(alice.id, 50.0), (bob.id, 50.0)].into();
    update_group_metadata(group.id, &metadata, &conn)?;

    let ledger = Ledger::open(Arc::new(Mutex::new(conn)));
    for member in [&alice, &bob] {
        let token = ledger.log_in(member.id, DEFAULT_SESSION_DURATION)?;
        println!("Session for {} (member {}): {token}", member.display_name, member.id);
    }

    println!("Success!");

    Ok(())
}
