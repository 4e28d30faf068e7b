//! # Store Client CLI
//!
//! Small command-line client for the store server. Glue only: every
//! command maps onto one or two client stub calls.
//!
//! ## Usage
//!
//! ```bash
//! slotstore read 3
//! slotstore write 3 Alice 41 0
//! slotstore demo
//! ```

use eyre::{bail, Result};

use slotstore::{Record, StoreClient};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    slotstore::logging::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        print_usage();
        return Ok(());
    };

    match command.as_str() {
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "--version" | "-v" => {
            println!("slotstore {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "read" => {
            let index = parse_index(args.get(2))?;
            let client = StoreClient::open()?;
            let record = client.read(index)?;
            println!(
                "slot {index}: id={} name={:?} age={} gender={}",
                record.id(),
                record.name(),
                record.age(),
                record.gender()
            );
            Ok(())
        }
        "write" => {
            let index = parse_index(args.get(2))?;
            let Some(name) = args.get(3) else {
                bail!("write needs: <index> <name> [age] [gender]");
            };
            let age = args.get(4).map(|s| s.parse()).transpose()?.unwrap_or(0);
            let gender = args.get(5).map(|s| s.parse()).transpose()?.unwrap_or(0);

            let client = StoreClient::open()?;
            client.write(index, &Record::new(index, age, gender, name))?;
            println!("slot {index} written");
            Ok(())
        }
        "demo" => demo(),
        other => bail!("Unknown command: {other}"),
    }
}

/// Writes a handful of records and reads them back, the same smoke loop
/// the store has always shipped with.
fn demo() -> Result<()> {
    let client = StoreClient::open()?;

    for (index, name, age) in [(1u32, "Alice", 41), (2, "Bob", 33), (3, "Carol", 57)] {
        client.write(index, &Record::new(index, age, 0, name))?;
        println!("wrote slot {index} ({name})");
    }

    for index in [1u32, 2, 3] {
        let record = client.read(index)?;
        println!(
            "read slot {index}: name={:?} age={}",
            record.name(),
            record.age()
        );
    }

    Ok(())
}

fn parse_index(arg: Option<&String>) -> Result<u32> {
    match arg {
        Some(s) => s
            .parse()
            .map_err(|_| eyre::eyre!("slot index must be a positive integer, got {s:?}")),
        None => bail!("missing slot index"),
    }
}

fn print_usage() {
    println!("slotstore client");
    println!();
    println!("USAGE:");
    println!("    slotstore read <index>");
    println!("    slotstore write <index> <name> [age] [gender]");
    println!("    slotstore demo");
}
