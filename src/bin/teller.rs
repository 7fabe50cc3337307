//! An interactive teller for the passbook ledger.
//!
//! Reads commands from stdin and drives the public ledger operations.
//! Amounts are entered in decimal dollars and converted to integer cents
//! at this boundary; the ledger itself only ever sees minor units.

use std::{
    io::{self, Write},
    sync::OnceLock,
};

use clap::Parser;
use numfmt::{Formatter, Precision};
use rusqlite::Connection;
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use passbook_rs::{Cents, Ledger};

/// The interactive front end for the passbook ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the ledger SQLite database.
    #[arg(long, default_value = "accounts.sqlite")]
    db_path: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();

    let args = Args::parse();

    let connection = Connection::open(&args.db_path)?;
    let ledger = Ledger::new(connection)?;

    loop {
        let Some(command) = prompt(
            "Enter the kind of operation: create account - C, deposit - D, withdraw - W, \
             show balance - S, history - H, export history - E, audit - A, quit - Q.",
        )?
        else {
            break;
        };

        match command.to_uppercase().as_str() {
            "C" | "CREATE" => create_account(&ledger)?,
            "D" | "DEPOSIT" => deposit(&ledger)?,
            "W" | "WITHDRAW" => withdraw(&ledger)?,
            "S" | "SHOW" => show_balance(&ledger)?,
            "H" | "HISTORY" => show_history(&ledger)?,
            "E" | "EXPORT" => export_history(&ledger)?,
            "A" | "AUDIT" => audit(&ledger)?,
            "Q" | "QUIT" => break,
            "" => {}
            other => println!("Entered an unrecognized command: {other}."),
        }
    }

    Ok(())
}

fn setup_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().pretty().with_filter(env_filter))
        .init();
}

fn create_account(ledger: &Ledger) -> io::Result<()> {
    let Some(name) = prompt("Enter the name of the account.")? else {
        return Ok(());
    };

    let opening_balance =
        match prompt("Enter the opening balance in dollars, or press enter for 0.")? {
            None => return Ok(()),
            Some(input) if input.is_empty() => 0,
            Some(input) => match parse_cents(&input) {
                Some(cents) => cents,
                None => {
                    println!("Could not read \"{input}\" as a dollar amount, using 0.");
                    0
                }
            },
        };

    match ledger.open_or_create(&name, opening_balance) {
        Ok((handle, true)) => println!(
            "Account {} already exists, retrieved the stored record. Balance is {}.",
            handle.name(),
            format_cents(handle.balance())
        ),
        Ok((handle, false)) => println!(
            "Account created for {}. Balance is {}.",
            handle.name(),
            format_cents(handle.balance())
        ),
        Err(error) => println!("{error}"),
    }

    Ok(())
}

fn deposit(ledger: &Ledger) -> io::Result<()> {
    let Some(name) = prompt("Enter the name of the account to deposit into.")? else {
        return Ok(());
    };
    let Some(amount) = prompt_amount("Enter the amount to deposit in dollars.")? else {
        return Ok(());
    };

    match ledger.deposit(&name, amount) {
        Ok(balance) => println!(
            "{} deposited. Balance is {}.",
            format_cents(amount),
            format_cents(balance)
        ),
        Err(error) => println!("{error}"),
    }

    Ok(())
}

fn withdraw(ledger: &Ledger) -> io::Result<()> {
    let Some(name) = prompt("Enter the name of the account to withdraw from.")? else {
        return Ok(());
    };
    let Some(amount) = prompt_amount("Enter the amount to withdraw in dollars.")? else {
        return Ok(());
    };

    match ledger.withdraw(&name, amount) {
        Ok(withdrawn) => println!("{} withdrawn.", format_cents(withdrawn)),
        Err(error) => println!("{error}"),
    }

    Ok(())
}

fn show_balance(ledger: &Ledger) -> io::Result<()> {
    let Some(name) = prompt("Enter the name of the account.")? else {
        return Ok(());
    };

    match ledger.balance_of(&name) {
        Ok(balance) => println!("Balance on account {name} is {}.", format_cents(balance)),
        Err(error) => println!("{error}"),
    }

    Ok(())
}

fn show_history(ledger: &Ledger) -> io::Result<()> {
    let Some(name) = prompt("Enter the name of the account.")? else {
        return Ok(());
    };

    match ledger.history_of(&name) {
        Ok(entries) if entries.is_empty() => println!("No transactions on account {name}."),
        Ok(entries) => {
            for entry in entries {
                println!("{}  {}", entry.timestamp, format_cents(entry.amount));
            }
        }
        Err(error) => println!("{error}"),
    }

    Ok(())
}

fn export_history(ledger: &Ledger) -> io::Result<()> {
    let Some(name) = prompt("Enter the name of the account.")? else {
        return Ok(());
    };

    match ledger.history_of(&name) {
        Ok(entries) => match serde_json::to_string_pretty(&entries) {
            Ok(json) => println!("{json}"),
            Err(error) => println!("Could not serialize the history: {error}"),
        },
        Err(error) => println!("{error}"),
    }

    Ok(())
}

fn audit(ledger: &Ledger) -> io::Result<()> {
    let Some(name) = prompt("Enter the name of the account.")? else {
        return Ok(());
    };

    match ledger.audit(&name) {
        Ok(audit) => println!(
            "Account {name}: balance {}, {} entries totalling {}, implied opening balance {}.",
            format_cents(audit.balance),
            audit.entries,
            format_cents(audit.history_total),
            format_cents(audit.opening_balance())
        ),
        Err(error) => println!("{error}"),
    }

    Ok(())
}

/// Print `label`, then read one trimmed line from stdin. Returns `None` on
/// end of input.
fn prompt(label: &str) -> io::Result<Option<String>> {
    print!("{label} ");
    io::stdout().flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }

    Ok(Some(input.trim().to_string()))
}

fn prompt_amount(label: &str) -> io::Result<Option<Cents>> {
    let Some(input) = prompt(label)? else {
        return Ok(None);
    };

    match parse_cents(&input) {
        Some(amount) => Ok(Some(amount)),
        None => {
            println!("Could not read \"{input}\" as a dollar amount, e.g. 12.50.");
            Ok(None)
        }
    }
}

/// Parse a decimal dollar amount such as "12.50" into integer cents.
///
/// At most two decimal places are accepted; the ledger only deals in
/// whole cents.
fn parse_cents(input: &str) -> Option<Cents> {
    let input = input.trim();

    let (dollars, fraction) = match input.split_once('.') {
        None => (input, ""),
        Some(parts) => parts,
    };

    if dollars.is_empty() && fraction.is_empty() {
        return None;
    }

    if !dollars.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
        || fraction.len() > 2
    {
        return None;
    }

    let dollars: Cents = if dollars.is_empty() {
        0
    } else {
        dollars.parse().ok()?
    };

    let cents: Cents = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<Cents>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };

    dollars.checked_mul(100)?.checked_add(cents)
}

fn format_cents(cents: Cents) -> String {
    static POSITIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let positive_fmt = POSITIVE_FMT.get_or_init(|| {
        Formatter::currency("$")
            .unwrap()
            .precision(Precision::Decimals(2))
    });

    static NEGATIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let negative_fmt = NEGATIVE_FMT.get_or_init(|| {
        Formatter::currency("-$")
            .unwrap()
            .precision(Precision::Decimals(2))
    });

    let dollars = cents as f64 / 100.0;

    let mut formatted = if cents < 0 {
        negative_fmt.fmt_string(dollars.abs())
    } else if cents > 0 {
        positive_fmt.fmt_string(dollars)
    } else {
        // Zero is hardcoded as "0", so we must specify the formatted string for zero
        return "$0.00".to_owned();
    };

    // numfmt omits the last trailing zero, so we must add it ourselves
    // For example, "12.30" is rendered as "12.3" so we append "0".
    if formatted.as_bytes()[formatted.len() - 3] != b'.' {
        formatted = format!("{formatted}0");
    }

    formatted
}
