use std::io::{self, BufRead};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use zeroize::Zeroizing;

use paperlock::cli::{
    Cli, Commands, ExamCommand, GuardianCommand, KeyCommand, PaperCommand, QuestionsCommand,
    ShareCommand,
};
use paperlock::codec;
use paperlock::commands::{
    combine_shares, publish_questions, resolve_config, split_key, split_key_hex,
};
use paperlock::domain::{ShareCount, SplitConfig};
use paperlock::keys::SecretKey;
use paperlock::lifecycle::ExamSlot;
use paperlock::logging::init_logging;
use paperlock::store::FileStore;
use paperlock::vault::Vault;

/// Read one secret line from stdin (hidden input when TTY available)
fn read_secret(prompt: &str) -> Result<Zeroizing<String>> {
    if atty::is(atty::Stream::Stdin) {
        eprintln!("{prompt}");
        let line =
            Zeroizing::new(rpassword::read_password().context("Failed to read from stdin")?);
        Ok(Zeroizing::new(line.trim().to_string()))
    } else {
        let mut line = Zeroizing::new(String::new());
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        Ok(Zeroizing::new(line.trim().to_string()))
    }
}

/// Read shares from stdin (hidden input when TTY available)
/// One share per line, an empty line finishes
fn read_shares() -> Result<Vec<String>> {
    let mut shares = Vec::new();

    if atty::is(atty::Stream::Stdin) {
        eprintln!("Enter hex shares (one per line, empty line to finish):");

        loop {
            let share = rpassword::read_password().context("Failed to read share from stdin")?;
            if share.trim().is_empty() {
                break;
            }
            shares.push(share.trim().to_string());
        }
    } else {
        for line in io::stdin().lock().lines() {
            let line = line.context("Failed to read line from stdin")?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            shares.push(trimmed.to_string());
        }
    }

    if shares.is_empty() {
        bail!("No shares provided");
    }

    Ok(shares)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render output")?
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli.global)?;
    init_logging(&config.log_level)?;

    cli.global
        .role
        .authorize(cli.command.action())
        .with_context(|| format!("Acting as {}", cli.global.role))?;

    match cli.command {
        Commands::Key { command } => run_key_command(command),
        command => {
            let vault = Vault::<FileStore>::open(&config).with_context(|| {
                format!("Failed to open state at {}", config.state_path.display())
            })?;
            run_vault_command(&vault, command)
        }
    }
}

fn run_vault_command(vault: &Vault<FileStore>, command: Commands) -> Result<()> {
    match command {
        Commands::Guardian { command } => match command {
            GuardianCommand::Add { id, contact } => {
                print_json(&vault.register_guardian(id, &contact)?)?;
            }
            GuardianCommand::List => print_json(&vault.list_guardians()?)?,
            GuardianCommand::Available => {
                print_json(&vault.authoring().available_guardians()?)?;
            }
        },
        Commands::Questions { command } => match command {
            QuestionsCommand::Publish {
                author,
                file,
                guardians,
            } => {
                let receipt = publish_questions(vault, &author, &file, &guardians)?;
                println!("Published {} questions", receipt.items.len());
                for guardian in &receipt.notices.failed {
                    eprintln!("Key share for {guardian} was not delivered");
                }
            }
        },
        Commands::Exam { command } => match command {
            ExamCommand::Schedule { date, start, end } => {
                let scheduled = vault.lifecycle().schedule(ExamSlot {
                    date,
                    start_time: start,
                    end_time: end,
                })?;
                print_json(&scheduled.event)?;
                for guardian in &scheduled.notices.failed {
                    eprintln!("Schedule notice for {guardian} was not delivered");
                }
            }
            ExamCommand::Start { id } => print_json(&vault.lifecycle().start(id)?)?,
            ExamCommand::Complete { id } => print_json(&vault.lifecycle().complete(id)?)?,
            ExamCommand::Cancel { id } => print_json(&vault.lifecycle().cancel(id)?)?,
            ExamCommand::Delete { id } => {
                let removed = vault.lifecycle().delete(id)?;
                println!("Deleted exam {id} and {removed} pooled questions");
            }
            ExamCommand::Show => match vault.lifecycle().active_event()? {
                Some(event) => print_json(&event.summary())?,
                None => println!("No active exam"),
            },
        },
        Commands::Share { command } => match command {
            ShareCommand::Submit { guardian } => {
                let share = read_secret("Enter your hex key share:")?;
                let event = vault.registry().submit_for_active(&guardian, &share)?;
                println!("Share accepted for exam {event}");
            }
            ShareCommand::Status { guardian } => {
                match vault.registry().status_for_active(&guardian)? {
                    Some(status) => print_json(&status)?,
                    None => println!("No active exam lists {guardian}"),
                }
            }
        },
        Commands::Paper { command } => match command {
            PaperCommand::Request => {
                let (outcome, paper) = vault.request_paper()?;
                eprintln!("{outcome:?}");
                print_json(&paper)?;
            }
            PaperCommand::Show => match vault.lifecycle().active_event()? {
                Some(event) => print_json(&event.published_paper())?,
                None => println!("No active exam"),
            },
            PaperCommand::Tick => {
                for entry in vault.decoder().run_periodic(Utc::now()) {
                    match entry.result {
                        Ok(outcome) => println!("{}: {outcome:?}", entry.event),
                        Err(e) => println!("{}: {e}", entry.event),
                    }
                }
            }
        },
        Commands::Key { command } => run_key_command(command)?,
    }

    Ok(())
}

fn run_key_command(command: KeyCommand) -> Result<()> {
    match command {
        KeyCommand::Split {
            shares,
            threshold,
            generate,
        } => {
            let config = SplitConfig::new(threshold, ShareCount::new(shares)?)?;
            let shares = if generate {
                let key = SecretKey::generate();
                println!("{}", *codec::encode_key(&key));
                split_key(&key, config)?
            } else {
                let key_hex = read_secret("Enter hex key:")?;
                split_key_hex(&key_hex, config)?
            };
            for share in &shares {
                println!("{}", **share);
            }
        }
        KeyCommand::Combine { threshold } => {
            let shares = read_shares()?;
            let key = combine_shares(&shares, threshold)?;
            println!("{}", *key);
        }
    }
    Ok(())
}
