//! Line-based front end: plain lines are chat turns, `/` lines drive the
//! admin panel and settings.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::admin::{AdminOutcome, AdminPanel};
use crate::commands::chat::{ChatSession, Rejection, Sender, SessionEvent, SubmitOutcome};
use crate::commands::settings;
use crate::db::Database;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Chat(String),
    Banks,
    AddBank(String),
    DeleteBank(i64),
    RenameBank(i64, String),
    ShowPolicy(i64),
    SetPolicy(i64, String),
    Settings,
    Set(String, String),
    Unset(String),
    Help,
    Quit,
    Invalid(String),
}

const HELP: &str = "\
Type a question to chat. Admin commands:
  /banks                      list banks
  /bank add <name>            create a bank
  /bank rm <id>               delete a bank and its policy
  /bank rename <id> <name>    rename a bank
  /policy <id>                show a bank's policy
  /policy set <id> <text>     replace a bank's policy
  /settings                   show stored settings
  /set <key> <value>          store a setting (applies on restart)
  /unset <key>                remove a stored setting
  /quit                       exit";

fn split_first(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (s, ""),
    }
}

fn parse_id(s: &str) -> Option<i64> {
    s.parse().ok()
}

pub fn parse_command(line: &str) -> Command {
    let Some(rest) = line.trim().strip_prefix('/') else {
        return Command::Chat(line.to_string());
    };

    let (verb, args) = split_first(rest);
    let invalid = || Command::Invalid(line.trim().to_string());
    match verb {
        "banks" => Command::Banks,
        "bank" => {
            let (action, args) = split_first(args);
            match action {
                "add" if !args.is_empty() => Command::AddBank(args.to_string()),
                "rm" => parse_id(args).map(Command::DeleteBank).unwrap_or_else(invalid),
                "rename" => {
                    let (id, name) = split_first(args);
                    match parse_id(id) {
                        Some(id) if !name.is_empty() => Command::RenameBank(id, name.to_string()),
                        _ => invalid(),
                    }
                }
                _ => invalid(),
            }
        }
        "policy" => {
            let (first, rest) = split_first(args);
            if first == "set" {
                let (id, text) = split_first(rest);
                match parse_id(id) {
                    Some(id) if !text.is_empty() => Command::SetPolicy(id, text.to_string()),
                    _ => invalid(),
                }
            } else {
                parse_id(first).map(Command::ShowPolicy).unwrap_or_else(invalid)
            }
        }
        "settings" => Command::Settings,
        "set" => {
            let (key, value) = split_first(args);
            if key.is_empty() || value.is_empty() {
                invalid()
            } else {
                Command::Set(key.to_string(), value.to_string())
            }
        }
        "unset" if !args.is_empty() && !args.contains(char::is_whitespace) => {
            Command::Unset(args.to_string())
        }
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => invalid(),
    }
}

/// Prints bot messages as they are appended.
pub fn print_bot_messages(event: &SessionEvent) {
    if let SessionEvent::MessageAppended { message, .. } = event {
        if message.sender == Sender::Bot {
            println!("\nassistant> {}\n", message.content);
        }
    }
}

fn report(outcome: AdminOutcome, what: &str) {
    match outcome {
        AdminOutcome::Applied => println!("{what}: done"),
        AdminOutcome::Skipped => println!("{what}: nothing to do"),
        AdminOutcome::Failed => println!("{what}: failed (see log)"),
    }
}

pub async fn run_loop(
    db: Arc<Database>,
    session: ChatSession,
    mut admin: AdminPanel,
) -> std::io::Result<()> {
    for message in session.messages() {
        println!("assistant> {}\n", message.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Command::Chat(text) => {
                if let SubmitOutcome::Rejected(Rejection::Busy) = session.submit(&text).await {
                    println!("(still waiting for the previous answer)");
                }
            }
            Command::Banks => {
                report(admin.load_banks(), "load banks");
                for bank in admin.banks() {
                    let marker = if admin.active_tab() == Some(bank.id) { "*" } else { " " };
                    println!("{marker} {:>4}  {}", bank.id, bank.name);
                }
            }
            Command::AddBank(name) => report(admin.add_bank(&name), "add bank"),
            Command::DeleteBank(id) => report(admin.delete_bank(id), "delete bank"),
            Command::RenameBank(id, name) => report(admin.rename_bank(id, &name), "rename bank"),
            Command::ShowPolicy(id) => {
                if !admin.banks().iter().any(|b| b.id == id) {
                    admin.load_banks();
                }
                if !admin.select_tab(id) {
                    println!("No bank {id}");
                    continue;
                }
                match admin.active_policy() {
                    Some(policy) => println!(
                        "{}\n(updated {})",
                        policy.policy_text,
                        policy.updated_at.to_rfc3339()
                    ),
                    None => println!("No policy stored for bank {id}"),
                }
            }
            Command::SetPolicy(id, text) => {
                admin.begin_edit(id);
                admin.set_policy_text(text);
                let outcome = admin.save_policy(id).await;
                if outcome != AdminOutcome::Applied {
                    admin.cancel_edit();
                }
                report(outcome, "save policy");
            }
            Command::Settings => match settings::get_settings(&db) {
                Ok(map) => {
                    for (key, value) in map {
                        println!("{key} = {value}");
                    }
                }
                Err(e) => println!("settings: {e}"),
            },
            Command::Set(key, value) => match settings::set_setting(&db, &key, &value) {
                Ok(()) => println!("{key} saved; restart to apply"),
                Err(e) => println!("set: {e}"),
            },
            Command::Unset(key) => match settings::delete_setting(&db, &key) {
                Ok(()) => println!("{key} removed; restart to apply"),
                Err(e) => println!("unset: {e}"),
            },
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
            Command::Invalid(line) => println!("Unrecognised command: {line} (try /help)"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_chat() {
        assert_eq!(
            parse_command("Which bank for a nurse at 85%?"),
            Command::Chat("Which bank for a nurse at 85%?".into())
        );
    }

    #[test]
    fn bank_commands_parse() {
        assert_eq!(parse_command("/banks"), Command::Banks);
        assert_eq!(parse_command("/bank add La Trobe"), Command::AddBank("La Trobe".into()));
        assert_eq!(parse_command("/bank rm 3"), Command::DeleteBank(3));
        assert_eq!(
            parse_command("/bank rename 2 Bankwest"),
            Command::RenameBank(2, "Bankwest".into())
        );
    }

    #[test]
    fn policy_commands_parse() {
        assert_eq!(parse_command("/policy 4"), Command::ShowPolicy(4));
        assert_eq!(
            parse_command("/policy set 4 LMI waived for doctors below 90%"),
            Command::SetPolicy(4, "LMI waived for doctors below 90%".into())
        );
    }

    #[test]
    fn settings_commands_parse() {
        assert_eq!(parse_command("/settings"), Command::Settings);
        assert_eq!(
            parse_command("/set chat_model gpt-4o"),
            Command::Set("chat_model".into(), "gpt-4o".into())
        );
        assert_eq!(
            parse_command("/unset embedding_dimensions"),
            Command::Unset("embedding_dimensions".into())
        );
        assert_eq!(parse_command("/quit"), Command::Quit);
    }

    #[test]
    fn malformed_commands_are_invalid() {
        for line in [
            "/bank rm x",
            "/bank add",
            "/policy",
            "/set key",
            "/unset",
            "/unset a b",
            "/frobnicate",
        ] {
            assert!(matches!(parse_command(line), Command::Invalid(_)), "{line}");
        }
    }
}
