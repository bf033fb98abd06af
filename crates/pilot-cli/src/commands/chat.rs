use std::io::Write;

use pilot_config::PilotConfig;
use pilot_core::{Credential, PersistedMessage, Role, SubjectId};
use pilot_runtime::{RunOutcome, TurnInput};
use tokio::io::AsyncBufReadExt;
use tracing::warn;

pub(super) async fn cmd_chat(
    config: PilotConfig,
    user_id: Option<SubjectId>,
    token: Option<String>,
) -> pilot_core::Result<()> {
    println!("🧭 DevPilot Interactive Chat");
    println!("   Type 'exit' or Ctrl+C to quit");
    if user_id.is_none() || token.is_none() {
        println!("   No --user-id/--token given: backend operations are unavailable");
    }
    println!();

    super::warn_missing_api_key(&config);

    let (agent, store) = super::build_agent(&config)?;
    let credential = token.as_deref().and_then(Credential::from_header);

    // Resume the stored conversation for this user, if any
    let mut history: Vec<PersistedMessage> = match user_id {
        Some(id) => store.fetch(id).await.unwrap_or_else(|e| {
            warn!(subject = id, error = %e, "failed to load chat history");
            Vec::new()
        }),
        None => Vec::new(),
    };
    if !history.is_empty() {
        println!("   Resumed {} stored messages", history.len());
        println!();
    }

    let stdin = tokio::io::stdin();
    let reader = tokio::io::BufReader::new(stdin);
    let mut lines = reader.lines();

    loop {
        eprint!("\x1b[36myou>\x1b[0m ");
        std::io::stderr().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break, // EOF
            Err(_) => break,
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "exit" || trimmed == "quit" || trimmed == "/exit" {
            println!("👋 Goodbye!");
            break;
        }

        let output = agent
            .run(TurnInput {
                user_input: trimmed.to_string(),
                prior_history: history.clone(),
                credential: credential.clone(),
                subject_id: user_id,
            })
            .await;

        for record in output.appended.iter().filter(|r| r.role == Role::Tool) {
            let tool = record.tool_name.as_deref().unwrap_or("tool");
            if record.is_error {
                eprintln!(
                    "\x1b[31m   ❌ {tool}: {}\x1b[0m",
                    truncate_output(&record.content, 200)
                );
            } else {
                eprintln!("\x1b[90m   ✓ {tool}\x1b[0m");
            }
        }

        eprint!("\x1b[32mdevpilot>\x1b[0m ");
        println!("{}", output.reply);
        println!();

        if output.outcome == RunOutcome::InvalidHistory {
            history.clear();
            continue;
        }
        if let Some(id) = user_id
            && let Err(e) = store.append(id, &output.appended).await
        {
            warn!(subject = id, error = %e, "failed to persist chat history");
        }
        history.extend(output.appended);
    }

    Ok(())
}

fn truncate_output(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.replace('\n', " "),
        Some((idx, _)) => format!("{}...", s[..idx].replace('\n', " ")),
    }
}
