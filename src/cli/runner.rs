//! CLI runner for interactive and single-prompt modes.

use crate::chat::SessionState;
use crate::cli::repl::Repl;
use crate::config::ConfigOverrides;
use crate::db::Database;

/// Send one prompt, stream the answer and exit.
///
/// A failed or cancelled answer is reported as an error so the exit code
/// reflects it.
pub async fn run_single_prompt(
    db: &Database,
    prompt: &str,
    overrides: ConfigOverrides,
) -> anyhow::Result<()> {
    let mut repl = Repl::new(db, overrides)?;
    let report = repl.handle_prompt(prompt).await;
    repl.shutdown().await?;

    match report? {
        None => anyhow::bail!("Nothing to send: the prompt is empty"),
        Some(report) => match report.state {
            SessionState::Completed => Ok(()),
            SessionState::Aborted => anyhow::bail!("Response cancelled"),
            _ => anyhow::bail!(
                "Advisor request failed: {}",
                report.reply.unwrap_or_default()
            ),
        },
    }
}

/// Run in interactive mode.
pub async fn run_interactive(db: &Database, overrides: ConfigOverrides) -> anyhow::Result<()> {
    let repl = Repl::new(db, overrides)?;
    print_banner(&repl.config().endpoint);
    repl.run().await
}

/// Print the welcome banner.
pub fn print_banner(endpoint: &str) {
    println!();
    println!(
        "  \x1b[1;32m💰 moneychat\x1b[0m  \x1b[2mv{}\x1b[0m",
        get_version()
    );
    println!("  \x1b[2mPersonal-finance advisor at {}\x1b[0m", endpoint);
    println!("  \x1b[2mType \x1b[0m\x1b[1;36m/help\x1b[0m\x1b[2m for commands, or ask about your spending!\x1b[0m");
    println!();
}

/// Get the application version string.
pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn setup_test_db() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open_at(temp_dir.path().join("runner.db")).unwrap();
        db.migrate().unwrap();
        (temp_dir, db)
    }

    fn overrides_for(server: &MockServer) -> ConfigOverrides {
        ConfigOverrides {
            endpoint: Some(format!("{}/api/chat", server.uri())),
            language: Some("en".to_string()),
        }
    }

    // =========================================================================
    // Version Tests
    // =========================================================================

    #[test]
    fn test_get_version_format() {
        let version = get_version();
        let parts: Vec<&str> = version.split('.').collect();
        assert!(
            parts.len() >= 2,
            "Version should have at least major.minor: {}",
            version
        );
        for part in &parts[..2] {
            assert!(part.parse::<u32>().is_ok(), "Version part should be numeric: {}", part);
        }
    }

    // =========================================================================
    // Single prompt
    // =========================================================================

    #[tokio::test]
    async fn test_single_prompt_persists_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Checking\n> 🔧 调用工具: python_repl_ast\nYou spent 42."),
            )
            .mount(&server)
            .await;
        let (_temp, db) = setup_test_db();

        run_single_prompt(&db, "How much did I spend?", overrides_for(&server))
            .await
            .unwrap();

        let store = crate::session::ConversationStore::restore(Box::new(db.reopen().unwrap()));
        let contents: Vec<&str> = store.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["How much did I spend?", "Checking\nYou spent 42."]);
    }

    #[tokio::test]
    async fn test_single_prompt_reports_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"detail": "API Key not configured"})),
            )
            .mount(&server)
            .await;
        let (_temp, db) = setup_test_db();

        let err = run_single_prompt(&db, "hi", overrides_for(&server))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("API Key not configured"));
    }

    #[tokio::test]
    async fn test_single_prompt_rejects_blank_input() {
        let server = MockServer::start().await;
        let (_temp, db) = setup_test_db();

        assert!(run_single_prompt(&db, "   ", overrides_for(&server))
            .await
            .is_err());
    }
}
