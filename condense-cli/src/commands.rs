//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use anyhow::Context;
use condense_core::config::{self, CondenseConfig, SettingsUpdate};
use condense_core::{SearchResult, SynthesisMode, Synthesizer};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::warn;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Synthesize {
            query,
            results,
            mode,
            provider,
            model,
            threshold,
            pretty,
        } => {
            let overrides = SettingsUpdate {
                mode,
                provider,
                model,
                confidence_threshold: threshold,
                ..Default::default()
            };
            handle_synthesize(&query, results, overrides, pretty, workspace).await
        }
        Commands::TestKey { provider, key } => handle_test_key(&provider, key, workspace).await,
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn load(workspace: &Path, overrides: Option<&SettingsUpdate>) -> anyhow::Result<CondenseConfig> {
    let config = config::load_config(Some(workspace), overrides)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    for warning in config.validate() {
        warn!("{warning}");
    }
    Ok(config)
}

async fn handle_synthesize(
    query: &str,
    source: Option<PathBuf>,
    overrides: SettingsUpdate,
    pretty: bool,
    workspace: &Path,
) -> anyhow::Result<()> {
    let config = load(workspace, Some(&overrides))?;
    synthesize_with_config(&config, query, source, pretty).await
}

async fn synthesize_with_config(
    config: &CondenseConfig,
    query: &str,
    source: Option<PathBuf>,
    pretty: bool,
) -> anyhow::Result<()> {
    let raw = match &source {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("Failed to read results from stdin")?;
            buf
        }
    };
    let results = parse_results(&raw)?;

    let synthesizer = Synthesizer::from_config(config);
    let result = synthesizer.synthesize(query, &results).await?;

    let output = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{output}");
    Ok(())
}

/// Accept either a bare array of results or an object with a `results` array.
fn parse_results(raw: &str) -> anyhow::Result<Vec<SearchResult>> {
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Input {
        List(Vec<SearchResult>),
        Wrapped { results: Vec<SearchResult> },
    }

    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let input: Input =
        serde_json::from_str(raw).context("Results must be a JSON array of search results")?;
    Ok(match input {
        Input::List(results) | Input::Wrapped { results } => results,
    })
}

async fn handle_test_key(provider: &str, key: Option<String>, workspace: &Path) -> anyhow::Result<()> {
    let overrides = SettingsUpdate {
        mode: Some(SynthesisMode::Llm),
        provider: Some(provider.to_string()),
        ..Default::default()
    };
    let config = load(workspace, Some(&overrides))?;
    let synthesizer = Synthesizer::from_config(&config);

    if synthesizer.active_provider().is_none() {
        anyhow::bail!(
            "Unknown provider '{}'. Available: {}",
            provider,
            synthesizer.registry().names().join(", ")
        );
    }

    let key = match key {
        Some(key) => key,
        None => synthesizer
            .resolve_api_key(&synthesizer.settings())
            .with_context(|| {
                format!(
                    "No key given and {} is not set",
                    condense_core::credentials::env_var_for(provider)
                )
            })?,
    };

    if synthesizer.test_api_key(&key).await {
        println!("API key accepted by {provider}");
        Ok(())
    } else {
        anyhow::bail!("API key rejected by {provider}")
    }
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load(workspace, None)?;
            print!("{}", config.to_redacted_toml()?);
        }
        ConfigAction::Path => {
            match config::user_config_path() {
                Some(path) => println!("user:      {}", path.display()),
                None => println!("user:      (no home directory)"),
            }
            println!(
                "workspace: {}",
                config::workspace_config_path(workspace).display()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_results_array() {
        let raw = r#"[{"path":"src/a.ts","startLine":1,"endLine":4,"content":"class A {}"}]"#;
        let results = parse_results(raw).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "src/a.ts");
    }

    #[test]
    fn test_parse_results_wrapped() {
        let raw = r#"{"results":[{"path":"b.py","startLine":2,"endLine":3,"content":"def b(): pass"}]}"#;
        let results = parse_results(raw).unwrap();
        assert_eq!(results[0].end_line, 3);
    }

    #[test]
    fn test_parse_results_empty_input() {
        assert!(parse_results("  \n").unwrap().is_empty());
        assert!(parse_results("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_results_invalid() {
        assert!(parse_results(r#"{"path": 3}"#).is_err());
    }

    #[tokio::test]
    async fn test_synthesize_from_file_algorithmic() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("results.json");
        std::fs::write(
            &file,
            r#"[{"path":"src/a.ts","startLine":1,"endLine":4,"content":"class A {}"}]"#,
        )
        .unwrap();
        let mut config = CondenseConfig::default();
        SettingsUpdate {
            mode: Some(SynthesisMode::Algorithmic),
            ..Default::default()
        }
        .apply_to(&mut config.synthesis);
        synthesize_with_config(&config, "where is A", Some(file), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_synthesize_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = synthesize_with_config(
            &CondenseConfig::default(),
            "q",
            Some(dir.path().join("absent.json")),
            false,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
