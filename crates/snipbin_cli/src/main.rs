//! Command-line client for the snipbin API.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde_json::Value;
use snipbin_core::models::permission::parse_permissions;
use snipbin_core::DEFAULT_CLI_SERVER_URL;
use std::io::{self, Read};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "snip", about = "snipbin CLI", version)]
struct Cli {
    /// Server URL (can also be set via SNIP_SERVER env var)
    #[arg(short, long, env = "SNIP_SERVER", global = true)]
    server: Option<String>,

    /// Share token for the document (can also be set via SNIP_TOKEN env var)
    #[arg(long, env = "SNIP_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    json: bool,

    /// Request timeout in seconds
    #[arg(short = 't', long, default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Upload a file (or stdin) as a new document
    New {
        #[arg(short, long)]
        file: Option<String>,
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Print a document's content
    Get {
        id: String,
        /// Fetch an exact version instead of the latest
        #[arg(long = "rev", value_name = "VERSION")]
        version: Option<u64>,
    },
    /// Delete a document and all of its versions
    Delete { id: String },
    /// Print a share link granting the given permissions
    Share {
        id: String,
        #[arg(short, long = "permission", value_name = "PERMISSION")]
        permissions: Vec<String>,
    },
}

fn error_message_for_response(status: reqwest::StatusCode, body: &str) -> String {
    if body.trim().is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
    }

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return value
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or(body)
            .to_string();
    }

    body.to_string()
}

fn fail(action: &str, message: impl std::fmt::Display) -> ! {
    eprintln!("{} failed: {}", action, message);
    std::process::exit(1);
}

async fn ensure_success_or_exit(res: reqwest::Response, action: &str) -> reqwest::Response {
    let status = res.status();
    if status.is_success() {
        return res;
    }

    let body = match res.text().await {
        Ok(body) => body,
        Err(err) => format!("failed to read error response body: {}", err),
    };
    let message = error_message_for_response(status, &body);
    eprintln!("{} failed ({}): {}", action, status, message);
    std::process::exit(1);
}

fn api_url(server: &str, segments: &[&str]) -> Result<reqwest::Url, String> {
    let mut url = reqwest::Url::parse(server)
        .map_err(|err| format!("Invalid server URL '{}': {}", server, err))?;
    let mut path = url
        .path_segments_mut()
        .map_err(|_| "Server URL cannot be used as an API base".to_string())?;
    path.pop_if_empty();
    for segment in segments {
        path.push(segment);
    }
    drop(path);
    Ok(url)
}

fn api_url_or_exit(server: &str, action: &str, segments: &[&str]) -> reqwest::Url {
    api_url(server, segments).unwrap_or_else(|message| fail(action, message))
}

fn normalize_server(server: String) -> String {
    let trimmed = server.trim();
    if trimmed.is_empty() {
        return DEFAULT_CLI_SERVER_URL.to_string();
    }
    let mut normalized = match reqwest::Url::parse(trimmed) {
        Ok(url) => url.to_string(),
        Err(_) => trimmed.to_string(),
    };
    while normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// `<server>/<id>` with an optional `?token=` suffix.
fn share_link(server: &str, id: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => format!("{}/{}?token={}", server, id, token),
        None => format!("{}/{}", server, id),
    }
}

fn string_field<'a>(value: &'a Value, field: &str) -> Result<&'a str, String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("response missing '{}' field", field))
}

fn format_new_output(server: &str, created: &Value, json: bool) -> Result<String, String> {
    if json {
        return serde_json::to_string_pretty(created)
            .map_err(|err| format!("response encoding error: {}", err));
    }
    let id = string_field(created, "id")?;
    let token = string_field(created, "token")?;
    Ok(format!(
        "ID: {}\nLink: {}\nToken: {}",
        id,
        share_link(server, id, Some(token)),
        token
    ))
}

fn format_get_output(document: &Value, json: bool) -> Result<String, String> {
    if json {
        return serde_json::to_string_pretty(document)
            .map_err(|err| format!("response encoding error: {}", err));
    }
    string_field(document, "content").map(str::to_string)
}

fn format_delete_output(id: &str, response: &Value, json: bool) -> Result<String, String> {
    if json {
        return serde_json::to_string_pretty(response)
            .map_err(|err| format!("response encoding error: {}", err));
    }
    Ok(format!("Deleted document: {}", id))
}

fn require_token(token: Option<String>, action: &str) -> String {
    token
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| fail(action, "a document token is required (--token or SNIP_TOKEN)"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Cli {
        server,
        token,
        json,
        timeout,
        command,
    } = Cli::parse();

    if let Commands::Completions { shell } = &command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()?;
    let server = normalize_server(server.unwrap_or_default());

    match command {
        Commands::Completions { .. } => unreachable!("completions handled before client setup"),
        Commands::New { file, language } => {
            let endpoint = api_url_or_exit(&server, "New", &["documents"]);
            let content = if let Some(path) = file {
                std::fs::read_to_string(path)?
            } else {
                let mut buffer = String::new();
                io::stdin().read_to_string(&mut buffer)?;
                buffer
            };

            let mut body = serde_json::json!({ "content": content });
            if let Some(language) = language {
                body["language"] = language.into();
            }

            let res = client.post(endpoint).json(&body).send().await?;
            let res = ensure_success_or_exit(res, "New").await;
            let created: Value = res.json().await?;
            let output = format_new_output(&server, &created, json)
                .unwrap_or_else(|message| fail("New", message));
            println!("{}", output);
        }
        Commands::Get { id, version } => {
            let endpoint = match version {
                Some(version) => {
                    let version = version.to_string();
                    api_url_or_exit(
                        &server,
                        "Get",
                        &["documents", id.as_str(), "versions", version.as_str()],
                    )
                }
                None => api_url_or_exit(&server, "Get", &["documents", id.as_str()]),
            };
            let res = client.get(endpoint).send().await?;
            let res = ensure_success_or_exit(res, "Get").await;
            let document: Value = res.json().await?;
            let output =
                format_get_output(&document, json).unwrap_or_else(|message| fail("Get", message));
            println!("{}", output);
        }
        Commands::Delete { id } => {
            let token = require_token(token, "Delete");
            let endpoint = api_url_or_exit(&server, "Delete", &["documents", id.as_str()]);
            let res = client.delete(endpoint).bearer_auth(token).send().await?;
            let res = ensure_success_or_exit(res, "Delete").await;
            let response: Value = res.json().await?;
            let output = format_delete_output(&id, &response, json)
                .unwrap_or_else(|message| fail("Delete", message));
            println!("{}", output);
        }
        Commands::Share { id, permissions } => {
            if let Err(err) = parse_permissions(&permissions) {
                fail("Share", err);
            }
            if permissions.is_empty() {
                println!("Link: {}", share_link(&server, &id, None));
                return Ok(());
            }

            let token = require_token(token, "Share");
            let endpoint = api_url_or_exit(&server, "Share", &["documents", id.as_str(), "share"]);
            let res = client
                .post(endpoint)
                .bearer_auth(token)
                .json(&serde_json::json!({ "permissions": permissions }))
                .send()
                .await?;
            let res = ensure_success_or_exit(res, "Share").await;
            let shared: Value = res.json().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&shared)?);
            } else {
                let shared_token =
                    string_field(&shared, "token").unwrap_or_else(|message| fail("Share", message));
                println!("Link: {}", share_link(&server, &id, Some(shared_token)));
            }
        }
    }

    Ok(())
}
