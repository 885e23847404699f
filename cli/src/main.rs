use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing session token; run `login` and set TEAMHUB_SESSION_TOKEN or pass --session-token")]
    MissingSessionToken,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server returned HTTP {status}: {message}")]
    ServerError { status: u16, message: String },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: std::io::Error },
}

#[derive(Parser, Debug)]
#[command(name = "teamhub-cli", about = "Teamhub admin CLI")]
struct Cli {
    #[arg(long, env = "TEAMHUB_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "TEAMHUB_SESSION_TOKEN")]
    session_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
    session_token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    /// Sign in and print the session token.
    Login {
        #[arg(long, env = "TEAMHUB_EMAIL")]
        email: String,
        #[arg(long, env = "TEAMHUB_PASSWORD")]
        password: String,
    },
    Requests(RequestsCommand),
    Students(StudentsCommand),
    Export(ExportArgs),
    Analytics,
}

#[derive(Args, Debug)]
struct RequestsCommand {
    #[command(subcommand)]
    command: RequestsSubcommand,
}

#[derive(Subcommand, Debug)]
enum RequestsSubcommand {
    List {
        #[arg(long, help = "pending, approved or denied")]
        status: Option<String>,
    },
    Approve {
        request_id: Uuid,
    },
    Deny {
        request_id: Uuid,
    },
}

#[derive(Args, Debug)]
struct StudentsCommand {
    #[command(subcommand)]
    command: StudentsSubcommand,
}

#[derive(Subcommand, Debug)]
enum StudentsSubcommand {
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = false)]
        include_archived: bool,
    },
    /// Merge duplicate student records.
    Dedupe {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(value_enum)]
    format: ExportFormat,

    #[arg(long, help = "Output file; stdout when omitted")]
    out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = CliContext { base_url: cli.base_url, session_token: cli.session_token };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Login { email, password } => run_login(&ctx, &email, &password).await,
        Command::Requests(requests) => run_requests(&ctx, requests).await,
        Command::Students(students) => run_students(&ctx, students).await,
        Command::Export(args) => run_export(&ctx, args).await,
        Command::Analytics => {
            let json = api_request(&ctx, reqwest::Method::GET, "/api/admin/analytics", None).await?;
            print_json(&json)
        }
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let response = client.get(url_for(&cli.base_url, "/healthz")).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError { status: status.as_u16(), message: "health check failed".to_owned() });
    }
    println!("ok");
    Ok(())
}

async fn run_login(cli: &CliContext, email: &str, password: &str) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let response = client
        .post(url_for(&cli.base_url, "/api/auth/login"))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await?;
    let value = read_json(response).await?;
    let token = value
        .get("token")
        .and_then(Value::as_str)
        .ok_or(CliError::MissingField("token"))?;
    println!("{token}");
    Ok(())
}

async fn run_requests(cli: &CliContext, requests: RequestsCommand) -> Result<(), CliError> {
    let json = match requests.command {
        RequestsSubcommand::List { status } => {
            let path = with_query("/api/requests", &[("status", status.as_deref())]);
            api_request(cli, reqwest::Method::GET, &path, None).await?
        }
        RequestsSubcommand::Approve { request_id } => {
            let path = format!("/api/requests/{request_id}/approve");
            api_request(cli, reqwest::Method::POST, &path, None).await?
        }
        RequestsSubcommand::Deny { request_id } => {
            let path = format!("/api/requests/{request_id}/deny");
            api_request(cli, reqwest::Method::POST, &path, None).await?;
            Value::String(format!("denied {request_id}"))
        }
    };
    print_json(&json)
}

async fn run_students(cli: &CliContext, students: StudentsCommand) -> Result<(), CliError> {
    let json = match students.command {
        StudentsSubcommand::List { status, include_archived } => {
            let archived = include_archived.then_some("true");
            let path = with_query("/api/students", &[("status", status.as_deref()), ("include_archived", archived)]);
            api_request(cli, reqwest::Method::GET, &path, None).await?
        }
        StudentsSubcommand::Dedupe { dry_run: true } => {
            api_request(cli, reqwest::Method::GET, "/api/admin/duplicates", None).await?
        }
        StudentsSubcommand::Dedupe { dry_run: false } => {
            api_request(cli, reqwest::Method::POST, "/api/admin/duplicates/merge", None).await?
        }
    };
    print_json(&json)
}

async fn run_export(cli: &CliContext, args: ExportArgs) -> Result<(), CliError> {
    let path = format!("/api/admin/export.{}", args.format.extension());
    let response = authed_client(cli)?.get(url_for(&cli.base_url, &path)).send().await?;
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(CliError::ServerError {
            status: status.as_u16(),
            message: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    match args.out {
        Some(out) => {
            tokio::fs::write(&out, &body)
                .await
                .map_err(|source| CliError::Write { path: out.clone(), source })?;
            eprintln!("wrote {} bytes to {}", body.len(), out.display());
        }
        None => print!("{}", String::from_utf8_lossy(&body)),
    }
    Ok(())
}

fn url_for(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Append the present query parameters to `path`.
fn with_query(path: &str, params: &[(&str, Option<&str>)]) -> String {
    let pairs: Vec<String> = params
        .iter()
        .filter_map(|(key, value)| value.map(|v| format!("{key}={v}")))
        .collect();
    if pairs.is_empty() { path.to_owned() } else { format!("{path}?{}", pairs.join("&")) }
}

fn authed_client(cli: &CliContext) -> Result<reqwest::Client, CliError> {
    let session_token = cli
        .session_token
        .as_deref()
        .ok_or(CliError::MissingSessionToken)?;

    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_str(&format!("session_token={session_token}"))?);

    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

async fn api_request(
    cli: &CliContext,
    method: reqwest::Method,
    path: &str,
    body: Option<Value>,
) -> Result<Value, CliError> {
    let request = authed_client(cli)?.request(method, url_for(&cli.base_url, path));
    let request = if let Some(json) = body { request.json(&json) } else { request };
    read_json(request.send().await?).await
}

async fn read_json(response: reqwest::Response) -> Result<Value, CliError> {
    let status = response.status();
    let value = response.json::<Value>().await.unwrap_or(Value::Null);

    if !status.is_success() {
        return Err(CliError::ServerError { status: status.as_u16(), message: error_message(&value) });
    }
    Ok(value)
}

/// Prefer the API's `error.message`, else the raw body.
fn error_message(value: &Value) -> String {
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map_or_else(|| value.to_string(), ToOwned::to_owned)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_for_strips_trailing_slash() {
        assert_eq!(url_for("http://localhost:3000/", "/healthz"), "http://localhost:3000/healthz");
    }

    #[test]
    fn with_query_skips_missing_values() {
        assert_eq!(with_query("/api/requests", &[("status", None)]), "/api/requests");
        assert_eq!(
            with_query("/api/students", &[("status", Some("free")), ("include_archived", Some("true"))]),
            "/api/students?status=free&include_archived=true"
        );
    }

    #[test]
    fn error_message_prefers_envelope() {
        let body = serde_json::json!({ "error": { "code": "E_TEAM_FULL", "message": "team is full" } });
        assert_eq!(error_message(&body), "team is full");
        assert_eq!(error_message(&Value::Null), "null");
    }

    #[test]
    fn parses_dedupe_dry_run() {
        let cli = Cli::try_parse_from(["teamhub-cli", "students", "dedupe", "--dry-run"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Students(StudentsCommand { command: StudentsSubcommand::Dedupe { dry_run: true } })
        ));
    }

    #[test]
    fn export_without_session_token_fails_fast() {
        let ctx = CliContext { base_url: "http://localhost".into(), session_token: None };
        assert!(matches!(authed_client(&ctx), Err(CliError::MissingSessionToken)));
    }
}
