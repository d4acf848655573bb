use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gmailctl::auth::{CredentialManager, CredentialStore, HttpTokenExchanger, Scope};
use gmailctl::cli::{Cli, Command, ComposeArgs};
use gmailctl::error::Error;
use gmailctl::format;
use gmailctl::gmail_api::{
    build_query, create_draft, download_attachments, fetch_labels, search_messages, send_message,
    send_reply, GmailClient, OutgoingMessage, SearchFilters,
};

#[tokio::main]
async fn main() -> ExitCode {
    // Diagnostics go to stderr so Markdown/JSON output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json {
                println!("{}", format::error_json(&err));
            } else {
                eprintln!("Error: {}", err);
            }
            ExitCode::FAILURE
        }
    }
}

fn resolve_dir(cli_dir: Option<PathBuf>) -> Result<PathBuf, Error> {
    if let Some(dir) = cli_dir {
        return Ok(dir);
    }
    if let Ok(dir) = std::env::var("GMAILCTL_CREDENTIALS_DIR") {
        return Ok(PathBuf::from(dir));
    }
    CredentialStore::default_dir()
}

async fn run(cli: Cli) -> Result<(), Error> {
    let store = CredentialStore::new(resolve_dir(cli.dir)?);
    let manager = CredentialManager::new(store, HttpTokenExchanger::new());

    match cli.command {
        Command::Setup => {
            let status = manager.check_setup();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!(
                    "{}",
                    format::setup_markdown(&status, &manager.store().client_config_path())
                );
            }
            Ok(())
        }

        Command::Auth { manual } => {
            let record = if manual {
                manager.authorize_manual().await?
            } else {
                manager.authorize_interactive().await?
            };
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "authenticated": true, "scope": record.scope })
                );
            } else {
                println!("Authentication successful!");
                println!("Scope: {}", record.scope);
            }
            Ok(())
        }

        Command::Scope { set } => {
            match set {
                Some(name) => {
                    let scope = manager.set_scope(&name)?;
                    if cli.json {
                        println!("{}", serde_json::json!({ "scope": scope }));
                    } else {
                        println!("Scope set to: {}", scope);
                        println!("The cached token (if any) no longer matches; run 'gmailctl auth' before the next API command.");
                    }
                }
                None => {
                    let current = manager.current_scope()?;
                    if cli.json {
                        let available: Vec<_> = Scope::ALL
                            .iter()
                            .map(|s| {
                                serde_json::json!({
                                    "name": s.as_str(),
                                    "permissions": s.permission_urls(),
                                })
                            })
                            .collect();
                        println!(
                            "{}",
                            serde_json::json!({ "scope": current, "available": available })
                        );
                    } else {
                        println!("Current scope: {}", current);
                        println!("\nAvailable scopes:");
                        for scope in Scope::ALL {
                            let marker = if scope == current { " (current)" } else { "" };
                            println!(
                                "  {}{}: {}",
                                scope,
                                marker,
                                scope.permission_urls().join(", ")
                            );
                        }
                    }
                }
            }
            Ok(())
        }

        Command::Search {
            query,
            from,
            to,
            subject,
            label,
            after,
            before,
            has_attachment,
            unread,
            starred,
            limit,
            full,
            attachments,
        } => {
            let client = api_client(&manager).await?;
            let filters = SearchFilters {
                query,
                from,
                to,
                subject,
                label,
                after,
                before,
                has_attachment,
                unread,
                starred,
            };
            let gmail_query = build_query(&filters);
            let messages = search_messages(&client, &gmail_query, limit, full, attachments).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else {
                println!("{}", format::messages_markdown(&messages, full));
            }
            Ok(())
        }

        Command::Download { message_id, output } => {
            let client = api_client(&manager).await?;
            let output_dir = match output {
                Some(dir) => dir,
                None => dirs::home_dir()
                    .map(|home| home.join("Downloads").join("gmail_attachments"))
                    .unwrap_or_else(|| PathBuf::from("gmail_attachments")),
            };
            let downloaded = download_attachments(&client, &message_id, &output_dir).await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "downloaded": downloaded }))?
                );
            } else {
                println!("{}", format::downloads_markdown(&downloaded, &output_dir));
            }
            Ok(())
        }

        Command::Labels => {
            let client = api_client(&manager).await?;
            let labels = fetch_labels(&client).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&labels)?);
            } else {
                println!("{}", format::labels_markdown(&labels));
            }
            Ok(())
        }

        Command::Send(args) => {
            let client = api_client(&manager).await?;
            let msg = compose(args);
            let response = send_message(&client, &msg).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("Email sent successfully!");
                println!("Message ID: {}", response.id);
                println!("Thread ID: {}", response.thread_id);
                println!("To: {}", msg.to);
                println!("Subject: {}", msg.subject);
            }
            Ok(())
        }

        Command::Draft(args) => {
            let client = api_client(&manager).await?;
            let msg = compose(args);
            let response = create_draft(&client, &msg).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("Draft created successfully!");
                println!("Draft ID: {}", response.id);
                println!("Message ID: {}", response.message.id);
                println!("To: {}", msg.to);
                println!("Subject: {}", msg.subject);
            }
            Ok(())
        }

        Command::Reply {
            message_id,
            body,
            html,
        } => {
            let client = api_client(&manager).await?;
            let (response, context) = send_reply(&client, &message_id, &body, html).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("Reply sent successfully!");
                println!("Message ID: {}", response.id);
                println!("Thread ID: {}", response.thread_id);
                println!("To: {}", context.to);
                println!("Subject: {}", context.subject);
            }
            Ok(())
        }
    }
}

/// Every API-invoking subcommand goes through the credential manager first.
async fn api_client(
    manager: &CredentialManager<HttpTokenExchanger>,
) -> Result<GmailClient, Error> {
    let token = manager.get_valid_token().await?;
    Ok(GmailClient::new(token.access_token))
}

fn compose(args: ComposeArgs) -> OutgoingMessage {
    OutgoingMessage {
        to: args.to,
        subject: args.subject,
        body: args.body,
        cc: args.cc,
        bcc: args.bcc,
        html: args.html,
        ..Default::default()
    }
}
