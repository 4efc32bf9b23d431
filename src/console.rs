//! Line-oriented control surface on stdin. One command per line, one JSON
//! response per command on stdout.

use crate::commands;
use crate::database::Status;
use crate::error::AppError;
use crate::sync::SyncWorker;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

const HELP: &str = "commands: start | stop | flush | refresh | status | timer | table <name> | \
     errors | clear-errors | write <range> <value> | fill <range> <length> <value> | \
     mark <range> <status> | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Flush,
    Refresh,
    Status,
    Timer,
    Table(String),
    Errors,
    ClearErrors,
    WriteCell {
        range: String,
        value: String,
    },
    FillColumn {
        range: String,
        length: usize,
        value: String,
    },
    MarkStatus {
        range: String,
        status: Status,
    },
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, AppError> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().unwrap_or("").to_ascii_lowercase();
        let command = match verb.as_str() {
            "start" => Self::Start,
            "stop" => Self::Stop,
            "flush" => Self::Flush,
            "refresh" => Self::Refresh,
            "status" => Self::Status,
            "timer" => Self::Timer,
            "table" => match parts.next() {
                Some(name) => Self::Table(name.to_string()),
                None => return Err(AppError::Other("usage: table <name>".into())),
            },
            "errors" => Self::Errors,
            "clear-errors" => Self::ClearErrors,
            "write" => match (parts.next(), rest(parts)) {
                (Some(range), value) => Self::WriteCell {
                    range: range.to_string(),
                    value,
                },
                _ => return Err(AppError::Other("usage: write <range> <value>".into())),
            },
            "fill" => {
                let usage = || AppError::Other("usage: fill <range> <length> <value>".into());
                let range = parts.next().ok_or_else(usage)?.to_string();
                let length = parts
                    .next()
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(usage)?;
                Self::FillColumn {
                    range,
                    length,
                    value: rest(parts),
                }
            }
            "mark" => {
                let range = parts.next();
                let status = rest(parts);
                match range {
                    Some(range) if !status.is_empty() => Self::MarkStatus {
                        range: range.to_string(),
                        status: Status::from(status.as_str()),
                    },
                    _ => return Err(AppError::Other("usage: mark <range> <status>".into())),
                }
            }
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(AppError::Other(format!("unknown command: {}", other))),
        };
        Ok(command)
    }
}

/// Remaining words joined by single spaces
fn rest(parts: std::str::SplitWhitespace<'_>) -> String {
    parts.collect::<Vec<_>>().join(" ")
}

fn to_json<T: Serialize>(value: T) -> Result<Value, AppError> {
    Ok(serde_json::to_value(value)?)
}

/// Run one command against the worker.
pub async fn execute(worker: &SyncWorker, command: &Command) -> Result<Value, AppError> {
    match command {
        Command::Start => to_json(commands::start_sync(worker).await?),
        Command::Stop => to_json(commands::stop_sync(worker).await?),
        Command::Flush => to_json(commands::flush_sync(worker).await?),
        Command::Refresh => to_json(commands::refresh_sync(worker).await?),
        Command::Status => to_json(commands::get_sync_status(worker).await?),
        Command::Timer => to_json(commands::get_timer(worker).await?),
        Command::Table(name) => commands::get_table_by_name(worker.database(), name),
        Command::Errors => to_json(commands::get_diagnostics(worker)?),
        Command::ClearErrors => {
            commands::clear_errors(worker)?;
            Ok(json!({ "message": "Errors cleared" }))
        }
        Command::WriteCell { range, value } => {
            commands::update_cell(worker.source().as_ref(), range, value).await?;
            Ok(json!({ "message": format!("Wrote {}", range) }))
        }
        Command::FillColumn {
            range,
            length,
            value,
        } => {
            commands::update_column(worker.source().as_ref(), range, value, *length).await?;
            Ok(json!({ "message": format!("Wrote {} cells down {}", length, range) }))
        }
        Command::MarkStatus { range, status } => {
            commands::update_status(worker.source().as_ref(), range, *status).await?;
            Ok(json!({ "message": format!("Marked {} as {}", range, status) }))
        }
        Command::Help => Ok(json!({ "message": HELP })),
        Command::Quit => Ok(json!({ "message": "Shutting down" })),
    }
}

/// Read commands until EOF, `quit` or cancellation. `quit` cancels `cancel`.
pub async fn run(worker: &SyncWorker, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                log::info!("stdin closed, console stopped");
                break;
            }
            Err(e) => {
                log::warn!("Failed to read stdin: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match Command::parse(&line) {
            Ok(command) => {
                let result = execute(worker, &command).await;
                if command == Command::Quit {
                    print_response(result);
                    cancel.cancel();
                    break;
                }
                result
            }
            Err(e) => Err(e),
        };
        print_response(response);
    }
}

fn print_response(response: Result<Value, AppError>) {
    let body = match response {
        Ok(value) => value,
        Err(e) => json!({ "error": e }),
    };
    println!("{}", body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::fake::{FakeSheet, Write};
    use crate::sync::tests::worker_with;
    use std::sync::Arc;

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("start").unwrap(), Command::Start);
        assert_eq!(Command::parse("  FLUSH ").unwrap(), Command::Flush);
        assert_eq!(
            Command::parse("table Seasonal").unwrap(),
            Command::Table("Seasonal".into())
        );
        assert_eq!(Command::parse("clear-errors").unwrap(), Command::ClearErrors);
        assert!(Command::parse("table").is_err());
        assert!(Command::parse("sync now").is_err());
    }

    #[test]
    fn parses_sheet_writes() {
        assert_eq!(
            Command::parse("write N2 Cowboy  Bebop").unwrap(),
            Command::WriteCell {
                range: "N2".into(),
                value: "Cowboy Bebop".into()
            }
        );
        assert_eq!(
            Command::parse("write N2").unwrap(),
            Command::WriteCell {
                range: "N2".into(),
                value: String::new()
            }
        );
        assert_eq!(
            Command::parse("fill M2 3 x").unwrap(),
            Command::FillColumn {
                range: "M2".into(),
                length: 3,
                value: "x".into()
            }
        );
        assert_eq!(
            Command::parse("MARK O2:O4 not aired").unwrap(),
            Command::MarkStatus {
                range: "O2:O4".into(),
                status: Status::NotAired
            }
        );
        assert!(Command::parse("write").is_err());
        assert!(Command::parse("fill M2 many x").is_err());
        assert!(Command::parse("mark O2").is_err());
    }

    #[tokio::test]
    async fn sheet_writes_reach_the_source() {
        let sheet = Arc::new(FakeSheet::new());
        let (worker, _dir) = worker_with(sheet.clone());

        for line in ["write N2 done", "fill M2 2 -", "mark O2 watched"] {
            let command = Command::parse(line).unwrap();
            execute(&worker, &command).await.unwrap();
        }

        let writes = sheet.writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(
            writes[0],
            Write::Cell {
                range: "N2".into(),
                value: "done".into()
            }
        );
        assert_eq!(
            writes[1],
            Write::Column {
                range: "M2".into(),
                values: vec!["-".into(), "-".into()]
            }
        );
        assert!(matches!(&writes[2], Write::Formatted { rows, .. } if rows.len() == 1));

        let err = execute(&worker, &Command::parse("fill M2 0 x").unwrap()).await;
        assert!(err.is_err());
        assert_eq!(sheet.writes().len(), 3);
    }

    #[tokio::test]
    async fn stop_then_status_reports_paused() {
        let (worker, _dir) = worker_with(Arc::new(FakeSheet::new()));

        let stopped = execute(&worker, &Command::Stop).await.unwrap();
        assert_eq!(stopped["state"], "paused");
        assert_eq!(stopped["message"], "Sync stopped");

        let status = execute(&worker, &Command::Status).await.unwrap();
        assert_eq!(status["state"], "paused");
        assert_eq!(status["busy"], false);
    }

    #[tokio::test]
    async fn table_command_returns_rows() {
        let (worker, _dir) = worker_with(Arc::new(FakeSheet::new()));
        let rows = execute(&worker, &Command::Table("movies".into()))
            .await
            .unwrap();
        assert_eq!(rows, json!([]));

        let err = execute(&worker, &Command::Table("nope".into())).await;
        assert!(err.is_err());
    }
}
