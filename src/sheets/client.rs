//! Google Sheets v4 REST client.
//!
//! Token acquisition is handled outside this crate; the client is handed
//! either an OAuth bearer token (read + write) or an API key (read only).
//! With a reload hook installed, a 401 re-reads the credential and the
//! request is retried once.

use super::{Color, DocumentSource, FormattedCell, GridCell, GridRange, ValueRow};
use crate::error::AppError;
use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use std::sync::RwLock;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4";
const GRID_FIELDS: &str = "sheets/data/rowData/values(formattedValue,userEnteredFormat/backgroundColor)";

#[derive(Clone, PartialEq)]
pub enum SheetsAuth {
    Bearer(String),
    ApiKey(String),
}

impl std::fmt::Debug for SheetsAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(***)"),
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
        }
    }
}

type AuthLoader = Box<dyn Fn() -> Option<SheetsAuth> + Send + Sync>;

pub struct SheetsClient {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    grid_id: i64,
    auth: RwLock<SheetsAuth>,
    reload: Option<AuthLoader>,
}

impl SheetsClient {
    pub fn new(
        base_url: &str,
        spreadsheet_id: &str,
        grid_id: i64,
        auth: SheetsAuth,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            grid_id,
            auth: RwLock::new(auth),
            reload: None,
        })
    }

    /// Called after a 401 to fetch a fresh credential.
    pub fn with_auth_reload(
        mut self,
        loader: impl Fn() -> Option<SheetsAuth> + Send + Sync + 'static,
    ) -> Self {
        self.reload = Some(Box::new(loader));
        self
    }

    fn current_auth(&self) -> SheetsAuth {
        self.auth.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Swap in the loader's credential. False when there is no loader or it
    /// returned nothing new.
    fn reload_auth(&self) -> bool {
        let Some(fresh) = self.reload.as_ref().and_then(|load| load()) else {
            return false;
        };
        let mut auth = self.auth.write().unwrap_or_else(|e| e.into_inner());
        if *auth == fresh {
            return false;
        }
        *auth = fresh;
        log::info!("Sheets credentials reloaded");
        true
    }

    /// `{base}/spreadsheets/{id}{suffix}/{segments...}` with each segment
    /// percent-encoded (A1 ranges contain `!` and `:`).
    fn url(&self, suffix: &str, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::Config(format!("Invalid Sheets base URL: {}", e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| AppError::Config("Sheets base URL cannot be a base".to_string()))?;
            path.push("spreadsheets");
            path.push(&format!("{}{}", self.spreadsheet_id, suffix));
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.current_auth() {
            SheetsAuth::Bearer(token) => request.bearer_auth(token),
            SheetsAuth::ApiKey(key) => request.query(&[("key", key.as_str())]),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, AppError> {
        let retry = request.try_clone();
        let mut response = self.authorize(request).send().await?;
        if response.status() == StatusCode::UNAUTHORIZED && self.reload_auth() {
            if let Some(retry) = retry {
                response = self.authorize(retry).send().await?;
            }
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Sheets(format!("{}: {}", status, body)));
        }
        Ok(response)
    }

    fn require_write_access(&self) -> Result<(), AppError> {
        match self.current_auth() {
            SheetsAuth::Bearer(_) => Ok(()),
            SheetsAuth::ApiKey(_) => Err(AppError::Sheets(
                "writes need an OAuth access token, only an API key is configured".to_string(),
            )),
        }
    }
}

#[async_trait]
impl DocumentSource for SheetsClient {
    async fn read_values(&self, range: &str) -> Result<Vec<ValueRow>, AppError> {
        let url = self.url("", &["values", range])?;
        let request = self.client.get(url).query(&[("fields", "values")]);
        let body: ValuesResponse = self.send(request).await?.json().await?;
        Ok(body.values)
    }

    async fn read_grid(&self, range: &str) -> Result<Vec<Vec<GridCell>>, AppError> {
        let url = self.url("", &[])?;
        let request = self
            .client
            .get(url)
            .query(&[("ranges", range), ("fields", GRID_FIELDS)]);
        let body: SpreadsheetResponse = self.send(request).await?.json().await?;

        let rows = body
            .sheets
            .into_iter()
            .next()
            .and_then(|sheet| sheet.data.into_iter().next())
            .map(|grid| grid.row_data)
            .unwrap_or_default();

        Ok(rows
            .into_iter()
            .map(|row| {
                row.values
                    .into_iter()
                    .map(|cell| GridCell {
                        formatted_value: cell.formatted_value,
                        background: cell.user_entered_format.and_then(|f| f.background_color),
                    })
                    .collect()
            })
            .collect())
    }

    async fn write_cell(&self, range: &str, value: &str) -> Result<(), AppError> {
        self.require_write_access()?;
        let url = self.url("", &["values", range])?;
        let request = self
            .client
            .put(url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": [[value]],
            }));
        self.send(request).await?;
        Ok(())
    }

    async fn write_column(&self, range: &str, values: &[String]) -> Result<(), AppError> {
        self.require_write_access()?;
        let url = self.url("", &["values", range])?;
        let request = self
            .client
            .put(url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&json!({
                "range": range,
                "majorDimension": "COLUMNS",
                "values": [values],
            }));
        self.send(request).await?;
        Ok(())
    }

    async fn write_formatted(
        &self,
        range: &GridRange,
        rows: &[Vec<FormattedCell>],
    ) -> Result<(), AppError> {
        self.require_write_access()?;

        let writes_values = rows.iter().flatten().any(|c| c.value.is_some());
        let writes_colors = rows.iter().flatten().any(|c| c.background.is_some());
        let fields = match (writes_values, writes_colors) {
            (true, true) => "userEnteredValue/stringValue,userEnteredFormat/backgroundColor",
            (true, false) => "userEnteredValue/stringValue",
            (false, true) => "userEnteredFormat/backgroundColor",
            (false, false) => return Ok(()),
        };

        let rows_json: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                let values: Vec<serde_json::Value> = row.iter().map(cell_json).collect();
                json!({ "values": values })
            })
            .collect();

        let url = self.url(":batchUpdate", &[])?;
        let request = self.client.post(url).json(&json!({
            "requests": [{
                "updateCells": {
                    "fields": fields,
                    "range": {
                        "sheetId": self.grid_id,
                        "startRowIndex": range.start_row_index,
                        "endRowIndex": range.end_row_index,
                        "startColumnIndex": range.start_column_index,
                        "endColumnIndex": range.end_column_index,
                    },
                    "rows": rows_json,
                }
            }]
        }));
        self.send(request).await?;
        Ok(())
    }
}

fn cell_json(cell: &FormattedCell) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    if let Some(value) = &cell.value {
        out.insert("userEnteredValue".into(), json!({ "stringValue": value }));
    }
    if let Some(color) = &cell.background {
        out.insert(
            "userEnteredFormat".into(),
            json!({ "backgroundColor": color_json(color) }),
        );
    }
    serde_json::Value::Object(out)
}

fn color_json(color: &Color) -> serde_json::Value {
    let (red, green, blue) = color.channels();
    json!({ "red": red, "green": green, "blue": blue })
}

// ── Response shapes ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ValuesResponse {
    #[serde(default)]
    values: Vec<ValueRow>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetData>,
}

#[derive(Debug, Deserialize)]
struct SheetData {
    #[serde(default)]
    data: Vec<GridData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridData {
    #[serde(default)]
    row_data: Vec<RowData>,
}

#[derive(Debug, Deserialize)]
struct RowData {
    #[serde(default)]
    values: Vec<CellData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellData {
    formatted_value: Option<String>,
    user_entered_format: Option<CellFormat>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellFormat {
    background_color: Option<Color>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client(auth: SheetsAuth) -> SheetsClient {
        SheetsClient::new(
            DEFAULT_BASE_URL,
            "sheet-123",
            0,
            auth,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn url_encodes_a1_ranges() {
        let c = client(SheetsAuth::Bearer("t".into()));
        let url = c.url("", &["values", "Sheet1!A2:J999"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-123/values/Sheet1!A2:J999"
        );
        let url = c.url(":batchUpdate", &[]).unwrap();
        assert!(url.as_str().ends_with("/spreadsheets/sheet-123:batchUpdate"));
    }

    #[test]
    fn api_key_cannot_write() {
        let c = client(SheetsAuth::ApiKey("k".into()));
        assert!(c.require_write_access().is_err());
        let c = client(SheetsAuth::Bearer("t".into()));
        assert!(c.require_write_access().is_ok());
    }

    #[test]
    fn grid_response_parses_missing_channels() {
        let body = r#"{"sheets":[{"data":[{"rowData":[
            {"values":[{"formattedValue":"Frieren","userEnteredFormat":{"backgroundColor":{"red":0.20392157,"green":0.65882355,"blue":0.3254902}}}]},
            {},
            {"values":[{"userEnteredFormat":{"backgroundColor":{}}}]}
        ]}]}]}"#;
        let parsed: SpreadsheetResponse = serde_json::from_str(body).unwrap();
        let rows = &parsed.sheets[0].data[0].row_data;
        assert_eq!(rows.len(), 3);
        assert!(rows[1].values.is_empty());
        let empty = rows[2].values[0]
            .user_entered_format
            .as_ref()
            .and_then(|f| f.background_color)
            .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn cell_json_only_includes_set_fields() {
        let v = cell_json(&FormattedCell {
            value: None,
            background: Some(Color::rgb(0.8, 0.8, 0.8)),
        });
        assert!(v.get("userEnteredValue").is_none());
        assert!(v.get("userEnteredFormat").is_some());
    }

    #[test]
    fn reload_swaps_only_changed_credentials() {
        let c = client(SheetsAuth::ApiKey("k".into()));
        assert!(!c.reload_auth());

        let c = client(SheetsAuth::ApiKey("k".into()))
            .with_auth_reload(|| Some(SheetsAuth::ApiKey("k".into())));
        assert!(!c.reload_auth());

        let c = client(SheetsAuth::ApiKey("k".into()))
            .with_auth_reload(|| Some(SheetsAuth::Bearer("fresh".into())));
        assert!(c.reload_auth());
        assert_eq!(c.current_auth(), SheetsAuth::Bearer("fresh".into()));
        assert!(c.require_write_access().is_ok());
    }

    /// Answers one connection per status line and records each
    /// Authorization header it sees.
    async fn stub_server(statuses: &'static [&'static str]) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recorded = seen.clone();
        tokio::spawn(async move {
            for status in statuses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut head = Vec::new();
                let mut chunk = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&chunk[..n]);
                }
                let auth = String::from_utf8_lossy(&head)
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("authorization")
                            .then(|| value.trim().to_string())
                    })
                    .unwrap_or_default();
                recorded.lock().unwrap().push(auth);

                let body = if status.starts_with("200") {
                    r#"{"values":[["1"]]}"#
                } else {
                    r#"{"error":{"code":401}}"#
                };
                let reply = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(reply.as_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        (base, seen)
    }

    fn local_client(
        base: &str,
        loader: impl Fn() -> Option<SheetsAuth> + Send + Sync + 'static,
    ) -> SheetsClient {
        SheetsClient::new(
            base,
            "sheet-123",
            0,
            SheetsAuth::Bearer("old".into()),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_auth_reload(loader)
    }

    #[tokio::test]
    async fn expired_token_is_reloaded_and_retried() {
        let (base, seen) = stub_server(&["401 Unauthorized", "200 OK"]).await;
        let c = local_client(&base, || Some(SheetsAuth::Bearer("new".into())));

        let rows = c.read_values("A2:J").await.unwrap();
        assert_eq!(rows, vec![vec![serde_json::Value::from("1")]]);
        assert_eq!(*seen.lock().unwrap(), vec!["Bearer old", "Bearer new"]);

        assert_eq!(c.current_auth(), SheetsAuth::Bearer("new".into()));
    }

    #[tokio::test]
    async fn unchanged_token_is_not_retried() {
        let (base, seen) = stub_server(&["401 Unauthorized"]).await;
        let c = local_client(&base, || Some(SheetsAuth::Bearer("old".into())));

        let err = c.read_values("A2:J").await.unwrap_err();
        assert!(matches!(err, AppError::Sheets(ref m) if m.starts_with("401")));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
