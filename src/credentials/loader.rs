use crate::config::{ColumnConfig, CredentialsConfig};
use crate::credentials::{ArchiveCredential, CredentialRecord, CredentialTable};
use crate::error::{Result, UnlockError};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// A table row as ordered (column, value) pairs.
type Row = Vec<(String, String)>;

/// Loads the credential table from a CSV or JSON source, chosen by extension.
pub fn load_credentials(path: &Path, config: &CredentialsConfig) -> Result<CredentialTable> {
    if !path.is_file() {
        return Err(UnlockError::NotFound {
            what: "Credential table".to_string(),
            path: path.display().to_string(),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let (rows, mut archives) = match extension.as_str() {
        "csv" => (read_csv_rows(path, config.skip_rows)?, Vec::new()),
        "json" => read_json_rows(path)?,
        other => {
            return Err(parse_error(
                path,
                format!("unsupported credential table format '.{}' (expected .csv or .json)", other),
            ))
        }
    };

    let columns = &config.columns;
    if let Some(first) = rows.first() {
        if !first.iter().any(|(key, _)| key == &columns.account) {
            return Err(parse_error(
                path,
                format!("missing required column '{}'", columns.account),
            ));
        }
    }

    let mut records = Vec::with_capacity(rows.len());
    for (line, row) in rows.iter().enumerate() {
        let Some(record) = record_from_row(row, columns) else {
            debug!(row = line + 1, "skipping row without account token");
            continue;
        };

        if let Some(ref status) = record.status {
            if config.skip_statuses.iter().any(|s| s.eq_ignore_ascii_case(status)) {
                debug!(account = %record.account_token, status = %status, "skipping row by status");
                continue;
            }
        }

        archives.extend(row_archive_credentials(row, &record, columns));
        records.push(record);
    }

    let table = CredentialTable::new(records, archives);
    info!(
        path = %path.display(),
        accounts = table.len(),
        archive_passwords = table.archive_credentials().len(),
        "loaded credential table"
    );
    Ok(table)
}

fn parse_error(path: &Path, message: String) -> UnlockError {
    UnlockError::Parse {
        path: path.display().to_string(),
        message,
    }
}

fn read_csv_rows(path: &Path, skip_rows: usize) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| parse_error(path, e.to_string()))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| parse_error(path, e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| parse_error(path, e.to_string()))?;
        if idx < skip_rows {
            continue;
        }
        let row = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}

fn read_json_rows(path: &Path) -> Result<(Vec<Row>, Vec<ArchiveCredential>)> {
    let content = std::fs::read_to_string(path)?;
    let document: Value =
        serde_json::from_str(&content).map_err(|e| parse_error(path, e.to_string()))?;

    let (row_values, archive_values) = match document {
        Value::Array(items) => (items, Vec::new()),
        Value::Object(mut map) => {
            let rows = match map.remove("shops").or_else(|| map.remove("accounts")) {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(parse_error(path, "'shops' must be an array".to_string()));
                }
                None => {
                    return Err(parse_error(
                        path,
                        "expected a top-level array or a 'shops' array".to_string(),
                    ));
                }
            };
            let archives = match map.remove("archives") {
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(parse_error(path, "'archives' must be an array".to_string()));
                }
                None => Vec::new(),
            };
            (rows, archives)
        }
        _ => {
            return Err(parse_error(
                path,
                "expected a top-level array or object".to_string(),
            ))
        }
    };

    let rows = row_values
        .into_iter()
        .enumerate()
        .map(|(idx, value)| json_row(value).ok_or_else(|| {
            parse_error(path, format!("row {} is not an object", idx + 1))
        }))
        .collect::<Result<Vec<Row>>>()?;

    let mut archives = Vec::new();
    for (idx, value) in archive_values.into_iter().enumerate() {
        let row = json_row(value)
            .ok_or_else(|| parse_error(path, format!("archive entry {} is not an object", idx + 1)))?;
        let password = field(&row, "password");
        let Some(password) = password else {
            debug!(entry = idx + 1, "skipping archive entry without password");
            continue;
        };
        archives.push(ArchiveCredential {
            display_name: field(&row, "name").unwrap_or_default(),
            account_token: field(&row, "account"),
            password,
        });
    }

    Ok((rows, archives))
}

fn json_row(value: Value) -> Option<Row> {
    let Value::Object(map) = value else {
        return None;
    };

    Some(
        map.into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null => return None,
                    Value::Array(_) | Value::Object(_) => return None,
                };
                Some((key, text.trim().to_string()))
            })
            .collect(),
    )
}

fn field(row: &Row, column: &str) -> Option<String> {
    row.iter()
        .find(|(key, _)| key == column)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn password_value<'r>(value: &'r str, columns: &ColumnConfig) -> Option<&'r str> {
    let value = value.trim();
    if value.is_empty() || columns.empty_markers.iter().any(|m| m == value) {
        None
    } else {
        Some(value)
    }
}

/// Listed password columns first, in configured order, then any prefix matches in row order.
fn row_passwords(row: &Row, columns: &ColumnConfig) -> Vec<String> {
    let listed = columns.passwords.iter().filter_map(|column| {
        row.iter()
            .find(|(key, _)| key == column)
            .map(|(_, value)| value.as_str())
    });

    let prefixed = row.iter().filter_map(|(key, value)| {
        let prefix = columns.password_prefix.as_deref()?;
        let matched = key.starts_with(prefix)
            && !key.starts_with(&columns.archive_password_prefix)
            && !columns.passwords.contains(key);
        matched.then_some(value.as_str())
    });

    let mut passwords: Vec<String> = Vec::new();
    for value in listed.chain(prefixed) {
        if let Some(password) = password_value(value, columns) {
            if !passwords.iter().any(|p| p == password) {
                passwords.push(password.to_string());
            }
        }
    }
    passwords
}

fn record_from_row(row: &Row, columns: &ColumnConfig) -> Option<CredentialRecord> {
    let account_token = field(row, &columns.account)?;
    let passwords = row_passwords(row, columns);

    Some(CredentialRecord {
        display_name: field(row, &columns.name).unwrap_or_else(|| account_token.clone()),
        account_id: field(row, &columns.account_id),
        platform: field(row, &columns.platform),
        status: field(row, &columns.status),
        passwords,
        account_token,
    })
}

fn row_archive_credentials(
    row: &Row,
    record: &CredentialRecord,
    columns: &ColumnConfig,
) -> Vec<ArchiveCredential> {
    row.iter()
        .filter(|(key, _)| key.starts_with(&columns.archive_password_prefix))
        .filter_map(|(_, value)| password_value(value, columns))
        .map(|password| ArchiveCredential {
            display_name: record.display_name.clone(),
            account_token: Some(record.account_token.clone()),
            password: password.to_string(),
        })
        .collect()
}
