//! Response rendering for each negotiated format.
//!
//! # Responsibilities
//! - Map a handler payload (one result, a result list, a free-form value, an
//!   acknowledgement or an error) onto text, HTML, JSON or YAML
//! - Downgrade serialization failures to a 500 error body
//! - Report the rendered size for the access log
//!
//! # Design Decisions
//! - Pure: the same payload, format and `pretty` flag always give the same bytes
//! - Text output is flattened to dotted keys sorted lexicographically
//! - JSON/YAML serialize the payload types directly so field order follows the
//!   struct definitions (`name`, `summary`, `data`)

use std::collections::HashMap;
use std::fmt::Write as _;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::http::flatten::flatten;
use crate::http::negotiate::Format;
use crate::probe::{Dispatch, ProbeResult};

/// Bytes escaped when a result name becomes a relative link.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// What a wrapped handler hands back for rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Result(ProbeResult),
    Results(Vec<ProbeResult>),
    /// Free-form structured value; plain strings render bare in text mode.
    Value(Value),
    /// Success without a body: `{type: OK, code: 200}`.
    Ack,
    Error { status: StatusCode, message: String },
}

impl Payload {
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Payload::Error {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Payload::Error { status, .. } => *status,
            _ => StatusCode::OK,
        }
    }
}

impl From<Dispatch> for Payload {
    fn from(dispatch: Dispatch) -> Self {
        match dispatch {
            Dispatch::One(result) => Payload::Result(result),
            Dispatch::All(results) => Payload::Results(results),
        }
    }
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Error serializing to JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("Error serializing to YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Error serializing to {format}: {source}")]
    Value {
        format: Format,
        #[source]
        source: serde_json::Error,
    },
}

/// `{type, code[, message]}` envelope for acknowledgements and errors.
#[derive(Debug, Serialize)]
struct StatusBody<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

impl<'a> StatusBody<'a> {
    fn ok() -> Self {
        Self {
            kind: "OK",
            code: StatusCode::OK.as_u16(),
            message: None,
        }
    }

    fn error(status: StatusCode, message: &'a str) -> Self {
        Self {
            kind: "ERROR",
            code: status.as_u16(),
            message: Some(message),
        }
    }
}

/// A fully rendered response body.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub status: StatusCode,
    pub format: Format,
    pub body: Vec<u8>,
}

impl Rendered {
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

impl IntoResponse for Rendered {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.format.content_type())],
            self.body,
        )
            .into_response()
    }
}

/// Render `payload` in `format`.
pub fn render(format: Format, pretty: bool, payload: &Payload) -> Rendered {
    match encode(format, pretty, payload) {
        Ok(body) => Rendered {
            status: payload.status(),
            format,
            body,
        },
        Err(err) => encoding_failure(format, pretty, err),
    }
}

fn encoding_failure(format: Format, pretty: bool, err: EncodeError) -> Rendered {
    tracing::error!(format = %format, error = %err, "Response encoding failed");
    let message = err.to_string();
    let payload = Payload::error(StatusCode::INTERNAL_SERVER_ERROR, message.clone());
    match encode(format, pretty, &payload) {
        Ok(body) => Rendered {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            format,
            body,
        },
        // The error envelope itself would not encode; plain text cannot fail.
        Err(_) => Rendered {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            format: Format::Text,
            body: format!("{message}\n").into_bytes(),
        },
    }
}

fn encode(format: Format, pretty: bool, payload: &Payload) -> Result<Vec<u8>, EncodeError> {
    match format {
        Format::Text => text(payload).map(String::into_bytes),
        Format::Html => html(payload).map(String::into_bytes),
        Format::Json | Format::Yaml => match payload {
            Payload::Result(result) => serialize(format, pretty, result),
            Payload::Results(results) => serialize(format, pretty, results),
            Payload::Value(value) => serialize(format, pretty, value),
            Payload::Ack => serialize(format, pretty, &StatusBody::ok()),
            Payload::Error { status, message } => serialize(format, pretty, &StatusBody::error(*status, message)),
        },
    }
}

fn serialize<T: Serialize + ?Sized>(format: Format, pretty: bool, value: &T) -> Result<Vec<u8>, EncodeError> {
    if format == Format::Yaml {
        return Ok(serde_yaml::to_string(value)?.into_bytes());
    }
    let encoded = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    encoded.map_err(EncodeError::Json)
}

fn to_value<T: Serialize>(format: Format, value: &T) -> Result<Value, EncodeError> {
    serde_json::to_value(value).map_err(|source| EncodeError::Value { format, source })
}

/// Results keyed by name, so text listings read `<name>.<field>`.
///
/// A repeated name is keyed `<name>#2`, `<name>#3`, ... in list order.
fn results_by_name(format: Format, results: &[ProbeResult]) -> Result<Value, EncodeError> {
    let mut map = serde_json::Map::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for result in results {
        let count = seen.entry(result.name.as_str()).or_insert(0);
        *count += 1;
        let key = if *count == 1 {
            result.name.clone()
        } else {
            format!("{}#{}", result.name, count)
        };

        let mut entry = serde_json::Map::new();
        entry.insert("summary".into(), Value::String(result.summary.clone()));
        entry.insert("data".into(), to_value(format, &result.data)?);
        map.insert(key, Value::Object(entry));
    }
    Ok(Value::Object(map))
}

fn text_lines(value: &Value) -> String {
    let mut out = String::new();
    for (key, value) in flatten(value) {
        let _ = writeln!(out, "{key}\t{value}");
    }
    out
}

fn text(payload: &Payload) -> Result<String, EncodeError> {
    Ok(match payload {
        Payload::Result(result) => text_lines(&to_value(Format::Text, result)?),
        Payload::Results(results) => text_lines(&results_by_name(Format::Text, results)?),
        Payload::Value(Value::String(s)) => s.clone(),
        Payload::Value(value) => text_lines(value),
        Payload::Ack => "OK".to_string(),
        Payload::Error { message, .. } => format!("{message}\n"),
    })
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}</body>\n</html>\n",
        escape(title),
        body
    )
}

fn table<'a>(rows: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::from("<table>\n<tr><th>Key</th><th>Value</th></tr>\n");
    for (key, value) in rows {
        let _ = writeln!(out, "<tr><td>{}</td><td>{}</td></tr>", escape(key), escape(value));
    }
    out.push_str("</table>\n");
    out
}

fn html(payload: &Payload) -> Result<String, EncodeError> {
    Ok(match payload {
        Payload::Result(result) => {
            let mut body = format!("<h1>{}</h1>\n", escape(&result.name));
            if !result.summary.is_empty() {
                let _ = writeln!(body, "<p>{}</p>", escape(&result.summary));
            }
            body.push_str(&table(result.data.iter().map(|(k, v)| (k.as_str(), v.as_str()))));
            page(&result.name, &body)
        }
        Payload::Results(results) => {
            let mut sorted: Vec<&ProbeResult> = results.iter().collect();
            sorted.sort_by(|a, b| a.name.cmp(&b.name));

            let mut body = String::from("<h1>Probes</h1>\n<ul>\n");
            for result in sorted {
                let name = escape(&result.name);
                let href = escape(&utf8_percent_encode(&result.name, PATH_SEGMENT).to_string());
                if result.summary.is_empty() {
                    let _ = writeln!(body, "<li><a href=\"{href}\">{name}</a></li>");
                } else {
                    let _ = writeln!(body, "<li><a href=\"{href}\">{name}</a>: {}</li>", escape(&result.summary));
                }
            }
            body.push_str("</ul>\n");
            page("Probes", &body)
        }
        Payload::Value(Value::String(s)) => page("Probe", &format!("<p>{}</p>\n", escape(s))),
        Payload::Value(value) => {
            let flat = flatten(value);
            page("Probe", &table(flat.iter().map(|(k, v)| (k.as_str(), v.as_str()))))
        }
        Payload::Ack => page("OK", "<p>OK</p>\n"),
        Payload::Error { status, message } => {
            let heading = format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or("Error"));
            page(&heading, &format!("<h1>{}</h1>\n<p>{}</p>\n", escape(&heading), escape(message)))
        }
    })
}
