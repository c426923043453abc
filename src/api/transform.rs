//! Outgoing payload pipeline: normalization and form encoding.

use crate::base::error::{ErrorKind, RequestError};
use crate::base::payload::{format_date, Payload};
use crate::http::request::{Body, RequestDescriptor};

/// Normalize a payload before it is sent.
///
/// With `filter_empty`, object fields holding `""` or null are dropped at
/// every depth; array elements are kept. With `date_to_iso`, dates become
/// RFC 3339 strings wherever they occur.
pub fn normalize_payload(payload: Payload, filter_empty: bool, date_to_iso: bool) -> Payload {
    match payload {
        Payload::Date(date) if date_to_iso => Payload::String(format_date(&date)),
        Payload::Array(items) => Payload::Array(
            items
                .into_iter()
                .map(|item| normalize_payload(item, filter_empty, date_to_iso))
                .collect(),
        ),
        Payload::Object(entries) => Payload::Object(
            entries
                .into_iter()
                .filter(|(_, value)| !(filter_empty && value.is_empty_value()))
                .map(|(key, value)| (key, normalize_payload(value, filter_empty, date_to_iso)))
                .collect(),
        ),
        other => other,
    }
}

/// Serialize the top-level fields of an object as `k=v&...`.
///
/// Scalars use their plain text, nested values their JSON text. Anything
/// other than an object encodes to the empty string.
pub fn serialize_form(payload: &Payload) -> Result<String, RequestError> {
    let Payload::Object(entries) = payload else {
        return Ok(String::new());
    };
    let fields: Vec<(&str, String)> = entries
        .iter()
        .map(|(key, value)| (key.as_str(), value.to_string()))
        .collect();
    serde_urlencoded::to_string(fields).map_err(|e| ErrorKind::Encode(e.to_string()).into())
}

/// Replace a structured body with its form encoding when the request
/// declares a url-encoded content type.
pub fn encode_form_body(request: &mut RequestDescriptor) -> Result<(), RequestError> {
    if !request.is_form_encoded() {
        return Ok(());
    }
    if let Some(Body::Json(payload)) = request.body() {
        let encoded = serialize_form(payload)?;
        request.set_body(Some(Body::Form(encoded)));
    }
    Ok(())
}
