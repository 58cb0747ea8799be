//! Tolerant decoding of provider responses.
//!
//! Provider payloads come in several shapes. Each `Extractor` knows one shape
//! and returns `None` when it does not apply; `first_match` tries a chain in
//! order. `scan_http_string` is the catch-all used last.
use serde_json::Value;

use crate::model::JobState;

pub type Extractor = fn(&Value) -> Option<String>;

pub fn first_match(value: &Value, extractors: &[Extractor]) -> Option<String> {
    extractors.iter().find_map(|extract| extract(value))
}

fn http_string(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| s.starts_with("http"))
        .map(str::to_string)
}

fn data_download_url(v: &Value) -> Option<String> {
    http_string(v.pointer("/data/downloadUrl"))
}

fn data_file_url(v: &Value) -> Option<String> {
    http_string(v.pointer("/data/fileUrl"))
}

fn data_url(v: &Value) -> Option<String> {
    http_string(v.pointer("/data/url"))
}

fn top_download_url(v: &Value) -> Option<String> {
    http_string(v.get("downloadUrl"))
}

fn top_url(v: &Value) -> Option<String> {
    http_string(v.get("url"))
}

/// Depth-first search for the first string value starting with `http`.
pub fn scan_http_string(v: &Value) -> Option<String> {
    match v {
        Value::String(_) => http_string(Some(v)),
        Value::Object(map) => map.values().find_map(scan_http_string),
        Value::Array(items) => items.iter().find_map(scan_http_string),
        _ => None,
    }
}

pub const UPLOAD_URL_EXTRACTORS: &[Extractor] = &[
    data_download_url,
    data_file_url,
    data_url,
    top_download_url,
    top_url,
    scan_http_string,
];

/// URL of an uploaded file, from any of the known upload response shapes.
pub fn upload_url(body: &Value) -> Option<String> {
    first_match(body, UPLOAD_URL_EXTRACTORS)
}

/// `resultJson` is usually a JSON-encoded string, sometimes an object.
/// Parse failures fall through to the flat fields.
fn result_json_urls(data: &Value) -> Option<String> {
    let raw = data.get("resultJson")?;
    let parsed = match raw {
        Value::String(s) => serde_json::from_str::<Value>(s).ok()?,
        Value::Object(_) => raw.clone(),
        _ => return None,
    };
    let urls = parsed.get("resultUrls")?.as_array()?;
    urls.iter().find_map(|u| http_string(Some(u)))
}

fn flat_result_url(data: &Value) -> Option<String> {
    http_string(data.get("resultUrl"))
}

fn flat_image_url(data: &Value) -> Option<String> {
    http_string(data.get("imageUrl"))
}

pub const RESULT_URL_EXTRACTORS: &[Extractor] =
    &[result_json_urls, flat_result_url, flat_image_url];

/// Result URL from the `data` object of a status response.
pub fn result_url(data: &Value) -> Option<String> {
    first_match(data, RESULT_URL_EXTRACTORS)
}

/// Anything other than `success` or `fail` means the job is still running.
pub fn job_state(raw: Option<&str>) -> JobState {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("success") => JobState::Success,
        Some("fail") | Some("failed") => JobState::Fail,
        _ => JobState::Waiting,
    }
}

/// Human-readable provider message, tolerating `msg`/`message`/`error`.
pub fn provider_message(body: &Value) -> Option<String> {
    ["msg", "message", "error"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upload_url_prefers_dedicated_fields() {
        let body = json!({"data": {"fileUrl": "https://b", "downloadUrl": "https://a"}});
        assert_eq!(upload_url(&body).as_deref(), Some("https://a"));
        let body = json!({"url": "https://top"});
        assert_eq!(upload_url(&body).as_deref(), Some("https://top"));
    }

    #[test]
    fn upload_url_scans_unknown_shapes() {
        let body = json!({"success": true, "result": {"files": [{"name": "x", "link": "https://scan/x.png"}]}});
        assert_eq!(upload_url(&body).as_deref(), Some("https://scan/x.png"));
        assert_eq!(upload_url(&json!({"ok": true, "id": "abc"})), None);
    }

    #[test]
    fn result_url_reads_encoded_result_json() {
        let data = json!({"resultJson": "{\"resultUrls\":[\"https://x/y.png\"]}"});
        assert_eq!(result_url(&data).as_deref(), Some("https://x/y.png"));
        let data = json!({"resultJson": {"resultUrls": ["https://x/z.png"]}});
        assert_eq!(result_url(&data).as_deref(), Some("https://x/z.png"));
    }

    #[test]
    fn result_url_falls_back_when_result_json_is_broken() {
        let data = json!({"resultJson": "{not json", "resultUrl": "https://flat/a.png"});
        assert_eq!(result_url(&data).as_deref(), Some("https://flat/a.png"));
        let data = json!({"resultJson": "", "imageUrl": "https://flat/b.png"});
        assert_eq!(result_url(&data).as_deref(), Some("https://flat/b.png"));
        assert_eq!(result_url(&json!({})), None);
    }

    #[test]
    fn job_state_classification() {
        assert_eq!(job_state(Some("success")), JobState::Success);
        assert_eq!(job_state(Some("FAIL")), JobState::Fail);
        assert_eq!(job_state(Some("generating")), JobState::Waiting);
        assert_eq!(job_state(Some("queuing")), JobState::Waiting);
        assert_eq!(job_state(None), JobState::Waiting);
    }
}
