//! Form bodies: `application/x-www-form-urlencoded` and `multipart/form-data`
//!
//! Both encodings decode into the same [`FormData`], an ordered list of
//! named entries. Multipart parts that carry a `filename` become
//! [`FormValue::File`], everything else is text.

use crate::error::{Error, Result};
use bytes::Bytes;

/// A single uploaded file from a multipart form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl FormFile {
    /// Size of the uploaded data in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Value of one form entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(FormFile),
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(text) => Some(text),
            FormValue::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FormFile> {
        match self {
            FormValue::File(file) => Some(file),
            FormValue::Text(_) => None,
        }
    }
}

/// Decoded form body, entries in body order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, name: impl Into<String>, value: FormValue) {
        self.entries.push((name.into(), value));
    }

    /// First value for `name`
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// First text value for `name`
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FormValue::as_text)
    }

    /// First file for `name`
    pub fn file(&self, name: &str) -> Option<&FormFile> {
        self.get(name).and_then(FormValue::as_file)
    }

    /// Every value for `name`, in body order
    pub fn get_all(&self, name: &str) -> Vec<&FormValue> {
        self.entries
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value)
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decode a form body according to its `Content-Type`
pub(crate) fn parse_form(content_type: Option<&str>, body: &[u8]) -> Result<FormData> {
    let content_type = content_type.unwrap_or("");
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        "application/x-www-form-urlencoded" => parse_urlencoded(body),
        "multipart/form-data" => {
            let boundary = extract_boundary(content_type)
                .ok_or_else(|| Error::multipart("missing boundary in Content-Type"))?;
            parse_multipart(body, &boundary)
        }
        _ => Err(Error::FormContentType(content_type.to_string())),
    }
}

fn parse_urlencoded(body: &[u8]) -> Result<FormData> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)?;
    Ok(FormData {
        entries: pairs
            .into_iter()
            .map(|(key, value)| (key, FormValue::Text(value)))
            .collect(),
    })
}

fn extract_boundary(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|param| {
        let (key, value) = param.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_multipart(body: &[u8], boundary: &str) -> Result<FormData> {
    let delimiter = format!("--{}", boundary).into_bytes();
    let separator = [b"\r\n".as_slice(), &delimiter].concat();

    let start = find(body, &delimiter)
        .ok_or_else(|| Error::multipart("body does not contain the boundary"))?;
    let mut rest = &body[start + delimiter.len()..];
    let mut form = FormData::new();

    loop {
        if rest.starts_with(b"--") {
            return Ok(form);
        }
        rest = rest
            .strip_prefix(b"\r\n")
            .ok_or_else(|| Error::multipart("malformed boundary line"))?;

        let end = find(rest, &separator)
            .ok_or_else(|| Error::multipart("missing closing boundary"))?;
        let (name, value) = parse_part(&rest[..end])?;
        form.append(name, value);

        rest = &rest[end + separator.len()..];
    }
}

fn parse_part(part: &[u8]) -> Result<(String, FormValue)> {
    let split = find(part, b"\r\n\r\n")
        .ok_or_else(|| Error::multipart("part has no header terminator"))?;
    let headers = std::str::from_utf8(&part[..split])
        .map_err(|_| Error::multipart("part headers are not valid UTF-8"))?;
    let data = &part[split + 4..];

    let mut name = None;
    let mut file_name = None;
    let mut content_type = None;

    for line in headers.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if key.trim().eq_ignore_ascii_case("content-disposition") {
            for param in value.split(';').skip(1) {
                let Some((key, val)) = param.trim().split_once('=') else {
                    continue;
                };
                let val = val.trim().trim_matches('"').to_string();
                match key.trim() {
                    "name" => name = Some(val),
                    "filename" => file_name = Some(val),
                    _ => {}
                }
            }
        } else if key.trim().eq_ignore_ascii_case("content-type") {
            content_type = Some(value.to_string());
        }
    }

    let name = name.ok_or_else(|| Error::multipart("part is missing a field name"))?;
    let value = match file_name {
        Some(file_name) => FormValue::File(FormFile {
            file_name,
            content_type,
            data: Bytes::copy_from_slice(data),
        }),
        None => FormValue::Text(
            String::from_utf8(data.to_vec())
                .map_err(|_| Error::multipart(format!("field `{}` is not valid UTF-8", name)))?,
        ),
    };

    Ok((name, value))
}
