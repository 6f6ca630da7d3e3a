use http::header::{self, HeaderMap};

pub(crate) struct ContentDisposition {
    pub(crate) field_name: Option<String>,
    pub(crate) file_name: Option<String>,
}

impl ContentDisposition {
    pub fn parse(headers: &HeaderMap) -> ContentDisposition {
        // Work on raw bytes: browsers put unescaped UTF-8 in `filename=`,
        // which `HeaderValue::to_str` would reject.
        let content_disposition = headers.get(header::CONTENT_DISPOSITION).map(|val| val.as_bytes());

        let field_name = content_disposition.and_then(|val| attribute(val, b"name"));
        let file_name = content_disposition.and_then(|val| attribute(val, b"filename"));

        ContentDisposition { field_name, file_name }
    }
}

/// Extracts a `key="value"` or `key=value` parameter from a
/// `Content-Disposition` value. Quoted values may contain semicolons and
/// backslash-escaped quotes.
fn attribute(header: &[u8], key: &[u8]) -> Option<String> {
    for param in split_params(header) {
        let param = trim(param);

        if param.len() > key.len()
            && param[..key.len()].eq_ignore_ascii_case(key)
            && param[key.len()] == b'='
        {
            return Some(unquote(&param[key.len() + 1..]));
        }
    }

    None
}

/// Splits on `;`, ignoring separators inside double quotes.
fn split_params(header: &[u8]) -> Vec<&[u8]> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (idx, &byte) in header.iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }

        match byte {
            b'\\' if quoted => escaped = true,
            b'"' => quoted = !quoted,
            b';' if !quoted => {
                params.push(&header[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }

    params.push(&header[start..]);
    params
}

fn unquote(raw: &[u8]) -> String {
    let raw = trim(raw);

    if raw.len() >= 2 && raw[0] == b'"' && raw[raw.len() - 1] == b'"' {
        let mut value = Vec::with_capacity(raw.len() - 2);
        let mut escaped = false;

        for &byte in &raw[1..raw.len() - 1] {
            if !escaped && byte == b'\\' {
                escaped = true;
                continue;
            }

            escaped = false;
            value.push(byte);
        }

        String::from_utf8_lossy(&value).into_owned()
    } else {
        String::from_utf8_lossy(raw).into_owned()
    }
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|byte| !byte.is_ascii_whitespace())
        .map_or(start, |idx| idx + 1);

    &bytes[start..end]
}
