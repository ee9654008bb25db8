use crate::UrlError;
use sha2::{Digest, Sha256};
use url::Url;

/// Normalizes a media URL taken from a post
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace
/// 2. Unescape HTML entities (feed JSON carries `&amp;` inside URLs)
/// 3. Drop everything from the first `?` or `#` (query and fragment)
/// 4. Parse the remainder; reject if malformed, not http(s), or host-less
///
/// The result is both the fetch URL and the deduplication key.
///
/// # Examples
///
/// ```
/// use feed_harvest::url::normalize_media_url;
///
/// let url = normalize_media_url("https://preview.redd.it/a.jpg?width=640&amp;s=abc").unwrap();
/// assert_eq!(url.as_str(), "https://preview.redd.it/a.jpg");
/// ```
pub fn normalize_media_url(raw: &str) -> Result<Url, UrlError> {
    let unescaped = unescape_html(raw.trim());

    let stripped = match unescaped.find(|c: char| c == '?' || c == '#') {
        Some(idx) => &unescaped[..idx],
        None => unescaped.as_str(),
    };

    let url = Url::parse(stripped).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    Ok(url)
}

/// Replaces HTML character references with the characters they denote
///
/// Handles the named entities that show up in feed payloads plus decimal
/// (`&#39;`) and hexadecimal (`&#x27;`) references. Unknown or malformed
/// references are left untouched.
pub fn unescape_html(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        match tail.find(';') {
            // Entity names are short; anything longer is a literal ampersand
            Some(semi) if semi <= 10 => {
                let entity = &tail[1..semi];
                match decode_entity(entity) {
                    Some(ch) => {
                        out.push(ch);
                        rest = &tail[semi + 1..];
                    }
                    None => {
                        out.push('&');
                        rest = &tail[1..];
                    }
                }
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let digits = entity.strip_prefix('#')?;
            let code = match digits.strip_prefix(|c: char| c == 'x' || c == 'X') {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

/// Derives the on-disk file name for a normalized media URL
///
/// Uses the last path segment, restricted to a safe character set. URLs with
/// no usable segment get a name derived from the SHA-256 of the URL.
pub fn media_file_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    let sanitized: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = sanitized.trim_matches('.');
    if trimmed.is_empty() {
        let digest = Sha256::digest(url.as_str().as_bytes());
        return hex::encode(&digest[..8]);
    }

    trimmed.to_string()
}
