//! Challenge Links
//!
//! The token travels as the `challenge` query parameter of the game URL.
//! The oldest links carried only an `items` parameter; those are still read.

use serde_json::Value;

/// Query parameter carrying the token.
pub const CHALLENGE_PARAM: &str = "challenge";

/// Query parameter of items-only links.
pub const ITEMS_PARAM: &str = "items";

/// `type` tag of the JSON form of an items-only link.
pub const SHARED_ITEMS_TYPE: &str = "location-guessing-game";

/// Append the challenge parameter to `base_url`.
///
/// Tokens from [`encode_challenge`](crate::challenge::codec::encode_challenge)
/// only use URL-safe characters, so no escaping is needed.
pub fn challenge_link(base_url: &str, token: &str) -> String {
    let (without_fragment, fragment) = match base_url.split_once('#') {
        Some((head, frag)) => (head, Some(frag)),
        None => (base_url, None),
    };

    let sep = if !without_fragment.contains('?') {
        "?"
    } else if without_fragment.ends_with('?') || without_fragment.ends_with('&') {
        ""
    } else {
        "&"
    };

    let mut link = format!("{without_fragment}{sep}{CHALLENGE_PARAM}={token}");
    if let Some(frag) = fragment {
        link.push('#');
        link.push_str(frag);
    }
    link
}

/// Extract the (percent-decoded) challenge token from an entry URL.
pub fn challenge_from_url(url: &str) -> Option<String> {
    query_value(url, CHALLENGE_PARAM)
        .map(percent_decode)
        .filter(|value| !value.is_empty())
}

/// Extract the item list from an items-only link.
///
/// The value is either `{"type":"location-guessing-game","items":[...]}` or,
/// when it is not JSON, a comma-separated list. A lone word, other JSON, or
/// an empty list yields `None`.
pub fn shared_items_from_url(url: &str) -> Option<Vec<String>> {
    let raw = query_value(url, ITEMS_PARAM)?;
    let items = parse_shared_items(&percent_decode(&raw.replace('+', " ")))?;
    (!items.is_empty()).then_some(items)
}

fn parse_shared_items(data: &str) -> Option<Vec<String>> {
    match serde_json::from_str::<Value>(data) {
        Ok(value) => {
            let obj = value.as_object()?;
            if obj.get("type").and_then(Value::as_str) != Some(SHARED_ITEMS_TYPE) {
                return None;
            }
            let items = obj.get("items")?.as_array()?;
            Some(items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        }
        Err(_) if data.contains(',') => Some(
            data.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        Err(_) => None,
    }
}

/// Raw value of `key` in the query, ignoring anything after `#`.
fn query_value<'a>(url: &'a str, key: &str) -> Option<&'a str> {
    let without_fragment = url.split('#').next().unwrap_or_default();
    let (_, query) = without_fragment.split_once('?')?;

    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| percent_decode(k) == key)
        .map(|(_, value)| value)
}

/// Decode `%XX` escapes. Malformed escapes are kept literally; `+` is left
/// alone because the codec treats it as part of the base64 alphabet.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
