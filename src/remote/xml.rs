/*
 * Copyright 2019-2021 Wren Powell
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Scanning helpers for the small, fixed-shape XML documents the remote
//! service speaks. The tags scanned for carry no attributes, so a full XML
//! parser is not needed.

/// Return the inner content of each `<tag>...</tag>` element in `document`,
/// in order, without unescaping.
pub fn elements<'a>(document: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let mut found = Vec::new();
    let mut rest = document;
    while let Some(start) = rest.find(&open) {
        rest = &rest[start + open.len()..];
        match rest.find(&close) {
            Some(end) => {
                found.push(&rest[..end]);
                rest = &rest[end + close.len()..];
            }
            None => break,
        }
    }

    found
}

/// Return the unescaped text of the first `<tag>` element in `document`.
pub fn text(document: &str, tag: &str) -> Option<String> {
    elements(document, tag).first().map(|inner| unescape(inner))
}

/// Escape `text` for embedding in an XML document.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Resolve the named entities and character references in `text`.
///
/// Unknown entities are passed through unchanged.
fn unescape(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        unescaped.push_str(&rest[..start]);
        rest = &rest[start..];

        let end = match rest.find(';') {
            Some(end) => end,
            None => break,
        };
        match &rest[1..end] {
            "amp" => unescaped.push('&'),
            "lt" => unescaped.push('<'),
            "gt" => unescaped.push('>'),
            "quot" => unescaped.push('"'),
            "apos" => unescaped.push('\''),
            entity => {
                let code = entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()));
                match code.and_then(char::from_u32) {
                    Some(c) => unescaped.push(c),
                    None => unescaped.push_str(&rest[..=end]),
                }
            }
        }
        rest = &rest[end + 1..];
    }
    unescaped.push_str(rest);
    unescaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_nested_elements() {
        let document = "\
            <ListBucketResult xmlns=\"http://example.com\">\
            <Prefix>top</Prefix>\
            <Contents><Key>a</Key></Contents>\
            <Contents><Key>b</Key></Contents>\
            </ListBucketResult>";

        let contents = elements(document, "Contents");
        assert_eq!(contents.len(), 2);
        assert_eq!(text(contents[0], "Key").as_deref(), Some("a"));
        assert_eq!(text(contents[1], "Key").as_deref(), Some("b"));
        assert_eq!(text(document, "Prefix").as_deref(), Some("top"));
        assert_eq!(text(document, "Missing"), None);
    }

    #[test]
    fn escape_round_trip() {
        let original = "a&b<c>d\"e'f&#x41;";
        assert_eq!(unescape(&escape(original)), original);
    }

    #[test]
    fn unescapes_character_references() {
        assert_eq!(unescape("&#65;&#x42;"), "AB");
        assert_eq!(unescape("&bogus;"), "&bogus;");
        assert_eq!(unescape("trailing&"), "trailing&");
    }
}
