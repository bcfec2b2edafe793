use chardetng::EncodingDetector;
use encoding_rs::Encoding;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHtml {
    pub html: String,
    pub encoding_label: String,
}

/// Decode raw page bytes into UTF-8 using the transport's best guess:
/// BOM -> Content-Type charset -> chardetng sniffing. Byte sequences that do
/// not fit the chosen encoding decode lossily; a replacement character is
/// better than losing the article.
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> DecodedHtml {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(label) = content_type.and_then(header_charset) {
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            return decode_with(bytes, encoding);
        }
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    decode_with(bytes, detector.guess(None, true))
}

fn header_charset(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        Some(value.trim().trim_matches(['"', '\'']).to_string())
    })
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> DecodedHtml {
    let (text, actual, _had_errors) = encoding.decode(bytes);
    DecodedHtml {
        html: text.into_owned(),
        encoding_label: actual.name().to_string(),
    }
}
