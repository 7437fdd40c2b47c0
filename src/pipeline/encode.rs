//! Image encoding: raw bytes → base64 string or `data:` URI.
//!
//! The extraction endpoint takes bare base64 in `inputs`; the chat endpoint
//! takes an `image_url`, which may be a `data:<mime>;base64,...` URI when no
//! public URL is available. The MIME type is sniffed from the magic bytes,
//! never trusted from the file extension.

use crate::pipeline::input::ImageInput;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

/// Base64-encode raw image bytes (standard alphabet, padded).
pub fn encode_image(bytes: &[u8]) -> String {
    let b64 = STANDARD.encode(bytes);
    debug!("Encoded image → {} bytes base64", b64.len());
    b64
}

/// Guess the MIME type of an uploaded document from its first bytes.
///
/// PDFs are recognised explicitly; everything else goes through
/// [`image::guess_format`]. Unknown data is reported as
/// `application/octet-stream`.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF") {
        return "application/pdf";
    }
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => "application/octet-stream",
    }
}

/// Build a `data:` URI for inline image transport.
pub fn to_data_uri(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", sniff_mime(bytes), encode_image(bytes))
}

/// The string placed in the extraction payload's `inputs` member:
/// base64 for local bytes, the URL itself for remote images.
pub fn payload_image(input: &ImageInput) -> String {
    match input {
        ImageInput::Bytes { bytes, .. } => encode_image(bytes),
        ImageInput::Url(url) => url.clone(),
    }
}

/// The string placed in a chat message's `image_url.url` member.
pub fn chat_image_url(input: &ImageInput) -> String {
    match input {
        ImageInput::Bytes { bytes, .. } => to_data_uri(bytes),
        ImageInput::Url(url) => url.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1×1 transparent PNG.
    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    fn png_bytes() -> Vec<u8> {
        STANDARD.decode(PNG_B64).expect("valid base64")
    }

    #[test]
    fn encode_matches_known_base64() {
        assert_eq!(encode_image(&png_bytes()), PNG_B64);
    }

    #[test]
    fn sniff_common_formats() {
        assert_eq!(sniff_mime(&png_bytes()), "image/png");
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), "image/jpeg");
        assert_eq!(sniff_mime(b"%PDF-1.7\n"), "application/pdf");
        assert_eq!(sniff_mime(b"hello"), "application/octet-stream");
    }

    #[test]
    fn data_uri_has_mime_and_payload() {
        let uri = to_data_uri(&png_bytes());
        assert_eq!(uri, format!("data:image/png;base64,{PNG_B64}"));
    }

    #[test]
    fn url_inputs_pass_through() {
        let input = ImageInput::Url("https://i.example.com/a.png".into());
        assert_eq!(payload_image(&input), "https://i.example.com/a.png");
        assert_eq!(chat_image_url(&input), "https://i.example.com/a.png");
    }
}
