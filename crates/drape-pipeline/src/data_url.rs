//! Mask data URL parsing.
//!
//! The mask arrives as text of the form `data:<mime>;base64,<payload>`.
//! Only the comma is structural: the text is split on the *first* comma
//! and the header before it is informational. Browsers and hand-written
//! clients disagree on the header, so a missing `data:` scheme or
//! `;base64` marker is tolerated. The payload is decoded leniently:
//! characters outside the base64 alphabet (line breaks, stray commas,
//! padding) are discarded before decoding.

use base64::Engine as _;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use image::GrayImage;

use crate::decode;
use crate::types::{InputKind, PipelineError};

/// Standard alphabet, no padding required, non-canonical trailing bits
/// accepted.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// A parsed `data:` URL borrowing from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrl<'a> {
    /// Media type from the header with the `data:` scheme and `;base64`
    /// marker removed, e.g. `image/png`. May be empty.
    pub mime: &'a str,
    /// Raw payload text following the first comma.
    pub payload: &'a str,
}

/// Split a data URL into its header and payload.
///
/// The `data:` scheme and `;base64` marker are stripped from the header
/// when present (case-insensitively) but not required.
///
/// # Errors
///
/// Returns [`PipelineError::MissingInput`] for empty text and
/// [`PipelineError::MalformedMask`] if there is no comma.
pub fn parse_data_url(text: &str) -> Result<DataUrl<'_>, PipelineError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PipelineError::MissingInput(InputKind::Mask));
    }

    let (header, payload) = text.split_once(',').ok_or_else(|| {
        PipelineError::MalformedMask(
            "expected `data:<mime>;base64,<payload>`, found no comma".to_owned(),
        )
    })?;

    let header = header.trim();
    let header = strip_prefix_ignore_case(header, "data:").unwrap_or(header);
    let mime = strip_suffix_ignore_case(header, ";base64").unwrap_or(header);

    Ok(DataUrl { mime, payload })
}

impl DataUrl<'_> {
    /// Base64-decode the payload, discarding every character outside the
    /// standard alphabet first.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MalformedMask`] if no base64 characters
    /// remain or the remaining length is not decodable.
    pub fn decode_payload(&self) -> Result<Vec<u8>, PipelineError> {
        let compact: String = self
            .payload
            .chars()
            .filter(|&c| c.is_ascii_alphanumeric() || c == '+' || c == '/')
            .collect();
        if compact.is_empty() {
            return Err(PipelineError::MalformedMask("payload is empty".to_owned()));
        }
        PAYLOAD_ENGINE
            .decode(compact)
            .map_err(|e| PipelineError::MalformedMask(format!("invalid base64 payload: {e}")))
    }
}

/// Parse a mask data URL and decode it into a grayscale image.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedMask`] for any structural, base64 or
/// image decoding failure, [`PipelineError::MissingInput`] for empty text,
/// and [`PipelineError::TooLarge`] if the embedded image exceeds
/// `max_pixels`.
pub fn decode_mask_data_url(text: &str, max_pixels: u64) -> Result<GrayImage, PipelineError> {
    let url = parse_data_url(text)?;
    let bytes = url.decode_payload()?;
    decode::decode_mask_bytes(&bytes, max_pixels).map_err(|e| match e {
        PipelineError::Decode { source, .. } => {
            PipelineError::MalformedMask(format!("payload is not a supported image: {source}"))
        }
        other => other,
    })
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    let tail = s.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &s[..split])
}
