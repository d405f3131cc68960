use crate::ingest::error::{FeedError, FeedStage};
use crate::ingest::types::{DailyDocument, DynamicDocument};
use encoding_rs::WINDOWS_1251;

pub const DAILY_ENDPOINT: &str = "daily";
pub const DYNAMIC_ENDPOINT: &str = "dynamic";

const RAW_BODY_PREVIEW_CHARS: usize = 512;

/// The feed is served as windows-1251 regardless of what the HTTP headers claim. Every byte maps
/// to a character in that code page, so decoding cannot fail.
pub fn decode_windows_1251(bytes: &[u8]) -> String {
    let (cow, _, _) = WINDOWS_1251.decode(bytes);
    cow.into_owned()
}

pub fn parse_daily(text: &str) -> Result<DailyDocument, FeedError> {
    parse_document(text, DAILY_ENDPOINT)
}

pub fn parse_dynamic(text: &str) -> Result<DynamicDocument, FeedError> {
    parse_document(text, DYNAMIC_ENDPOINT)
}

fn parse_document<T>(text: &str, endpoint: &str) -> Result<T, FeedError>
where
    T: serde::de::DeserializeOwned,
{
    quick_xml::de::from_str::<T>(text).map_err(|err| {
        FeedError::new(FeedStage::Parse, endpoint, format!("malformed XML: {err}"))
            .with_raw_body(preview(text))
    })
}

fn preview(text: &str) -> String {
    text.chars().take(RAW_BODY_PREVIEW_CHARS).collect()
}
