use crate::error::ApiError;

/// Maximum text length for TTS requests, in characters
const MAX_TEXT_LENGTH: usize = 5000;

/// Validate TTS request text before it is turned into a synthesis request
pub fn validate_tts_request(text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::InvalidInput("Text cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }
    Ok(())
}

/// Client control message that cancels an in-flight stream: either the bare
/// word `stop` or `{"type": "stop"}`.
pub fn is_stop_message(text: &str) -> bool {
    let text = text.trim();
    if text.eq_ignore_ascii_case("stop") {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(|t| t == "stop"))
        .unwrap_or(false)
}
