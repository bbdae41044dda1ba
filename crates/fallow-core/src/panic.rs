use std::any::Any;

/// Best-effort extraction of a panic payload's message.
///
/// Panic payloads are almost always `&str` or `String`; anything else is
/// reported opaquely.
pub fn panic_message(payload: &dyn Any) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
