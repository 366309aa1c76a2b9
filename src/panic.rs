//! Describe panic payloads caught from handler callbacks and queued sends.

use std::any::Any;

/// Render a caught panic payload as text.
///
/// `&'static str` and `String` payloads are returned verbatim; anything else
/// is reported as an opaque payload.
///
/// ```
/// use wireline::panic::describe_panic;
///
/// let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
/// assert_eq!(describe_panic(payload.as_ref()), "boom");
/// ```
#[must_use]
pub fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        String::from("<non-string panic payload>")
    }
}
