use ammonia;

/// Cleans teacher- or student-supplied text before it is stored and echoed back.
///
/// Uses ammonia's whitelist sanitizer: harmless inline tags survive, while `<script>`
/// (including its contents), `<iframe>` and event-handler attributes are dropped.
/// Surrounding whitespace is trimmed.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input).trim().to_string()
}
