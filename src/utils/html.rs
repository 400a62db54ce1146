/// Clean user-supplied rich text with ammonia's whitelist.
///
/// Safe formatting tags (like <b>, <p>) survive; <script>, <iframe> and event
/// handler attributes are stripped. Used for material descriptions, profile
/// bios and review comments before they are stored.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Trims and sanitizes optional free text. Blank input becomes `None`.
pub fn clean_optional(input: Option<&str>) -> Option<String> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(clean_html)
        .filter(|s| !s.trim().is_empty())
}
