use ammonia;

/// Clean author-supplied HTML (question prompts, options) before it is handed
/// to the browser.
///
/// Whitelist based: safe tags such as <b> or <p> survive, <script> and
/// <iframe> are removed together with their content, and event handler
/// attributes like onclick are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}
