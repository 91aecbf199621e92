// Link grammar used for both message bodies and profile bios.

use regex::Regex;
use std::sync::LazyLock;

/// `http(s)://`, `tg://` deep links, `t.me`/`telegram.me` short links, and bare
/// domain-like tokens (`label.label...tld` with a 2+ letter TLD).
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:https?://\S+|tg://\S+|t\.me/\S+|telegram\.me/\S+|(?:[a-z0-9-]+\.)+[a-z]{2,})",
    )
    .expect("link pattern is valid")
});

/// Whether `text` contains anything that looks like a link.
pub fn contains_link(text: &str) -> bool {
    LINK_RE.is_match(text)
}
