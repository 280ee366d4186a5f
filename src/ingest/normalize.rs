use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Canonical comparison key for a header label or a cell token.
///
/// `"Bloco de anúncios"` → `"bloco_de_anuncios"`, `" CPC (US$) "` → `"cpc_us"`.
/// Output is either empty or matches `^[a-z0-9]+(_[a-z0-9]+)*$`.
pub fn normalize(label: &str) -> String {
    let spaced = label.replace('\u{00A0}', " ");
    let folded: String = spaced
        .trim()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();

    let mut key = String::with_capacity(folded.len());
    let mut pending_sep = false;
    for c in folded.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.push(c);
        } else {
            pending_sep = true;
        }
    }
    key
}
