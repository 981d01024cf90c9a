//! Pictorial glyph (emoji) recognition for visual descriptors.
//!
//! A glyph is one pictographic scalar together with whatever trails it: skin-tone
//! modifiers, variation selectors, keycaps and zero-width-joined continuations. So
//! "👩‍👧" counts once and "⭐️" counts once.

const ZWJ: char = '\u{200D}';
const VS16: char = '\u{FE0F}';
const KEYCAP: char = '\u{20E3}';

pub fn is_pictographic(c: char) -> bool {
    let cp = c as u32;
    if is_modifier(c) {
        return false;
    }
    matches!(
        cp,
        0x1F300..=0x1F5FF
            | 0x1F600..=0x1F64F
            | 0x1F680..=0x1F6FF
            | 0x1F7E0..=0x1F7EB
            | 0x1F900..=0x1F9FF
            | 0x1FA70..=0x1FAFF
            | 0x2600..=0x26FF
            | 0x2700..=0x27BF
            | 0x2B1B..=0x2B1C
            | 0x2B50
            | 0x2B55
    )
}

fn is_modifier(c: char) -> bool {
    matches!(c as u32, 0x1F3FB..=0x1F3FF) || c == VS16 || c == KEYCAP
}

/// Splits the pictographic content of `s` into glyph clusters, dropping everything else.
pub fn glyph_clusters(s: &str) -> Vec<String> {
    let mut clusters: Vec<String> = Vec::new();
    let mut joining = false;

    for c in s.chars() {
        if c == ZWJ {
            if let Some(last) = clusters.last_mut() {
                last.push(c);
                joining = true;
            }
            continue;
        }
        if is_modifier(c) {
            if let Some(last) = clusters.last_mut() {
                last.push(c);
            }
            continue;
        }
        if is_pictographic(c) {
            match clusters.last_mut() {
                Some(last) if joining => last.push(c),
                _ => clusters.push(c.to_string()),
            }
        }
        joining = false;
    }

    clusters
}

pub fn count_glyphs(s: &str) -> usize {
    glyph_clusters(s).len()
}

pub fn has_glyphs(s: &str) -> bool {
    s.chars().any(is_pictographic)
}

/// True when the text is made of glyphs and whitespace only.
pub fn is_glyph_only(s: &str) -> bool {
    let trimmed = s.trim();
    !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_whitespace() || is_pictographic(c) || is_modifier(c) || c == ZWJ)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_simple_runs() {
        assert_eq!(count_glyphs("🌟🌟🌟"), 3);
        assert_eq!(count_glyphs("🍎 🍎 🍎 🍎 🍎"), 5);
        assert_eq!(count_glyphs("How many? 🐶🐶"), 2);
        assert_eq!(count_glyphs("no pictures here"), 0);
    }

    #[test]
    fn modifiers_and_joiners_do_not_add_glyphs() {
        assert_eq!(count_glyphs("👍🏽👍🏽"), 2);
        assert_eq!(count_glyphs("⭐\u{FE0F}⭐\u{FE0F}"), 2);
        assert_eq!(count_glyphs("👩\u{200D}👧"), 1);
    }

    #[test]
    fn clusters_keep_order() {
        assert_eq!(glyph_clusters("🔴🔵🔴"), vec!["🔴", "🔵", "🔴"]);
        assert!(is_glyph_only(" 🔴 🔵 "));
        assert!(!is_glyph_only("red 🔴"));
    }
}
