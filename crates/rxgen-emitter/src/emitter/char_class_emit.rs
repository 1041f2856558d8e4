//! Rendering character-class membership tests.
//!
//! The cheap shapes (one or two characters, a single range, a lone named
//! category) become direct comparisons; everything else goes through the
//! runtime's general matcher with the class's canonical pattern text.

use rxgen_syntax::{CharCategory, CharClass};

use super::Emitter;
use crate::literals::{rune_literal, string_literal};

impl Emitter<'_> {
    /// An expression over `expr` that's true when the character is in the
    /// class; with `negate`, true when it is not.
    pub(crate) fn emit_match_character_class(
        &self,
        set: &CharClass,
        negate: bool,
        expr: &str,
    ) -> String {
        if set.is_anything() {
            return if negate { "false" } else { "true" }.to_string();
        }

        // Membership folded together with the class's own negation; the
        // runtime fallback instead gets the class verbatim and only the
        // caller's negation applies there.
        let negated = set.is_negated() != negate;

        if let Some((category, category_negated)) = set.get_if_only_category() {
            let (helper, helper_negated) = match category {
                CharCategory::Word => ("IsWordChar", false),
                CharCategory::NotWord => ("IsWordChar", true),
                CharCategory::Digit => ("IsDigitChar", false),
                CharCategory::NotDigit => ("IsDigitChar", true),
                CharCategory::Space => ("IsSpaceChar", false),
                CharCategory::NotSpace => ("IsSpaceChar", true),
            };
            let invert = (helper_negated != category_negated) != negate;
            let bang = if invert { "!" } else { "" };
            return format!("{bang}helpers.{helper}({expr})");
        }

        if let Some(chars) = set.get_set_chars(3) {
            let comparisons: Vec<String> = chars
                .iter()
                .map(|&ch| {
                    let op = if negated { "!=" } else { "==" };
                    format!("{expr} {op} {}", rune_literal(ch))
                })
                .collect();
            let join = if negated { " && " } else { " || " };
            return if comparisons.len() == 1 {
                comparisons.into_iter().next().unwrap_or_default()
            } else {
                format!("({})", comparisons.join(join))
            };
        }

        if let Some(ranges) = set.get_if_n_ranges(1) {
            let lo = rune_literal(ranges[0].first);
            let hi = rune_literal(ranges[0].last);
            return if negated {
                format!("({expr} < {lo} || {expr} > {hi})")
            } else {
                format!("({expr} >= {lo} && {expr} <= {hi})")
            };
        }

        let bang = if negate { "!" } else { "" };
        format!(
            "{bang}helpers.CharInClass({expr}, {})",
            string_literal(&set.to_string())
        )
    }
}
