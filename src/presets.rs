use crate::cli::Preset;
use crate::errors::Result;
use crate::transform::{MatchFlags, Transform};

/// Loads a pre-defined transform pipeline for a given `Preset`.
///
/// Presets are convenient, built-in pipelines for common site cleanup
/// tasks. Every preset is idempotent: none of its replacement outputs can
/// re-match its own patterns, so a second run over already-fixed files is
/// a no-op.
pub fn load_preset(preset: &Preset) -> Result<Vec<Transform>> {
    match preset {
        Preset::SmartPunctuation => Ok(vec![
            Transform::replace_literal("en-dash", "\u{2013}", "-")?,
            Transform::replace_literal("em-dash", "\u{2014}", "-")?,
            // Left and right variants collapse to the same ASCII quote
            Transform::replace("single-quotes", "[\u{2018}\u{2019}]", "'", MatchFlags::default())?,
            Transform::replace("double-quotes", "[\u{201C}\u{201D}]", "\"", MatchFlags::default())?,
            Transform::replace_literal("ellipsis", "\u{2026}", "...")?,
            Transform::replace_literal("bullet", "\u{2022}", "*")?,
            Transform::replace_literal("trademark", "\u{2122}", "(TM)")?,
            Transform::replace_literal("registered", "\u{AE}", "(R)")?,
            Transform::replace_literal("copyright", "\u{A9}", "(C)")?,
            Transform::replace_literal("degree-sign", "\u{B0}", " degrees")?,
            Transform::replace_literal("one-half", "\u{BD}", "1/2")?,
            Transform::replace_literal("one-quarter", "\u{BC}", "1/4")?,
            Transform::replace_literal("three-quarters", "\u{BE}", "3/4")?,
        ]),

        Preset::StripControlChars => Ok(vec![
            // Keeps tab, newline, and carriage return
            Transform::replace(
                "control-chars",
                "[\\x00-\\x08\\x0B\\x0C\\x0E-\\x1F\\x7F]",
                "",
                MatchFlags::default(),
            )?,
        ]),

        Preset::TrimTrailingWhitespace => Ok(vec![Transform::replace(
            "trailing-whitespace",
            "[ \\t]+$",
            "",
            MatchFlags {
                multi_line: true,
                ..MatchFlags::default()
            },
        )?]),

        Preset::CollapseBlankLines => Ok(vec![Transform::replace(
            "blank-lines",
            "\\n{3,}",
            "\n\n",
            MatchFlags::default(),
        )?]),

        Preset::StripHtmlComments => {
            Ok(vec![Transform::delete_region("html-comments", "<!--", "-->")?])
        }

        Preset::NormalizeHexCase => Ok(vec![Transform::replace_computed(
            "hex-case",
            "#([0-9a-fA-F]{6}|[0-9a-fA-F]{3})\\b",
            MatchFlags::default(),
            Box::new(|caps| format!("#{}", caps[1].to_lowercase())),
        )?]),
    }
}
