use crate::errors::Result;
use regex::{Captures, Regex, RegexBuilder};
use serde::Deserialize;

/// A function that computes replacement text from a regex match.
pub type ComputeFn = Box<dyn Fn(&Captures) -> String + Send + Sync>;

/// Regex flag options captured when a rule is built.
///
/// These mirror the flags the maintenance scripts this tool replaces passed
/// to their substitutions: case-insensitive matching, `.` matching newlines
/// (for rules that span tags or blocks), and `^`/`$` matching line
/// boundaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchFlags {
    pub case_insensitive: bool,
    pub dot_matches_new_line: bool,
    pub multi_line: bool,
}

/// Where an insert rule places its snippet relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPosition {
    /// Insert the snippet immediately before the anchor.
    #[default]
    Before,
    /// Insert the snippet immediately after the anchor.
    After,
}

/// The action a transform performs, dispatched explicitly by variant.
enum Rule {
    /// Replace every match of `pattern` with `replacement` (capture groups
    /// such as `$1` are supported).
    Replace { pattern: Regex, replacement: String },
    /// Replace every match of `pattern` with text computed from its captures.
    /// Not expressible in pipeline files; used by presets and library callers.
    ReplaceComputed { pattern: Regex, compute: ComputeFn },
    /// Remove every span from a literal start marker through a literal end
    /// marker, inclusive, across lines.
    DeleteRegion { start: String, end: String },
    /// Insert `snippet` next to the first occurrence of the literal `anchor`,
    /// unless `marker` is already present in the text.
    Insert {
        anchor: String,
        snippet: String,
        position: InsertPosition,
        marker: Option<String>,
    },
}

/// A single named rewriting rule.
///
/// A transform is a pure function over file text: given the same input it
/// always produces the same output, and it holds no state between files.
/// Rules must be idempotent, so applying the same transform twice yields
/// the same text as applying it once. The `DeleteRegion` and `Insert`
/// variants enforce this structurally; `Replace` rules inherit it from
/// their pattern, which must not re-match its own replacement.
pub struct Transform {
    name: String,
    rule: Rule,
}

/// The result of applying one transform to one file's text.
pub struct Applied {
    /// The rewritten text, or `None` when the rule left the input unchanged.
    pub text: Option<String>,
    /// How many matches/regions/insertions actually changed the text.
    pub hits: usize,
    /// A soft failure (missing anchor or end marker) to surface in the report.
    pub warning: Option<String>,
}

impl Applied {
    fn unchanged() -> Self {
        Self {
            text: None,
            hits: 0,
            warning: None,
        }
    }

    fn changed(text: String, hits: usize) -> Self {
        Self {
            text: Some(text),
            hits,
            warning: None,
        }
    }

    fn warned(message: String) -> Self {
        Self {
            text: None,
            hits: 0,
            warning: Some(message),
        }
    }
}

impl Transform {
    /// Creates a replace rule from a regex pattern and a replacement string.
    pub fn replace(name: &str, pattern: &str, replacement: &str, flags: MatchFlags) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            rule: Rule::Replace {
                pattern: compile(pattern, flags)?,
                replacement: replacement.to_string(),
            },
        })
    }

    /// Creates a replace rule that matches `from` literally (no regex
    /// metacharacters) and substitutes `to`.
    pub fn replace_literal(name: &str, from: &str, to: &str) -> Result<Self> {
        Self::replace(name, &regex::escape(from), to, MatchFlags::default())
    }

    /// Creates a replace rule whose replacement text is computed per match.
    pub fn replace_computed(
        name: &str,
        pattern: &str,
        flags: MatchFlags,
        compute: ComputeFn,
    ) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            rule: Rule::ReplaceComputed {
                pattern: compile(pattern, flags)?,
                compute,
            },
        })
    }

    /// Creates a delete-region rule bounded by literal start and end markers.
    pub fn delete_region(name: &str, start: &str, end: &str) -> Result<Self> {
        if start.is_empty() || end.is_empty() {
            return Err(format!("transform '{name}': region markers must be non-empty").into());
        }
        Ok(Self {
            name: name.to_string(),
            rule: Rule::DeleteRegion {
                start: start.to_string(),
                end: end.to_string(),
            },
        })
    }

    /// Creates an insert rule guarded by a presence marker.
    ///
    /// The marker defaults to the snippet itself. An explicit marker must be
    /// a substring of the snippet; without that, a second run could not
    /// detect the earlier insertion and the rule would not be idempotent.
    pub fn insert(
        name: &str,
        anchor: &str,
        snippet: &str,
        position: InsertPosition,
        marker: Option<String>,
    ) -> Result<Self> {
        if anchor.is_empty() {
            return Err(format!("transform '{name}': insert anchor must be non-empty").into());
        }
        if let Some(ref m) = marker {
            if !snippet.contains(m.as_str()) {
                return Err(format!(
                    "transform '{name}': presence marker must appear in the snippet"
                )
                .into());
            }
        }
        Ok(Self {
            name: name.to_string(),
            rule: Rule::Insert {
                anchor: anchor.to_string(),
                snippet: snippet.to_string(),
                position,
                marker,
            },
        })
    }

    /// The rule's name, used in reports and warnings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Applies this transform to `text`, returning the rewritten text (if it
    /// changed), the number of effective hits, and any soft warning.
    pub fn apply(&self, text: &str) -> Applied {
        match &self.rule {
            Rule::Replace {
                pattern,
                replacement,
            } => {
                let replaced = pattern.replace_all(text, replacement.as_str());
                if replaced == text {
                    Applied::unchanged()
                } else {
                    let hits = pattern.find_iter(text).count();
                    Applied::changed(replaced.into_owned(), hits)
                }
            }
            Rule::ReplaceComputed { pattern, compute } => {
                let replaced = pattern.replace_all(text, |caps: &Captures| compute(caps));
                if replaced == text {
                    Applied::unchanged()
                } else {
                    let hits = pattern.find_iter(text).count();
                    Applied::changed(replaced.into_owned(), hits)
                }
            }
            Rule::DeleteRegion { start, end } => delete_regions(text, start, end),
            Rule::Insert {
                anchor,
                snippet,
                position,
                marker,
            } => {
                let guard = marker.as_deref().unwrap_or(snippet.as_str());
                if text.contains(guard) {
                    return Applied::unchanged();
                }
                match text.find(anchor.as_str()) {
                    None => Applied::warned(format!("insert anchor '{anchor}' not found")),
                    Some(pos) => {
                        let at = match position {
                            InsertPosition::Before => pos,
                            InsertPosition::After => pos + anchor.len(),
                        };
                        let mut out = String::with_capacity(text.len() + snippet.len());
                        out.push_str(&text[..at]);
                        out.push_str(snippet);
                        out.push_str(&text[at..]);
                        Applied::changed(out, 1)
                    }
                }
            }
        }
    }
}

/// Removes every `start`..`end` span from `text`, inclusive of the markers.
///
/// The rule is all-or-nothing for a file: if any start marker has no matching
/// end marker after it, the whole input is returned unchanged with a warning,
/// so a malformed page is never half-edited or truncated to the marker.
fn delete_regions(text: &str, start: &str, end: &str) -> Applied {
    let mut out = String::new();
    let mut rest = text;
    let mut removed = 0;

    while let Some(s) = rest.find(start) {
        let tail = &rest[s + start.len()..];
        match tail.find(end) {
            Some(e) => {
                out.push_str(&rest[..s]);
                removed += 1;
                rest = &tail[e + end.len()..];
            }
            None => {
                return Applied::warned(format!(
                    "start marker '{start}' without matching end marker '{end}'"
                ));
            }
        }
    }

    if removed == 0 {
        Applied::unchanged()
    } else {
        out.push_str(rest);
        Applied::changed(out, removed)
    }
}

fn compile(pattern: &str, flags: MatchFlags) -> Result<Regex> {
    Ok(RegexBuilder::new(pattern)
        .case_insensitive(flags.case_insensitive)
        .dot_matches_new_line(flags.dot_matches_new_line)
        .multi_line(flags.multi_line)
        .build()?)
}

/// One transform's effect on one file, for the run report.
#[derive(Debug, Clone)]
pub struct TransformHit {
    /// The transform's name.
    pub name: String,
    /// How many edits it made.
    pub count: usize,
}

/// A soft, per-file failure of a single rule (missing anchor or end marker).
#[derive(Debug, Clone)]
pub struct RuleWarning {
    /// The transform that could not apply.
    pub transform: String,
    /// What went wrong.
    pub message: String,
}

/// The outcome of folding a whole pipeline over one file's text.
pub struct PipelineResult {
    /// The final text, or `None` when no transform changed anything. Note
    /// that `Some` text can still equal the original if later transforms
    /// undid earlier ones; callers decide persistence by comparing against
    /// the original.
    pub text: Option<String>,
    /// Transforms that made edits, in pipeline order.
    pub hits: Vec<TransformHit>,
    /// Soft warnings raised along the way.
    pub warnings: Vec<RuleWarning>,
}

/// An ordered list of transforms applied as a left fold.
///
/// Order is load-bearing: each transform sees the previous transform's
/// output, and the caller's ordering is preserved exactly. The fold itself
/// is pure; all file I/O lives in the rewriter.
pub struct Pipeline {
    transforms: Vec<Transform>,
}

impl Pipeline {
    pub fn new(transforms: Vec<Transform>) -> Self {
        Self { transforms }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Transform names in application order, for report headers.
    pub fn names(&self) -> Vec<String> {
        self.transforms.iter().map(|t| t.name().to_string()).collect()
    }

    /// Applies every transform in order to `original`.
    pub fn apply(&self, original: &str) -> PipelineResult {
        let mut current: Option<String> = None;
        let mut hits = Vec::new();
        let mut warnings = Vec::new();

        for transform in &self.transforms {
            let input = current.as_deref().unwrap_or(original);
            let applied = transform.apply(input);

            if let Some(message) = applied.warning {
                warnings.push(RuleWarning {
                    transform: transform.name().to_string(),
                    message,
                });
            }
            if applied.hits > 0 {
                hits.push(TransformHit {
                    name: transform.name().to_string(),
                    count: applied.hits,
                });
            }
            if let Some(text) = applied.text {
                current = Some(text);
            }
        }

        PipelineResult {
            text: current,
            hits,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> MatchFlags {
        MatchFlags::default()
    }

    #[test]
    fn replace_swaps_all_occurrences() {
        let t = Transform::replace("navy-bg", r"#fff\b", "#2C3E50", flags()).unwrap();
        let applied = t.apply(r#"<div style="background: #fff;">Hi</div> #fff"#);
        assert_eq!(
            applied.text.as_deref(),
            Some(r#"<div style="background: #2C3E50;">Hi</div> #2C3E50"#)
        );
        assert_eq!(applied.hits, 2);
    }

    #[test]
    fn replace_supports_capture_groups() {
        let t = Transform::replace(
            "swap-attr-order",
            r#"color:\s*#1e3a8a(["'])"#,
            "color: #2C3E50$1",
            flags(),
        )
        .unwrap();
        let applied = t.apply(r#"style="color: #1e3a8a""#);
        assert_eq!(applied.text.as_deref(), Some(r#"style="color: #2C3E50""#));
    }

    #[test]
    fn replace_case_insensitive_flag() {
        let f = MatchFlags {
            case_insensitive: true,
            ..MatchFlags::default()
        };
        let t = Transform::replace("bg", r"background:\s*#1E3A8A", "background: navy", f).unwrap();
        let applied = t.apply("background: #1e3a8a");
        assert_eq!(applied.text.as_deref(), Some("background: navy"));
    }

    #[test]
    fn replace_no_match_is_untouched() {
        let t = Transform::replace("noop", "absent", "x", flags()).unwrap();
        let applied = t.apply("some text");
        assert!(applied.text.is_none());
        assert_eq!(applied.hits, 0);
    }

    #[test]
    fn replace_identity_substitution_counts_as_unchanged() {
        let t = Transform::replace("same", "foo", "foo", flags()).unwrap();
        let applied = t.apply("foo bar foo");
        assert!(applied.text.is_none());
        assert_eq!(applied.hits, 0);
    }

    #[test]
    fn replace_converges_on_second_application() {
        let t = Transform::replace("hex", "#fff", "#2C3E50", flags()).unwrap();
        let once = t.apply("a #fff b").text.unwrap();
        let twice = t.apply(&once);
        assert!(twice.text.is_none());
    }

    #[test]
    fn replace_literal_escapes_metacharacters() {
        let t = Transform::replace_literal("ellipsis", "wait...", "wait&hellip;").unwrap();
        let applied = t.apply("wait... waitXYZ");
        assert_eq!(applied.text.as_deref(), Some("wait&hellip; waitXYZ"));
        assert_eq!(applied.hits, 1);
    }

    #[test]
    fn computed_replacement_sees_captures() {
        let t = Transform::replace_computed(
            "lowercase-hex",
            r"#([0-9A-Fa-f]{6})\b",
            flags(),
            Box::new(|caps: &Captures| format!("#{}", caps[1].to_lowercase())),
        )
        .unwrap();
        let applied = t.apply("color: #2C3E50; border: #f4a261;");
        assert_eq!(
            applied.text.as_deref(),
            Some("color: #2c3e50; border: #f4a261;")
        );
        assert_eq!(applied.hits, 2);
    }

    #[test]
    fn delete_region_removes_marked_span() {
        let t = Transform::delete_region("reviews", "<!-- BLOCK -->", "<!-- /BLOCK -->").unwrap();
        let applied = t.apply("before<!-- BLOCK --><p>x</p><!-- /BLOCK -->after");
        assert_eq!(applied.text.as_deref(), Some("beforeafter"));
        assert_eq!(applied.hits, 1);
        assert!(applied.warning.is_none());
    }

    #[test]
    fn delete_region_spans_multiple_lines_and_regions() {
        let t = Transform::delete_region("blocks", "<!-- A -->", "<!-- /A -->").unwrap();
        let input = "keep\n<!-- A -->\nline1\nline2\n<!-- /A -->\nmid\n<!-- A -->x<!-- /A -->\nend";
        let applied = t.apply(input);
        assert_eq!(applied.text.as_deref(), Some("keep\n\nmid\n\nend"));
        assert_eq!(applied.hits, 2);
    }

    #[test]
    fn delete_region_orphan_start_is_byte_for_byte_unchanged() {
        let t = Transform::delete_region("reviews", "<!-- BLOCK -->", "<!-- /BLOCK -->").unwrap();
        let input = "text <!-- BLOCK --> never closed";
        let applied = t.apply(input);
        assert!(applied.text.is_none());
        assert_eq!(applied.hits, 0);
        assert!(applied.warning.unwrap().contains("without matching end"));
    }

    #[test]
    fn delete_region_orphan_after_complete_pair_leaves_everything() {
        // All-or-nothing: one malformed region poisons the rule for the file.
        let t = Transform::delete_region("blocks", "<!-- A -->", "<!-- /A -->").unwrap();
        let input = "<!-- A -->x<!-- /A --> keep <!-- A --> orphan";
        let applied = t.apply(input);
        assert!(applied.text.is_none());
        assert!(applied.warning.is_some());
    }

    #[test]
    fn delete_region_is_idempotent() {
        let t = Transform::delete_region("blocks", "<!-- A -->", "<!-- /A -->").unwrap();
        let once = t.apply("a<!-- A -->x<!-- /A -->b").text.unwrap();
        assert!(t.apply(&once).text.is_none());
    }

    #[test]
    fn insert_before_anchor() {
        let t = Transform::insert(
            "analytics",
            "</head>",
            "<script>gtag()</script>\n",
            InsertPosition::Before,
            None,
        )
        .unwrap();
        let applied = t.apply("<head>\n</head><body></body>");
        assert_eq!(
            applied.text.as_deref(),
            Some("<head>\n<script>gtag()</script>\n</head><body></body>")
        );
        assert_eq!(applied.hits, 1);
    }

    #[test]
    fn insert_after_anchor() {
        let t = Transform::insert("note", "<body>", "<p>hi</p>", InsertPosition::After, None)
            .unwrap();
        let applied = t.apply("<body></body>");
        assert_eq!(applied.text.as_deref(), Some("<body><p>hi</p></body>"));
    }

    #[test]
    fn insert_skips_when_marker_already_present() {
        let t = Transform::insert(
            "analytics",
            "</head>",
            "<script src=\"gtag/js?id=G-12345\"></script>",
            InsertPosition::Before,
            Some("G-12345".to_string()),
        )
        .unwrap();
        let first = t.apply("<head></head>").text.unwrap();
        let second = t.apply(&first);
        assert!(second.text.is_none());
        assert!(second.warning.is_none());
    }

    #[test]
    fn insert_missing_anchor_warns_and_leaves_text() {
        let t = Transform::insert("x", "</head>", "snippet", InsertPosition::Before, None).unwrap();
        let applied = t.apply("no head closing tag here");
        assert!(applied.text.is_none());
        assert!(applied.warning.unwrap().contains("anchor"));
    }

    #[test]
    fn insert_rejects_marker_outside_snippet() {
        let result = Transform::insert(
            "bad",
            "</head>",
            "<script></script>",
            InsertPosition::Before,
            Some("not-in-snippet".to_string()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn pipeline_preserves_caller_order() {
        let a = Transform::replace("a", "foo", "bar", flags()).unwrap();
        let b = Transform::replace("b", "bar", "baz", flags()).unwrap();
        let forward = Pipeline::new(vec![a, b]);
        assert_eq!(forward.apply("foo").text.as_deref(), Some("baz"));

        let a = Transform::replace("a", "foo", "bar", flags()).unwrap();
        let b = Transform::replace("b", "bar", "baz", flags()).unwrap();
        let reversed = Pipeline::new(vec![b, a]);
        assert_eq!(reversed.apply("foo").text.as_deref(), Some("bar"));
    }

    #[test]
    fn pipeline_records_hits_in_order() {
        let p = Pipeline::new(vec![
            Transform::replace("first", "x", "y", flags()).unwrap(),
            Transform::replace("silent", "absent", "z", flags()).unwrap(),
            Transform::replace("second", "y", "y2", flags()).unwrap(),
        ]);
        let result = p.apply("x x");
        assert_eq!(result.text.as_deref(), Some("y2 y2"));
        let names: Vec<&str> = result.hits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(result.hits[0].count, 2);
    }

    #[test]
    fn pipeline_unchanged_input_yields_none() {
        let p = Pipeline::new(vec![
            Transform::replace("a", "absent", "x", flags()).unwrap(),
        ]);
        assert!(p.apply("text").text.is_none());
    }

    #[test]
    fn pipeline_collects_warnings_and_continues() {
        let p = Pipeline::new(vec![
            Transform::delete_region("orphan", "<!-- S -->", "<!-- E -->").unwrap(),
            Transform::replace("still-runs", "foo", "bar", flags()).unwrap(),
        ]);
        let result = p.apply("foo <!-- S --> unterminated");
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].transform, "orphan");
        assert_eq!(
            result.text.as_deref(),
            Some("bar <!-- S --> unterminated")
        );
    }
}
