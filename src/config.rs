use crate::errors::Result;
use crate::transform::{InsertPosition, MatchFlags, Pipeline, Transform};
use serde::Deserialize;
use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A named pattern used by the read-only checker.
#[derive(Deserialize)]
pub struct NamedPattern {
    /// The name of the pattern, echoed in match output.
    pub name: String,
    /// The regex pattern string.
    pub pattern: String,
}

/// Configuration for the `check` command: a list of named patterns.
///
/// ```yaml
/// patterns:
///   - name: leftover_reviews
///     pattern: 'Leave a Review|review-section'
///   - name: old_analytics_id
///     pattern: 'G-OLDID123'
/// ```
#[derive(Deserialize)]
pub struct CheckConfig {
    pub patterns: Vec<NamedPattern>,
}

/// Configuration for the `rewrite` command: an ordered transform pipeline.
///
/// Order in the `transforms` list is the order of application; many rules
/// only make sense after an earlier rule has already run, so the list is
/// never reordered or deduplicated.
///
/// ```yaml
/// transforms:
///   - name: navy-header
///     replace:
///       pattern: 'background:\s*#1e3a8a'
///       replacement: 'background: #2C3E50'
///       case_insensitive: true
///   - name: strip-review-block
///     delete_region:
///       start: '<!-- REVIEWS -->'
///       end: '<!-- /REVIEWS -->'
///   - name: analytics
///     insert:
///       anchor: '</head>'
///       position: before
///       snippet: '<script async src="https://example.com/tag.js"></script>'
/// extensions: [html, htm]
/// exclude: [node_modules, dist]
/// ```
#[derive(Deserialize, Clone)]
pub struct PipelineConfig {
    /// The ordered list of rewriting rules.
    pub transforms: Vec<TransformSpec>,
    /// File extensions to process; falls back to the command-line list.
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
    /// Directory names to exclude from the walk.
    #[serde(default)]
    pub exclude: Option<Vec<String>>,
}

/// One named rule in a pipeline file.
#[derive(Deserialize, Clone)]
pub struct TransformSpec {
    /// The rule's name, used in reports and warnings.
    pub name: String,
    #[serde(flatten)]
    pub rule: RuleSpec,
}

/// The serializable subset of rule kinds. Computed replacements are
/// library-only since a YAML file cannot carry a closure.
#[derive(Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub enum RuleSpec {
    Replace {
        pattern: String,
        replacement: String,
        #[serde(default)]
        case_insensitive: bool,
        #[serde(default)]
        dot_matches_new_line: bool,
        #[serde(default)]
        multi_line: bool,
    },
    DeleteRegion {
        start: String,
        end: String,
    },
    Insert {
        anchor: String,
        snippet: String,
        #[serde(default)]
        position: InsertPosition,
        #[serde(default)]
        marker: Option<String>,
    },
}

impl TransformSpec {
    /// Compiles this spec into a ready-to-apply transform.
    pub fn compile(&self) -> Result<Transform> {
        match &self.rule {
            RuleSpec::Replace {
                pattern,
                replacement,
                case_insensitive,
                dot_matches_new_line,
                multi_line,
            } => Transform::replace(
                &self.name,
                pattern,
                replacement,
                MatchFlags {
                    case_insensitive: *case_insensitive,
                    dot_matches_new_line: *dot_matches_new_line,
                    multi_line: *multi_line,
                },
            ),
            RuleSpec::DeleteRegion { start, end } => {
                Transform::delete_region(&self.name, start, end)
            }
            RuleSpec::Insert {
                anchor,
                snippet,
                position,
                marker,
            } => Transform::insert(&self.name, anchor, snippet, *position, marker.clone()),
        }
    }
}

impl PipelineConfig {
    /// Compiles the whole ordered transform list. Any invalid pattern or
    /// marker aborts compilation so a broken rule never reaches a file.
    pub fn compile(&self) -> Result<Pipeline> {
        let transforms: Vec<Transform> = self
            .transforms
            .iter()
            .map(TransformSpec::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Pipeline::new(transforms))
    }
}

/// A utility for locating and loading pipeline and pattern files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Finds a configuration file by searching a prioritized list of
    /// locations:
    ///
    /// 1. The path as given (absolute, or relative to the current directory).
    /// 2. Relative to the target root directory.
    /// 3. Inside `~/.sitefix/`.
    pub fn find_config(config_path: &Path, root: &Path) -> Result<PathBuf> {
        if config_path.exists() {
            return Ok(config_path.to_path_buf());
        }

        let in_root = root.join(config_path);
        if in_root.exists() {
            return Ok(in_root);
        }

        let mut tried = vec![
            config_path.display().to_string(),
            in_root.display().to_string(),
        ];

        if let Some(home) = env::var_os("HOME") {
            let home_config = PathBuf::from(home).join(".sitefix").join(config_path);
            if home_config.exists() {
                return Ok(home_config);
            }
            tried.push(home_config.display().to_string());
        }

        Err(format!(
            "Config file '{}' not found. Searched in:\n  - {}",
            config_path.display(),
            tried.join("\n  - ")
        )
        .into())
    }

    /// Loads a `PipelineConfig` from a YAML file.
    pub fn load_pipeline_config(path: &Path) -> Result<PipelineConfig> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }

    /// Loads a `CheckConfig` from a YAML file.
    pub fn load_check_config(path: &Path) -> Result<CheckConfig> {
        let file = File::open(path)?;
        Ok(serde_yaml::from_reader(file)?)
    }
}
