use crate::pipeline::schema::Pipeline;
use anyhow::{bail, Context, Result};
use std::path::Path;

/// Load and validate a pipeline override from a YAML file.
pub fn load_pipeline(path: &Path) -> Result<Pipeline> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_pipeline(&content)
}

/// Parse and validate a pipeline from a YAML string.
///
/// ```yaml
/// kind: rollback
/// phases:
///   - id: flag-issue
///     title: Flag the issue
///     effect: flag_issue
///     delay_ms: 200
///   - id: apply-rollback
///     title: Apply
///     effect: apply_rollback
/// ```
pub fn parse_pipeline(yaml: &str) -> Result<Pipeline> {
    let pipeline: Pipeline = serde_yaml::from_str(yaml).context("pipeline schema validation failed")?;
    validate_pipeline(&pipeline)?;
    Ok(pipeline)
}

pub fn validate_pipeline(pipeline: &Pipeline) -> Result<()> {
    // Rule 1: at least one phase
    if pipeline.phases.is_empty() {
        bail!("pipeline must have at least one phase");
    }

    // Rule 2: phase IDs must be unique kebab-case
    let mut seen_ids = std::collections::HashSet::new();
    for phase in &pipeline.phases {
        if !is_kebab_case(&phase.id) {
            bail!(
                "phase id must be kebab-case (lowercase letters, digits, hyphens), got: \"{}\"",
                phase.id
            );
        }
        if !seen_ids.insert(phase.id.as_str()) {
            bail!("duplicate phase id: \"{}\"", phase.id);
        }
    }

    // Rule 3: exactly one terminal effect, matching the kind, in last position
    let terminal = pipeline.kind.terminal_effect();
    let terminals: Vec<_> = pipeline
        .phases
        .iter()
        .filter(|p| p.effect.is_terminal())
        .collect();
    if terminals.len() != 1 || terminals[0].effect != terminal {
        bail!("{} pipeline must contain exactly one {terminal:?} phase", pipeline.kind);
    }
    if pipeline.phases.last().map(|p| p.effect) != Some(terminal) {
        bail!("{terminal:?} must be the last phase of a {} pipeline", pipeline.kind);
    }

    Ok(())
}

fn is_kebab_case(s: &str) -> bool {
    let Some(first) = s.bytes().next() else {
        return false;
    };
    if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
        return false;
    }
    !s.ends_with('-')
        && !s.contains("--")
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::schema::{PhaseEffect, PipelineKind};

    #[test]
    fn builtins_are_valid() {
        validate_pipeline(&Pipeline::feature_deployment()).unwrap();
        validate_pipeline(&Pipeline::rollback()).unwrap();
    }

    #[test]
    fn parse_short_rollback() {
        let yaml = r#"
kind: rollback
phases:
  - id: flag-issue
    title: Flag
    effect: flag_issue
    delay_ms: 200
  - id: apply-rollback
    title: Apply
    effect: apply_rollback
"#;
        let p = parse_pipeline(yaml).unwrap();
        assert_eq!(p.kind, PipelineKind::Rollback);
        assert_eq!(p.phases.len(), 2);
        assert_eq!(p.phases[0].delay_ms, Some(200));
        assert_eq!(p.phases[1].effect, PhaseEffect::ApplyRollback);
    }

    #[test]
    fn roundtrips_builtin_yaml() {
        let yaml = serde_yaml::to_string(&Pipeline::feature_deployment()).unwrap();
        assert_eq!(parse_pipeline(&yaml).unwrap(), Pipeline::feature_deployment());
    }

    #[test]
    fn rejects_empty() {
        let err = parse_pipeline("kind: rollback\nphases: []\n").unwrap_err();
        assert!(err.to_string().contains("at least one phase"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let yaml = r#"
kind: feature_deployment
phases:
  - { id: a, title: A, effect: create_branch }
  - { id: a, title: B, effect: apply_and_sync }
"#;
        let err = parse_pipeline(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate phase id"));
    }

    #[test]
    fn rejects_wrong_terminal() {
        let yaml = r#"
kind: feature_deployment
phases:
  - { id: a, title: A, effect: apply_rollback }
"#;
        assert!(parse_pipeline(yaml).is_err());
    }

    #[test]
    fn rejects_terminal_not_last() {
        let yaml = r#"
kind: rollback
phases:
  - { id: apply, title: A, effect: apply_rollback }
  - { id: flag, title: F, effect: flag_issue }
"#;
        let err = parse_pipeline(yaml).unwrap_err();
        assert!(err.to_string().contains("last phase"));
    }

    #[test]
    fn rejects_non_kebab_ids() {
        let yaml = r#"
kind: rollback
phases:
  - { id: Apply_Now, title: A, effect: apply_rollback }
"#;
        assert!(parse_pipeline(yaml).is_err());
    }

    #[test]
    fn unknown_effect_is_schema_error() {
        let yaml = r#"
kind: rollback
phases:
  - { id: x, title: X, effect: launch_rockets }
"#;
        let err = parse_pipeline(yaml).unwrap_err();
        assert!(err.to_string().contains("schema validation"));
    }

    #[test]
    fn kebab_case() {
        assert!(is_kebab_case("apply-and-sync"));
        assert!(is_kebab_case("phase2"));
        assert!(!is_kebab_case(""));
        assert!(!is_kebab_case("-lead"));
        assert!(!is_kebab_case("trail-"));
        assert!(!is_kebab_case("dou--ble"));
        assert!(!is_kebab_case("Upper"));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rollback.yaml");
        std::fs::write(
            &path,
            serde_yaml::to_string(&Pipeline::rollback().with_delay("flag-issue", 1)).unwrap(),
        )
        .unwrap();
        let p = load_pipeline(&path).unwrap();
        assert_eq!(p.phase("flag-issue").unwrap().delay_ms, Some(1));
    }
}
