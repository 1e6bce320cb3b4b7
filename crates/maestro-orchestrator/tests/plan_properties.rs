//! Plan validation over noisy generative output.
//!
//! Every decorated variant of a planner reply must either parse to a plan
//! whose workers are all available, or fail with `MalformedPlan` /
//! `InvalidStep`. Nothing else is acceptable.

use maestro_core::MaestroError;
use maestro_orchestrator::parse_plan;
use std::collections::BTreeSet;

fn available() -> BTreeSet<String> {
    ["greeting", "pos_tagger", "sentiment"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

const BODIES: &[&str] = &[
    r#"[{"agent": "sentiment", "input": "I love this"}]"#,
    r#"[{"agent": "sentiment", "input": "a"}, {"agent": "pos_tagger", "input": "b"}]"#,
    r#"[{"agent": "translator", "input": "hola"}]"#,
    r#"[{"agent": "sentiment ", "input": "padded name"}]"#,
    r#"[{"agent": "SENTIMENT", "input": "upper"}]"#,
    r#"[{"agent": "sentiment"}]"#,
    r#"[{"agent": null, "input": "x"}]"#,
    r#"{"agent": "sentiment", "input": "x"}"#,
    r#"[]"#,
    r#"[{"agent": "sentiment", "input": "x"},]"#,
    r#""sentiment""#,
];

fn decorations(body: &str) -> Vec<String> {
    vec![
        body.to_string(),
        format!("   \n{body}\n\t "),
        format!("```json\n{body}\n```"),
        format!("```\n{body}\n```"),
        format!("```json{body}```"),
        format!("```json\n{body}\n```\n\n"),
        format!("Here is the plan:\n```json\n{body}\n```"),
        format!("{body}\nLet me know if you need anything else."),
        format!("```json\n{body}\n```\nThis plan uses two agents."),
        format!("```json\n{body}"),
        format!("{body}\n```"),
    ]
}

#[test]
fn test_decorated_outputs_never_yield_unknown_workers() {
    let available = available();
    let mut accepted = 0;

    for body in BODIES {
        for raw in decorations(body) {
            match parse_plan(&raw, &available) {
                Ok(plan) => {
                    accepted += 1;
                    for step in &plan {
                        assert!(
                            available.contains(&step.worker),
                            "accepted unknown worker {:?} from {raw:?}",
                            step.worker
                        );
                    }
                }
                Err(MaestroError::MalformedPlan(_)) | Err(MaestroError::InvalidStep { .. }) => {}
                Err(other) => panic!("unexpected error kind {other:?} for {raw:?}"),
            }
        }
    }

    assert!(accepted > 0, "at least the clean variants must parse");
}

#[test]
fn test_fenced_and_whitespace_variants_agree_with_clean_body() {
    let available = available();
    for body in BODIES {
        let clean = parse_plan(body, &available);
        for raw in [
            format!("```json\n{body}\n```"),
            format!("\n\n  {body}  \n"),
            format!("```\n{body}\n```"),
        ] {
            let decorated = parse_plan(&raw, &available);
            match (&clean, &decorated) {
                (Ok(a), Ok(b)) => assert_eq!(a, b),
                (Err(a), Err(b)) => assert_eq!(
                    std::mem::discriminant(a),
                    std::mem::discriminant(b),
                    "{raw:?}"
                ),
                _ => panic!("{body:?} and {raw:?} disagree"),
            }
        }
    }
}

#[test]
fn test_trailing_prose_is_rejected() {
    let err = parse_plan(
        "[{\"agent\": \"sentiment\", \"input\": \"x\"}]\nHope this helps!",
        &available(),
    )
    .unwrap_err();
    assert!(matches!(err, MaestroError::MalformedPlan(_)));
}
