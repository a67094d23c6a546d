use super::*;
use pretty_assertions::assert_eq;

#[test]
fn node_status_overwrites_status_and_module_name() {
    let transcript = apply(
        streaming(),
        vec![
            StreamEvent::NodeStatus {
                status: ChatStatus::Running,
                name: Some("Dataset search".to_string()),
            },
            StreamEvent::NodeStatus {
                status: ChatStatus::Running,
                name: Some("LLM".to_string()),
            },
        ],
    );

    let turn = ai(&transcript);
    assert_eq!(turn.status, ChatStatus::Running);
    assert_eq!(turn.module_name.as_deref(), Some("LLM"));
    assert_eq!(turn.value, vec![ContentBlock::text("")]);
}

#[test]
fn node_responses_accumulate_in_arrival_order() {
    let transcript = apply(
        streaming(),
        vec![
            StreamEvent::NodeResponse {
                record: ResponseRecord::new("1", "Start"),
            },
            StreamEvent::NodeResponse {
                record: ResponseRecord::new("2", "LLM"),
            },
        ],
    );

    let ids: Vec<&str> = ai(&transcript)
        .response_data
        .iter()
        .map(|record| record.id.as_str())
        .collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[test]
fn duration_rounds_at_every_step() {
    let transcript = apply(
        streaming(),
        vec![
            StreamEvent::DurationDelta { seconds: 1.005 },
            StreamEvent::DurationDelta { seconds: 2.003 },
        ],
    );

    assert_eq!(ai(&transcript).duration_seconds, Some(3.01));
}

#[test]
fn first_duration_is_stored_as_reported() {
    let transcript = apply(streaming(), vec![StreamEvent::DurationDelta { seconds: 1.005 }]);
    assert_eq!(ai(&transcript).duration_seconds, Some(1.005));
}

#[test]
fn zero_duration_delta_is_ignored() {
    let before = apply(streaming(), vec![StreamEvent::DurationDelta { seconds: 1.005 }]);

    let (after, effects) = reduce(&before, StreamEvent::DurationDelta { seconds: 0.0 });

    assert!(effects.is_empty());
    assert_unchanged(&before, &after);
    assert_eq!(ai(&after).duration_seconds, Some(1.005));
    assert_eq!(crate::reducer::accumulate_duration(Some(1.005), 0.0), Some(1.005));
    assert_eq!(crate::reducer::accumulate_duration(None, 0.0), None);
}

#[test]
fn variables_update_is_a_side_channel() {
    let before = streaming();
    let variables = std::collections::BTreeMap::from([(
        "city".to_string(),
        serde_json::json!("Lisbon"),
    )]);

    let (after, effects) = reduce(
        &before,
        StreamEvent::VariablesUpdate {
            variables: variables.clone(),
        },
    );

    assert_unchanged(&before, &after);
    assert_eq!(effects, vec![ChatEffect::UpdateVariables(variables)]);
}

#[test]
fn end_to_end_answer_then_finish_status() {
    let transcript = apply(
        streaming(),
        vec![StreamEvent::text("He"), StreamEvent::text("llo")],
    );
    assert_eq!(ai(&transcript).value, vec![ContentBlock::text("Hello")]);

    let transcript = apply(
        transcript,
        vec![StreamEvent::NodeStatus {
            status: ChatStatus::Finish,
            name: Some("LLM".to_string()),
        }],
    );
    let turn = ai(&transcript);
    assert_eq!(turn.status, ChatStatus::Finish);
    assert_eq!(turn.module_name.as_deref(), Some("LLM"));
}
