use super::*;
use pretty_assertions::assert_eq;

#[test]
fn finish_merges_response_data() {
    let mut first = ResponseRecord::new("1", "Tool");
    first.merge_sign_id = Some("m".to_string());
    first.running_time = Some(1.25);
    let mut second = ResponseRecord::new("2", "Tool");
    second.merge_sign_id = Some("m".to_string());
    second.running_time = Some(0.5);

    let streamed = apply(
        streaming(),
        vec![
            StreamEvent::NodeResponse { record: first },
            StreamEvent::NodeResponse { record: second },
        ],
    );
    let (finished, effects) = finish_stream(&streamed);

    let turn = ai(&finished);
    assert_eq!(turn.status, ChatStatus::Finish);
    assert_eq!(turn.response_data.len(), 1);
    assert_eq!(turn.response_data[0].running_time, Some(1.75));
    assert_eq!(effects, vec![ChatEffect::ScrollToBottom { force: true }]);
}

#[test]
fn finish_reports_error_of_last_record() {
    let mut failing = ResponseRecord::new("1", "HTTP");
    failing.error = Some("request timed out".to_string());
    let streamed = apply(
        streaming(),
        vec![StreamEvent::NodeResponse { record: failing }],
    );

    let (_, effects) = finish_stream(&streamed);

    assert!(effects.iter().any(|effect| matches!(
        effect,
        ChatEffect::Notify(notification)
            if notification.level == NotifyLevel::Error
                && notification.message == "request timed out"
    )));
}

#[test]
fn fail_sets_error_and_finishes() {
    let streamed = apply(streaming(), vec![StreamEvent::text("par")]);

    let (failed, effects) = fail_stream(&streamed, "network down");

    let turn = ai(&failed);
    assert_eq!(turn.status, ChatStatus::Finish);
    assert_eq!(turn.error_msg.as_deref(), Some("network down"));
    assert_eq!(turn.text(), "par");
    assert_eq!(effects.len(), 1);
}

#[test]
fn abort_keeps_partial_content() {
    let streamed = apply(
        streaming(),
        vec![StreamEvent::reasoning("hmm"), StreamEvent::text("Partial")],
    );

    let aborted = abort_stream(&streamed);

    let turn = ai(&aborted);
    assert_eq!(turn.status, ChatStatus::Finish);
    assert_eq!(turn.value, ai(&streamed).value);
    assert_eq!(turn.error_msg, None);
}
