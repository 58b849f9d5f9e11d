mod common;

use asterisk_ami_tokio::{collect_response, Action, AmiError, EventType};
use common::{emit_later, response, FakeSwitch};
use std::time::Duration;

fn device_list_switch() -> std::sync::Arc<FakeSwitch> {
    FakeSwitch::new(|action, listeners| {
        let id = action
            .action_id()
            .unwrap()
            .to_string();
        let blocks = vec![
            format!("Event: TableStart\r\nActionID: {id}\r\nTableName: Devices\r\n"),
            format!("Event: DeviceStateChange\r\nActionID: {id}\r\nDevice: SIP/100\r\nState: INUSE\r\n"),
            "Event: DeviceStateChange\r\nActionID: someone-else\r\nDevice: SIP/300\r\n".to_string(),
            format!("Event: DeviceStateChange\r\nActionID: {id}\r\nDevice: SIP/200\r\nState: NOT_INUSE\r\n"),
            format!("Event: TableEnd\r\nActionID: {id}\r\nTableName: Devices\r\n"),
            format!("Event: CustomThing\r\nActionID: {id}\r\nFoo: bar\r\n"),
            format!("Event: DeviceListComplete\r\nActionID: {id}\r\nEventList: Complete\r\nListItems: 2\r\n"),
        ];
        emit_later(listeners, Duration::from_millis(5), blocks);
        response(&format!(
            "Response: Success\r\nActionID: {id}\r\nEventList: start\r\nMessage: Device list will follow\r\nJSON: {{\"devices\":2}}\r\n"
        ))
    })
}

#[tokio::test]
async fn list_action_collects_tables_and_events() {
    let switch = device_list_switch();
    let action = Action::new("DeviceStateList").unwrap();
    let complex = collect_response(&*switch, action, Duration::from_secs(2))
        .await
        .unwrap();

    assert!(complex.is_complete());
    assert_eq!(complex.table_names(), vec!["Devices"]);
    let devices = complex
        .table("Devices")
        .unwrap();
    assert_eq!(devices.len(), 2);
    assert!(devices
        .entries()
        .iter()
        .all(|e| e.is_event_type(EventType::DeviceStateChange)));
    assert_eq!(devices.entries()[1].key("device"), Some("SIP/200"));

    assert_eq!(complex.events().len(), 1);
    assert_eq!(complex.events()[0].name(), "CustomThing");
    assert_eq!(complex.json().unwrap()["devices"], 2);

    // The stream used for collection is gone again.
    assert!(switch
        .listeners_handle()
        .is_empty());
}

#[tokio::test]
async fn generated_action_id_is_sent() {
    let switch = device_list_switch();
    collect_response(
        &*switch,
        Action::new("DeviceStateList").unwrap(),
        Duration::from_secs(2),
    )
    .await
    .unwrap();
    let sent = switch.sent();
    assert!(sent[0]
        .action_id()
        .is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn plain_response_needs_no_events() {
    let switch = FakeSwitch::new(|action, _| {
        response(&format!(
            "Response: Success\r\nActionID: {}\r\nPing: Pong\r\n",
            action
                .action_id()
                .unwrap()
        ))
    });
    let complex = collect_response(
        &*switch,
        Action::new("Ping")
            .unwrap()
            .with_action_id("p1")
            .unwrap(),
        Duration::from_secs(1),
    )
    .await
    .unwrap();
    assert!(!complex.has_table());
    assert!(complex
        .events()
        .is_empty());
    assert_eq!(complex.response().key("ping"), Some("Pong"));
    assert!(matches!(complex.json(), Err(AmiError::NoJsonPayload)));
}

#[tokio::test]
async fn error_response_fails() {
    let switch = FakeSwitch::new(|_, _| {
        response("Response: Error\r\nMessage: Permission denied\r\n")
    });
    let err = collect_response(
        &*switch,
        Action::new("Status").unwrap(),
        Duration::from_secs(1),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AmiError::ActionFailed(msg) if msg == "Permission denied"));
}

#[tokio::test]
async fn unfinished_list_times_out() {
    let switch = FakeSwitch::new(|action, listeners| {
        let id = action
            .action_id()
            .unwrap()
            .to_string();
        emit_later(
            listeners,
            Duration::from_millis(5),
            vec![format!("Event: PeerEntry\r\nActionID: {id}\r\nObjectName: 100\r\n")],
        );
        response(&format!("Response: Success\r\nActionID: {id}\r\nEventList: start\r\n"))
    });
    let err = collect_response(
        &*switch,
        Action::new("SIPpeers").unwrap(),
        Duration::from_millis(100),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AmiError::CommandTimeout { .. }));
}
