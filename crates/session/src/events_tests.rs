// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;
use uuid::Uuid;

use super::SessionEvent;

#[test]
fn refresh_failed_wire_name() -> anyhow::Result<()> {
    let session = Uuid::new_v4();
    let event = SessionEvent::RefreshFailed {
        session: Some(session),
        error: "refresh rejected (401): invalid_grant".to_owned(),
        rejected: true,
    };
    let value = serde_json::to_value(&event)?;
    assert_eq!(value["event"], "refresh:failed");
    assert_eq!(value["session"], session.to_string());
    assert_eq!(value["rejected"], true);
    Ok(())
}

#[test]
fn optional_fields_are_omitted() -> anyhow::Result<()> {
    let value = serde_json::to_value(SessionEvent::LoggedOut { session: None })?;
    assert_eq!(value, json!({ "event": "logged_out" }));

    let value =
        serde_json::to_value(SessionEvent::Refreshed { session: None, expires_in_secs: None })?;
    assert_eq!(value, json!({ "event": "refreshed" }));
    Ok(())
}

#[test]
fn parses_logged_in() -> anyhow::Result<()> {
    let session = Uuid::new_v4();
    let event: SessionEvent =
        serde_json::from_value(json!({ "event": "logged_in", "session": session }))?;
    assert_eq!(event, SessionEvent::LoggedIn { session });
    Ok(())
}
