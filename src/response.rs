//! Multi-event responses and table aggregation
//!
//! Listing actions answer with `Response: Success` + `EventList: start`,
//! then a run of events sharing the action's `ActionID`, then an event whose
//! `EventList` (or name) says `Complete`. Some modules frame part of that run
//! as tables:
//!
//! ```text
//! TableStart (TableName: Devices)
//!   DeviceEntry
//!   DeviceEntry
//! TableEnd   (TableName: Devices)
//! ```
//!
//! [`ComplexResponse::add_event`] folds each framed run into a [`Table`] and
//! keeps everything else as plain events.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    action::Response,
    error::{AmiError, AmiResult},
    event::{AmiEvent, EventType},
    headers::MessageKey,
};

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| {
        h.to_lowercase()
            .contains(needle)
    })
}

/// Events collected between a `TableStart` and its `TableEnd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    name: String,
    entries: Vec<AmiEvent>,
}

impl Table {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// `TableName` of the framing events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entries in delivery order.
    pub fn entries(&self) -> &[AmiEvent] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries
            .len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries
            .is_empty()
    }
}

/// A response assembled from its opening reply and the events that follow.
#[derive(Debug, Clone)]
pub struct ComplexResponse {
    response: Response,
    events: Vec<AmiEvent>,
    tables: Vec<Table>,
    pending_table: Option<Table>,
    completed: bool,
}

impl ComplexResponse {
    /// Start collecting events for `response`.
    pub fn new(response: Response) -> Self {
        Self {
            response,
            events: Vec::new(),
            tables: Vec::new(),
            pending_table: None,
            completed: false,
        }
    }

    /// Whether `event` belongs to this response, by `ActionID`.
    ///
    /// A response without an `ActionID` accepts every event.
    pub fn accepts(&self, event: &AmiEvent) -> bool {
        match self
            .response
            .action_id()
        {
            Some(id) => event.action_id() == Some(id),
            None => true,
        }
    }

    /// Fold one event into the response, in delivery order.
    ///
    /// List markers (`EventList: start`/`Complete`, or a name containing
    /// `Complete`) are not stored. Events outside the catalog always go to
    /// the plain event list, even inside a table. A marker still completes the
    /// response.
    ///
    /// Fails with [`AmiError::TableSequence`] on a `TableStart` while another
    /// table is open, or a `TableEnd` with none open; the response is left as
    /// it was before the call.
    pub fn add_event(&mut self, event: AmiEvent) -> AmiResult<()> {
        let list = event.event_list();
        let name = Some(event.name());
        let is_marker = contains_ignore_case(list, "start")
            || contains_ignore_case(list, "complete")
            || contains_ignore_case(name, "complete");
        let completes =
            contains_ignore_case(list, "complete") || contains_ignore_case(name, "complete");

        if !is_marker {
            self.add_payload(event)?;
        }

        if completes && !self.completed {
            debug!(
                "Response complete: {} events, {} tables",
                self.events
                    .len(),
                self.tables
                    .len()
            );
            self.completed = true;
        }
        Ok(())
    }

    fn add_payload(&mut self, event: AmiEvent) -> AmiResult<()> {
        if event.is_unknown() {
            self.events
                .push(event);
            return Ok(());
        }

        if event.is_event_type(EventType::TableStart) {
            let table_name = event
                .table_name()
                .unwrap_or("");
            if let Some(open) = &self.pending_table {
                warn!(
                    "TableStart '{}' while table '{}' is still open",
                    table_name,
                    open.name()
                );
                return Err(AmiError::TableSequence(format!(
                    "table '{}' started before table '{}' ended",
                    table_name,
                    open.name()
                )));
            }
            self.pending_table = Some(Table::new(table_name));
        } else if event.is_event_type(EventType::TableEnd) {
            let table_name = event
                .table_name()
                .unwrap_or("")
                .to_string();
            let Some(mut table) = self
                .pending_table
                .take()
            else {
                warn!("TableEnd '{}' without a matching TableStart", table_name);
                return Err(AmiError::TableSequence(format!(
                    "table '{}' ended but was never started",
                    table_name
                )));
            };
            if table.name != table_name {
                warn!(
                    "TableEnd '{}' closes table started as '{}'",
                    table_name, table.name
                );
            }
            table.name = table_name;
            match self
                .tables
                .iter_mut()
                .find(|t| t.name == table.name)
            {
                Some(existing) => *existing = table,
                None => self
                    .tables
                    .push(table),
            }
        } else if let Some(table) = self
            .pending_table
            .as_mut()
        {
            table
                .entries
                .push(event);
        } else {
            self.events
                .push(event);
        }
        Ok(())
    }

    /// Whether a `Complete` marker has been seen.
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Whether at least one table was sealed.
    pub fn has_table(&self) -> bool {
        !self
            .tables
            .is_empty()
    }

    /// Table names in the order their `TableEnd` arrived.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables
            .iter()
            .map(|t| t.name())
            .collect()
    }

    /// Table by name.
    pub fn table(&self, name: &str) -> AmiResult<&Table> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| AmiError::NoSuchTable(name.to_string()))
    }

    /// All sealed tables.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Events not attributed to any table.
    pub fn events(&self) -> &[AmiEvent] {
        &self.events
    }

    /// The reply that opened this response.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Decoded `JSON` key of the opening reply.
    ///
    /// Fails with [`AmiError::NoJsonPayload`] when the key is absent, empty,
    /// not valid JSON, or decodes to a falsy value: `null`, `false`, `0`,
    /// `""`, `"0"`, `[]` or `{}`.
    pub fn json(&self) -> AmiResult<serde_json::Value> {
        match serde_json::from_str::<serde_json::Value>(self.json_text()?) {
            Ok(value) if !is_falsy(&value) => Ok(value),
            _ => Err(AmiError::NoJsonPayload),
        }
    }

    /// Deserialize the `JSON` key into `T`.
    ///
    /// A missing or empty key is [`AmiError::NoJsonPayload`]; text that does
    /// not deserialize into `T` is [`AmiError::Json`].
    pub fn json_as<T: DeserializeOwned>(&self) -> AmiResult<T> {
        Ok(serde_json::from_str(self.json_text()?)?)
    }

    fn json_text(&self) -> AmiResult<&str> {
        self.response
            .key(MessageKey::Json)
            .filter(|s| !s.trim().is_empty())
            .ok_or(AmiError::NoJsonPayload)
    }
}

/// Values that carry no payload.
fn is_falsy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}
