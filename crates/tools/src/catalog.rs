//! The voice-agent tool catalogue: alarms,
//! reminders, notes, calendar events, weather/search lookups, email, and
//! app control. Each tool is a small `Tool` implementation operating on
//! the shared [`ToolStores`].

use std::collections::HashMap;
use std::sync::Arc;

use conductor_domain::error::{Error, Result};
use serde_json::{json, Value};

use crate::stores::{Alarm, CalendarEvent, Note, Reminder, ToolStores, new_id};

/// A single executable tool. `execute` receives already-extracted
/// arguments and returns a JSON result to surface back to the LLM/user.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self, args: Value) -> Result<Value>;
}

fn arg_str(args: &Value, key: &str) -> Result<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Other(format!("missing required argument '{key}'")))
}

fn opt_arg_str(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

macro_rules! simple_tool {
    ($struct_name:ident, $name:expr) => {
        pub struct $struct_name {
            stores: Arc<ToolStores>,
        }
        impl $struct_name {
            pub fn new(stores: Arc<ToolStores>) -> Self {
                Self { stores }
            }
        }
    };
}

// ── Read-only time tools ────────────────────────────────────────────

pub struct GetCurrentDatetime;
#[async_trait::async_trait]
impl Tool for GetCurrentDatetime {
    fn name(&self) -> &str {
        "get_current_datetime"
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        Ok(json!({ "datetime": chrono::Utc::now().to_rfc3339() }))
    }
}

pub struct GetDate;
#[async_trait::async_trait]
impl Tool for GetDate {
    fn name(&self) -> &str {
        "get_date"
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        Ok(json!({ "date": chrono::Utc::now().format("%Y-%m-%d").to_string() }))
    }
}

pub struct GetTime;
#[async_trait::async_trait]
impl Tool for GetTime {
    fn name(&self) -> &str {
        "get_time"
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        Ok(json!({ "time": chrono::Utc::now().format("%H:%M:%S").to_string() }))
    }
}

// ── Low-risk lookups ─────────────────────────────────────────────────

pub struct GetWeather;
#[async_trait::async_trait]
impl Tool for GetWeather {
    fn name(&self) -> &str {
        "get_weather"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let location = arg_str(&args, "location")?;
        Ok(json!({ "location": location, "summary": "weather lookup not wired to a live provider in this build" }))
    }
}

pub struct SearchWeb;
#[async_trait::async_trait]
impl Tool for SearchWeb {
    fn name(&self) -> &str {
        "search_web"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let query = arg_str(&args, "query")?;
        Ok(json!({ "query": query, "results": [] }))
    }
}

// ── Alarms ────────────────────────────────────────────────────────────

simple_tool!(ListAlarms, "list_alarms");
#[async_trait::async_trait]
impl Tool for ListAlarms {
    fn name(&self) -> &str {
        "list_alarms"
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        Ok(json!({ "alarms": self.stores.alarms.list() }))
    }
}

simple_tool!(SetAlarm, "set_alarm");
#[async_trait::async_trait]
impl Tool for SetAlarm {
    fn name(&self) -> &str {
        "set_alarm"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let time = arg_str(&args, "time")?;
        let label = opt_arg_str(&args, "label").unwrap_or_else(|| "alarm".to_string());
        let id = new_id();
        self.stores.alarms.insert(
            id.clone(),
            Alarm { id: id.clone(), label, time, created_at: chrono::Utc::now() },
        );
        Ok(json!({ "id": id }))
    }
}

simple_tool!(DeleteAlarm, "delete_alarm");
#[async_trait::async_trait]
impl Tool for DeleteAlarm {
    fn name(&self) -> &str {
        "delete_alarm"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let id = arg_str(&args, "id")?;
        let removed = self.stores.alarms.remove(&id).is_some();
        Ok(json!({ "removed": removed }))
    }
}

// ── Reminders ─────────────────────────────────────────────────────────

simple_tool!(ListReminders, "list_reminders");
#[async_trait::async_trait]
impl Tool for ListReminders {
    fn name(&self) -> &str {
        "list_reminders"
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        Ok(json!({ "reminders": self.stores.reminders.list() }))
    }
}

simple_tool!(SetReminder, "set_reminder");
#[async_trait::async_trait]
impl Tool for SetReminder {
    fn name(&self) -> &str {
        "set_reminder"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let text = arg_str(&args, "text")?;
        let due = opt_arg_str(&args, "due");
        let id = new_id();
        self.stores.reminders.insert(
            id.clone(),
            Reminder { id: id.clone(), text, due, created_at: chrono::Utc::now() },
        );
        Ok(json!({ "id": id }))
    }
}

simple_tool!(DeleteReminder, "delete_reminder");
#[async_trait::async_trait]
impl Tool for DeleteReminder {
    fn name(&self) -> &str {
        "delete_reminder"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let id = arg_str(&args, "id")?;
        let removed = self.stores.reminders.remove(&id).is_some();
        Ok(json!({ "removed": removed }))
    }
}

// ── Notes ─────────────────────────────────────────────────────────────

simple_tool!(ListNotes, "list_notes");
#[async_trait::async_trait]
impl Tool for ListNotes {
    fn name(&self) -> &str {
        "list_notes"
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        Ok(json!({ "notes": self.stores.notes.list() }))
    }
}

simple_tool!(ReadNote, "read_note");
#[async_trait::async_trait]
impl Tool for ReadNote {
    fn name(&self) -> &str {
        "read_note"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let id = arg_str(&args, "id")?;
        match self.stores.notes.get(&id) {
            Some(note) => Ok(json!(note)),
            None => Err(Error::Other(format!("note '{id}' not found"))),
        }
    }
}

simple_tool!(CreateNote, "create_note");
#[async_trait::async_trait]
impl Tool for CreateNote {
    fn name(&self) -> &str {
        "create_note"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let title = arg_str(&args, "title")?;
        let body = opt_arg_str(&args, "body").unwrap_or_default();
        let id = new_id();
        self.stores.notes.insert(
            id.clone(),
            Note { id: id.clone(), title, body, created_at: chrono::Utc::now() },
        );
        Ok(json!({ "id": id }))
    }
}

simple_tool!(DeleteNote, "delete_note");
#[async_trait::async_trait]
impl Tool for DeleteNote {
    fn name(&self) -> &str {
        "delete_note"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let id = arg_str(&args, "id")?;
        let removed = self.stores.notes.remove(&id).is_some();
        Ok(json!({ "removed": removed }))
    }
}

// ── Calendar ──────────────────────────────────────────────────────────

simple_tool!(ListCalendarEvents, "list_calendar_events");
#[async_trait::async_trait]
impl Tool for ListCalendarEvents {
    fn name(&self) -> &str {
        "list_calendar_events"
    }
    async fn execute(&self, _args: Value) -> Result<Value> {
        Ok(json!({ "events": self.stores.calendar.list() }))
    }
}

simple_tool!(CreateCalendarEvent, "create_calendar_event");
#[async_trait::async_trait]
impl Tool for CreateCalendarEvent {
    fn name(&self) -> &str {
        "create_calendar_event"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let title = arg_str(&args, "title")?;
        let when = arg_str(&args, "when")?;
        let id = new_id();
        self.stores.calendar.insert(
            id.clone(),
            CalendarEvent { id: id.clone(), title, when, created_at: chrono::Utc::now() },
        );
        Ok(json!({ "id": id }))
    }
}

simple_tool!(DeleteCalendarEvent, "delete_calendar_event");
#[async_trait::async_trait]
impl Tool for DeleteCalendarEvent {
    fn name(&self) -> &str {
        "delete_calendar_event"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let id = arg_str(&args, "id")?;
        let removed = self.stores.calendar.remove(&id).is_some();
        Ok(json!({ "removed": removed }))
    }
}

// ── Communication / app control ─────────────────────────────────────

pub struct SendEmail;
#[async_trait::async_trait]
impl Tool for SendEmail {
    fn name(&self) -> &str {
        "send_email"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let recipient = arg_str(&args, "recipient")?;
        let body = opt_arg_str(&args, "body").unwrap_or_default();
        tracing::info!(recipient = %recipient, body = %body, "send_email (no mail transport wired in this build)");
        Ok(json!({ "sent": true, "recipient": recipient }))
    }
}

pub struct OpenApp;
#[async_trait::async_trait]
impl Tool for OpenApp {
    fn name(&self) -> &str {
        "open_app"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let app_name = arg_str(&args, "app_name")?;
        Ok(json!({ "opened": app_name }))
    }
}

pub struct CloseApp;
#[async_trait::async_trait]
impl Tool for CloseApp {
    fn name(&self) -> &str {
        "close_app"
    }
    async fn execute(&self, args: Value) -> Result<Value> {
        let app_name = arg_str(&args, "app_name")?;
        Ok(json!({ "closed": app_name }))
    }
}

/// Builds the default catalogue: every tool in the §4.7 risk table, backed
/// by one shared [`ToolStores`].
pub fn default_catalog() -> HashMap<String, Arc<dyn Tool>> {
    let stores = Arc::new(ToolStores::new());
    let mut tools: HashMap<String, Arc<dyn Tool>> = HashMap::new();
    let mut register = |tool: Arc<dyn Tool>| {
        tools.insert(tool.name().to_string(), tool);
    };

    register(Arc::new(GetCurrentDatetime));
    register(Arc::new(GetDate));
    register(Arc::new(GetTime));
    register(Arc::new(GetWeather));
    register(Arc::new(SearchWeb));
    register(Arc::new(ListAlarms::new(stores.clone())));
    register(Arc::new(SetAlarm::new(stores.clone())));
    register(Arc::new(DeleteAlarm::new(stores.clone())));
    register(Arc::new(ListReminders::new(stores.clone())));
    register(Arc::new(SetReminder::new(stores.clone())));
    register(Arc::new(DeleteReminder::new(stores.clone())));
    register(Arc::new(ListNotes::new(stores.clone())));
    register(Arc::new(ReadNote::new(stores.clone())));
    register(Arc::new(CreateNote::new(stores.clone())));
    register(Arc::new(DeleteNote::new(stores.clone())));
    register(Arc::new(ListCalendarEvents::new(stores.clone())));
    register(Arc::new(CreateCalendarEvent::new(stores.clone())));
    register(Arc::new(DeleteCalendarEvent::new(stores.clone())));
    register(Arc::new(SendEmail));
    register(Arc::new(OpenApp));
    register(Arc::new(CloseApp));

    tools
}

/// Metadata for every tool in [`default_catalog`], in the shape the intent
/// classifier's fuzzy matcher needs. Kept alongside the catalog so the two
/// never drift: every name returned here has a matching executor above.
pub fn default_tool_metadata() -> Vec<conductor_intent::ToolMetadata> {
    use conductor_intent::ToolMetadata;
    use serde_json::json;

    vec![
        ToolMetadata::new(
            "get_current_datetime",
            "Get the current date and time",
            "datetime",
            &["date", "time", "now", "today"],
            &[],
            json!({"type": "object", "properties": {}}),
        ),
        ToolMetadata::new(
            "get_date",
            "Get today's date",
            "datetime",
            &["date", "today"],
            &[],
            json!({"type": "object", "properties": {}}),
        ),
        ToolMetadata::new(
            "get_time",
            "Get the current time",
            "datetime",
            &["time", "clock"],
            &[],
            json!({"type": "object", "properties": {}}),
        ),
        ToolMetadata::new(
            "get_weather",
            "Get the current weather forecast for a location",
            "search",
            &["weather", "forecast", "temperature"],
            &[],
            json!({"type": "object", "properties": {"location": {"type": "string"}}}),
        ),
        ToolMetadata::new(
            "search_web",
            "Search the web for information",
            "search",
            &["search", "look up", "find"],
            &[],
            json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        ),
        ToolMetadata::new(
            "list_alarms",
            "List all alarms currently set",
            "alarms",
            &["alarms", "list"],
            &[],
            json!({"type": "object", "properties": {}}),
        ),
        ToolMetadata::new(
            "set_alarm",
            "Set an alarm for a specific time",
            "alarms",
            &["set", "alarm", "wake"],
            &["time"],
            json!({"type": "object", "properties": {"time": {"type": "string"}, "label": {"type": "string"}}}),
        ),
        ToolMetadata::new(
            "delete_alarm",
            "Delete an existing alarm",
            "alarms",
            &["delete", "remove", "alarm", "cancel"],
            &["id"],
            json!({"type": "object", "properties": {"id": {"type": "string"}}}),
        ),
        ToolMetadata::new(
            "list_reminders",
            "List all reminders",
            "reminders",
            &["reminders", "list"],
            &[],
            json!({"type": "object", "properties": {}}),
        ),
        ToolMetadata::new(
            "set_reminder",
            "Create a reminder",
            "reminders",
            &["remind", "reminder", "set"],
            &["text"],
            json!({"type": "object", "properties": {"text": {"type": "string"}, "due": {"type": "string"}}}),
        ),
        ToolMetadata::new(
            "delete_reminder",
            "Delete an existing reminder",
            "reminders",
            &["delete", "remove", "reminder", "cancel"],
            &["id"],
            json!({"type": "object", "properties": {"id": {"type": "string"}}}),
        ),
        ToolMetadata::new(
            "list_notes",
            "List all saved notes",
            "notes",
            &["notes", "list"],
            &[],
            json!({"type": "object", "properties": {}}),
        ),
        ToolMetadata::new(
            "read_note",
            "Read the contents of a saved note",
            "notes",
            &["read", "note", "open"],
            &["id"],
            json!({"type": "object", "properties": {"id": {"type": "string"}}}),
        ),
        ToolMetadata::new(
            "create_note",
            "Create a new note",
            "notes",
            &["create", "note", "write", "save"],
            &["content"],
            json!({"type": "object", "properties": {"title": {"type": "string"}, "content": {"type": "string"}}}),
        ),
        ToolMetadata::new(
            "delete_note",
            "Delete an existing note",
            "notes",
            &["delete", "remove", "note"],
            &["id"],
            json!({"type": "object", "properties": {"id": {"type": "string"}}}),
        ),
        ToolMetadata::new(
            "list_calendar_events",
            "List upcoming calendar events",
            "calendar",
            &["calendar", "events", "schedule", "list"],
            &[],
            json!({"type": "object", "properties": {}}),
        ),
        ToolMetadata::new(
            "create_calendar_event",
            "Create a new calendar event",
            "calendar",
            &["create", "calendar", "event", "schedule"],
            &["title"],
            json!({"type": "object", "properties": {"title": {"type": "string"}, "when": {"type": "string"}, "location": {"type": "string"}}}),
        ),
        ToolMetadata::new(
            "delete_calendar_event",
            "Delete a calendar event",
            "calendar",
            &["delete", "remove", "calendar", "event", "cancel"],
            &["id"],
            json!({"type": "object", "properties": {"id": {"type": "string"}}}),
        ),
        ToolMetadata::new(
            "send_email",
            "Send an email to a recipient",
            "email",
            &["send", "email", "message"],
            &["recipient"],
            json!({"type": "object", "properties": {"recipient": {"type": "string"}, "body": {"type": "string"}}}),
        ),
        ToolMetadata::new(
            "open_app",
            "Open an application by name",
            "apps",
            &["open", "launch", "start"],
            &["app_name"],
            json!({"type": "object", "properties": {"app_name": {"type": "string"}}}),
        ),
        ToolMetadata::new(
            "close_app",
            "Close a running application by name",
            "apps",
            &["close", "quit", "stop"],
            &["app_name"],
            json!({"type": "object", "properties": {"app_name": {"type": "string"}}}),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_list_then_delete_alarm() {
        let stores = Arc::new(ToolStores::new());
        let set = SetAlarm::new(stores.clone());
        let result = set.execute(json!({ "time": "07:00", "label": "wake up" })).await.unwrap();
        let id = result["id"].as_str().unwrap().to_string();

        let list = ListAlarms::new(stores.clone());
        let listed = list.execute(json!({})).await.unwrap();
        assert_eq!(listed["alarms"].as_array().unwrap().len(), 1);

        let delete = DeleteAlarm::new(stores.clone());
        let deleted = delete.execute(json!({ "id": id })).await.unwrap();
        assert_eq!(deleted["removed"], json!(true));
    }

    #[tokio::test]
    async fn read_note_missing_returns_error() {
        let stores = Arc::new(ToolStores::new());
        let read = ReadNote::new(stores);
        let err = read.execute(json!({ "id": "nope" })).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn missing_required_arg_is_rejected() {
        let stores = Arc::new(ToolStores::new());
        let set = SetAlarm::new(stores);
        let err = set.execute(json!({})).await.unwrap_err();
        assert!(err.to_string().contains("time"));
    }

    #[test]
    fn default_catalog_covers_the_full_risk_table() {
        let catalog = default_catalog();
        for name in [
            "get_current_datetime", "get_date", "get_time", "get_weather", "search_web",
            "list_alarms", "set_alarm", "delete_alarm", "list_reminders", "set_reminder",
            "delete_reminder", "list_notes", "read_note", "create_note", "delete_note",
            "list_calendar_events", "create_calendar_event", "delete_calendar_event",
            "send_email", "open_app", "close_app",
        ] {
            assert!(catalog.contains_key(name), "missing tool {name}");
        }
    }

    #[test]
    fn metadata_names_match_catalog_names_exactly() {
        let catalog = default_catalog();
        let metadata = default_tool_metadata();
        assert_eq!(metadata.len(), catalog.len());
        for m in &metadata {
            assert!(catalog.contains_key(&m.name), "metadata for unknown tool {}", m.name);
        }
    }
}
