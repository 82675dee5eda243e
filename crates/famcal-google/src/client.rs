//! Google Calendar API client.

use chrono::{DateTime, Utc};
use famcal_core::{with_retry, GoogleConfig, RetryConfig};
use tracing::instrument;

use crate::error::GoogleError;
use crate::types::*;

/// Pages fetched per calendar before a listing is cut off.
const MAX_PAGES: usize = 20;

pub struct GoogleCalendarClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
    retry: RetryConfig,
}

/// Fields written back to Google. `None` leaves the field unchanged.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EventWrite<'a> {
    pub summary: Option<&'a str>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub description: Option<&'a str>,
    pub location: Option<&'a str>,
}

impl EventWrite<'_> {
    fn to_body(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        if let Some(s) = self.summary {
            body.insert("summary".to_string(), serde_json::Value::String(s.to_string()));
        }
        if let Some(s) = self.start {
            body.insert("start".to_string(), serde_json::json!({ "dateTime": s.to_rfc3339() }));
        }
        if let Some(e) = self.end {
            body.insert("end".to_string(), serde_json::json!({ "dateTime": e.to_rfc3339() }));
        }
        if let Some(d) = self.description {
            body.insert("description".to_string(), serde_json::Value::String(d.to_string()));
        }
        if let Some(l) = self.location {
            body.insert("location".to_string(), serde_json::Value::String(l.to_string()));
        }
        serde_json::Value::Object(body)
    }
}

impl GoogleCalendarClient {
    pub fn new(access_token: &str, base_url: &str, retry: RetryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
        }
    }

    /// Build from settings; fails when no access token is available.
    pub fn from_config(config: &GoogleConfig, retry: RetryConfig) -> Result<Self, GoogleError> {
        let token = config
            .access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(GoogleError::AuthRequired)?;
        Ok(Self::new(token, &config.api_base_url, retry))
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!(
            "{}/calendars/{}/events/{}",
            self.base_url,
            urlencoding::encode(calendar_id),
            urlencoding::encode(event_id),
        )
    }

    /// List all calendars visible to the account.
    #[instrument(skip(self), level = "info")]
    pub async fn list_calendars(&self) -> Result<Vec<GoogleCalendar>, GoogleError> {
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut url = format!("{}/users/me/calendarList", self.base_url);
            if let Some(pt) = &page_token {
                url.push_str(&format!("?pageToken={}", urlencoding::encode(pt)));
            }
            let auth = self.auth_header();
            let response = with_retry(&self.retry, || {
                self.client.get(&url).header("Authorization", &auth).send()
            })
            .await?;

            let resp: CalendarListResponse = self.handle_response(response).await?;
            calendars.extend(resp.items.into_iter().map(GoogleCalendar::from));
            match resp.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(calendars)
    }

    /// List one page of events from a calendar within a time range.
    #[instrument(skip(self), level = "info")]
    pub async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> Result<EventListResponse, GoogleError> {
        let mut url = format!(
            "{}/calendars/{}/events?timeMin={}&timeMax={}&singleEvents=true&orderBy=startTime&maxResults=250",
            self.base_url,
            urlencoding::encode(calendar_id),
            urlencoding::encode(&time_min.to_rfc3339()),
            urlencoding::encode(&time_max.to_rfc3339()),
        );
        if let Some(pt) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(pt)));
        }

        let auth = self.auth_header();
        let response = with_retry(&self.retry, || {
            self.client.get(&url).header("Authorization", &auth).send()
        })
        .await?;

        self.handle_response(response).await
    }

    /// Every event in the range, following page tokens.
    pub async fn list_all_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<ApiEvent>, GoogleError> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for page in 0..MAX_PAGES {
            let resp = self
                .list_events(calendar_id, time_min, time_max, page_token.as_deref())
                .await?;
            events.extend(resp.items);
            match resp.next_page_token {
                Some(next) if page + 1 < MAX_PAGES => page_token = Some(next),
                Some(_) => {
                    tracing::warn!(calendar_id, "Stopped paging Google events at page limit");
                    break;
                }
                None => break,
            }
        }
        Ok(events)
    }

    /// Create an event.
    #[instrument(skip(self, event), level = "info")]
    pub async fn create_event(
        &self,
        calendar_id: &str,
        event: &EventWrite<'_>,
    ) -> Result<ApiEvent, GoogleError> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id),
        );
        let body = event.to_body();
        let auth = self.auth_header();

        let response = with_retry(&self.retry, || {
            self.client
                .post(&url)
                .header("Authorization", &auth)
                .json(&body)
                .send()
        })
        .await?;

        self.handle_response(response).await
    }

    /// Patch an existing event.
    #[instrument(skip(self, changes), level = "info")]
    pub async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        changes: &EventWrite<'_>,
    ) -> Result<ApiEvent, GoogleError> {
        let url = self.event_url(calendar_id, event_id);
        let body = changes.to_body();
        let auth = self.auth_header();

        let response = with_retry(&self.retry, || {
            self.client
                .patch(&url)
                .header("Authorization", &auth)
                .json(&body)
                .send()
        })
        .await?;

        self.handle_response(response).await
    }

    /// Delete an event. An event that is already gone counts as deleted.
    #[instrument(skip(self), level = "info")]
    pub async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), GoogleError> {
        let url = self.event_url(calendar_id, event_id);
        let auth = self.auth_header();

        let response = with_retry(&self.retry, || {
            self.client
                .delete(&url)
                .header("Authorization", &auth)
                .send()
        })
        .await?;

        // Delete returns 204 No Content on success, 410 if already deleted
        let status = response.status();
        if status.is_success() || status.as_u16() == 410 {
            return Ok(());
        }
        self.handle_response::<serde_json::Value>(response)
            .await
            .map(|_| ())
    }

    /// Helper to handle API responses and errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, GoogleError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| GoogleError::ApiError(format!("JSON parse error: {}", e)))
        } else if status.as_u16() == 401 {
            Err(GoogleError::TokenExpired)
        } else if status.as_u16() == 403 {
            Err(GoogleError::AuthRequired)
        } else if status.as_u16() == 404 {
            let text = response.text().await.unwrap_or_default();
            Err(GoogleError::EventNotFound(text))
        } else if status.as_u16() == 409 || status.as_u16() == 412 {
            Err(GoogleError::Conflict)
        } else if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            Err(GoogleError::RateLimited(retry_after))
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(GoogleError::ApiError(format!("{}: {}", status, text)))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use chrono::TimeZone;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GoogleCalendarClient {
        GoogleCalendarClient::new("test_token", &server.uri(), RetryConfig::none())
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 10, 31, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_list_calendars() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .and(header("Authorization", "Bearer test_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {"id": "mom@example.com", "summary": "Mom", "primary": true, "accessRole": "owner"},
                    {"id": "family@group.calendar.google.com", "accessRole": "writer"}
                ]
            })))
            .mount(&mock_server)
            .await;

        let calendars = client(&mock_server).list_calendars().await.unwrap();

        assert_eq!(calendars.len(), 2);
        assert!(calendars[0].is_primary);
        assert_eq!(calendars[1].summary, "family@group.calendar.google.com");
        assert_eq!(calendars[1].access_role, AccessRole::Writer);
    }

    #[tokio::test]
    async fn test_list_all_events_follows_pages() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("pageToken", "p2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"id": "e2", "summary": "Second"}]
            })))
            .with_priority(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("singleEvents", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"id": "e1", "summary": "First"}],
                "nextPageToken": "p2"
            })))
            .with_priority(2)
            .mount(&mock_server)
            .await;

        let (min, max) = window();
        let events = client(&mock_server)
            .list_all_events("primary", min, max)
            .await
            .unwrap();

        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
    }

    #[tokio::test]
    async fn test_update_event_sends_only_changed_fields() {
        let mock_server = MockServer::start().await;
        let start = Utc.with_ymd_and_hms(2025, 10, 9, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 10, 9, 11, 0, 0).unwrap();

        Mock::given(method("PATCH"))
            .and(path("/calendars/primary/events/event123"))
            .and(body_json(serde_json::json!({
                "start": {"dateTime": start.to_rfc3339()},
                "end": {"dateTime": end.to_rfc3339()}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "event123",
                "start": {"dateTime": "2025-10-09T10:00:00Z"},
                "end": {"dateTime": "2025-10-09T11:00:00Z"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let changes = EventWrite {
            start: Some(start),
            end: Some(end),
            ..Default::default()
        };
        let updated = client(&mock_server)
            .update_event("primary", "event123", &changes)
            .await
            .unwrap();
        assert_eq!(updated.id, "event123");
    }

    #[tokio::test]
    async fn test_token_expired() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let result = client(&mock_server).list_calendars().await;
        assert!(matches!(result, Err(GoogleError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "60"))
            .mount(&mock_server)
            .await;

        let result = client(&mock_server).list_calendars().await;
        assert!(matches!(result, Err(GoogleError::RateLimited(60))));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/users/me/calendarList"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
            .with_priority(2)
            .mount(&mock_server)
            .await;

        let client = GoogleCalendarClient::new("t", &mock_server.uri(), RetryConfig::new(2, 1, 5));
        assert!(client.list_calendars().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_event() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/calendars/primary/events/event123"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/calendars/primary/events/gone"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server);
        assert!(client.delete_event("primary", "event123").await.is_ok());
        assert!(client.delete_event("primary", "gone").await.is_ok());
    }

    #[test]
    fn test_from_config_requires_token() {
        let mut config = GoogleConfig::default();
        config.access_token = None;
        assert!(matches!(
            GoogleCalendarClient::from_config(&config, RetryConfig::none()),
            Err(GoogleError::AuthRequired)
        ));
        config.access_token = Some("abc".to_string());
        assert!(GoogleCalendarClient::from_config(&config, RetryConfig::none()).is_ok());
    }
}
