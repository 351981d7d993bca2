use std::collections::BTreeMap;

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;

use crate::config::Config;
use crate::session::Session;
use crate::user_id::UserId;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("homeserver url {0} cannot carry a path")]
    BaseUrl(String),
    #[error("unexpected status: {0}")]
    Status(u16),
    #[error("{errcode}: {error} (status {status})")]
    Matrix {
        status: u16,
        errcode: String,
        error: String,
    },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        match self {
            ApiError::Matrix { errcode, status, .. } => errcode == "M_NOT_FOUND" || *status == 404,
            ApiError::Status(status) => *status == 404,
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MatrixErrorBody {
    errcode: String,
    #[serde(default)]
    error: String,
}

pub fn http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .danger_accept_invalid_certs(config.insecure)
        .build()
}

/// One call against the homeserver, relative to its base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, segments: &[&str]) -> Self {
        Self {
            method,
            segments: segments.iter().map(|segment| segment.to_string()).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(segments: &[&str]) -> Self {
        Self::new(Method::GET, segments)
    }

    pub fn post(segments: &[&str], body: Value) -> Self {
        Self::new(Method::POST, segments).body(body)
    }

    pub fn put(segments: &[&str], body: Value) -> Self {
        Self::new(Method::PUT, segments).body(body)
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    /// Unencoded path, used for logging and by test doubles.
    pub fn path(&self) -> String {
        self.segments.join("/")
    }
}

/// The authenticated handle every leaf command talks through.
///
/// Implementors only provide `request`; the typed calls are layered on top so
/// a test double can answer with canned JSON per path.
pub trait Homeserver {
    /// Base URL every request is resolved against.
    fn homeserver(&self) -> &Url;

    async fn request(&self, request: ApiRequest) -> Result<Value, ApiError>;

    async fn call<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let value = self.request(request).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn login(
        &self,
        user: &UserId,
        password: &str,
        device_name: &str,
    ) -> Result<LoginResponse, ApiError> {
        let body = json!({
            "type": "m.login.password",
            "identifier": { "type": "m.id.user", "user": user.as_str() },
            "password": password,
            "initial_device_display_name": device_name,
        });
        self.call(ApiRequest::post(&["_matrix", "client", "v3", "login"], body))
            .await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.request(ApiRequest::post(&["_matrix", "client", "v3", "logout"], json!({})))
            .await?;
        Ok(())
    }

    async fn whoami(&self) -> Result<WhoamiResponse, ApiError> {
        self.call(ApiRequest::get(&["_matrix", "client", "v3", "account", "whoami"]))
            .await
    }

    async fn versions(&self) -> Result<VersionsResponse, ApiError> {
        self.call(ApiRequest::get(&["_matrix", "client", "versions"]))
            .await
    }

    async fn joined_rooms(&self) -> Result<Vec<String>, ApiError> {
        let rooms: JoinedRooms = self
            .call(ApiRequest::get(&["_matrix", "client", "v3", "joined_rooms"]))
            .await?;
        Ok(rooms.joined_rooms)
    }

    async fn room_name(&self, room_id: &str) -> Result<Option<String>, ApiError> {
        let request = ApiRequest::get(&[
            "_matrix", "client", "v3", "rooms", room_id, "state", "m.room.name", "",
        ]);
        match self.call::<RoomNameContent>(request).await {
            Ok(content) => Ok(content.name.filter(|name| !name.is_empty())),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn joined_members(&self, room_id: &str) -> Result<BTreeMap<String, RoomMember>, ApiError> {
        let members: JoinedMembers = self
            .call(ApiRequest::get(&[
                "_matrix", "client", "v3", "rooms", room_id, "joined_members",
            ]))
            .await?;
        Ok(members.joined)
    }

    async fn create_room(&self, input: &CreateRoomInput) -> Result<String, ApiError> {
        let body = serde_json::to_value(input)?;
        let created: RoomIdResponse = self
            .call(ApiRequest::post(&["_matrix", "client", "v3", "createRoom"], body))
            .await?;
        Ok(created.room_id)
    }

    async fn join_room(&self, room_id_or_alias: &str) -> Result<String, ApiError> {
        let joined: RoomIdResponse = self
            .call(ApiRequest::post(
                &["_matrix", "client", "v3", "join", room_id_or_alias],
                json!({}),
            ))
            .await?;
        Ok(joined.room_id)
    }

    async fn invite(&self, room_id: &str, user_id: &str) -> Result<(), ApiError> {
        self.request(ApiRequest::post(
            &["_matrix", "client", "v3", "rooms", room_id, "invite"],
            json!({ "user_id": user_id }),
        ))
        .await?;
        Ok(())
    }

    async fn leave(&self, room_id: &str) -> Result<(), ApiError> {
        self.request(ApiRequest::post(
            &["_matrix", "client", "v3", "rooms", room_id, "leave"],
            json!({}),
        ))
        .await?;
        Ok(())
    }

    async fn forget(&self, room_id: &str) -> Result<(), ApiError> {
        self.request(ApiRequest::post(
            &["_matrix", "client", "v3", "rooms", room_id, "forget"],
            json!({}),
        ))
        .await?;
        Ok(())
    }

    /// Newest `limit` events, newest first as the server returns them.
    async fn messages(&self, room_id: &str, limit: u32) -> Result<Vec<RoomEvent>, ApiError> {
        let request = ApiRequest::get(&["_matrix", "client", "v3", "rooms", room_id, "messages"])
            .query("dir", "b")
            .query("limit", limit);
        let page: MessagesResponse = self.call(request).await?;
        Ok(page.chunk)
    }

    /// Sends an `m.room.message` event; `content` carries the msgtype.
    async fn send_message(&self, room_id: &str, txn_id: &str, content: Value) -> Result<String, ApiError> {
        let sent: EventIdResponse = self
            .call(ApiRequest::put(
                &[
                    "_matrix", "client", "v3", "rooms", room_id, "send", "m.room.message", txn_id,
                ],
                content,
            ))
            .await?;
        Ok(sent.event_id)
    }

    async fn redact(
        &self,
        room_id: &str,
        event_id: &str,
        txn_id: &str,
        reason: Option<&str>,
    ) -> Result<String, ApiError> {
        let body = match reason {
            Some(reason) => json!({ "reason": reason }),
            None => json!({}),
        };
        let redacted: EventIdResponse = self
            .call(ApiRequest::put(
                &["_matrix", "client", "v3", "rooms", room_id, "redact", event_id, txn_id],
                body,
            ))
            .await?;
        Ok(redacted.event_id)
    }

    /// `timeout_ms` is only sent when starting to type.
    async fn typing(&self, room_id: &str, user_id: &str, typing: bool, timeout_ms: u64) -> Result<(), ApiError> {
        let body = if typing {
            json!({ "typing": true, "timeout": timeout_ms })
        } else {
            json!({ "typing": false })
        };
        self.request(ApiRequest::put(
            &["_matrix", "client", "v3", "rooms", room_id, "typing", user_id],
            body,
        ))
        .await?;
        Ok(())
    }

    async fn sync(
        &self,
        since: Option<&str>,
        timeout_ms: u64,
        presence: Presence,
    ) -> Result<SyncResponse, ApiError> {
        let mut request = ApiRequest::get(&["_matrix", "client", "v3", "sync"])
            .query("timeout", timeout_ms)
            .query("set_presence", presence.as_str());
        if let Some(since) = since {
            request = request.query("since", since);
        }
        self.call(request).await
    }

    async fn profile(&self, user_id: &str) -> Result<ProfileResponse, ApiError> {
        self.call(ApiRequest::get(&["_matrix", "client", "v3", "profile", user_id]))
            .await
    }

    async fn admin_rooms(&self) -> Result<AdminRoomList, ApiError> {
        self.call(ApiRequest::get(&["_synapse", "admin", "v1", "rooms"]))
            .await
    }

    async fn admin_room_members(&self, room_id: &str) -> Result<AdminRoomMembers, ApiError> {
        self.call(ApiRequest::get(&["_synapse", "admin", "v1", "rooms", room_id, "members"]))
            .await
    }

    async fn admin_user(&self, user_id: &str) -> Result<Value, ApiError> {
        self.request(ApiRequest::get(&["_synapse", "admin", "v2", "users", user_id]))
            .await
    }

    async fn admin_user_devices(&self, user_id: &str) -> Result<AdminDevices, ApiError> {
        self.call(ApiRequest::get(&["_synapse", "admin", "v2", "users", user_id, "devices"]))
            .await
    }

    async fn admin_whois(&self, user_id: &str) -> Result<WhoisResponse, ApiError> {
        self.call(ApiRequest::get(&["_synapse", "admin", "v1", "whois", user_id]))
            .await
    }

    async fn admin_server_version(&self) -> Result<ServerVersion, ApiError> {
        self.call(ApiRequest::get(&["_synapse", "admin", "v1", "server_version"]))
            .await
    }
}

pub struct MatrixClient {
    base_url: Url,
    http: Client,
    access_token: Option<String>,
}

impl MatrixClient {
    /// An anonymous client, only good for `login`.
    pub fn new(http: Client, base_url: Url) -> Self {
        Self {
            base_url,
            http,
            access_token: None,
        }
    }

    pub fn with_session(mut self, session: &Session) -> Self {
        self.access_token = Some(session.access_token.clone());
        self
    }

    fn url(&self, request: &ApiRequest) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::BaseUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().extend(&request.segments);
        }
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }
}

impl Homeserver for MatrixClient {
    fn homeserver(&self) -> &Url {
        &self.base_url
    }

    async fn request(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = self.url(&request)?;
        tracing::debug!(method = %request.method, path = %request.path(), "homeserver request");

        let mut builder = self.http.request(request.method, url);
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "homeserver request failed");
            return Err(match serde_json::from_slice::<MatrixErrorBody>(&bytes) {
                Ok(body) => ApiError::Matrix {
                    status: status.as_u16(),
                    errcode: body.errcode,
                    error: body.error,
                },
                Err(_) => ApiError::Status(status.as_u16()),
            });
        }
        if bytes.is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Online,
    Offline,
}

impl Presence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Online => "online",
            Presence::Offline => "offline",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub access_token: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhoamiResponse {
    pub user_id: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionsResponse {
    pub versions: Vec<String>,
    #[serde(default)]
    pub unstable_features: BTreeMap<String, bool>,
}

#[derive(Debug, Deserialize)]
struct JoinedRooms {
    joined_rooms: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RoomNameContent {
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomMember {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JoinedMembers {
    #[serde(default)]
    joined: BTreeMap<String, RoomMember>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateRoomInput {
    pub preset: &'static str,
    pub is_direct: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invite: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RoomIdResponse {
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct EventIdResponse {
    event_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoomEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub origin_server_ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default)]
    pub content: Value,
}

impl RoomEvent {
    pub fn body(&self) -> Option<&str> {
        self.content.get("body").and_then(Value::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    chunk: Vec<RoomEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncResponse {
    pub next_batch: String,
    #[serde(default)]
    pub rooms: SyncRooms,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncRooms {
    #[serde(default)]
    pub join: BTreeMap<String, JoinedRoom>,
    #[serde(default)]
    pub invite: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinedRoom {
    #[serde(default)]
    pub timeline: Timeline,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub events: Vec<RoomEvent>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProfileResponse {
    #[serde(default)]
    pub displayname: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminRoom {
    pub room_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub canonical_alias: Option<String>,
    #[serde(default)]
    pub joined_members: u64,
    #[serde(default)]
    pub creator: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminRoomList {
    #[serde(default)]
    pub rooms: Vec<AdminRoom>,
    #[serde(default)]
    pub total_rooms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminRoomMembers {
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminDevice {
    pub device_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub last_seen_ip: Option<String>,
    #[serde(default)]
    pub last_seen_ts: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminDevices {
    #[serde(default)]
    pub devices: Vec<AdminDevice>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhoisResponse {
    pub user_id: String,
    #[serde(default)]
    pub devices: BTreeMap<String, WhoisDevice>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WhoisDevice {
    #[serde(default)]
    pub sessions: Vec<WhoisSession>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WhoisSession {
    #[serde(default)]
    pub connections: Vec<WhoisConnection>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhoisConnection {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub last_seen: Option<i64>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerVersion {
    pub server_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session() -> Session {
        Session {
            user_id: "@alice:example.org".to_string(),
            access_token: "syt_token".to_string(),
            device_id: None,
        }
    }

    fn client_for(server: &MockServer) -> MatrixClient {
        let base = Url::parse(&server.uri()).expect("mock uri");
        MatrixClient::new(Client::new(), base).with_session(&session())
    }

    #[tokio::test]
    async fn whoami_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/account/whoami"))
            .and(header("authorization", "Bearer syt_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "user_id": "@alice:example.org",
                "device_id": "DEV1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let whoami = client_for(&server).whoami().await.expect("whoami");
        assert_eq!(whoami.user_id, "@alice:example.org");
        assert_eq!(whoami.device_id.as_deref(), Some("DEV1"));
    }

    #[tokio::test]
    async fn room_ids_become_single_path_segments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/rooms/!abc:example.org/leave"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .leave("!abc:example.org")
            .await
            .expect("leave");
    }

    #[tokio::test]
    async fn room_aliases_are_percent_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_matrix/client/v3/join/%23lobby:example.org"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "room_id": "!abc:example.org"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let room_id = client_for(&server)
            .join_room("#lobby:example.org")
            .await
            .expect("join");
        assert_eq!(room_id, "!abc:example.org");
    }

    #[tokio::test]
    async fn messages_pass_direction_and_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/rooms/!abc:example.org/messages"))
            .and(query_param("dir", "b"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chunk": [{
                    "type": "m.room.message",
                    "sender": "@bob:example.org",
                    "origin_server_ts": 1700000000000i64,
                    "content": { "msgtype": "m.text", "body": "hi" }
                }]
            })))
            .mount(&server)
            .await;

        let events = client_for(&server)
            .messages("!abc:example.org", 5)
            .await
            .expect("messages");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].body(), Some("hi"));
    }

    #[tokio::test]
    async fn send_message_puts_message_event() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(
                "/_matrix/client/v3/rooms/!abc:example.org/send/m.room.message/txn1",
            ))
            .and(body_json(json!({ "msgtype": "m.text", "body": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "$ev" })))
            .expect(1)
            .mount(&server)
            .await;

        let event_id = client_for(&server)
            .send_message("!abc:example.org", "txn1", json!({ "msgtype": "m.text", "body": "hello" }))
            .await
            .expect("send");
        assert_eq!(event_id, "$ev");
    }

    #[tokio::test]
    async fn redact_puts_reason_under_event_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/_matrix/client/v3/rooms/!abc:example.org/redact/$ev/txn2"))
            .and(body_json(json!({ "reason": "spam" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "$redaction" })))
            .expect(1)
            .mount(&server)
            .await;

        let event_id = client_for(&server)
            .redact("!abc:example.org", "$ev", "txn2", Some("spam"))
            .await
            .expect("redact");
        assert_eq!(event_id, "$redaction");
    }

    #[tokio::test]
    async fn matrix_errors_keep_errcode() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/account/whoami"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "errcode": "M_UNKNOWN_TOKEN",
                "error": "Invalid access token"
            })))
            .mount(&server)
            .await;

        let error = client_for(&server).whoami().await.expect_err("401");
        match error {
            ApiError::Matrix { status, errcode, .. } => {
                assert_eq!(status, 401);
                assert_eq!(errcode, "M_UNKNOWN_TOKEN");
            }
            other => panic!("expected matrix error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_room_name_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_matrix/client/v3/rooms/!abc:example.org/state/m.room.name/"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "errcode": "M_NOT_FOUND",
                "error": "Event not found"
            })))
            .mount(&server)
            .await;

        let name = client_for(&server)
            .room_name("!abc:example.org")
            .await
            .expect("room name");
        assert!(name.is_none());
    }

    #[test]
    fn request_path_is_unencoded() {
        let request = ApiRequest::get(&["_matrix", "client", "v3", "rooms", "!a:b", "members"]);
        assert_eq!(request.path(), "_matrix/client/v3/rooms/!a:b/members");
    }
}
