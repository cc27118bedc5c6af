//! A2A HTTP+JSON routes
//!
//! All routes live under a configurable prefix:
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET | `/.well-known/agent-card.json`, `/.well-known/agent.json`, `/v1/card` | agent card |
//! | POST | `/v1/message:send` | send message |
//! | POST | `/v1/message:stream` | send message, server-sent events reply |
//! | GET | `/v1/tasks/{id}` | get task |
//! | POST | `/v1/tasks/{id}:cancel` | cancel task |
//! | GET, POST | `/v1/tasks/{id}:subscribe` | resubscribe |
//! | POST, GET | `/v1/tasks/{id}/pushNotificationConfigs` | set, list push config |
//! | GET, DELETE | `/v1/tasks/{id}/pushNotificationConfigs/{config_id}` | get, delete push config |

use super::handler::A2aRequestHandler;
use super::protocol::{A2aError, AgentCard, Message, MessageSendParams, SendMessageResponse};
use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::Instrument;
use warp::filters::BoxedFilter;
use warp::http::Method;
use warp::hyper::body::Bytes;
use warp::{Filter, Rejection, Reply};

type Handler = Arc<dyn A2aRequestHandler>;

/// Filter matching each non-empty segment of `base_path` in order
pub fn path_prefix(base_path: &str) -> BoxedFilter<()> {
    base_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(warp::any().boxed(), |filter, segment| {
            filter.and(warp::path(segment.to_string())).boxed()
        })
}

/// All A2A routes for one agent, mounted under `base_path`
pub fn routes(
    card: AgentCard,
    handler: Handler,
    base_path: &str,
) -> BoxedFilter<(Box<dyn Reply>,)> {
    let card = Arc::new(card);
    let with_card = warp::any().map(move || card.clone());
    let with_handler = warp::any().map(move || handler.clone());

    let well_known = warp::path(".well-known").and(
        warp::path("agent-card.json")
            .or(warp::path("agent.json"))
            .unify(),
    );
    let v1_card = warp::path("v1").and(warp::path("card"));
    let card_route = warp::get()
        .and(well_known.or(v1_card).unify())
        .and(warp::path::end())
        .and(with_card)
        .map(|card: Arc<AgentCard>| Box::new(warp::reply::json(card.as_ref())) as Box<dyn Reply>);

    let send_route = warp::post()
        .and(warp::path("v1"))
        .and(warp::path("message:send"))
        .and(warp::path::end())
        .and(warp::body::bytes())
        .and(with_handler.clone())
        .and_then(handle_send);

    let stream_route = warp::post()
        .and(warp::path("v1"))
        .and(warp::path("message:stream"))
        .and(warp::path::end())
        .and(warp::body::bytes())
        .and(with_handler.clone())
        .and_then(handle_stream);

    let tasks_route = warp::path("v1")
        .and(warp::path("tasks"))
        .and(warp::method())
        .and(warp::path::tail())
        .and(warp::body::bytes())
        .and(with_handler)
        .and_then(handle_task);

    path_prefix(base_path)
        .and(
            card_route
                .or(send_route)
                .unify()
                .or(stream_route)
                .unify()
                .or(tasks_route)
                .unify(),
        )
        .boxed()
}

fn json_reply<T: Serialize>(value: &T) -> Box<dyn Reply> {
    Box::new(warp::reply::json(value))
}

fn error_reply(error: &A2aError) -> Box<dyn Reply> {
    Box::new(warp::reply::with_status(
        warp::reply::json(error),
        error.status_code(),
    ))
}

fn sse_reply(messages: BoxStream<'static, Message>) -> Box<dyn Reply> {
    let events = messages.map(|message| {
        let data = serde_json::to_string(&SendMessageResponse { message })
            .unwrap_or_else(|_| "{}".to_string());
        Ok::<_, Infallible>(warp::sse::Event::default().data(data))
    });
    Box::new(warp::sse::reply(events))
}

fn parse_send_params(body: &[u8]) -> Result<MessageSendParams, A2aError> {
    serde_json::from_slice(body)
        .map_err(|e| A2aError::invalid_params(format!("Invalid message send params: {e}")))
}

fn parse_optional_json(body: &[u8]) -> Result<Value, A2aError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| A2aError::invalid_request(format!("Invalid JSON: {e}")))
}

async fn handle_send(body: Bytes, handler: Handler) -> Result<Box<dyn Reply>, Infallible> {
    let params = match parse_send_params(&body) {
        Ok(params) => params,
        Err(e) => return Ok(error_reply(&e)),
    };

    Ok(match handler.on_message_send(params).await {
        Ok(message) => json_reply(&SendMessageResponse { message }),
        Err(e) => error_reply(&e),
    })
}

async fn handle_stream(body: Bytes, handler: Handler) -> Result<Box<dyn Reply>, Infallible> {
    let params = match parse_send_params(&body) {
        Ok(params) => params,
        Err(e) => return Ok(error_reply(&e)),
    };

    Ok(match handler.on_message_send_stream(params).await {
        Ok(messages) => sse_reply(messages),
        Err(e) => error_reply(&e),
    })
}

/// Task operation addressed by a `/v1/tasks/...` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRoute {
    Get { task_id: String },
    Cancel { task_id: String },
    Subscribe { task_id: String },
    SetPushConfig { task_id: String },
    ListPushConfigs { task_id: String },
    GetPushConfig { task_id: String, config_id: String },
    DeletePushConfig { task_id: String, config_id: String },
}

impl TaskRoute {
    pub fn operation(&self) -> &'static str {
        match self {
            TaskRoute::Get { .. } => "tasks/get",
            TaskRoute::Cancel { .. } => "tasks/cancel",
            TaskRoute::Subscribe { .. } => "tasks/resubscribe",
            TaskRoute::SetPushConfig { .. } => "tasks/pushNotificationConfig/set",
            TaskRoute::ListPushConfigs { .. } => "tasks/pushNotificationConfig/list",
            TaskRoute::GetPushConfig { .. } => "tasks/pushNotificationConfig/get",
            TaskRoute::DeletePushConfig { .. } => "tasks/pushNotificationConfig/delete",
        }
    }
}

/// Map a method and the path after `/v1/tasks/` to a task operation
pub fn parse_task_route(method: &Method, tail: &str) -> Option<TaskRoute> {
    let segments: Vec<&str> = tail.trim_end_matches('/').split('/').collect();
    let get = *method == Method::GET;
    let post = *method == Method::POST;

    match segments.as_slice() {
        [segment] => {
            let (task_id, verb) = match segment.split_once(':') {
                Some((id, verb)) => (id, Some(verb)),
                None => (*segment, None),
            };
            if task_id.is_empty() {
                return None;
            }
            let task_id = task_id.to_string();
            match verb {
                None if get => Some(TaskRoute::Get { task_id }),
                Some("cancel") if post => Some(TaskRoute::Cancel { task_id }),
                Some("subscribe") if get || post => Some(TaskRoute::Subscribe { task_id }),
                _ => None,
            }
        }
        [task_id, "pushNotificationConfigs"] if !task_id.is_empty() => {
            let task_id = task_id.to_string();
            if post {
                Some(TaskRoute::SetPushConfig { task_id })
            } else if get {
                Some(TaskRoute::ListPushConfigs { task_id })
            } else {
                None
            }
        }
        [task_id, "pushNotificationConfigs", config_id]
            if !task_id.is_empty() && !config_id.is_empty() =>
        {
            let task_id = task_id.to_string();
            let config_id = config_id.to_string();
            if get {
                Some(TaskRoute::GetPushConfig { task_id, config_id })
            } else if *method == Method::DELETE {
                Some(TaskRoute::DeletePushConfig { task_id, config_id })
            } else {
                None
            }
        }
        _ => None,
    }
}

async fn handle_task(
    method: Method,
    tail: warp::path::Tail,
    body: Bytes,
    handler: Handler,
) -> Result<Box<dyn Reply>, Rejection> {
    let route = parse_task_route(&method, tail.as_str()).ok_or_else(warp::reject::not_found)?;
    let span = crate::a2a_span!(operation = route.operation());

    let result = dispatch_task(route, &body, handler.as_ref())
        .instrument(span)
        .await;

    Ok(result.unwrap_or_else(|e| error_reply(&e)))
}

async fn dispatch_task(
    route: TaskRoute,
    body: &[u8],
    handler: &dyn A2aRequestHandler,
) -> Result<Box<dyn Reply>, A2aError> {
    match route {
        TaskRoute::Get { task_id } => handler.on_get_task(&task_id).await.map(|t| json_reply(&t)),
        TaskRoute::Cancel { task_id } => handler
            .on_cancel_task(&task_id)
            .await
            .map(|t| json_reply(&t)),
        TaskRoute::Subscribe { task_id } => handler
            .on_resubscribe_to_task(&task_id)
            .await
            .map(sse_reply),
        TaskRoute::SetPushConfig { task_id } => {
            let config = parse_optional_json(body)?;
            handler
                .on_set_task_push_notification_config(&task_id, config)
                .await
                .map(|c| json_reply(&c))
        }
        TaskRoute::ListPushConfigs { task_id } => handler
            .on_list_task_push_notification_config(&task_id)
            .await
            .map(|c| json_reply(&c)),
        TaskRoute::GetPushConfig { task_id, config_id } => handler
            .on_get_task_push_notification_config(&task_id, &config_id)
            .await
            .map(|c| json_reply(&c)),
        TaskRoute::DeletePushConfig { task_id, config_id } => handler
            .on_delete_task_push_notification_config(&task_id, &config_id)
            .await
            .map(|()| json_reply(&Value::Null)),
    }
}
