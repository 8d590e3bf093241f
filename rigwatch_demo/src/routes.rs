//! REST handlers. Every route except login/register needs a bearer token.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::auth::{issue_token, AuthUser};
use crate::error::DemoError;
use crate::state::{AppState, DeviceRecord, Profile, Store, User};
use crate::types::{
    DeviceBody, DeviceInfo, LoginBody, LoginReply, MessageRecord, NoteBody, RegisterBody,
};

type ApiResult<T> = Result<T, DemoError>;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/Auth/login", post(login))
        .route("/Auth/register", post(register))
        .route("/Device/GetDeviceInfo/:username", get(device_info))
        .route("/Device/GetDevices/:username", get(device_ids))
        .route("/Device/AddDevice", post(add_device))
        .route("/Device/DeleteDevice", delete(delete_device))
        .route("/messages", post(post_message))
        .route("/messages/:device_id", get(messages).delete(clear_messages))
        .route("/Donanim/GetNote/:device_id", get(note))
        .route("/Donanim/SaveNote", post(save_note));
    Router::new().nest("/api", api).with_state(state)
}

fn ok(message: &str) -> Json<Value> {
    Json(json!({ "message": message }))
}

fn ensure_self(user: &AuthUser, username: &str) -> ApiResult<()> {
    if user.username == username {
        Ok(())
    } else {
        Err(DemoError::Forbidden("token does not belong to this user"))
    }
}

fn ensure_owner(store: &Store, user: &AuthUser, device_id: &str) -> ApiResult<()> {
    if store.owns(&user.username, device_id) {
        Ok(())
    } else {
        Err(DemoError::NotFound("Device not found"))
    }
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<LoginReply>> {
    let valid = state
        .store
        .lock()
        .await
        .users
        .get(&body.username)
        .is_some_and(|u| u.password == body.password);
    if !valid {
        debug!(user = %body.username, "login refused");
        return Err(DemoError::Unauthorized("Invalid username or password"));
    }
    let token = issue_token(&body.username, &state.secret)?;
    info!(user = %body.username, "login");
    Ok(Json(LoginReply {
        token,
        message: "Login successful".into(),
    }))
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> ApiResult<Json<Value>> {
    let username = body.username.trim();
    if username.is_empty() || body.password.is_empty() {
        return Err(DemoError::BadRequest("Username and password are required"));
    }
    let mut store = state.store.lock().await;
    if store.users.contains_key(username) {
        return Err(DemoError::Conflict("User already exists"));
    }
    store.users.insert(
        username.to_string(),
        User {
            email: body.email,
            password: body.password,
        },
    );
    info!(user = %username, "registered");
    Ok(ok("User registered successfully"))
}

async fn device_info(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<Vec<DeviceInfo>>> {
    ensure_self(&user, &username)?;
    Ok(Json(state.store.lock().await.devices_of(&username)))
}

async fn device_ids(
    user: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<Vec<String>>> {
    ensure_self(&user, &username)?;
    let store = state.store.lock().await;
    Ok(Json(store.owned.get(&username).cloned().unwrap_or_default()))
}

async fn add_device(
    user: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<DeviceBody>,
) -> ApiResult<Json<Value>> {
    ensure_self(&user, &body.username)?;
    let id = body.device_id.trim();
    if id.is_empty() {
        return Err(DemoError::BadRequest("Device ID is required"));
    }
    let mut store = state.store.lock().await;
    if store.owns(&user.username, id) {
        return Err(DemoError::Conflict("Device already added"));
    }
    let record = match store.devices.get(id) {
        Some(existing) => existing.clone(),
        None => DeviceRecord::new(id, &format!("Device {id}"), Profile::idle(), store.tick),
    };
    store.add_device(&user.username, record);
    info!(user = %user.username, device = %id, "device added");
    Ok(ok("Device added successfully"))
}

async fn delete_device(
    user: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<DeviceBody>,
) -> ApiResult<Json<Value>> {
    ensure_self(&user, &body.username)?;
    let mut store = state.store.lock().await;
    if !store.remove_device(&user.username, &body.device_id) {
        return Err(DemoError::NotFound("Device not found"));
    }
    info!(user = %user.username, device = %body.device_id, "device deleted");
    Ok(ok("Device deleted successfully"))
}

async fn messages(
    user: AuthUser,
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<Vec<MessageRecord>>> {
    let store = state.store.lock().await;
    ensure_owner(&store, &user, &device_id)?;
    Ok(Json(store.messages.get(&device_id).cloned().unwrap_or_default()))
}

async fn post_message(
    user: AuthUser,
    State(state): State<AppState>,
    Json(msg): Json<MessageRecord>,
) -> ApiResult<(StatusCode, Json<MessageRecord>)> {
    if msg.content.trim().is_empty() {
        return Err(DemoError::BadRequest("Message content is required"));
    }
    let mut store = state.store.lock().await;
    ensure_owner(&store, &user, &msg.device_id)?;
    store
        .messages
        .entry(msg.device_id.clone())
        .or_default()
        .push(msg.clone());
    Ok((StatusCode::CREATED, Json(msg)))
}

async fn clear_messages(
    user: AuthUser,
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let mut store = state.store.lock().await;
    ensure_owner(&store, &user, &device_id)?;
    store.messages.remove(&device_id);
    Ok(ok("Messages deleted"))
}

/// Newest note first.
async fn note(
    user: AuthUser,
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> ApiResult<Json<Vec<String>>> {
    let store = state.store.lock().await;
    ensure_owner(&store, &user, &device_id)?;
    match store.notes.get(&device_id) {
        Some(notes) if !notes.is_empty() => Ok(Json(notes.iter().rev().cloned().collect())),
        _ => Err(DemoError::NotFound("No note for this device")),
    }
}

async fn save_note(
    user: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<NoteBody>,
) -> ApiResult<Json<Value>> {
    let mut store = state.store.lock().await;
    ensure_owner(&store, &user, &body.device_id)?;
    debug!(device = %body.device_id, created = ?body.date_created, "note saved");
    store.notes.entry(body.device_id).or_default().push(body.note);
    Ok(ok("Note saved"))
}
