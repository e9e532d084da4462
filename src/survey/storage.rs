//! Persistence adapter: survey snapshots in the browser's local storage.
//!
//! Nothing here surfaces an error to the caller. Reads that fail are treated
//! as "no prior session", writes are best effort, and both are logged.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{error, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::responses::UserPath;

/// Schema version written by this build.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Key holding the serialized snapshot.
pub const DATA_KEY: &str = "survey_flow_data";
/// Key holding the session id.
pub const SESSION_ID_KEY: &str = "survey_flow_session_id";
/// Key holding the schema version.
pub const VERSION_KEY: &str = "survey_flow_version";

/// Persisted survey progress.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSurveyData {
	/// Session id.
	pub session_id: String,
	/// Survey the answers belong to.
	pub survey_id: String,
	/// Epoch milliseconds.
	pub started_at: u64,
	/// Epoch milliseconds.
	pub last_updated: u64,
	/// Paths still receiving answers.
	pub current_paths: Vec<UserPath>,
	/// Paths no longer active.
	#[serde(default)]
	pub completed_paths: Vec<UserPath>,
	/// Every path has run out of questions.
	pub is_completed: bool,
	/// Schema version.
	pub version: String,
}

/// Failures at the storage boundary.
#[derive(Debug, Error)]
pub enum StorageError {
	/// No storage backend in this environment.
	#[error("local storage is unavailable")]
	Unavailable,
	/// The backend threw.
	#[error("storage backend error: {0}")]
	Backend(String),
	/// Stored data could not be (de)serialized.
	#[error("invalid stored data: {0}")]
	Json(#[from] serde_json::Error),
}

/// Raw key/value access; implemented per backend.
pub trait KeyValueStore {
	/// Reads a key.
	fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
	/// Writes a key.
	fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
	/// Deletes a key.
	fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Snapshot-level operations used by the survey store.
pub trait SurveyStorage {
	/// Latest snapshot, or `None` when absent or unreadable.
	fn load(&self) -> Option<LocalSurveyData>;
	/// Writes a snapshot. Fire and forget.
	fn save(&self, data: &LocalSurveyData);
	/// Removes every key this adapter owns.
	fn clear(&self);
	/// Stored session id, creating one if none exists.
	fn session_id(&self) -> String;
}

impl<S: KeyValueStore> SurveyStorage for S {
	fn load(&self) -> Option<LocalSurveyData> {
		match read_snapshot(self) {
			Ok(data) => data,
			Err(err) => {
				error!("failed to load survey data: {err}");
				None
			}
		}
	}

	fn save(&self, data: &LocalSurveyData) {
		let result = serde_json::to_string(data)
			.map_err(StorageError::from)
			.and_then(|raw| self.set(DATA_KEY, &raw))
			.and_then(|()| self.set(VERSION_KEY, &data.version));
		if let Err(err) = result {
			error!("failed to save survey data: {err}");
		}
	}

	fn clear(&self) {
		for key in [DATA_KEY, SESSION_ID_KEY, VERSION_KEY] {
			if let Err(err) = self.remove(key) {
				warn!("failed to remove {key}: {err}");
			}
		}
	}

	fn session_id(&self) -> String {
		match self.get(SESSION_ID_KEY) {
			Ok(Some(id)) if !id.is_empty() => return id,
			Ok(_) => {}
			Err(err) => warn!("failed to read session id: {err}"),
		}
		let id = generate_session_id();
		if let Err(err) = self.set(SESSION_ID_KEY, &id) {
			warn!("failed to store session id: {err}");
		}
		id
	}
}

fn read_snapshot<S: KeyValueStore>(store: &S) -> Result<Option<LocalSurveyData>, StorageError> {
	let Some(raw) = store.get(DATA_KEY)? else {
		return Ok(None);
	};
	let value: Value = serde_json::from_str(&raw)?;
	let migrated = migrate(value, generate_session_id);
	Ok(Some(serde_json::from_value(migrated)?))
}

/// Upgrades a stored snapshot to the current schema. Snapshots without a
/// version are `1.0.0` and get a session id if they lack one.
pub fn migrate(mut value: Value, new_session_id: impl FnOnce() -> String) -> Value {
	if value.get("version").and_then(Value::as_str).is_some() {
		return value;
	}
	let Some(object) = value.as_object_mut() else {
		return value;
	};
	object.insert("version".into(), Value::from(SCHEMA_VERSION));
	let has_session = object
		.get("sessionId")
		.and_then(Value::as_str)
		.is_some_and(|id| !id.is_empty());
	if !has_session {
		object.insert("sessionId".into(), Value::from(new_session_id()));
	}
	value
}

/// Epoch milliseconds.
#[cfg(target_arch = "wasm32")]
pub fn now_ms() -> u64 {
	js_sys::Date::now() as u64
}

/// Epoch milliseconds.
#[cfg(not(target_arch = "wasm32"))]
pub fn now_ms() -> u64 {
	use std::time::{SystemTime, UNIX_EPOCH};
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map_or(0, |d| d.as_millis() as u64)
}

const ENTROPY_RANGE: u64 = 36u64.pow(9);

#[cfg(target_arch = "wasm32")]
fn entropy() -> u64 {
	(js_sys::Math::random() * ENTROPY_RANGE as f64) as u64
}

#[cfg(not(target_arch = "wasm32"))]
fn entropy() -> u64 {
	use std::hash::{BuildHasher, RandomState};
	RandomState::new().hash_one(now_ms()) % ENTROPY_RANGE
}

/// `session_<ms>_<base36>` from the current time and a random number.
pub fn generate_session_id() -> String {
	format_session_id(now_ms(), entropy())
}

/// Formats a session id from a timestamp and a random number.
pub fn format_session_id(now_ms: u64, entropy: u64) -> String {
	const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
	let mut suffix = Vec::new();
	let mut rest = entropy;
	loop {
		suffix.push(DIGITS[(rest % 36) as usize]);
		rest /= 36;
		if rest == 0 {
			break;
		}
	}
	suffix.reverse();
	format!("session_{now_ms}_{}", String::from_utf8_lossy(&suffix))
}

/// `window.localStorage`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserStorage;

impl BrowserStorage {
	fn storage(&self) -> Result<web_sys::Storage, StorageError> {
		web_sys::window()
			.ok_or(StorageError::Unavailable)?
			.local_storage()
			.map_err(js_error)?
			.ok_or(StorageError::Unavailable)
	}

	/// Whether storage accepts a write in this environment.
	pub fn is_available(&self) -> bool {
		const PROBE: &str = "__survey_flow_probe__";
		self.set(PROBE, "probe")
			.and_then(|()| self.remove(PROBE))
			.is_ok()
	}
}

fn js_error(err: wasm_bindgen::JsValue) -> StorageError {
	StorageError::Backend(format!("{err:?}"))
}

impl KeyValueStore for BrowserStorage {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		self.storage()?.get_item(key).map_err(js_error)
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
		self.storage()?.set_item(key, value).map_err(js_error)
	}

	fn remove(&self, key: &str) -> Result<(), StorageError> {
		self.storage()?.remove_item(key).map_err(js_error)
	}
}

/// In-process store, shareable across threads.
#[derive(Debug, Default)]
pub struct MemoryStorage {
	items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
	/// Empty store.
	pub fn new() -> Self {
		Self::default()
	}

	fn items(&self) -> MutexGuard<'_, HashMap<String, String>> {
		self.items.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Number of stored keys.
	pub fn len(&self) -> usize {
		self.items().len()
	}

	/// Whether nothing is stored.
	pub fn is_empty(&self) -> bool {
		self.items().is_empty()
	}
}

impl KeyValueStore for MemoryStorage {
	fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
		Ok(self.items().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
		self.items().insert(key.into(), value.into());
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StorageError> {
		self.items().remove(key);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn snapshot() -> LocalSurveyData {
		LocalSurveyData {
			session_id: "session_1_a".into(),
			survey_id: "survey".into(),
			started_at: 1,
			last_updated: 2,
			current_paths: vec![UserPath::new("path_1", "q1", 1)],
			completed_paths: Vec::new(),
			is_completed: false,
			version: SCHEMA_VERSION.into(),
		}
	}

	#[test]
	fn load_returns_none_when_empty() {
		assert_eq!(MemoryStorage::new().load(), None);
	}

	#[test]
	fn save_then_load() {
		let store = MemoryStorage::new();
		store.save(&snapshot());
		assert_eq!(store.load(), Some(snapshot()));
		assert_eq!(store.get(VERSION_KEY).unwrap().as_deref(), Some(SCHEMA_VERSION));
	}

	#[test]
	fn corrupt_data_loads_as_none() {
		let store = MemoryStorage::new();
		store.set(DATA_KEY, "{not json").unwrap();
		assert_eq!(store.load(), None);
		store.set(DATA_KEY, r#"{"sessionId": 3, "version": "1.0.0"}"#).unwrap();
		assert_eq!(store.load(), None);
	}

	#[test]
	fn clear_removes_owned_keys() {
		let store = MemoryStorage::new();
		store.save(&snapshot());
		store.set(SESSION_ID_KEY, "abc").unwrap();
		store.set("unrelated", "x").unwrap();
		store.clear();
		assert_eq!(store.len(), 1);
		assert_eq!(store.load(), None);
	}

	#[test]
	fn session_id_is_reused() {
		let store = MemoryStorage::new();
		store.set(SESSION_ID_KEY, "session_5_x").unwrap();
		assert_eq!(store.session_id(), "session_5_x");
	}

	#[test]
	fn migrate_fills_version_and_session() {
		let legacy = json!({"currentPaths": []});
		let migrated = migrate(legacy, || "session_9_z".into());
		assert_eq!(migrated["version"], SCHEMA_VERSION);
		assert_eq!(migrated["sessionId"], "session_9_z");
	}

	#[test]
	fn migrate_keeps_existing_session_and_versioned_data() {
		let legacy = json!({"sessionId": "keep"});
		assert_eq!(migrate(legacy, || "new".into())["sessionId"], "keep");

		let current = json!({"version": "2.0.0"});
		assert_eq!(migrate(current.clone(), || unreachable!()), current);
	}

	#[test]
	fn null_version_is_migrated() {
		let legacy = json!({"sessionId": "keep", "version": null});
		let migrated = migrate(legacy, || unreachable!());
		assert_eq!(migrated["version"], SCHEMA_VERSION);

		let store = MemoryStorage::new();
		let mut raw = serde_json::to_value(snapshot()).unwrap();
		raw["version"] = Value::Null;
		store.set(DATA_KEY, &raw.to_string()).unwrap();
		assert_eq!(store.load(), Some(snapshot()));
	}

	/// Backend that rejects every operation.
	struct FailingStore;

	impl KeyValueStore for FailingStore {
		fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
			Err(StorageError::Backend("quota exceeded".into()))
		}

		fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
			Err(StorageError::Backend("quota exceeded".into()))
		}

		fn remove(&self, _key: &str) -> Result<(), StorageError> {
			Err(StorageError::Unavailable)
		}
	}

	#[test]
	fn backend_failures_are_swallowed() {
		let store = FailingStore;
		assert_eq!(store.load(), None);
		store.save(&snapshot());
		store.clear();

		let id = store.session_id();
		let mut parts = id.splitn(3, '_');
		assert_eq!(parts.next(), Some("session"));
		assert!(parts.next().is_some_and(|ms| ms.parse::<u64>().is_ok()));
		assert!(
			parts
				.next()
				.is_some_and(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()))
		);
		assert_ne!(store.session_id(), "");
	}

	#[test]
	fn fresh_session_id_is_stored() {
		let store = MemoryStorage::new();
		let id = store.session_id();
		assert!(id.starts_with("session_"));
		assert_eq!(store.get(SESSION_ID_KEY).unwrap(), Some(id.clone()));
		assert_eq!(store.session_id(), id);
	}

	#[test]
	fn session_id_format() {
		assert_eq!(format_session_id(1700, 0), "session_1700_0");
		assert_eq!(format_session_id(1700, 36 * 36 + 35), "session_1700_10z");
	}
}
