use serde_json::Value;
use std::{
    fs,
    path::Path,
};
use tracing::{
    info,
    warn,
};

pub const FALLBACK_USER_ID: &str = "demo_user_local_test";

/// Maps host context to a player identifier. Total: implementors fall back
/// instead of failing.
pub trait IdentityResolver {
    fn resolve(&self) -> String;
}

/// Reads `initDataUnsafe.user.id` from the context object the host bridge
/// exposes to the game.
#[derive(Clone, Debug, Default)]
pub struct HostIdentityResolver {
    context: Option<Value>,
}

impl HostIdentityResolver {
    pub fn new(context: Option<Value>) -> Self {
        Self { context }
    }

    /// Loads the host context from a JSON file. A missing or unreadable file
    /// yields a resolver without context.
    pub fn from_file(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        let context = fs::read_to_string(path)
            .map_err(|err| err.to_string())
            .and_then(|raw| {
                serde_json::from_str::<Value>(&raw).map_err(|err| err.to_string())
            });
        match context {
            Ok(value) => Self::new(Some(value)),
            Err(err) => {
                warn!(path = %path.display(), %err, "host context unavailable");
                Self::default()
            }
        }
    }
}

impl IdentityResolver for HostIdentityResolver {
    fn resolve(&self) -> String {
        let id = self
            .context
            .as_ref()
            .and_then(|ctx| ctx.get("initDataUnsafe"))
            .and_then(|data| data.get("user"))
            .and_then(|user| user.get("id"))
            .and_then(host_id_to_string);
        match id {
            Some(id) => {
                info!(user_id = %id, "host user id found");
                id
            }
            None => {
                warn!("host user data not found, using fallback user id");
                FALLBACK_USER_ID.to_string()
            }
        }
    }
}

fn host_id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) if n.as_f64().is_some_and(|v| v != 0.0) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Always answers with the same identifier.
#[derive(Clone, Debug)]
pub struct StaticIdentity(pub String);

impl IdentityResolver for StaticIdentity {
    fn resolve(&self) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use serde_json::json;

    #[test]
    fn resolve__returns_numeric_host_id_as_string() {
        // given
        let resolver = HostIdentityResolver::new(Some(json!({
            "initDataUnsafe": { "user": { "id": 123456789 } }
        })));

        // when
        let id = resolver.resolve();

        // then
        assert_eq!(id, "123456789");
    }

    #[test]
    fn resolve__falls_back_when_any_level_is_missing() {
        let contexts = [
            None,
            Some(json!({})),
            Some(json!({ "initDataUnsafe": null })),
            Some(json!({ "initDataUnsafe": { "user": {} } })),
            Some(json!({ "initDataUnsafe": { "user": { "id": 0 } } })),
            Some(json!({ "initDataUnsafe": { "user": { "id": [1, 2] } } })),
            Some(json!("not an object")),
        ];
        for context in contexts {
            let resolver = HostIdentityResolver::new(context.clone());
            assert_eq!(resolver.resolve(), FALLBACK_USER_ID, "context {context:?}");
        }
    }

    #[test]
    fn from_file__missing_file_falls_back() {
        let resolver =
            HostIdentityResolver::from_file(Some(Path::new("/definitely/not/here.json")));
        assert_eq!(resolver.resolve(), FALLBACK_USER_ID);
    }

    #[test]
    fn from_file__reads_context_json() {
        // given
        let path = std::env::temp_dir()
            .join(format!("coinflip-host-context-{}.json", std::process::id()));
        fs::write(&path, r#"{"initDataUnsafe":{"user":{"id":77}}}"#).unwrap();

        // when
        let resolver = HostIdentityResolver::from_file(Some(&path));

        // then
        assert_eq!(resolver.resolve(), "77");
        let _ = fs::remove_file(path);
    }
}
