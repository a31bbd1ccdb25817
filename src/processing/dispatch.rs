use super::Error;
use crate::github::{DispatchEventRequest, GithubClient, RepositoryIdentifier};
use log::{error, info};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Sends the repository dispatch event that kicks off the remote workflow.
pub struct Dispatcher {
    github: Arc<dyn GithubClient>,
}

impl Dispatcher {
    pub fn new(github: Arc<dyn GithubClient>) -> Self {
        Self { github }
    }

    pub async fn dispatch(
        &self,
        repo: &RepositoryIdentifier,
        event_type: &str,
        client_payload: Option<&str>,
    ) -> Result<(), Error> {
        let client_payload = parse_payload(client_payload)?;
        let request = DispatchEventRequest {
            event_type: event_type.into(),
            client_payload,
        };
        match self.github.create_dispatch_event(repo, &request).await {
            Ok(()) => {
                info!("Dispatched event '{}' successfully", event_type);
                Ok(())
            }
            Err(e) => {
                if e.not_found() {
                    error!("Repository {} not found or token lacks access to it", repo);
                } else if e.unprocessable_entity() {
                    error!("Dispatch event '{}' was rejected by the API", event_type);
                }
                error!("Error dispatching event: {}", e);
                Err(e.into())
            }
        }
    }
}

/// Parses the optional payload; a missing or blank payload is an empty object.
pub fn parse_payload(payload: Option<&str>) -> Result<Value, Error> {
    let payload = match payload.map(str::trim) {
        Some(payload) if !payload.is_empty() => payload,
        _ => return Ok(Value::Object(Map::new())),
    };
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| Error::InvalidPayload(format!("not valid JSON: {}", e).into()))?;
    if !value.is_object() {
        return Err(Error::InvalidPayload("must be a JSON object".into()));
    }
    Ok(value)
}
