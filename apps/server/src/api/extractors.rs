//! Custom Axum extractors for the queue API.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

use crate::Error;

/// Hospital scope, set by the upstream gateway on every staff request.
pub const HOSPITAL_HEADER: &str = "x-hospital-id";
/// Acting staff member, if known.
pub const STAFF_HEADER: &str = "x-staff-id";

/// Identity forwarded by the auth gateway. Authentication itself happens upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaffContext {
    pub hospital_id: Uuid,
    pub staff_id: Option<Uuid>,
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Option<Uuid>, Error> {
    let Some(value) = parts.headers.get(name) else {
        return Ok(None);
    };
    let text = value
        .to_str()
        .map_err(|_| Error::Validation(format!("{name} header is not valid text")))?;
    Uuid::parse_str(text.trim())
        .map(Some)
        .map_err(|_| Error::Validation(format!("{name} header must be a UUID")))
}

#[async_trait]
impl<S> FromRequestParts<S> for StaffContext
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let hospital_id = header_uuid(parts, HOSPITAL_HEADER)?
            .ok_or_else(|| Error::Validation(format!("{HOSPITAL_HEADER} header is required")))?;
        let staff_id = header_uuid(parts, STAFF_HEADER)?;
        Ok(Self {
            hospital_id,
            staff_id,
        })
    }
}

/// JSON body that has passed its `validator` rules.
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| Error::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Parse an optional JSON body; an empty body yields `T::default()`.
pub fn optional_json<T>(body: &[u8]) -> Result<T, Error>
where
    T: DeserializeOwned + Validate + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    let value: T = serde_json::from_slice(body)
        .map_err(|e| Error::Validation(format!("Invalid JSON in request body: {e}")))?;
    value.validate()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CancelTicketRequest;
    use axum::http::Request as HttpRequest;

    #[tokio::test]
    async fn staff_context_requires_hospital() {
        let hospital = Uuid::new_v4();
        let (mut parts, _) = HttpRequest::builder()
            .header(HOSPITAL_HEADER, hospital.to_string())
            .body(())
            .unwrap()
            .into_parts();
        let ctx = StaffContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.hospital_id, hospital);
        assert_eq!(ctx.staff_id, None);

        let (mut parts, _) = HttpRequest::builder().body(()).unwrap().into_parts();
        assert!(matches!(
            StaffContext::from_request_parts(&mut parts, &()).await,
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn optional_body_defaults_when_empty() {
        let parsed: CancelTicketRequest = optional_json(b"").unwrap();
        assert!(parsed.reason.is_none());
        let parsed: CancelTicketRequest = optional_json(br#"{"reason":"left"}"#).unwrap();
        assert_eq!(parsed.reason.as_deref(), Some("left"));
    }
}
