pub(crate) mod trusted_user;

use axum::http::StatusCode;

type RejectionType = (StatusCode, String);
