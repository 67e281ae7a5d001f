// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::Result;
use crate::constants::{ASSERTION_PARAM, GRANT_TYPE_PARAM, JWT_BEARER_GRANT_TYPE};
use crate::errors::AuthError;
use crate::token::Token;

use bytes::Bytes;
use http::HeaderMap;
use http::header::{AUTHORIZATION, HeaderValue};

/// Creates the `Authorization` value for a token, marked as sensitive.
pub(crate) fn authorization_value(token_type: &str, token: &str) -> Result<HeaderValue> {
    let mut value =
        HeaderValue::from_str(&format!("{token_type} {token}")).map_err(AuthError::encoding)?;
    value.set_sensitive(true);
    Ok(value)
}

/// A utility function to create bearer headers.
pub(crate) fn build_bearer_headers(token: &Token) -> Result<HeaderMap> {
    let value = authorization_value(&token.token_type, &token.token)?;
    let mut header_map = HeaderMap::new();
    header_map.insert(AUTHORIZATION, value);
    Ok(header_map)
}

/// The form body exchanging `assertion` for an access token.
pub(crate) fn assertion_form(assertion: &str) -> Bytes {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(GRANT_TYPE_PARAM, JWT_BEARER_GRANT_TYPE)
        .append_pair(ASSERTION_PARAM, assertion)
        .finish();
    Bytes::from(body)
}
