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

use std::time::Duration;

/// JWT Bearer OAuth Grant Type
pub(crate) const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
pub(crate) const GRANT_TYPE_PARAM: &str = "grant_type";
pub(crate) const ASSERTION_PARAM: &str = "assertion";
pub(crate) const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

pub(crate) const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub(crate) const GOOGLE_APPLICATION_CREDENTIALS_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

pub(crate) const BEARER_TOKEN_TYPE: &str = "Bearer";
pub(crate) const JWT_TYPE: &str = "JWT";

pub(crate) const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);
pub(crate) const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);
pub(crate) const DEFAULT_SKEW_MARGIN: Duration = Duration::from_secs(30);
