// Copyright 2025 Metagraph (https://github.com/metagraph)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Org discovery for the browser session: the orgs a principal can see
//! are exactly the org scopes its token carries.

use axum::{Extension, Json};
use serde::Serialize;

use crate::auth::Principal;

#[derive(Debug, Serialize)]
pub struct OrgsResponse {
    pub orgs: Vec<String>,
}

/// GET /orgs
pub async fn list_orgs(Extension(principal): Extension<Principal>) -> Json<OrgsResponse> {
    Json(OrgsResponse {
        orgs: principal.permissions.orgs(),
    })
}
