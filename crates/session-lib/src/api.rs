//! REST client for the meetings and users API.

use crate::config::Settings;
use crate::error::{Result, SessionError};
use async_trait::async_trait;
use ricecoco_common::{Meeting, MeetingDetailsResponse, PromiseUpdate};
use std::time::Duration;

pub const MEETINGS_ROUTE: &str = "/meetings";
pub const USERS_ROUTE: &str = "/users";
pub const PROMISE_ROUTE: &str = "/promise";

/// Remote calls the meeting session depends on
#[async_trait]
pub trait MeetingApi: Send + Sync {
    /// `GET /meetings/{meeting_id}`
    async fn fetch_meeting(&self, meeting_id: &str) -> Result<Meeting>;

    /// `PUT /users/{user_id}/promise` with `{ amount }`
    async fn update_promise(&self, user_id: &str, amount: i32) -> Result<()>;
}

/// HTTP implementation backed by `reqwest`.
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpApi {
    pub fn new(base_url: &str, auth_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(&settings.api_base_url, settings.auth_token.clone())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn check(path: &str, response: &reqwest::Response) -> Result<()> {
        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Api {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MeetingApi for HttpApi {
    async fn fetch_meeting(&self, meeting_id: &str) -> Result<Meeting> {
        let path = format!("{MEETINGS_ROUTE}/{meeting_id}");
        let url = format!("{}{}", self.base_url, path);

        let response = self.authorize(self.client.get(&url)).send().await?;
        Self::check(&path, &response)?;

        let body: MeetingDetailsResponse = response.json().await?;
        Ok(body.meeting_details)
    }

    async fn update_promise(&self, user_id: &str, amount: i32) -> Result<()> {
        let path = format!("{USERS_ROUTE}/{user_id}{PROMISE_ROUTE}");
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .authorize(self.client.put(&url))
            .json(&PromiseUpdate { amount })
            .send()
            .await?;
        Self::check(&path, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalised() {
        let api = HttpApi::new("http://localhost:3000/", None).unwrap();
        assert_eq!(api.base_url, "http://localhost:3000");
    }
}
