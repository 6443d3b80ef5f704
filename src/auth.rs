use log::{debug, info, warn};
use reqwest::{Client, ClientBuilder};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use crate::error::{BirdError, Result};
use crate::session::SessionTokens;

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const TARGET_HEADER: &str = "X-Amz-Target";
const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";

#[derive(Debug, Deserialize)]
struct IdentityErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignUpOutcome {
    pub user_confirmed: bool,
    #[serde(rename = "UserSub")]
    pub user_sub: String,
}

/// Client for the user pool's sign-in, sign-up and confirmation calls.
#[derive(Clone, Debug)]
pub struct IdentityClient {
    http_client: Client,
    endpoint: String,
    client_id: String,
}

impl IdentityClient {
    pub fn new(endpoint: &str, client_id: &str) -> Result<Self> {
        let mut header_map = HeaderMap::new();
        header_map.insert(CONTENT_TYPE, HeaderValue::from_static(AMZ_JSON));
        let http_client = ClientBuilder::new()
            .default_headers(header_map)
            .build()?;
        Ok(Self {
            http_client,
            endpoint: endpoint.to_string(),
            client_id: client_id.to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, operation: &str, body: serde_json::Value) -> Result<T> {
        info!("identity call: {}", operation);
        let http_response = self.http_client.post(&self.endpoint)
            .header(TARGET_HEADER, format!("{}.{}", TARGET_PREFIX, operation))
            .body(body.to_string())
            .send()
            .await?;
        let status = http_response.status();
        let response_str = http_response.text().await?;
        debug!("identity response to {}: {}", operation, status);
        if !status.is_success() {
            let err = normalize_error(status.as_u16(), &response_str);
            warn!("identity call {} failed: {}", operation, err);
            return Err(err);
        }
        let response = serde_json::from_str(&response_str)
            .map_err(|e| BirdError::malformed(format!("{} response: {}", operation, e)))?;
        Ok(response)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionTokens> {
        let body = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": { "USERNAME": email, "PASSWORD": password },
        });
        let response: InitiateAuthResponse = self.call("InitiateAuth", body).await?;
        let Some(result) = response.authentication_result else {
            return Err(BirdError::Identity {
                kind: "ChallengeRequired".to_string(),
                message: format!("sign-in needs an extra step: {}", response.challenge_name.unwrap_or_default()),
            });
        };
        let access_token = result.access_token
            .filter(|x| !x.is_empty())
            .ok_or_else(|| BirdError::malformed("AuthenticationResult without AccessToken"))?;
        let id_token = result.id_token
            .filter(|x| !x.is_empty())
            .ok_or_else(|| BirdError::malformed("AuthenticationResult without IdToken"))?;
        Ok(SessionTokens {
            id_token,
            access_token,
            refresh_token: result.refresh_token.unwrap_or_default(),
        })
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome> {
        let body = json!({
            "ClientId": self.client_id,
            "Username": email,
            "Password": password,
            "UserAttributes": [{ "Name": "email", "Value": email }],
        });
        self.call("SignUp", body).await
    }

    pub async fn confirm_sign_up(&self, email: &str, code: &str) -> Result<()> {
        let body = json!({
            "ClientId": self.client_id,
            "Username": email,
            "ConfirmationCode": code,
        });
        let _: serde_json::Value = self.call("ConfirmSignUp", body).await?;
        Ok(())
    }
}

fn normalize_error(status: u16, body: &str) -> BirdError {
    match serde_json::from_str::<IdentityErrorBody>(body) {
        Ok(IdentityErrorBody { kind: Some(kind), message }) => BirdError::Identity {
            kind: kind.rsplit('#').next().unwrap_or_default().to_string(),
            message: message.unwrap_or_default(),
        },
        _ => BirdError::Http { status, body: body.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::Router;
    use crate::test_utils::serve;

    async fn fake_identity(headers: AxumHeaders, body: String) -> axum::response::Response {
        let target = headers.get(TARGET_HEADER).and_then(|x| x.to_str().ok()).unwrap_or_default().to_string();
        let content_type = headers.get("content-type").and_then(|x| x.to_str().ok()).unwrap_or_default().to_string();
        assert_eq!(content_type, AMZ_JSON);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        match target.as_str() {
            "AWSCognitoIdentityProviderService.InitiateAuth" => {
                if body["AuthParameters"]["PASSWORD"] == "right" {
                    axum::Json(json!({
                        "AuthenticationResult": { "IdToken": "id", "AccessToken": "access", "RefreshToken": "refresh" }
                    })).into_response()
                } else if body["AuthParameters"]["PASSWORD"] == "no-id" {
                    axum::Json(json!({
                        "AuthenticationResult": { "AccessToken": "access", "RefreshToken": "refresh" }
                    })).into_response()
                } else if body["AuthParameters"]["PASSWORD"] == "temporary" {
                    axum::Json(json!({ "ChallengeName": "NEW_PASSWORD_REQUIRED", "Session": "s" })).into_response()
                } else {
                    (StatusCode::BAD_REQUEST, axum::Json(json!({
                        "__type": "com.amazonaws.cognito#NotAuthorizedException",
                        "message": "Incorrect username or password."
                    }))).into_response()
                }
            }
            "AWSCognitoIdentityProviderService.SignUp" => {
                assert_eq!(body["UserAttributes"][0]["Value"], body["Username"]);
                axum::Json(json!({ "UserConfirmed": false, "UserSub": "sub-1" })).into_response()
            }
            "AWSCognitoIdentityProviderService.ConfirmSignUp" => {
                if body["ConfirmationCode"] == "123456" {
                    axum::Json(json!({})).into_response()
                } else {
                    (StatusCode::BAD_REQUEST, axum::Json(json!({
                        "__type": "CodeMismatchException",
                        "message": "Invalid verification code provided, please try again."
                    }))).into_response()
                }
            }
            _ => (StatusCode::BAD_GATEWAY, "unknown target").into_response(),
        }
    }

    async fn client() -> IdentityClient {
        let base_url = serve(Router::new().route("/", post(fake_identity))).await;
        IdentityClient::new(&format!("{}/", base_url), "client").unwrap()
    }

    #[tokio::test]
    async fn test_sign_in_returns_tokens() {
        let tokens = client().await.sign_in("a@b.c", "right").await.unwrap();
        assert_eq!(tokens.id_token, "id");
        assert_eq!(tokens.access_token, "access");
        assert_eq!(tokens.refresh_token, "refresh");
    }

    #[tokio::test]
    async fn test_sign_in_error_is_normalized() {
        let err = client().await.sign_in("a@b.c", "wrong").await.unwrap_err();
        match err {
            BirdError::Identity { kind, message } => {
                assert_eq!(kind, "NotAuthorizedException");
                assert_eq!(message, "Incorrect username or password.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sign_in_challenge_is_an_error() {
        let err = client().await.sign_in("a@b.c", "temporary").await.unwrap_err();
        assert!(matches!(err, BirdError::Identity { ref kind, .. } if kind == "ChallengeRequired"));
    }

    #[tokio::test]
    async fn test_sign_in_without_id_token_is_malformed() {
        let err = client().await.sign_in("a@b.c", "no-id").await.unwrap_err();
        assert!(matches!(err, BirdError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_sign_up_and_confirm() {
        let client = client().await;
        let outcome = client.sign_up("a@b.c", "pw").await.unwrap();
        assert_eq!(outcome, SignUpOutcome { user_confirmed: false, user_sub: "sub-1".to_string() });
        client.confirm_sign_up("a@b.c", "123456").await.unwrap();
        assert!(client.confirm_sign_up("a@b.c", "000000").await.is_err());
    }

    #[test]
    fn test_unstructured_error_body() {
        let err = normalize_error(502, "bad gateway");
        assert!(matches!(err, BirdError::Http { status: 502, .. }));
    }
}
