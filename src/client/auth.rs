use super::{decode, with_token, ClientError};
use crate::api::{AuthResponse, LoginRequest, MeResponse, MessageResponse, SignupRequest};

pub async fn signup(base_url: &str, request: &SignupRequest) -> Result<AuthResponse, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/auth/signup", base_url);
    let response = client.post(url).json(request).send().await?;
    decode(response).await
}

pub async fn login(base_url: &str, request: &LoginRequest) -> Result<AuthResponse, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/auth/login", base_url);
    let response = client.post(url).json(request).send().await?;
    decode(response).await
}

pub async fn logout(base_url: &str) -> Result<MessageResponse, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/auth/logout", base_url);
    let response = client.post(url).send().await?;
    decode(response).await
}

pub async fn me(base_url: &str, token: &str) -> Result<MeResponse, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/auth/me", base_url);
    let response = with_token(client.get(url), token).send().await?;
    decode(response).await
}
