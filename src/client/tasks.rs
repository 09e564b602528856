use super::{decode, with_token, ClientError};
use crate::api::{CreateTaskRequest, DeleteResponse, UpdateTaskRequest};
use crate::tables::Task;
use crate::TASKS_API;

pub async fn fetch_tasks(base_url: &str, token: &str) -> Result<Vec<Task>, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}", base_url);
    let response = with_token(client.get(url), token).send().await?;
    decode(response).await
}

pub async fn fetch_task(base_url: &str, token: &str, id: i32) -> Result<Task, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}/{}", base_url, id);
    let response = with_token(client.get(url), token).send().await?;
    decode(response).await
}

pub async fn create_task(
    base_url: &str,
    token: &str,
    task: &CreateTaskRequest,
) -> Result<Task, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}", base_url);
    let response = with_token(client.post(url), token).json(task).send().await?;
    decode(response).await
}

pub async fn update_task(
    base_url: &str,
    token: &str,
    id: i32,
    task: &UpdateTaskRequest,
) -> Result<Task, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}/{}", base_url, id);
    let response = with_token(client.put(url), token).json(task).send().await?;
    decode(response).await
}

pub async fn delete_task(base_url: &str, token: &str, id: i32) -> Result<DeleteResponse, ClientError> {
    let client = reqwest::Client::new();
    let url = format!("{}/{TASKS_API}/{}", base_url, id);
    let response = with_token(client.delete(url), token).send().await?;
    decode(response).await
}
