// src/client.rs

use crate::{config::AppConfig, error::*};
use log::debug;
use reqwest::{
    IntoUrl, Response, StatusCode,
    header::{self, HeaderMap, HeaderName, HeaderValue},
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{
    RetryTransientMiddleware, Retryable, RetryableStrategy, default_on_request_failure,
    policies::ExponentialBackoff,
};
use serde::{Serialize, de::DeserializeOwned};
use std::{collections::HashMap, sync::Arc, time::Duration};

/// 只对这些状态码进行重试
const RETRY_STATUSES: [StatusCode; 5] = [
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

struct TransientStatusStrategy;

impl RetryableStrategy for TransientStatusStrategy {
    fn handle(
        &self,
        res: &Result<reqwest::Response, reqwest_middleware::Error>,
    ) -> Option<Retryable> {
        match res {
            Ok(response) if RETRY_STATUSES.contains(&response.status()) => {
                debug!("服务器返回 {}，稍后重试: {}", response.status(), response.url());
                Some(Retryable::Transient)
            }
            Ok(_) => None,
            Err(error) => default_on_request_failure(error),
        }
    }
}

/// 每个提取器独占一个 `RobustClient`：固定的默认请求头、连接复用，以及
/// 只作用于幂等请求 (GET/HEAD) 的重试策略。POST 直接走底层客户端。
#[derive(Clone)]
pub struct RobustClient {
    pub client: ClientWithMiddleware,
    raw: reqwest::Client,
    config: Arc<AppConfig>,
}

impl RobustClient {
    pub fn new(config: Arc<AppConfig>) -> AppResult<Self> {
        Self::with_headers(config, &[])
    }

    pub fn with_headers(config: Arc<AppConfig>, extra_headers: &[(&str, &str)]) -> AppResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        for (name, value) in extra_headers {
            let (name, value) = parse_header(name, value)?;
            default_headers.insert(name, value);
        }

        let raw = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(default_headers)
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.max_workers * 2)
            .build()?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(config.retry_min_backoff, config.retry_max_backoff)
            .build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(raw.clone())
            .with(RetryTransientMiddleware::new_with_policy_and_strategy(
                retry_policy,
                TransientStatusStrategy,
            ))
            .build();

        Ok(Self { client, raw, config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 发起 GET 请求，非 2xx 视为错误
    pub async fn get<T: IntoUrl>(&self, url: T) -> AppResult<Response> {
        let res = self.client.get(url).send().await?;
        Ok(res.error_for_status()?)
    }

    /// 与 `get` 相同，但 404 返回 `None`，用于分页终止判断
    pub async fn get_optional<T: IntoUrl>(&self, url: T) -> AppResult<Option<Response>> {
        let res = self.client.get(url).send().await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(res.error_for_status()?))
    }

    pub async fn get_text<T: IntoUrl>(&self, url: T) -> AppResult<String> {
        Ok(self.get(url).await?.text().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        let res = self.get(url).await?;
        Self::parse_json(url, res).await
    }

    /// POST 不是幂等请求，不经过重试中间件
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> AppResult<T> {
        let res = self.raw.post(url).json(body).send().await?.error_for_status()?;
        Self::parse_json(url, res).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        let res = self.raw.post(url).send().await?.error_for_status()?;
        Self::parse_json(url, res).await
    }

    pub async fn parse_json<T: DeserializeOwned>(url: &str, res: Response) -> AppResult<T> {
        let body = res.text().await?;
        serde_json::from_str(&body).map_err(|source| AppError::ApiParseFailed {
            url: url.to_string(),
            source,
        })
    }

    /// 发起一次有时限的 HEAD 请求，返回 Content-Length。
    /// 不经过重试中间件，单个探测的耗时上限就是 `timeout`。
    pub async fn head_content_length(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        timeout: Duration,
    ) -> AppResult<Option<u64>> {
        let mut request = self.raw.head(url).timeout(timeout);
        for (name, value) in headers {
            let (name, value) = parse_header(name, value)?;
            request = request.header(name, value);
        }
        let res = request.send().await?.error_for_status()?;
        Ok(res
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok()))
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> AppResult<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| AppError::InvalidInput(format!("无效的请求头名称 '{}': {}", name, e)))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| AppError::InvalidInput(format!("无效的请求头 '{}' 的值: {}", name, e)))?;
    Ok((header_name, header_value))
}
