//! 远程规则拉取
//! 只负责一次 HTTP GET 并返回响应原文，解析与编译交给快照构建

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::GlobalConfig;
use crate::error::{TidyResult, UrlTidyError};

/// 远程规则传输接口
#[async_trait]
pub trait RuleFeedFetcher: Send + Sync {
    /// 拉取规则源原文，非 2xx 视为失败
    async fn fetch(&self) -> TidyResult<String>;
}

/// 基于 reqwest 的 HTTP 拉取器
#[derive(Debug, Clone)]
pub struct HttpRuleFetcher {
    client: Client,
    url: String,
    user_agent: String,
}

impl HttpRuleFetcher {
    pub fn new(config: &GlobalConfig) -> TidyResult<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            client,
            url: config.rule_feed_url.clone(),
            user_agent: config.user_agent.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RuleFeedFetcher for HttpRuleFetcher {
    async fn fetch(&self) -> TidyResult<String> {
        debug!("开始拉取远程规则，URL：{}", self.url);
        let response = self.client.get(&self.url)
            .header("User-Agent", &self.user_agent)
            .header("Accept-Encoding", "gzip, deflate")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(UrlTidyError::RuleLoadError(format!(
                "URL {} 返回状态码 {}",
                self.url, response.status()
            )));
        }

        let body = response.text().await?;
        debug!("远程规则拉取成功，响应大小：{} 字节", body.len());
        Ok(body)
    }
}
