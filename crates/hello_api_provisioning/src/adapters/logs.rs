use super::block_on;
use super::error::{classify, ProviderError};

pub trait LogStore {
    /// Names of every stream in the group, across all pages.
    fn list_log_streams(&self, log_group: &str) -> Result<Vec<String>, ProviderError>;
    fn delete_log_stream(&self, log_group: &str, log_stream: &str) -> Result<(), ProviderError>;
    fn delete_log_group(&self, log_group: &str) -> Result<(), ProviderError>;
}

pub struct CloudWatchLogStore {
    client: aws_sdk_cloudwatchlogs::Client,
}

impl CloudWatchLogStore {
    pub fn new(client: aws_sdk_cloudwatchlogs::Client) -> Self {
        Self { client }
    }
}

impl LogStore for CloudWatchLogStore {
    fn list_log_streams(&self, log_group: &str) -> Result<Vec<String>, ProviderError> {
        block_on(async {
            let mut pages = self
                .client
                .describe_log_streams()
                .log_group_name(log_group)
                .into_paginator()
                .send();
            let mut names = Vec::new();
            while let Some(page) = pages.next().await {
                let page = page.map_err(classify)?;
                names.extend(
                    page.log_streams()
                        .iter()
                        .filter_map(|stream| stream.log_stream_name())
                        .map(str::to_string),
                );
            }
            Ok::<_, ProviderError>(names)
        })
    }

    fn delete_log_stream(&self, log_group: &str, log_stream: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .delete_log_stream()
                .log_group_name(log_group)
                .log_stream_name(log_stream)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn delete_log_group(&self, log_group: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .delete_log_group()
                .log_group_name(log_group)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }
}
