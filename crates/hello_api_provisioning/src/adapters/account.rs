use super::block_on;
use super::error::{classify, ProviderError};

pub trait AccountLookup {
    /// Account id of the calling credentials.
    fn account_id(&self) -> Result<String, ProviderError>;
}

pub struct StsAccountLookup {
    client: aws_sdk_sts::Client,
}

impl StsAccountLookup {
    pub fn new(client: aws_sdk_sts::Client) -> Self {
        Self { client }
    }
}

impl AccountLookup for StsAccountLookup {
    fn account_id(&self) -> Result<String, ProviderError> {
        let output = block_on(self.client.get_caller_identity().send()).map_err(classify)?;
        output
            .account()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::missing_output("GetCallerIdentity", "Account"))
    }
}
