use hello_api_core::naming::LAMBDA_SERVICE_PRINCIPAL;

use super::block_on;
use super::error::{classify, ProviderError};

pub trait RoleManager {
    /// Creates the role and returns its ARN.
    fn create_role(&self, role_name: &str, trust_policy: &str) -> Result<String, ProviderError>;
    fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError>;
    fn detach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError>;
    fn delete_role(&self, role_name: &str) -> Result<(), ProviderError>;
    /// Whether a read of the role already returns a trust policy naming the
    /// Lambda service principal.
    fn trust_policy_visible(&self, role_name: &str) -> Result<bool, ProviderError>;
}

pub struct IamRoleManager {
    client: aws_sdk_iam::Client,
}

impl IamRoleManager {
    pub fn new(client: aws_sdk_iam::Client) -> Self {
        Self { client }
    }
}

impl RoleManager for IamRoleManager {
    fn create_role(&self, role_name: &str, trust_policy: &str) -> Result<String, ProviderError> {
        let output = block_on(
            self.client
                .create_role()
                .role_name(role_name)
                .assume_role_policy_document(trust_policy)
                .send(),
        )
        .map_err(classify)?;
        output
            .role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| ProviderError::missing_output("CreateRole", "Role.Arn"))
    }

    fn attach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .attach_role_policy()
                .role_name(role_name)
                .policy_arn(policy_arn)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn detach_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .detach_role_policy()
                .role_name(role_name)
                .policy_arn(policy_arn)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn delete_role(&self, role_name: &str) -> Result<(), ProviderError> {
        block_on(self.client.delete_role().role_name(role_name).send())
            .map(|_| ())
            .map_err(classify)
    }

    fn trust_policy_visible(&self, role_name: &str) -> Result<bool, ProviderError> {
        let output = match block_on(self.client.get_role().role_name(role_name).send())
            .map_err(classify)
        {
            Ok(output) => output,
            // the role itself may not be readable yet
            Err(error) if error.is_not_found() => return Ok(false),
            Err(error) => return Err(error),
        };
        // IAM returns the document URL-encoded; the principal has no escaped characters.
        let document = output
            .role()
            .and_then(|role| role.assume_role_policy_document());
        Ok(document.is_some_and(|document| document.contains(LAMBDA_SERVICE_PRINCIPAL)))
    }
}
