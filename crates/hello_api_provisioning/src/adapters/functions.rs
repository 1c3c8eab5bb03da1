use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Architecture, FunctionCode, Runtime};

use super::block_on;
use super::error::{classify, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionRuntime {
    Python311,
    /// Custom runtime executing a `bootstrap` binary.
    ProvidedAl2023,
}

impl FunctionRuntime {
    fn to_sdk(self) -> Runtime {
        match self {
            Self::Python311 => Runtime::Python311,
            Self::ProvidedAl2023 => Runtime::Providedal2023,
        }
    }
}

/// An arm64 function created from an in-memory zip archive.
#[derive(Clone, PartialEq, Eq)]
pub struct FunctionRequest {
    pub function_name: String,
    pub role_arn: String,
    pub runtime: FunctionRuntime,
    pub handler: String,
    pub description: String,
    pub zip: Vec<u8>,
}

impl std::fmt::Debug for FunctionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRequest")
            .field("function_name", &self.function_name)
            .field("role_arn", &self.role_arn)
            .field("runtime", &self.runtime)
            .field("handler", &self.handler)
            .field("zip_bytes", &self.zip.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokePermissionRequest {
    pub function_name: String,
    pub statement_id: String,
    pub action: String,
    pub principal: String,
    pub source_arn: String,
}

pub trait FunctionManager {
    /// Returns the function ARN.
    fn create_function(&self, request: &FunctionRequest) -> Result<String, ProviderError>;
    fn add_invoke_permission(&self, request: &InvokePermissionRequest)
        -> Result<(), ProviderError>;
    fn delete_function(&self, function_name: &str) -> Result<(), ProviderError>;
}

pub struct LambdaFunctionManager {
    client: aws_sdk_lambda::Client,
}

impl LambdaFunctionManager {
    pub fn new(client: aws_sdk_lambda::Client) -> Self {
        Self { client }
    }
}

impl FunctionManager for LambdaFunctionManager {
    fn create_function(&self, request: &FunctionRequest) -> Result<String, ProviderError> {
        let code = FunctionCode::builder()
            .zip_file(Blob::new(request.zip.clone()))
            .build();
        let output = block_on(
            self.client
                .create_function()
                .function_name(&request.function_name)
                .runtime(request.runtime.to_sdk())
                .role(&request.role_arn)
                .handler(&request.handler)
                .code(code)
                .architectures(Architecture::Arm64)
                .description(&request.description)
                .send(),
        )
        .map_err(classify)?;
        output
            .function_arn()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::missing_output("CreateFunction", "FunctionArn"))
    }

    fn add_invoke_permission(
        &self,
        request: &InvokePermissionRequest,
    ) -> Result<(), ProviderError> {
        block_on(
            self.client
                .add_permission()
                .function_name(&request.function_name)
                .statement_id(&request.statement_id)
                .action(&request.action)
                .principal(&request.principal)
                .source_arn(&request.source_arn)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }

    fn delete_function(&self, function_name: &str) -> Result<(), ProviderError> {
        block_on(
            self.client
                .delete_function()
                .function_name(function_name)
                .send(),
        )
        .map(|_| ())
        .map_err(classify)
    }
}
