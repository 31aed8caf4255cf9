//! Storage backend capability: the `RestDriver` trait and its method set.

use crate::context::{ReadContext, WriteContext};
use crate::endpoint::EndpointConfig;
use crate::error::DriverError;
use crate::response::RestResponse;
use async_trait::async_trait;
use serde_json::Value;

pub type DriverResult = Result<RestResponse, DriverError>;

/// Backend methods the pipeline can dispatch to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DriverMethod {
    GetAll,
    GetOne,
    Create,
    Update,
    Replace,
    DeleteOne,
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl DriverMethod {
    pub const CRUD: [DriverMethod; 6] = [
        DriverMethod::GetAll,
        DriverMethod::GetOne,
        DriverMethod::Create,
        DriverMethod::Update,
        DriverMethod::Replace,
        DriverMethod::DeleteOne,
    ];

    /// Wire name, as used in `method:<name>` error fields.
    pub fn name(self) -> &'static str {
        match self {
            DriverMethod::GetAll => "getAll",
            DriverMethod::GetOne => "getOne",
            DriverMethod::Create => "create",
            DriverMethod::Update => "update",
            DriverMethod::Replace => "replace",
            DriverMethod::DeleteOne => "deleteOne",
            DriverMethod::Get => "get",
            DriverMethod::Post => "post",
            DriverMethod::Put => "put",
            DriverMethod::Patch => "patch",
            DriverMethod::Delete => "delete",
        }
    }
}

/// A storage backend. Implement the methods you support and report them from `supports`;
/// the pipeline checks `supports` before every call, so unsupported defaults are never reached.
#[async_trait]
pub trait RestDriver: Send + Sync {
    fn supports(&self, method: DriverMethod) -> bool;

    fn name(&self) -> &'static str {
        "driver"
    }

    async fn get_all(&self, _ctx: &ReadContext, _config: &EndpointConfig) -> DriverResult {
        Err(DriverError::Unsupported(DriverMethod::GetAll.name()))
    }

    async fn get_one(&self, _ctx: &ReadContext, _config: &EndpointConfig, _id: &str) -> DriverResult {
        Err(DriverError::Unsupported(DriverMethod::GetOne.name()))
    }

    async fn create(&self, _ctx: &WriteContext, _config: &EndpointConfig, _body: &Value) -> DriverResult {
        Err(DriverError::Unsupported(DriverMethod::Create.name()))
    }

    async fn update(
        &self,
        _ctx: &WriteContext,
        _config: &EndpointConfig,
        _id: &str,
        _body: &Value,
    ) -> DriverResult {
        Err(DriverError::Unsupported(DriverMethod::Update.name()))
    }

    async fn replace(
        &self,
        _ctx: &WriteContext,
        _config: &EndpointConfig,
        _id: &str,
        _body: &Value,
    ) -> DriverResult {
        Err(DriverError::Unsupported(DriverMethod::Replace.name()))
    }

    async fn delete_one(&self, _ctx: &ReadContext, _config: &EndpointConfig, _id: &str) -> DriverResult {
        Err(DriverError::Unsupported(DriverMethod::DeleteOne.name()))
    }

    async fn get(&self, _ctx: &ReadContext, _config: &EndpointConfig) -> DriverResult {
        Err(DriverError::Unsupported(DriverMethod::Get.name()))
    }

    async fn post(&self, _ctx: &WriteContext, _config: &EndpointConfig) -> DriverResult {
        Err(DriverError::Unsupported(DriverMethod::Post.name()))
    }

    async fn put(&self, _ctx: &WriteContext, _config: &EndpointConfig) -> DriverResult {
        Err(DriverError::Unsupported(DriverMethod::Put.name()))
    }

    async fn patch(&self, _ctx: &WriteContext, _config: &EndpointConfig) -> DriverResult {
        Err(DriverError::Unsupported(DriverMethod::Patch.name()))
    }

    async fn delete(&self, _ctx: &ReadContext, _config: &EndpointConfig) -> DriverResult {
        Err(DriverError::Unsupported(DriverMethod::Delete.name()))
    }
}
