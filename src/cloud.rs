//! The cloud gateway: owns the init config and hands out databases and the
//! function / storage calls.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::config::{CloudConfig, InitCloudConfig, Service};
use crate::database::Database;
use crate::errors::CloudError;
use crate::request::{
    Action, CallFunctionResult, DeleteFileResult, DownloadFileResult, Envelope,
    GetTempFileUrlResult, MAX_FILE_LIST, Request, UploadFileResult,
};
use crate::transport::{ApiCall, Transport};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallFunctionParams {
    pub name: String,
    pub data: Option<Value>,
    pub slow: bool,
    pub config: Option<CloudConfig>,
}

impl CallFunctionParams {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    #[must_use]
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadFileParams {
    pub cloud_path: String,
    pub file_path: String,
    pub header: Option<Map<String, Value>>,
    pub config: Option<CloudConfig>,
}

impl UploadFileParams {
    pub fn new(cloud_path: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self { cloud_path: cloud_path.into(), file_path: file_path.into(), ..Self::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadFileParams {
    pub file_id: String,
    pub cloud_path: Option<String>,
    pub config: Option<CloudConfig>,
}

impl DownloadFileParams {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self { file_id: file_id.into(), ..Self::default() }
    }
}

/// Shared by `get_temp_file_url` and `delete_file`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileListParams {
    pub file_list: Vec<String>,
    pub config: Option<CloudConfig>,
}

impl FileListParams {
    pub fn new<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { file_list: files.into_iter().map(Into::into).collect(), config: None }
    }
}

fn require(what: &str, value: &str) -> Result<(), CloudError> {
    if value.trim().is_empty() {
        return Err(CloudError::invalid(format!("{what} must not be empty")));
    }
    Ok(())
}

fn check_file_list(files: &[String]) -> Result<(), CloudError> {
    if files.is_empty() || files.len() > MAX_FILE_LIST {
        return Err(CloudError::invalid(format!(
            "fileList must hold 1..={MAX_FILE_LIST} entries, got {}",
            files.len()
        )));
    }
    for f in files {
        require("fileID", f)?;
    }
    Ok(())
}

/// Entry point for a cloud runtime.
#[derive(Clone)]
pub struct Cloud {
    transport: Arc<dyn Transport>,
    init: Arc<RwLock<InitCloudConfig>>,
}

impl std::fmt::Debug for Cloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cloud").field("init", &*self.init.read()).finish_non_exhaustive()
    }
}

impl Cloud {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport, init: Arc::new(RwLock::new(InitCloudConfig::default())) }
    }

    /// Replace the init config. Later calls resolve their env against it.
    pub fn init(&self, config: InitCloudConfig) {
        log::debug!("cloud init: {config:?}");
        *self.init.write() = config;
    }

    pub fn init_config(&self) -> InitCloudConfig {
        self.init.read().clone()
    }

    fn resolve(&self, service: Service, call: Option<&CloudConfig>) -> CloudConfig {
        let init = self.init.read();
        CloudConfig {
            env: init.resolve_env(service, call),
            trace_user: Some(init.resolve_trace_user(call)),
        }
    }

    pub fn database(&self, config: Option<CloudConfig>) -> Database {
        Database::new(self.transport.clone(), self.resolve(Service::Database, config.as_ref()))
    }

    fn call<T>(
        &self,
        service: Service,
        action: Action,
        call: Option<&CloudConfig>,
        request: Result<Request, CloudError>,
    ) -> ApiCall<T>
    where
        T: serde::de::DeserializeOwned + Send + 'static,
    {
        let cfg = self.resolve(service, call);
        let trace_user = cfg.trace_user.unwrap_or(false);
        let envelope = request.map(|r| Envelope::new(r, cfg.env, trace_user));
        ApiCall::dispatch(&self.transport, action, envelope)
    }

    pub fn call_function(&self, params: CallFunctionParams) -> ApiCall<CallFunctionResult> {
        let CallFunctionParams { name, data, slow, config } = params;
        let request =
            require("function name", &name).map(|()| Request::CallFunction { name, data, slow });
        self.call(Service::Functions, Action::CallFunction, config.as_ref(), request)
    }

    pub fn upload_file(&self, params: UploadFileParams) -> ApiCall<UploadFileResult> {
        let UploadFileParams { cloud_path, file_path, header, config } = params;
        let request = require("cloudPath", &cloud_path)
            .and_then(|()| require("filePath", &file_path))
            .map(|()| Request::UploadFile { cloud_path, file_path, header });
        self.call(Service::Storage, Action::UploadFile, config.as_ref(), request)
    }

    pub fn download_file(&self, params: DownloadFileParams) -> ApiCall<DownloadFileResult> {
        let DownloadFileParams { file_id, cloud_path, config } = params;
        let request =
            require("fileID", &file_id).map(|()| Request::DownloadFile { file_id, cloud_path });
        self.call(Service::Storage, Action::DownloadFile, config.as_ref(), request)
    }

    pub fn get_temp_file_url(&self, params: FileListParams) -> ApiCall<GetTempFileUrlResult> {
        let FileListParams { file_list, config } = params;
        let request = check_file_list(&file_list).map(|()| Request::GetTempFileUrl { file_list });
        self.call(Service::Storage, Action::GetTempFileUrl, config.as_ref(), request)
    }

    pub fn delete_file(&self, params: FileListParams) -> ApiCall<DeleteFileResult> {
        let FileListParams { file_list, config } = params;
        let request = check_file_list(&file_list).map(|()| Request::DeleteFile { file_list });
        self.call(Service::Storage, Action::DeleteFile, config.as_ref(), request)
    }
}
