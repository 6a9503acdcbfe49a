use std::sync::Arc;

use cloudlite::config::EnvConfig;
use cloudlite::errors::CloudError;
use cloudlite::{
    Callbacks, CallFunctionParams, Cloud, CloudConfig, Completion, DownloadFileParams,
    FileListParams, InitCloudConfig, RecordingTransport, UploadFileParams,
};
use parking_lot::Mutex;
use serde_json::json;

fn cloud_with(reply: serde_json::Value) -> (Arc<RecordingTransport>, Cloud) {
    let t = Arc::new(RecordingTransport::replying(reply));
    let cloud = Cloud::new(t.clone());
    cloud.init(InitCloudConfig {
        env: Some(EnvConfig::Single("prod".into())),
        trace_user: Some(true),
    });
    (t, cloud)
}

#[tokio::test]
async fn callback_style_reports_success_then_complete() {
    let (_t, cloud) = cloud_with(json!({"result": {"sum": 3}}));
    let log = Arc::new(Mutex::new(Vec::new()));
    let (l1, l2) = (log.clone(), log.clone());
    cloud
        .call_function(CallFunctionParams::new("add").data(json!({"a": 1, "b": 2})))
        .with_callbacks(
            Callbacks::new()
                .success(move |r: cloudlite::request::CallFunctionResult| {
                    l1.lock().push(format!("success:{}", r.result.unwrap_or_default()))
                })
                .fail(|_| panic!("unexpected fail"))
                .complete(move |c| {
                    l2.lock().push(format!("complete:{}", matches!(c, Completion::Success(_))))
                }),
        )
        .unwrap()
        .await
        .unwrap();
    assert_eq!(*log.lock(), vec![r#"success:{"sum":3}"#, "complete:true"]);
}

#[tokio::test]
async fn complete_alone_sees_remote_failure() {
    let t = Arc::new(RecordingTransport::rejecting("storage.uploadFile:fail 403"));
    let cloud = Cloud::new(t);
    let seen = Arc::new(Mutex::new(None));
    let s = seen.clone();
    cloud
        .upload_file(UploadFileParams::new("img/a.png", "/tmp/a.png"))
        .with_callbacks(Callbacks::new().complete(move |c| *s.lock() = Some(c)))
        .unwrap()
        .await
        .unwrap();
    match seen.lock().take() {
        Some(Completion::Fail(e)) => assert_eq!(e.err_msg, "storage.uploadFile:fail 403"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn storage_calls_carry_storage_env_and_trace_flag() {
    let (t, cloud) = cloud_with(json!({"tempFilePath": "/tmp/x", "statusCode": 200}));
    let r = cloud.download_file(DownloadFileParams::new("cloud://bucket/x")).await.unwrap();
    assert_eq!(r.status_code, 200);
    let sent = serde_json::to_value(t.last().unwrap()).unwrap();
    assert_eq!(sent["action"], "storage.downloadFile");
    assert_eq!(sent["fileID"], "cloud://bucket/x");
    assert_eq!(sent["env"], "prod");
    assert_eq!(sent["traceUser"], true);
}

#[tokio::test]
async fn per_call_config_overrides_init() {
    let (t, cloud) = cloud_with(json!({"fileList": [{"fileID": "a", "status": 0}]}));
    let mut params = FileListParams::new(["a"]);
    params.config = Some(CloudConfig { env: Some("staging".into()), trace_user: Some(false) });
    let r = cloud.delete_file(params).await.unwrap();
    assert_eq!(r.file_list[0].status, 0);
    let sent = t.last().unwrap();
    assert_eq!(sent.env.as_deref(), Some("staging"));
    assert!(!sent.trace_user);
    assert_eq!(sent.request.action(), "storage.batchDeleteFile");
}

#[tokio::test]
async fn temp_url_list_is_bounded() {
    let (t, cloud) = cloud_with(json!({"fileList": []}));
    let too_many: Vec<String> = (0..51).map(|i| format!("f{i}")).collect();
    let r = cloud.get_temp_file_url(FileListParams::new(too_many)).await;
    assert!(matches!(r, Err(CloudError::InvalidArgument(_))));
    let r = cloud.get_temp_file_url(FileListParams::new(Vec::<String>::new())).await;
    assert!(r.is_err());
    assert!(t.sent().is_empty());
}

#[tokio::test]
async fn database_from_cloud_uses_database_env() {
    let t = Arc::new(RecordingTransport::replying(json!({"total": 0})));
    let cloud = Cloud::new(t.clone());
    cloud.init(InitCloudConfig {
        env: Some(EnvConfig::PerService {
            database: Some("db-env".into()),
            functions: None,
            storage: None,
        }),
        trace_user: None,
    });
    cloud.database(None).collection("c").count().await.unwrap();
    assert_eq!(t.last().unwrap().env.as_deref(), Some("db-env"));
    let explicit =
        cloud.database(Some(CloudConfig { env: Some("other".into()), trace_user: None }));
    assert_eq!(explicit.config().env.as_deref(), Some("other"));
}

#[tokio::test]
async fn no_handlers_is_a_usage_error() {
    let (t, cloud) = cloud_with(json!({}));
    let r = cloud.call_function(CallFunctionParams::new("f")).with_callbacks(Callbacks::new());
    assert!(matches!(r, Err(CloudError::InvalidArgument(_))));
    assert!(t.sent().is_empty());
}

#[tokio::test]
async fn rejected_gateway_calls_keep_their_action() {
    let (t, cloud) = cloud_with(json!({}));
    let call = cloud.call_function(CallFunctionParams::new(""));
    assert_eq!(call.action(), "functions.invokeFunction");
    assert!(matches!(call.await, Err(CloudError::InvalidArgument(_))));
    let call = cloud.get_temp_file_url(FileListParams::new(Vec::<String>::new()));
    assert_eq!(call.action(), "storage.getTempFileURL");
    assert_eq!(cloud.download_file(DownloadFileParams::new("")).action(), "storage.downloadFile");
    assert!(t.sent().is_empty());
}
