//! Asynchronous VM instance client.

use crate::models::{InstanceAction, InstanceResponse, QueryInstanceResponse, VmInstanceInventory};
use crate::Result;
use reqwest::{Method, Response, StatusCode};
use secrecy::SecretString;
use std::time::Duration;
use tracing::{debug, info, warn};
use zstack_core::error::describe_failure;
use zstack_core::uuid::VmUuid;
use zstack_core::{Error, Session, ZStackConfig};

/// Collection path for VM instances.
pub const VM_INSTANCES_PATH: &str = "/zstack/v1/vm-instances";

/// Client for the VM instance endpoints.
#[derive(Debug)]
pub struct InstanceClient {
    session: Session,
}

impl InstanceClient {
    /// Log in and build a client.
    ///
    /// # Errors
    ///
    /// Returns the login failure; no client is built in that case.
    pub async fn connect(
        config: ZStackConfig,
        account_name: impl Into<String>,
        password: &SecretString,
    ) -> Result<Self> {
        let session = Session::login(config, account_name, password)
            .await
            .map_err(|err| {
                warn!(error = %err, "failed to create instance client");
                err
            })?;
        Ok(Self { session })
    }

    /// Wrap an existing session.
    #[must_use]
    pub const fn from_session(session: Session) -> Self {
        Self { session }
    }

    /// Underlying session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Log out and return the session.
    ///
    /// # Errors
    ///
    /// See [`Session::logout`].
    pub async fn logout(mut self) -> Result<Session> {
        self.session.logout().await?;
        Ok(self.session)
    }

    /// List every instance visible to the account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] for a non-200 answer and [`Error::ParseError`] if a
    /// non-empty 200 body cannot be decoded.
    pub async fn query_instances(&self) -> Result<Vec<VmInstanceInventory>> {
        let response = self
            .session
            .send::<()>(Method::GET, VM_INSTANCES_PATH, None)
            .await?;
        let inventories = self.read_query(response).await?;
        debug!(count = inventories.len(), "queried vm instances");
        Ok(inventories)
    }

    /// Fetch a single instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] with status 404 if the server has no such instance,
    /// plus every error [`query_instances`](Self::query_instances) can return.
    pub async fn get_instance(&self, uuid: &VmUuid) -> Result<VmInstanceInventory> {
        let path = format!("{VM_INSTANCES_PATH}/{uuid}");
        let response = self
            .session
            .send::<()>(Method::GET, &path, None)
            .await?;

        self.read_query(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Api {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("vm instance {uuid} not found"),
            })
    }

    /// Start an instance and wait for the job to finish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the action is rejected, [`Error::Poll`] if the
    /// job fails or `timeout` elapses.
    pub async fn start_instance(
        &self,
        uuid: &VmUuid,
        timeout: Duration,
    ) -> Result<VmInstanceInventory> {
        self.run_action(uuid, InstanceAction::StartVmInstance {}, timeout)
            .await
    }

    /// Stop an instance and wait for the job to finish.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Api`] if the action is rejected, [`Error::Poll`] if the
    /// job fails or `timeout` elapses.
    pub async fn stop_instance(
        &self,
        uuid: &VmUuid,
        timeout: Duration,
    ) -> Result<VmInstanceInventory> {
        self.run_action(uuid, InstanceAction::StopVmInstance {}, timeout)
            .await
    }

    async fn run_action(
        &self,
        uuid: &VmUuid,
        action: InstanceAction,
        timeout: Duration,
    ) -> Result<VmInstanceInventory> {
        let path = format!("{VM_INSTANCES_PATH}/{uuid}/actions");
        info!(%uuid, action = action.name(), "submitting instance action");

        let response = self
            .session
            .send(Method::PUT, &path, Some(&action))
            .await?;

        let status = response.status();
        let result = match status {
            StatusCode::ACCEPTED => {
                self.session
                    .resolve::<InstanceResponse>(response, timeout)
                    .await?
            }
            status if status.is_success() => {
                let body = read_text(response).await?;
                Some(serde_json::from_str(&body).map_err(|err| {
                    Error::ParseError(format!("Failed to parse {} response: {err}", action.name()))
                })?)
            }
            status => {
                let body = read_text(response).await?;
                return Err(Error::Api {
                    status: status.as_u16(),
                    message: describe_failure(status, &body),
                });
            }
        };

        match result {
            Some(InstanceResponse {
                inventory: Some(inventory),
                ..
            }) => {
                info!(%uuid, action = action.name(), state = ?inventory.state, "instance action finished");
                Ok(inventory)
            }
            Some(InstanceResponse {
                error: Some(err), ..
            }) => Err(Error::Api {
                status: status.as_u16(),
                message: err.flatten(),
            }),
            _ => Err(Error::ParseError(format!(
                "{} on {uuid} finished without an inventory",
                action.name()
            ))),
        }
    }

    async fn read_query(&self, response: Response) -> Result<Vec<VmInstanceInventory>> {
        let status = response.status();
        let body = read_text(response).await?;

        let decoded = serde_json::from_str::<QueryInstanceResponse>(&body);
        if let Err(err) = &decoded {
            warn!(status = status.as_u16(), error = %err, "failed to decode vm instance query response");
        }

        if status != StatusCode::OK {
            let message = match decoded {
                Ok(QueryInstanceResponse {
                    error: Some(err), ..
                }) => err.flatten(),
                _ => describe_failure(status, &body),
            };
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        match decoded {
            Ok(query) => Ok(query.inventories),
            Err(_) if body.trim().is_empty() => Ok(Vec::new()),
            Err(err) => Err(Error::ParseError(format!(
                "Failed to parse vm instance query response: {err}"
            ))),
        }
    }
}

async fn read_text(response: Response) -> Result<String> {
    let url = response.url().clone();
    response
        .text()
        .await
        .map_err(|err| Error::Transport(format!("read response {url}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zstack_core::error::PollError;

    const TOKEN: &str = "d93ec8f8f1c54a4ab6b1e0c5a2f9b001";
    const VM: &str = "8e2cbd2a3b7e4b48a7f3f9d0b9a1c001";

    fn password() -> SecretString {
        SecretString::from("password".to_string())
    }

    fn test_config(server: &MockServer) -> ZStackConfig {
        ZStackConfig::new(server.uri())
            .unwrap()
            .with_poll_interval(Duration::from_millis(20))
    }

    async fn test_client(server: &MockServer) -> InstanceClient {
        Mock::given(method("PUT"))
            .and(path("/zstack/v1/accounts/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "inventory": {"uuid": TOKEN}
            })))
            .mount(server)
            .await;

        InstanceClient::connect(test_config(server), "admin", &password())
            .await
            .unwrap()
    }

    fn vm_uuid() -> VmUuid {
        VM.parse().unwrap()
    }

    fn inventory_json(state: &str) -> serde_json::Value {
        json!({
            "uuid": VM,
            "name": "web-01",
            "state": state,
            "memorySize": 2_147_483_648_i64,
            "cpuNum": 2,
            "vmNics": [{"uuid": "0b1f3c5e7a9d4b2c8e6f1a3b5c7d9e01", "ip": "10.0.0.12", "deviceId": 0}]
        })
    }

    #[tokio::test]
    async fn test_connect_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/zstack/v1/accounts/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": "ID.1001", "description": "wrong password", "details": "admin"}
            })))
            .mount(&server)
            .await;

        let err = InstanceClient::connect(test_config(&server), "admin", &password())
            .await
            .unwrap_err();
        assert_eq!(err, Error::Auth("wrong password admin".to_string()));
    }

    #[tokio::test]
    async fn test_query_instances_success() {
        let server = MockServer::start().await;
        let client = test_client(&server).await;

        Mock::given(method("GET"))
            .and(path(VM_INSTANCES_PATH))
            .and(header("Authorization", format!("OAuth {TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "inventories": [inventory_json("Running")]
            })))
            .mount(&server)
            .await;

        let vms = client.query_instances().await.unwrap();
        assert_eq!(vms.len(), 1);
        assert_eq!(vms[0].name.as_deref(), Some("web-01"));
        assert_eq!(vms[0].memory_size, Some(2_147_483_648));
        assert_eq!(vms[0].ips(), vec!["10.0.0.12"]);
    }

    #[tokio::test]
    async fn test_query_instances_structured_error() {
        let server = MockServer::start().await;
        let client = test_client(&server).await;

        Mock::given(method("GET"))
            .and(path(VM_INSTANCES_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {
                    "code": "SYS.1001",
                    "description": "permission denied",
                    "cause": {"code": "ID.1002", "description": "session expired"}
                }
            })))
            .mount(&server)
            .await;

        let err = client.query_instances().await.unwrap_err();
        assert_eq!(
            err,
            Error::Api {
                status: 403,
                message: "code:SYS.1001,detail:,description:permission denied: \
                          code:ID.1002,detail:,description:session expired"
                    .to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_query_instances_raw_error() {
        let server = MockServer::start().await;
        let client = test_client(&server).await;

        Mock::given(method("GET"))
            .and(path(VM_INSTANCES_PATH))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client.query_instances().await.unwrap_err();
        assert_eq!(
            err,
            Error::Api {
                status: 502,
                message: "status code 502, bad gateway".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_query_instances_empty_body() {
        let server = MockServer::start().await;
        let client = test_client(&server).await;

        Mock::given(method("GET"))
            .and(path(VM_INSTANCES_PATH))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert!(client.query_instances().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_instances_malformed_body() {
        let server = MockServer::start().await;
        let client = test_client(&server).await;

        Mock::given(method("GET"))
            .and(path(VM_INSTANCES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"inventories\": 7}"))
            .mount(&server)
            .await;

        let err = client.query_instances().await.unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[tokio::test]
    async fn test_get_instance() {
        let server = MockServer::start().await;
        let client = test_client(&server).await;

        Mock::given(method("GET"))
            .and(path(format!("{VM_INSTANCES_PATH}/{VM}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "inventories": [inventory_json("Stopped")]
            })))
            .mount(&server)
            .await;

        let vm = client.get_instance(&vm_uuid()).await.unwrap();
        assert_eq!(vm.uuid(), Some(&vm_uuid()));
        assert!(vm.is_stopped());
    }

    #[tokio::test]
    async fn test_get_instance_missing() {
        let server = MockServer::start().await;
        let client = test_client(&server).await;

        Mock::given(method("GET"))
            .and(path(format!("{VM_INSTANCES_PATH}/{VM}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"inventories": []})))
            .mount(&server)
            .await;

        let err = client.get_instance(&vm_uuid()).await.unwrap_err();
        assert!(matches!(err, Error::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_start_instance_resolves_job() {
        let server = MockServer::start().await;
        let client = test_client(&server).await;
        let job = "/zstack/v1/api-jobs/3a7c";

        Mock::given(method("PUT"))
            .and(path(format!("{VM_INSTANCES_PATH}/{VM}/actions").as_str()))
            .and(header("Authorization", format!("OAuth {TOKEN}").as_str()))
            .and(body_json(json!({"startVmInstance": {}})))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "location": format!("{}{job}", server.uri())
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(job))
            .respond_with(ResponseTemplate::new(202))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(job))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "inventory": inventory_json("Running")
            })))
            .mount(&server)
            .await;

        let vm = client
            .start_instance(&vm_uuid(), Duration::from_secs(5))
            .await
            .unwrap();
        assert!(vm.is_running());
    }

    #[tokio::test]
    async fn test_stop_instance_job_failure() {
        let server = MockServer::start().await;
        let client = test_client(&server).await;
        let job = "/zstack/v1/api-jobs/9d2e";

        Mock::given(method("PUT"))
            .and(path(format!("{VM_INSTANCES_PATH}/{VM}/actions").as_str()))
            .and(body_json(json!({"stopVmInstance": {}})))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "location": format!("{}{job}", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(job))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": {"code": "VM.1003", "description": "host unreachable"}
            })))
            .mount(&server)
            .await;

        let err = client
            .stop_instance(&vm_uuid(), Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            Error::Poll(PollError::ServerError { message, .. }) => {
                assert_eq!(message, "code:VM.1003,detail:,description:host unreachable");
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_action_rejected_before_job() {
        let server = MockServer::start().await;
        let client = test_client(&server).await;

        Mock::given(method("PUT"))
            .and(path(format!("{VM_INSTANCES_PATH}/{VM}/actions").as_str()))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": "SYS.1007", "description": "invalid state", "details": "Stopped"}
            })))
            .mount(&server)
            .await;

        let err = client
            .stop_instance(&vm_uuid(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::Api {
                status: 400,
                message: "code:SYS.1007,detail:Stopped,description:invalid state".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_job_without_inventory() {
        let server = MockServer::start().await;
        let client = test_client(&server).await;
        let job = "/zstack/v1/api-jobs/5b4f";

        Mock::given(method("PUT"))
            .and(path(format!("{VM_INSTANCES_PATH}/{VM}/actions").as_str()))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "location": format!("{}{job}", server.uri())
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(job))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = client
            .start_instance(&vm_uuid(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[tokio::test]
    async fn test_logout_returns_session() {
        let server = MockServer::start().await;
        let client = test_client(&server).await;

        Mock::given(method("DELETE"))
            .and(path(format!("/zstack/v1/accounts/sessions/{TOKEN}").as_str()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let session = client.logout().await.unwrap();
        assert!(!session.is_authenticated());
    }
}
