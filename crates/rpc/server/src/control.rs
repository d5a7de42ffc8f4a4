//! Control service: maps protobuf requests onto the lifecycle controller.

use std::sync::Arc;

use p2pd_node_core::{ControlError, ErrorKind, LifecycleController, NodeStatus};
use p2pd_primitives::{NodeId, NodeState};
use p2pd_runtime::NodeRuntime;
use tonic::{Request, Response, Status};

use crate::proto::control::{
    self, CreateNodeRequest, CreateNodeResponse, ListenNodeRequest, ListenNodeResponse,
    StartNodeRequest, StartNodeResponse, StatusNodeRequest, StatusNodeResponse, StopNodeRequest,
    StopNodeResponse, control_server::Control,
};

/// Control service implementation.
///
/// Requests are validated here, before the controller sees them, so a
/// malformed request has no side effects.
pub struct ControlService<R: NodeRuntime> {
    controller: Arc<LifecycleController<R>>,
}

impl<R: NodeRuntime> ControlService<R> {
    pub fn new(controller: Arc<LifecycleController<R>>) -> Self {
        Self { controller }
    }
}

impl<R: NodeRuntime> std::fmt::Debug for ControlService<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlService").finish_non_exhaustive()
    }
}

#[tonic::async_trait]
impl<R: NodeRuntime> Control for ControlService<R> {
    async fn create_node(
        &self,
        request: Request<CreateNodeRequest>,
    ) -> Result<Response<CreateNodeResponse>, Status> {
        let id = parse_node_id(request.into_inner().node_id)?;
        let peer_id = self.controller.create_node(&id).await.map_err(to_status)?;

        Ok(Response::new(CreateNodeResponse {
            node_peer_id: peer_id.to_base58(),
        }))
    }

    async fn start_node(
        &self,
        request: Request<StartNodeRequest>,
    ) -> Result<Response<StartNodeResponse>, Status> {
        let id = parse_node_id(request.into_inner().node_id)?;
        let status = self.controller.start_node(&id).await.map_err(to_status)?;

        Ok(Response::new(StartNodeResponse {
            node_peer_id: status.peer_id.to_base58(),
            node_listen_addrs: status.listen_addrs,
        }))
    }

    async fn listen_node(
        &self,
        request: Request<ListenNodeRequest>,
    ) -> Result<Response<ListenNodeResponse>, Status> {
        let ListenNodeRequest { node_id, addr } = request.into_inner();
        let id = parse_node_id(node_id)?;
        if addr.is_empty() {
            return Err(Status::invalid_argument("addr must not be empty"));
        }

        let status = self
            .controller
            .listen_node(&id, &addr)
            .await
            .map_err(to_status)?;

        Ok(Response::new(ListenNodeResponse {
            node_peer_id: status.peer_id.to_base58(),
            node_listen_addrs: status.listen_addrs,
        }))
    }

    async fn status_node(
        &self,
        request: Request<StatusNodeRequest>,
    ) -> Result<Response<StatusNodeResponse>, Status> {
        let id = parse_node_id(request.into_inner().node_id)?;
        let NodeStatus {
            peer_id,
            state,
            listen_addrs,
        } = self.controller.status_node(&id).map_err(to_status)?;

        Ok(Response::new(StatusNodeResponse {
            node_peer_id: peer_id.to_base58(),
            node_state: proto_state(state).into(),
            node_listen_addrs: listen_addrs,
        }))
    }

    async fn stop_node(
        &self,
        request: Request<StopNodeRequest>,
    ) -> Result<Response<StopNodeResponse>, Status> {
        let id = parse_node_id(request.into_inner().node_id)?;
        let status = self.controller.stop_node(&id).await.map_err(to_status)?;

        Ok(Response::new(StopNodeResponse {
            node_peer_id: status.peer_id.to_base58(),
            node_listen_addrs: status.listen_addrs,
        }))
    }
}

fn parse_node_id(raw: String) -> Result<NodeId, Status> {
    NodeId::new(raw).map_err(|err| Status::invalid_argument(err.to_string()))
}

fn proto_state(state: NodeState) -> control::NodeState {
    match state {
        NodeState::Unknown => control::NodeState::Unspecified,
        NodeState::Stopped => control::NodeState::Stopped,
        NodeState::Started => control::NodeState::Started,
    }
}

fn to_status(err: ControlError) -> Status {
    let message = err.to_string();
    match err.kind() {
        ErrorKind::Validation => Status::invalid_argument(message),
        ErrorKind::Conflict => Status::already_exists(message),
        ErrorKind::NotFound => Status::not_found(message),
        ErrorKind::Collaborator => Status::internal(message),
    }
}
