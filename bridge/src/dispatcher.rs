use std::sync::Arc;

use minion_core::{ActionEvent, ActionQueue, AgentRegistry, OwnerId, ReadExecutor, RequestError};
use minion_proto::{robot_request, RobotRequest, RobotResponse};
use tracing::debug;

use crate::convert;

/// Splits requests between the read path and the action queue.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<AgentRegistry>,
    reads: ReadExecutor,
    queue: Arc<ActionQueue>,
}

impl Dispatcher {
    pub fn new(registry: Arc<AgentRegistry>, queue: Arc<ActionQueue>) -> Self {
        Self {
            reads: ReadExecutor::new(registry.clone()),
            registry,
            queue,
        }
    }

    /// Handle one request.
    ///
    /// Returns the response when it is known right away (reads and rejected
    /// writes). Accepted writes return `None`; `reply` is then called from the
    /// tick thread once the action has been applied.
    pub fn dispatch(
        &self,
        request: RobotRequest,
        reply: impl FnOnce(RobotResponse) + Send + 'static,
    ) -> Option<RobotResponse> {
        let key = request.key;
        let owner = match self.resolve_owner(&request) {
            Ok(owner) => owner,
            Err(e) => return Some(convert::error_response(key, &e)),
        };

        match request.request {
            Some(robot_request::Request::ReadRequest(read)) => {
                let result =
                    convert::read_from_wire(read).and_then(|query| self.reads.execute(owner, query));
                Some(convert::read_response(key, result))
            }
            Some(robot_request::Request::ActionRequest(action)) => {
                let action = match convert::action_from_wire(action) {
                    Ok(action) => action,
                    Err(e) => return Some(convert::error_response(key, &e)),
                };
                if !self.registry.contains(owner) {
                    return Some(convert::error_response(key, &RequestError::UnknownAgent));
                }
                debug!(target: "bridge", owner = %owner, key = ?key, action = action.name(), "Action queued");
                self.queue.enqueue(ActionEvent::new(owner, key, action, move |result| {
                    reply(convert::action_response(result))
                }));
                None
            }
            None => Some(convert::error_response(
                key,
                &RequestError::InvalidRequest("request has neither action nor read".into()),
            )),
        }
    }

    /// The stable identity wins; the display name is only a fallback.
    fn resolve_owner(&self, request: &RobotRequest) -> Result<OwnerId, RequestError> {
        if !request.owner_id.is_empty() {
            return request
                .owner_id
                .parse()
                .map_err(|e| RequestError::InvalidRequest(format!("bad owner id: {}", e)));
        }
        if request.name.is_empty() {
            return Err(RequestError::InvalidRequest("no owner given".into()));
        }
        self.registry
            .resolve_name(&request.name)
            .ok_or(RequestError::UnknownAgent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minion_core::{AvatarKind, BlockPos, MemoryPresence, MemoryWorld, WorldDirectory};
    use minion_proto::{error_message, robot_action_request, world_location, RobotActionRequest};

    fn setup() -> (Dispatcher, Arc<ActionQueue>, OwnerId) {
        let registry = Arc::new(AgentRegistry::new(Arc::new(MemoryPresence::new())));
        let worlds = WorldDirectory::new().with(Arc::new(MemoryWorld::new("world")));
        let owner = OwnerId::new_v4();
        registry
            .spawn(&worlds, owner, Some("gina"), "world", BlockPos::new(0, 0, 0), AvatarKind::Hover)
            .unwrap();
        let queue = Arc::new(ActionQueue::new());
        (Dispatcher::new(registry, queue.clone()), queue, owner)
    }

    fn move_up(name: &str, key: i64) -> RobotRequest {
        RobotRequest {
            name: name.to_string(),
            key: Some(key),
            request: Some(robot_request::Request::ActionRequest(RobotActionRequest {
                action: Some(robot_action_request::Action::MoveDirection(
                    world_location::Direction::Up as i32,
                )),
            })),
            owner_id: String::new(),
        }
    }

    #[test]
    fn accepted_write_is_queued_without_reply() {
        let (dispatcher, queue, owner) = setup();
        assert!(dispatcher.dispatch(move_up("gina", 1), |_| {}).is_none());
        let event = queue.dequeue_one().unwrap();
        assert_eq!(event.owner, owner);
        assert_eq!(event.key, Some(1));
    }

    #[test]
    fn unresolvable_name_is_rejected_immediately() {
        let (dispatcher, queue, _) = setup();
        let response = dispatcher.dispatch(move_up("nobody", 4), |_| {}).unwrap();
        assert_eq!(response.key, Some(4));
        assert!(!response.success);
        let Some(minion_proto::robot_response::Response::ErrorMessage(e)) = response.response else {
            panic!("expected error");
        };
        assert_eq!(e.reason, error_message::Reason::RobotDoesNotExist as i32);
        assert!(queue.is_empty());
    }

    #[test]
    fn owner_id_takes_precedence_over_name() {
        let (dispatcher, queue, owner) = setup();
        let mut request = move_up("nobody", 5);
        request.owner_id = owner.to_string();
        assert!(dispatcher.dispatch(request, |_| {}).is_none());
        assert_eq!(queue.len(), 1);

        let mut bad = move_up("gina", 6);
        bad.owner_id = "not-a-uuid".into();
        let response = dispatcher.dispatch(bad, |_| {}).unwrap();
        assert!(!response.success);
    }

    #[test]
    fn invalid_action_is_not_queued() {
        let (dispatcher, queue, _) = setup();
        let mut request = move_up("gina", 2);
        request.request = Some(robot_request::Request::ActionRequest(RobotActionRequest {
            action: Some(robot_action_request::Action::TurnDirection(0)),
        }));
        let response = dispatcher.dispatch(request, |_| {}).unwrap();
        assert!(!response.success);
        assert!(queue.is_empty());
    }
}
