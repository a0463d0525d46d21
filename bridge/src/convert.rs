//! Wire messages to domain types and back.
//!
//! Unset fields and zero enum values are `InvalidRequest`; enum values this
//! server does not know (a newer client) are `NotImplemented`.

use minion_core::{
    Action, BlockPos, ClientAction, Direction, EntityKind, Material, ReadOutcome, ReadQuery,
    RequestError, Target,
};
use minion_proto::{
    error_message, robot_action_request, robot_read_request, robot_response, world_location,
    Coordinate, ErrorMessage, RobotActionRequest, RobotReadRequest, RobotResponse, WorldLocation,
};

pub fn direction_from_wire(value: i32) -> Result<Direction, RequestError> {
    use world_location::Direction as Wire;
    let wire = Wire::try_from(value)
        .map_err(|_| RequestError::NotImplemented(format!("direction {}", value)))?;
    Ok(match wire {
        Wire::Unspecified => {
            return Err(RequestError::InvalidRequest("direction not set".into()))
        }
        Wire::Up => Direction::UP,
        Wire::Down => Direction::DOWN,
        Wire::Left => Direction::LEFT,
        Wire::Right => Direction::RIGHT,
        Wire::Forward => Direction::FORWARD,
        Wire::Backward => Direction::BACKWARD,
        Wire::North => Direction::NORTH,
        Wire::South => Direction::SOUTH,
        Wire::East => Direction::EAST,
        Wire::West => Direction::WEST,
    })
}

pub fn material_from_wire(material: Option<minion_proto::Material>) -> Result<Material, RequestError> {
    let material =
        material.ok_or_else(|| RequestError::InvalidRequest("material not set".into()))?;
    Material::from_id(material.r#type)
        .ok_or_else(|| RequestError::NotImplemented(format!("material {}", material.r#type)))
}

pub fn material_to_wire(material: Material) -> minion_proto::Material {
    minion_proto::Material {
        r#type: material.id(),
    }
}

fn coordinate_from_wire(c: Coordinate) -> BlockPos {
    BlockPos::new(c.x, c.y, c.z)
}

fn location_to_wire(pos: BlockPos) -> WorldLocation {
    WorldLocation {
        location: Some(world_location::Location::AbsoluteLocation(Coordinate {
            x: pos.x,
            y: pos.y,
            z: pos.z,
        })),
    }
}

fn target_from_wire(location: WorldLocation) -> Result<Target, RequestError> {
    match location.location {
        Some(world_location::Location::Direction(d)) => Ok(Target::Direction(direction_from_wire(d)?)),
        Some(world_location::Location::AbsoluteLocation(c)) => {
            Ok(Target::Coordinate(coordinate_from_wire(c)))
        }
        None => Err(RequestError::InvalidRequest("location not set".into())),
    }
}

pub fn action_from_wire(request: RobotActionRequest) -> Result<Action, RequestError> {
    use robot_action_request::Action as Wire;
    match request.action {
        Some(Wire::MoveDirection(d)) => Ok(Action::Move(direction_from_wire(d)?)),
        Some(Wire::TurnDirection(d)) => Ok(Action::Turn(direction_from_wire(d)?)),
        Some(Wire::MineDirection(d)) => Ok(Action::Mine(direction_from_wire(d)?)),
        Some(Wire::Place(place)) => Ok(Action::Place {
            direction: direction_from_wire(place.direction)?,
            material: material_from_wire(place.material)?,
        }),
        Some(Wire::Chat(chat)) => Ok(Action::Chat {
            text: chat.message,
            public: chat.is_public,
        }),
        Some(Wire::TeleportLocation(c)) => Ok(Action::Teleport(coordinate_from_wire(c))),
        None => Err(RequestError::InvalidRequest(
            "action request has no action".into(),
        )),
    }
}

pub fn read_from_wire(request: RobotReadRequest) -> Result<ReadQuery, RequestError> {
    use robot_read_request::Request as Wire;
    match request.request {
        Some(Wire::LocateNonsolidNearby(_)) => Ok(ReadQuery::LocateNonSolidNearby),
        Some(Wire::LocateEntity(value)) => {
            let entity = robot_read_request::Entity::try_from(value)
                .map_err(|_| RequestError::NotImplemented(format!("entity {}", value)))?;
            match entity {
                robot_read_request::Entity::Robot => Ok(ReadQuery::LocateEntity(EntityKind::Robot)),
                robot_read_request::Entity::Owner => Ok(ReadQuery::LocateEntity(EntityKind::Owner)),
                robot_read_request::Entity::Unspecified => {
                    Err(RequestError::InvalidRequest("entity not set".into()))
                }
            }
        }
        Some(Wire::LocateMaterialNearby(m)) => {
            Ok(ReadQuery::LocateMaterialNearby(material_from_wire(Some(m))?))
        }
        Some(Wire::IdentifyMaterial(l)) => Ok(ReadQuery::IdentifyMaterial(target_from_wire(l)?)),
        Some(Wire::IsSolid(l)) => Ok(ReadQuery::IsSolid(target_from_wire(l)?)),
        Some(Wire::GetInventory(_)) => Ok(ReadQuery::GetInventory),
        None => Err(RequestError::InvalidRequest(
            "read request has no request".into(),
        )),
    }
}

pub fn outcome_to_wire(outcome: ReadOutcome) -> robot_response::Response {
    match outcome {
        ReadOutcome::Locations(cells) => {
            robot_response::Response::LocationResponse(minion_proto::LocationResponse {
                locations: cells.into_iter().map(location_to_wire).collect(),
            })
        }
        ReadOutcome::Materials(materials) => {
            robot_response::Response::MaterialResponse(minion_proto::MaterialResponse {
                materials: materials.into_iter().map(material_to_wire).collect(),
            })
        }
        ReadOutcome::Boolean(value) => {
            robot_response::Response::BooleanResponse(minion_proto::BooleanResponse { value })
        }
        ReadOutcome::Inventory(totals) => {
            let (materials, counts) = totals
                .into_iter()
                .map(|(m, n)| (material_to_wire(m), i32::try_from(n).unwrap_or(i32::MAX)))
                .unzip();
            robot_response::Response::InventoryResponse(minion_proto::InventoryResponse {
                materials,
                counts,
            })
        }
    }
}

pub fn error_to_wire(error: &RequestError) -> ErrorMessage {
    let reason = match error {
        RequestError::Unknown(_) => error_message::Reason::Unknown,
        RequestError::UnknownAgent => error_message::Reason::RobotDoesNotExist,
        RequestError::OwnerUnavailable => error_message::Reason::OwnerUnavailable,
        RequestError::TargetNotVisible => error_message::Reason::BlockIsNotVisible,
        RequestError::InvalidRequest(_) => error_message::Reason::InvalidRequest,
        RequestError::NotImplemented(_) => error_message::Reason::NotImplemented,
    };
    let action = match error.client_action() {
        ClientAction::FailAction => error_message::Action::FailAction,
        ClientAction::ExitClient => error_message::Action::ExitClient,
    };
    ErrorMessage {
        reason: reason as i32,
        message: error.to_string(),
        action: action as i32,
    }
}

pub fn error_response(key: Option<i64>, error: &RequestError) -> RobotResponse {
    RobotResponse {
        key,
        success: false,
        response: Some(robot_response::Response::ErrorMessage(error_to_wire(error))),
    }
}

pub fn read_response(key: Option<i64>, result: Result<ReadOutcome, RequestError>) -> RobotResponse {
    match result {
        Ok(outcome) => RobotResponse {
            key,
            success: true,
            response: Some(outcome_to_wire(outcome)),
        },
        Err(e) => error_response(key, &e),
    }
}

pub fn action_response(result: minion_core::ActionResult) -> RobotResponse {
    RobotResponse {
        key: result.key,
        success: result.success,
        response: result
            .error
            .as_ref()
            .map(|e| robot_response::Response::ErrorMessage(error_to_wire(e))),
    }
}
