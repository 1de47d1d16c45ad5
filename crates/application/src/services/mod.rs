mod room_service;

pub use room_service::{JoinOutcome, RoomService, RoomServiceDependencies, RoomView};
