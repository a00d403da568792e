pub mod game_service;
pub mod reconnect_service;
pub mod room_events;
pub mod session_service;
pub mod socket_service;
