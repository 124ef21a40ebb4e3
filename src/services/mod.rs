/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Single-consumer relay loop owning the registry and session table.
pub mod relay_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
