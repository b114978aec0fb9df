//! Integration tests: orchestrator scenarios over a scripted transport, and the
//! reqwest transport against a mock HTTP server.

mod http_transport;
mod orchestrator;
mod scripted_transport;
