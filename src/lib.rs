//! Message delivery and rendering engine for the PagePilot page copilot.
//!
//! PagePilot injects a chat assistant into supported third-party pages,
//! extracts a textual snapshot of the page, relays it to a remote copilot
//! endpoint and renders the reply into the chat surface one paragraph at a
//! time. This crate holds everything between "the page navigated" and
//! "the reply is on screen": identity, page classification, content
//! extraction, the relay contract, conversation persistence, the render
//! queue state machine and the per-navigation lifecycle controller.
//!
//! Host-specific concerns (the real DOM, the real extension messaging
//! bridge) sit behind the [`chat::ChatSurface`], [`lifecycle::PageView`]
//! and [`relay::RelayChannel`] traits, so the whole pipeline runs
//! headlessly in tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Chat render queue, paragraph pacing and the rate-limit state machine.
pub mod chat;
/// Hostname classification of supported pages.
pub mod classify;
/// Widget configuration and defaults.
pub mod config;
/// Per-site page content extraction strategies.
pub mod extract;
/// Client identity generation and persistence.
pub mod identity;
/// Navigation-driven orchestration of the whole pipeline.
pub mod lifecycle;
/// Typed relay contract and the copilot API client.
pub mod relay;
/// Conversation history and persisted widget state.
pub mod store;
