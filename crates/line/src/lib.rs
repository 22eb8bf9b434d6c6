//! LINE Integration - webhook bot interface
//!
//! This crate provides the LINE side of nickbook:
//! - **Events** (`events`) - webhook envelope and per-event validation
//! - **Commands** (`commands`) - `@登記暱稱`, `@找人`, `@暱稱清單`, `@刪除暱稱`, `@說明`
//! - **Guard** (`guard`) - group allow-list check
//! - **Profiles** (`profile`) - display name lookup with id fallback
//! - **Client** (`client`) - Messaging API calls (reply, leave, profiles)
//! - **Dispatcher** (`dispatcher`) - per-event pipeline with isolated outcomes
//!
//! # Architecture
//!
//! ```text
//! Webhook → signature → WebhookDispatcher → Guard → Parser → Resolver → CommandRouter
//!                                                                          ↓
//!                                           LineClient::reply_text ← NicknameRepository
//! ```
//!
//! # Key Types
//!
//! - `WebhookDispatcher` - fans a delivery out to per-event handlers
//! - `CommandRouter` - maps a parsed command to a store call and one reply
//! - `LineClient` - trait over the Messaging API, `HttpLineClient` in production

pub mod client;
pub mod commands;
pub mod dispatcher;
pub mod events;
pub mod guard;
pub mod messages;
pub mod profile;
pub mod signature;

pub use client::{ClientError, HttpLineClient, LineClient, Profile};
pub use dispatcher::{DispatchError, EventContext, EventOutcome, WebhookDispatcher};
pub use guard::{GuardDecision, MembershipGuard};
pub use signature::verify_signature;
