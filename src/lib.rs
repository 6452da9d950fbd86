//! # CodeAlive Context
//!
//! A command-line client for the CodeAlive code-intelligence service.
//!
//! It lists indexed repositories and workspaces, runs semantic code search,
//! holds multi-turn Q&A conversations about a codebase, and chains search
//! and chat into fixed "explore" workflows. A setup flow stores and verifies
//! the API key in the OS credential store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ Credentials  │──▶│   Client     │──▶│  CodeAlive API  │
//! │ arg/env/OS   │   │ bearer+JSON  │   │  (remote)       │
//! └──────────────┘   └──────┬───────┘   └────────────────┘
//!                           │
//!        ┌──────────────┬───┴──────────┬──────────────┐
//!        ▼              ▼              ▼              ▼
//!  ┌───────────┐  ┌──────────┐  ┌──────────┐  ┌───────────┐
//!  │datasources│  │  search  │  │   chat   │  │  explore  │
//!  └───────────┘  └──────────┘  └──────────┘  └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! codealive setup                                   # store and verify a key
//! codealive datasources                             # what is indexed
//! codealive search "JWT validation" my-backend
//! codealive chat "How does caching work?" my-backend
//! codealive explore "debug:slow queries" my-api
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and defaults |
//! | [`error`] | Error taxonomy with actionable messages |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`credentials`] | Ordered API key resolution |
//! | [`keychain`] | OS credential store backends |
//! | [`client`] | Authenticated HTTP client |
//! | [`models`] | Wire types |
//! | [`datasources`] | List data sources |
//! | [`search`] | Semantic search and result rendering |
//! | [`chat`] | Codebase Q&A with conversation continuation |
//! | [`explore`] | Search-then-chat workflows |
//! | [`setup`] | Key setup and `auth-check` |

pub mod chat;
pub mod client;
pub mod config;
pub mod credentials;
pub mod datasources;
pub mod error;
pub mod explore;
pub mod keychain;
pub mod logging;
pub mod models;
pub mod search;
pub mod setup;

pub use client::CodeAliveClient;
pub use credentials::{Credential, CredentialResolver};
pub use error::{CodeAliveError, Result};
pub use models::{ChatReply, DataSource, DataSourceType, SearchHit, SearchMode};
